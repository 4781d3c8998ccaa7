//! General rate model column.
//!
//! Finite-volume rendition with first-order upwind convection, central
//! axial dispersion, a film flux per cell and component, and spherical
//! particle shells with pore and surface diffusion. Binding is linear,
//! kinetic or quasi-stationary.
//!
//! # State layout
//!
//! ```text
//! [ inlet (ncomp)
//! | bulk   [AxialCell, Component]
//! | particles, per axial cell and shell: [cp (ncomp) | q (nbound)]
//! | flux   [Component, AxialCell] ]
//! ```
//!
//! The particle mobile and solid phase blocks interleave: both advance by
//! one shell (`ncomp + nbound` elements) per radial cell.
//!
//! # Equations
//!
//! With `h = L / ncol`, `β_c = (1 - ε_c) / ε_c` and shell geometry in
//! coordinates `ξ = r / r_p`:
//!
//! ```text
//! bulk:     ċ + u (c_k - c_{k-1}) / h - D_ax Δc / h² + β_c 3 / r_p j = 0
//! flux:     j - k_f (c - cp_outer) = 0
//! particle: ε_p ċp + (1 - ε_p) Σ q̇ - (shell inflows) / V_shell = 0
//! bound:    q̇ - (k_a cp - k_d q) = 0          (kinetic)
//!           k_d q - k_a cp = 0                (quasi-stationary)
//! inlet:    c_in = 0                          (coupled by the network)
//! ```
//!
//! All rows are linear and homogeneous in `(y, ẏ)`, so `J x = F(x, 0)` and
//! `J_dot x = F(0, x)`.

use chroma_core::registry::{ParamHandle, ParameterRegistry};
use chroma_core::solution::{BlockLayout, StateLayout, StateOrdering};
use chroma_core::traits::{ExportSolution, ParameterProvider, ResidualAssembly, UnitOperation};
use chroma_core::types::{
    Active, AdConfig, CoreError, CoreResult, ParameterId, ParameterName, ResidualScalar, UnitOpIdx,
};

use crate::config::{AdsorptionModel, GeneralRateConfig, ParticleDiscretization};
use crate::error::ModelResult;

/// Offsets of the interleaved column state.
#[derive(Clone, Debug)]
struct ColumnIndexer {
    ncomp: usize,
    ncol: usize,
    npar: usize,
    nbound_total: usize,
    off_bulk: usize,
    off_par: usize,
    off_flux: usize,
}

impl ColumnIndexer {
    fn new(ncomp: usize, ncol: usize, npar: usize, nbound_total: usize) -> Self {
        let off_bulk = ncomp;
        let off_par = off_bulk + ncol * ncomp;
        let off_flux = off_par + ncol * npar * (ncomp + nbound_total);
        Self {
            ncomp,
            ncol,
            npar,
            nbound_total,
            off_bulk,
            off_par,
            off_flux,
        }
    }

    #[inline]
    fn shell_stride(&self) -> usize {
        self.ncomp + self.nbound_total
    }

    #[inline]
    fn num_dofs(&self) -> usize {
        self.off_flux + self.ncomp * self.ncol
    }

    #[inline]
    fn bulk(&self, col: usize, comp: usize) -> usize {
        self.off_bulk + col * self.ncomp + comp
    }

    #[inline]
    fn shell(&self, col: usize, shell: usize) -> usize {
        self.off_par + (col * self.npar + shell) * self.shell_stride()
    }

    #[inline]
    fn mobile(&self, col: usize, shell: usize, comp: usize) -> usize {
        self.shell(col, shell) + comp
    }

    #[inline]
    fn solid(&self, col: usize, shell: usize, bound: usize) -> usize {
        self.shell(col, shell) + self.ncomp + bound
    }

    #[inline]
    fn flux(&self, col: usize, comp: usize) -> usize {
        self.off_flux + comp * self.ncol + col
    }
}

/// Dimensionless shell geometry, `ξ = r / r_p`, shell 0 outermost.
#[derive(Clone, Debug, PartialEq)]
struct ShellGeometry {
    /// `3 / (ξ_o³ - ξ_i³)` of the outermost shell
    film: f64,
    /// Inflow factor through the outer face, `3 ξ_o² / (δξ V)`; zero for shell 0
    outer: Vec<f64>,
    /// Inflow factor through the inner face, `3 ξ_i² / (δξ V)`; zero for the core
    inner: Vec<f64>,
}

impl ShellGeometry {
    fn new(npar: usize, disc: ParticleDiscretization) -> Self {
        // interface radii, ξ_0 = 1 > ξ_1 > ... > ξ_npar = 0
        let radii: Vec<f64> = (0..=npar)
            .map(|s| {
                let frac = 1.0 - s as f64 / npar as f64;
                match disc {
                    ParticleDiscretization::Equidistant => frac,
                    ParticleDiscretization::Equivolume => frac.cbrt(),
                }
            })
            .collect();
        let volume: Vec<f64> = (0..npar).map(|s| radii[s].powi(3) - radii[s + 1].powi(3)).collect();
        let center: Vec<f64> = (0..npar).map(|s| 0.5 * (radii[s] + radii[s + 1])).collect();

        let mut outer = vec![0.0; npar];
        let mut inner = vec![0.0; npar];
        for s in 0..npar {
            if s > 0 {
                let delta = center[s - 1] - center[s];
                outer[s] = 3.0 * radii[s].powi(2) / (delta * volume[s]);
            }
            if s + 1 < npar {
                let delta = center[s] - center[s + 1];
                inner[s] = 3.0 * radii[s + 1].powi(2) / (delta * volume[s]);
            }
        }
        Self {
            film: 3.0 / volume[0],
            outer,
            inner,
        }
    }
}

/// Linear binding of one bound state.
#[derive(Clone, Copy, Debug)]
struct BoundState {
    comp: usize,
    ka: ParamHandle,
    kd: ParamHandle,
    surf_diffusion: ParamHandle,
}

/// Scalar parameters of the column.
#[derive(Clone, Copy, Debug)]
struct ColumnParams {
    velocity: ParamHandle,
    dispersion: ParamHandle,
    length: ParamHandle,
    col_porosity: ParamHandle,
    par_radius: ParamHandle,
    par_porosity: ParamHandle,
}

/// General rate model column.
#[derive(Clone, Debug)]
pub struct GeneralRateModel {
    registry: ParameterRegistry,
    layout: StateLayout,
    idx: ColumnIndexer,
    geometry: ShellGeometry,
    params: ColumnParams,
    film_diffusion: Vec<ParamHandle>,
    par_diffusion: Vec<ParamHandle>,
    bound: Vec<BoundState>,
    is_kinetic: bool,
    init_c: Vec<f64>,
    init_q: Vec<f64>,
}

impl GeneralRateModel {
    /// Builds the column and registers its parameters.
    ///
    /// Scalar transport and geometry parameters are keyed by unit only,
    /// `FILM_DIFFUSION` and `PAR_DIFFUSION` by component, `LIN_KA`, `LIN_KD`
    /// and `PAR_SURFDIFFUSION` by component and bound state.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` on inconsistent dimensions or physical ranges.
    pub fn new(unit: UnitOpIdx, cfg: &GeneralRateConfig, ad: AdConfig) -> ModelResult<Self> {
        cfg.validate()?;
        let disc = &cfg.discretization;
        let (ncomp, ncol, npar) = (cfg.ncomp, disc.ncol, disc.npar);
        let nbound_total: usize = disc.nbound.iter().sum();

        let mut registry = ParameterRegistry::new(unit, ad);
        let scalar = |registry: &mut ParameterRegistry, name, value| {
            registry.register(ParameterId::new(name).unit(unit), value)
        };
        let params = ColumnParams {
            velocity: scalar(&mut registry, ParameterName::Velocity, cfg.velocity)?,
            dispersion: scalar(&mut registry, ParameterName::ColDispersion, cfg.col_dispersion)?,
            length: scalar(&mut registry, ParameterName::ColLength, cfg.col_length)?,
            col_porosity: scalar(&mut registry, ParameterName::ColPorosity, cfg.col_porosity)?,
            par_radius: scalar(&mut registry, ParameterName::ParRadius, cfg.par_radius)?,
            par_porosity: scalar(&mut registry, ParameterName::ParPorosity, cfg.par_porosity)?,
        };

        let per_component = |registry: &mut ParameterRegistry, name, values: &[f64]| {
            values
                .iter()
                .enumerate()
                .map(|(comp, v)| {
                    registry.register(ParameterId::new(name).unit(unit).component(comp as u32), *v)
                })
                .collect::<Result<Vec<_>, _>>()
        };
        let film_diffusion = per_component(&mut registry, ParameterName::FilmDiffusion, &cfg.film_diffusion)?;
        let par_diffusion = per_component(&mut registry, ParameterName::ParDiffusion, &cfg.par_diffusion)?;

        let mut bound = Vec::with_capacity(nbound_total);
        if cfg.adsorption.adsorption_model == AdsorptionModel::Linear {
            for (comp, n) in disc.nbound.iter().enumerate() {
                for b in 0..*n {
                    let flat = bound.len();
                    let id = |name| {
                        ParameterId::new(name)
                            .unit(unit)
                            .component(comp as u32)
                            .bound_state(b as u32)
                    };
                    let surf = cfg.par_surfdiffusion.get(flat).copied().unwrap_or(0.0);
                    bound.push(BoundState {
                        comp,
                        ka: registry.register(id(ParameterName::LinKa), cfg.adsorption.lin_ka[flat])?,
                        kd: registry.register(id(ParameterName::LinKd), cfg.adsorption.lin_kd[flat])?,
                        surf_diffusion: registry.register(id(ParameterName::ParSurfDiffusion), surf)?,
                    });
                }
            }
        }

        let idx = ColumnIndexer::new(ncomp, ncol, npar, nbound_total);
        let sp = idx.shell_stride();
        let mut builder = StateLayout::builder(ncomp)
            .axial_cells(ncol)
            .radial_cells(npar)
            .bound_states(disc.nbound.clone())
            .num_dofs(idx.num_dofs())
            .inlet(0, 1)
            .outlet(idx.bulk(ncol - 1, 0), 1)
            .bulk(BlockLayout::dense(
                idx.off_bulk,
                &[StateOrdering::AxialCell, StateOrdering::Component],
                &[ncol, ncomp],
            ))
            .particle_mobile_phase(BlockLayout::new(
                idx.off_par,
                &[
                    (StateOrdering::AxialCell, npar * sp),
                    (StateOrdering::RadialCell, sp),
                    (StateOrdering::Component, 1),
                ],
            ))
            .flux(BlockLayout::dense(
                idx.off_flux,
                &[StateOrdering::Component, StateOrdering::AxialCell],
                &[ncomp, ncol],
            ));
        if nbound_total > 0 {
            builder = builder.solid_phase(BlockLayout::new(
                idx.off_par + ncomp,
                &[
                    (StateOrdering::AxialCell, npar * sp),
                    (StateOrdering::RadialCell, sp),
                    (StateOrdering::BoundState, 1),
                ],
            ));
        }
        let layout = builder.build()?;

        Ok(Self {
            registry,
            layout,
            idx,
            geometry: ShellGeometry::new(npar, disc.par_disc_type),
            params,
            film_diffusion,
            par_diffusion,
            bound,
            is_kinetic: cfg.adsorption.is_kinetic,
            init_c: cfg.init_c.clone(),
            init_q: cfg.init_q.clone(),
        })
    }

    /// Number of components.
    pub fn ncomp(&self) -> usize {
        self.idx.ncomp
    }

    /// Number of axial cells.
    pub fn ncol(&self) -> usize {
        self.idx.ncol
    }

    /// Number of particle shells.
    pub fn npar(&self) -> usize {
        self.idx.npar
    }

    /// Returns true if binding is kinetic.
    pub fn is_kinetic(&self) -> bool {
        self.is_kinetic
    }

    fn param<S: ResidualScalar>(&self, h: ParamHandle) -> S {
        S::from_cell(self.registry.cell(h))
    }

    fn check_buffers(&self, bufs: &[(&'static str, usize)]) -> CoreResult<()> {
        let n = self.idx.num_dofs();
        bufs.iter()
            .try_for_each(|(what, len)| CoreError::check_len(*what, n, *len))
    }

    /// Residual kernel; `None` stands for a zero vector.
    fn assemble<S: ResidualScalar>(&self, y: Option<&[f64]>, y_dot: Option<&[f64]>, res: &mut [S]) {
        let idx = &self.idx;
        let (ncomp, ncol, npar) = (idx.ncomp, idx.ncol, idx.npar);
        let yv = |i: usize| y.map_or(0.0, |y| y[i]);
        let ydv = |i: usize| y_dot.map_or(0.0, |y| y[i]);

        let p = &self.params;
        let u: S = self.param(p.velocity);
        let d_ax: S = self.param(p.dispersion);
        let length: S = self.param(p.length);
        let eps_c: S = self.param(p.col_porosity);
        let r_p: S = self.param(p.par_radius);
        let eps_p: S = self.param(p.par_porosity);

        let h = length / ncol as f64;
        let h2 = h.clone() * h.clone();
        let one = S::from(1.0);
        let beta_c = (one.clone() - eps_c.clone()) / eps_c;
        let solid_frac = one - eps_p.clone();
        let r_p2 = r_p.clone() * r_p.clone();

        for comp in 0..ncomp {
            res[comp] = S::from(yv(comp));
        }

        // bulk and film
        for col in 0..ncol {
            for comp in 0..ncomp {
                let i = idx.bulk(col, comp);
                let c = yv(i);
                let upstream = if col == 0 { yv(comp) } else { yv(idx.bulk(col - 1, comp)) };
                let mut lap = 0.0;
                if col + 1 < ncol {
                    lap += yv(idx.bulk(col + 1, comp)) - c;
                }
                if col > 0 {
                    lap -= c - upstream;
                }
                let j = yv(idx.flux(col, comp));

                res[i] = u.clone() * (c - upstream) / h.clone() - d_ax.clone() * lap / h2.clone()
                    + beta_c.clone() * (3.0 * j) / r_p.clone()
                    + ydv(i);

                let kf: S = self.param(self.film_diffusion[comp]);
                let cp_outer = yv(idx.mobile(col, 0, comp));
                res[idx.flux(col, comp)] = -(kf * (c - cp_outer)) + j;
            }
        }

        // particle mobile phase
        let geo = &self.geometry;
        for col in 0..ncol {
            for shell in 0..npar {
                for comp in 0..ncomp {
                    let i = idx.mobile(col, shell, comp);
                    let cp = yv(i);
                    let dp: S = self.param(self.par_diffusion[comp]);

                    let mut q_dot = 0.0;
                    for (flat, b) in self.bound.iter().enumerate() {
                        if b.comp == comp {
                            q_dot += ydv(idx.solid(col, shell, flat));
                        }
                    }
                    let mut row = eps_p.clone() * ydv(i) + solid_frac.clone() * q_dot;

                    // pore diffusion through the shell faces
                    let mut pore = 0.0;
                    if shell > 0 {
                        pore += geo.outer[shell] * (yv(idx.mobile(col, shell - 1, comp)) - cp);
                    }
                    if shell + 1 < npar {
                        pore += geo.inner[shell] * (yv(idx.mobile(col, shell + 1, comp)) - cp);
                    }
                    row = row - eps_p.clone() * dp * pore / r_p2.clone();

                    // surface diffusion of the bound states of this component
                    for (flat, b) in self.bound.iter().enumerate() {
                        if b.comp != comp {
                            continue;
                        }
                        let q = yv(idx.solid(col, shell, flat));
                        let mut surf = 0.0;
                        if shell > 0 {
                            surf += geo.outer[shell] * (yv(idx.solid(col, shell - 1, flat)) - q);
                        }
                        if shell + 1 < npar {
                            surf += geo.inner[shell] * (yv(idx.solid(col, shell + 1, flat)) - q);
                        }
                        if surf != 0.0 {
                            let ds: S = self.param(b.surf_diffusion);
                            row = row - solid_frac.clone() * ds * surf / r_p2.clone();
                        }
                    }

                    if shell == 0 {
                        let j = yv(idx.flux(col, comp));
                        row = row - S::from(geo.film * j) / r_p.clone();
                    }
                    res[i] = row;
                }
            }
        }

        // binding
        for col in 0..ncol {
            for shell in 0..npar {
                for (flat, b) in self.bound.iter().enumerate() {
                    let i = idx.solid(col, shell, flat);
                    let cp = yv(idx.mobile(col, shell, b.comp));
                    let ka: S = self.param(b.ka);
                    let kd: S = self.param(b.kd);
                    let exchange = ka * cp - kd * yv(i);
                    res[i] = if self.is_kinetic {
                        -exchange + ydv(i)
                    } else {
                        -exchange
                    };
                }
            }
        }
    }

    /// Initial state: configured bulk and bound concentrations, pores in
    /// equilibrium with the bulk, zero flux and zero inlet.
    pub fn initial_state(&self, out: &mut [f64]) -> CoreResult<()> {
        self.check_buffers(&[("state", out.len())])?;
        out.fill(0.0);
        let idx = &self.idx;
        for col in 0..idx.ncol {
            for (comp, c) in self.init_c.iter().enumerate() {
                out[idx.bulk(col, comp)] = *c;
                for shell in 0..idx.npar {
                    out[idx.mobile(col, shell, comp)] = *c;
                }
            }
            for shell in 0..idx.npar {
                for (flat, q) in self.init_q.iter().enumerate() {
                    out[idx.solid(col, shell, flat)] = *q;
                }
            }
        }
        Ok(())
    }
}

impl ParameterProvider for GeneralRateModel {
    fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut ParameterRegistry {
        &mut self.registry
    }
}

impl ExportSolution for GeneralRateModel {
    fn layout(&self) -> &StateLayout {
        &self.layout
    }
}

impl ResidualAssembly for GeneralRateModel {
    fn residual(&self, _t: f64, _sec: usize, y: &[f64], y_dot: &[f64], res: &mut [f64]) -> CoreResult<()> {
        self.check_buffers(&[("y", y.len()), ("y_dot", y_dot.len()), ("res", res.len())])?;
        self.assemble(Some(y), Some(y_dot), res);
        Ok(())
    }

    fn residual_ad(
        &self,
        _t: f64,
        _sec: usize,
        y: &[f64],
        y_dot: &[f64],
        res: &mut [Active],
    ) -> CoreResult<()> {
        self.check_buffers(&[("y", y.len()), ("y_dot", y_dot.len()), ("res", res.len())])?;
        self.assemble(Some(y), Some(y_dot), res);
        Ok(())
    }

    fn multiply_with_jacobian(
        &self,
        _t: f64,
        _sec: usize,
        _y: &[f64],
        _y_dot: &[f64],
        x: &[f64],
        out: &mut [f64],
    ) -> CoreResult<()> {
        self.check_buffers(&[("x", x.len()), ("out", out.len())])?;
        self.assemble(Some(x), None, out);
        Ok(())
    }

    fn multiply_with_derivative_jacobian(
        &self,
        _t: f64,
        _sec: usize,
        _y: &[f64],
        _y_dot: &[f64],
        x: &[f64],
        out: &mut [f64],
    ) -> CoreResult<()> {
        self.check_buffers(&[("x", x.len()), ("out", out.len())])?;
        self.assemble(None, Some(x), out);
        Ok(())
    }
}

impl UnitOperation for GeneralRateModel {
    fn unit_type(&self) -> &'static str {
        "GENERAL_RATE_MODEL"
    }
}
