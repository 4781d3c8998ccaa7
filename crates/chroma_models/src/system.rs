//! Unit operation network.
//!
//! [`ModelSystem`] concatenates the unit states into one global vector in
//! unit order and couples them through the valve switches of the
//! configuration. Every unit reports its inlet DOFs as `c_in`; the network
//! subtracts the flow-weighted upstream outlets:
//!
//! ```text
//! res[in_k + i] = c_in_k,i - Σ_j (F_jk / Σ_l F_lk) c_out_j,i
//! ```
//!
//! Connection flow rates are constants, so the coupling is linear in `y`
//! and carries no parameter derivatives.
//!
//! Parameter access is broadcast: an identifier is offered to every unit
//! and a unit that does not own it ignores it.
//!
//! ```
//! use chroma_models::config::SimulationConfig;
//! use chroma_models::system::ModelSystem;
//!
//! let system = ModelSystem::from_config(&SimulationConfig::linear_benchmark(false)).unwrap();
//! assert_eq!(system.num_units(), 2);
//! assert_eq!(system.section_index(50.0), 1);
//! ```

use std::collections::BTreeMap;
use std::ops::Range;

use chroma_core::registry::ParameterValue;
use chroma_core::solution::{SolutionExporter, StateOrdering};
use chroma_core::traits::{combine_sensitivity_directions, ExportSolution, ParameterProvider, ResidualAssembly};
use chroma_core::types::{Active, AdConfig, CoreError, CoreResult, ParameterId, ResidualScalar, UnitOpIdx};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::{SensitivityConfig, SimulationConfig, SwitchConfig};
use crate::error::{ModelError, ModelResult};
use crate::units::UnitOperationEnum;

/// One coupling term `res[dst] -= weight * y[src]` in global indices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coupling {
    /// Inlet DOF of the downstream unit
    pub dst: usize,
    /// Outlet DOF of the upstream unit
    pub src: usize,
    /// Share of the downstream inflow
    pub weight: f64,
}

/// Network-level sensitive parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NetworkSensitivity {
    /// Parameter identity
    pub id: ParameterId,
    /// AD direction
    pub direction: usize,
}

/// Units, their global offsets and the section dependent coupling.
#[derive(Clone, Debug)]
pub struct ModelSystem {
    units: Vec<UnitOperationEnum>,
    offsets: Vec<usize>,
    section_times: Vec<f64>,
    couplings: Vec<Vec<Coupling>>,
    ad: AdConfig,
    sensitive: Vec<NetworkSensitivity>,
}

/// Splits `buf` into consecutive pieces at `offsets` (`offsets[0] == 0`).
fn split_at_offsets<'a, T>(buf: &'a mut [T], offsets: &[usize]) -> Vec<&'a mut [T]> {
    let mut pieces = Vec::with_capacity(offsets.len().saturating_sub(1));
    let mut rest = buf;
    for w in offsets.windows(2) {
        let (head, tail) = rest.split_at_mut(w[1] - w[0]);
        pieces.push(head);
        rest = tail;
    }
    pieces
}

/// Per-unit slice of the sensitivity combination.
struct UnitTask<'a> {
    unit: &'a UnitOperationEnum,
    range: Range<usize>,
    res_s: Vec<&'a mut [f64]>,
    tmp1: &'a mut [f64],
    tmp2: &'a mut [f64],
    tmp3: &'a mut [f64],
}

impl ModelSystem {
    /// Builds every unit, the coupling of every section and activates the
    /// configured sensitivities; sensitivity entry `p` gets direction `p`.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` for inconsistent units, switches or ports, or a
    ///   sensitivity listed twice
    /// - `UnitNotFound` for connections to missing units
    /// - `ParameterNotFound` for a sensitivity no unit owns
    pub fn from_config(cfg: &SimulationConfig) -> ModelResult<Self> {
        cfg.validate()?;
        let ad = AdConfig::new(cfg.sensitivity.parameters.len());
        let section_times = cfg.solver.section_times.clone();

        let units = cfg
            .model
            .units
            .iter()
            .enumerate()
            .map(|(idx, unit)| UnitOperationEnum::from_config(idx as UnitOpIdx, unit, &section_times, ad))
            .collect::<ModelResult<Vec<_>>>()?;

        let mut offsets = Vec::with_capacity(units.len() + 1);
        offsets.push(0);
        for unit in &units {
            offsets.push(offsets[offsets.len() - 1] + unit.num_dofs());
        }

        let mut system = Self {
            units,
            offsets,
            section_times,
            couplings: Vec::new(),
            ad,
            sensitive: Vec::new(),
        };
        system.couplings = (0..cfg.solver.num_sections())
            .map(|sec| system.build_couplings(&cfg.model.switches, sec))
            .collect::<ModelResult<_>>()?;
        system.apply_sensitivities(&cfg.sensitivity)?;

        info!(
            units = system.units.len(),
            dofs = system.num_dofs(),
            sensitivities = system.sensitive.len(),
            "model system ready"
        );
        Ok(system)
    }

    fn build_couplings(&self, switches: &[SwitchConfig], sec: usize) -> ModelResult<Vec<Coupling>> {
        // the last switch at or before `sec` is in effect
        let Some(switch) = switches.iter().rev().find(|s| s.section <= sec) else {
            return Ok(Vec::new());
        };

        let mut inflow = vec![0.0; self.units.len()];
        for conn in &switch.connections {
            inflow[conn.to as usize] += conn.flowrate;
        }

        let mut couplings = Vec::new();
        for conn in &switch.connections {
            let (from, to) = (conn.from as usize, conn.to as usize);
            if inflow[to] <= 0.0 {
                continue;
            }
            let up = self.units[from].layout();
            let down = self.units[to].layout();
            let outlet = up
                .outlet()
                .ok_or_else(|| ModelError::config(format!("unit {} has no outlet", from)))?;
            let inlet = down
                .inlet()
                .ok_or_else(|| ModelError::config(format!("unit {} has no inlet", to)))?;
            let ncomp = down.extent(StateOrdering::Component);
            if up.extent(StateOrdering::Component) != ncomp {
                return Err(ModelError::config(format!(
                    "units {} and {} differ in the number of components",
                    from, to
                )));
            }
            let weight = conn.flowrate / inflow[to];
            couplings.extend((0..ncomp).map(|comp| Coupling {
                dst: self.offsets[to] + inlet.offset + comp * inlet.stride,
                src: self.offsets[from] + outlet.offset + comp * outlet.stride,
                weight,
            }));
        }
        Ok(couplings)
    }

    /// Number of unit operations.
    pub fn num_units(&self) -> usize {
        self.units.len()
    }

    /// Unit operations in network order.
    pub fn units(&self) -> &[UnitOperationEnum] {
        &self.units
    }

    /// Unit `idx`.
    pub fn unit(&self, idx: UnitOpIdx) -> ModelResult<&UnitOperationEnum> {
        self.units.get(idx as usize).ok_or(ModelError::UnitNotFound(idx))
    }

    /// Size of the global state vector.
    pub fn num_dofs(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    /// Global index range of unit `idx`.
    pub fn unit_range(&self, idx: UnitOpIdx) -> ModelResult<Range<usize>> {
        let i = idx as usize;
        if i >= self.units.len() {
            return Err(ModelError::UnitNotFound(idx));
        }
        Ok(self.offsets[i]..self.offsets[i + 1])
    }

    /// Section boundaries.
    pub fn section_times(&self) -> &[f64] {
        &self.section_times
    }

    /// Section containing `t`; times outside the line clamp to the first or
    /// last section.
    pub fn section_index(&self, t: f64) -> usize {
        let last = self.section_times.len().saturating_sub(2);
        self.section_times[1..]
            .iter()
            .position(|end| t < *end)
            .unwrap_or(last)
            .min(last)
    }

    /// Coupling terms in effect during section `sec`.
    pub fn couplings(&self, sec: usize) -> &[Coupling] {
        self.couplings.get(sec).map(Vec::as_slice).unwrap_or(&[])
    }

    /// AD capacity shared by every unit.
    pub fn ad_config(&self) -> AdConfig {
        self.ad
    }

    fn check_state(&self, bufs: &[(&'static str, usize)]) -> CoreResult<()> {
        let n = self.num_dofs();
        bufs.iter()
            .try_for_each(|(what, len)| CoreError::check_len(*what, n, *len))
    }

    fn check_section(&self, sec: usize) -> CoreResult<()> {
        if sec < self.couplings.len() {
            Ok(())
        } else {
            Err(CoreError::InvalidState(format!(
                "section {} requested, network has {}",
                sec,
                self.couplings.len()
            )))
        }
    }

    fn couple<S: ResidualScalar>(&self, sec: usize, x: &[f64], out: &mut [S]) {
        for c in self.couplings(sec) {
            out[c.dst] = out[c.dst].clone() - c.weight * x[c.src];
        }
    }

    /// Network residual.
    pub fn residual(&self, t: f64, sec: usize, y: &[f64], y_dot: &[f64], res: &mut [f64]) -> ModelResult<()> {
        self.check_state(&[("y", y.len()), ("y_dot", y_dot.len()), ("res", res.len())])?;
        self.check_section(sec)?;
        for (k, out) in split_at_offsets(res, &self.offsets).into_iter().enumerate() {
            let r = self.offsets[k]..self.offsets[k + 1];
            self.units[k].residual(t, sec, &y[r.clone()], &y_dot[r], out)?;
        }
        self.couple(sec, y, res);
        Ok(())
    }

    /// Network residual carrying parameter derivatives.
    pub fn residual_ad(
        &self,
        t: f64,
        sec: usize,
        y: &[f64],
        y_dot: &[f64],
        res: &mut [Active],
    ) -> ModelResult<()> {
        self.check_state(&[("y", y.len()), ("y_dot", y_dot.len()), ("res", res.len())])?;
        self.check_section(sec)?;
        for (k, out) in split_at_offsets(res, &self.offsets).into_iter().enumerate() {
            let r = self.offsets[k]..self.offsets[k + 1];
            self.units[k].residual_ad(t, sec, &y[r.clone()], &y_dot[r], out)?;
        }
        self.couple(sec, y, res);
        Ok(())
    }

    /// `out = (∂F/∂y) x` including the coupling.
    pub fn multiply_with_jacobian(
        &self,
        t: f64,
        sec: usize,
        y: &[f64],
        y_dot: &[f64],
        x: &[f64],
        out: &mut [f64],
    ) -> ModelResult<()> {
        self.check_state(&[("y", y.len()), ("y_dot", y_dot.len()), ("x", x.len()), ("out", out.len())])?;
        self.check_section(sec)?;
        for (k, o) in split_at_offsets(out, &self.offsets).into_iter().enumerate() {
            let r = self.offsets[k]..self.offsets[k + 1];
            self.units[k].multiply_with_jacobian(t, sec, &y[r.clone()], &y_dot[r.clone()], &x[r], o)?;
        }
        self.couple(sec, x, out);
        Ok(())
    }

    /// `out = (∂F/∂ẏ) x`; the coupling has no time derivative.
    pub fn multiply_with_derivative_jacobian(
        &self,
        t: f64,
        sec: usize,
        y: &[f64],
        y_dot: &[f64],
        x: &[f64],
        out: &mut [f64],
    ) -> ModelResult<()> {
        self.check_state(&[("y", y.len()), ("y_dot", y_dot.len()), ("x", x.len()), ("out", out.len())])?;
        self.check_section(sec)?;
        for (k, o) in split_at_offsets(out, &self.offsets).into_iter().enumerate() {
            let r = self.offsets[k]..self.offsets[k + 1];
            self.units[k].multiply_with_derivative_jacobian(
                t,
                sec,
                &y[r.clone()],
                &y_dot[r.clone()],
                &x[r],
                o,
            )?;
        }
        Ok(())
    }

    /// Sensitivity residuals of the whole network.
    ///
    /// Units are processed in parallel on the current rayon pool, each on
    /// its own slice of `res_s` and the scratch buffers. Every unit
    /// combines all network directions, so a parameter owned by one unit
    /// still propagates through the state sensitivities of the others.
    ///
    /// Results go into the caller's `res_s` and scratch buffers; the only
    /// allocations are the per-unit lists of borrowed slices.
    ///
    /// # Errors
    ///
    /// `BufferSize` if the number of sensitivity vectors differs from
    /// [`num_sens_params`](Self::num_sens_params) or a buffer is not
    /// `num_dofs` long.
    #[allow(clippy::too_many_arguments)]
    pub fn residual_sens_fwd_combine(
        &self,
        t: f64,
        sec: usize,
        time_factor: f64,
        y: &[f64],
        y_dot: &[f64],
        ys: &[&[f64]],
        ys_dot: &[&[f64]],
        res_s: &mut [&mut [f64]],
        ad_res: &[Active],
        tmp1: &mut [f64],
        tmp2: &mut [f64],
        tmp3: &mut [f64],
    ) -> ModelResult<()> {
        let ns = self.sensitive.len();
        CoreError::check_len("ys", ns, ys.len())?;
        CoreError::check_len("ys_dot", ns, ys_dot.len())?;
        CoreError::check_len("res_s", ns, res_s.len())?;
        self.check_state(&[
            ("y", y.len()),
            ("y_dot", y_dot.len()),
            ("ad_res", ad_res.len()),
            ("tmp1", tmp1.len()),
            ("tmp2", tmp2.len()),
            ("tmp3", tmp3.len()),
        ])?;
        for p in 0..ns {
            self.check_state(&[
                ("ys[p]", ys[p].len()),
                ("ys_dot[p]", ys_dot[p].len()),
                ("res_s[p]", res_s[p].len()),
            ])?;
        }
        self.check_section(sec)?;

        let directions: Vec<usize> = self.sensitive.iter().map(|s| s.direction).collect();

        let mut per_unit: Vec<Vec<&mut [f64]>> = (0..self.units.len()).map(|_| Vec::with_capacity(ns)).collect();
        for r in res_s.iter_mut() {
            for (k, piece) in split_at_offsets(&mut **r, &self.offsets).into_iter().enumerate() {
                per_unit[k].push(piece);
            }
        }
        let tasks: Vec<UnitTask<'_>> = self
            .units
            .iter()
            .zip(per_unit)
            .zip(split_at_offsets(tmp1, &self.offsets))
            .zip(split_at_offsets(tmp2, &self.offsets))
            .zip(split_at_offsets(tmp3, &self.offsets))
            .enumerate()
            .map(|(k, ((((unit, res_s), tmp1), tmp2), tmp3))| UnitTask {
                unit,
                range: self.offsets[k]..self.offsets[k + 1],
                res_s,
                tmp1,
                tmp2,
                tmp3,
            })
            .collect();

        tasks.into_par_iter().try_for_each(|mut task| -> CoreResult<()> {
            let r = task.range.clone();
            let ys_k: Vec<&[f64]> = ys.iter().map(|v| &v[r.clone()]).collect();
            let ys_dot_k: Vec<&[f64]> = ys_dot.iter().map(|v| &v[r.clone()]).collect();
            combine_sensitivity_directions(
                task.unit,
                directions.iter().copied(),
                t,
                sec,
                time_factor,
                &y[r.clone()],
                &y_dot[r.clone()],
                &ys_k,
                &ys_dot_k,
                &mut task.res_s,
                &ad_res[r],
                task.tmp1,
                task.tmp2,
                task.tmp3,
            )
        })?;

        for (out, s) in res_s.iter_mut().zip(ys) {
            self.couple(sec, s, &mut **out);
        }
        Ok(())
    }

    /// Soft update offered to every unit; true if any unit owns `id`.
    pub fn set_parameter(&mut self, id: &ParameterId, value: impl Into<ParameterValue>) -> bool {
        let value = value.into();
        let mut hit = false;
        for unit in &mut self.units {
            hit |= unit.set_parameter(id, value);
        }
        if !hit {
            debug!(parameter = %id, "set_parameter ignored, no unit owns it");
        }
        hit
    }

    /// Marks `id` sensitive in every unit that owns it.
    ///
    /// Returns `Ok(false)` if no unit owns `id`. Re-assigning a sensitive
    /// parameter keeps its position.
    ///
    /// # Errors
    ///
    /// `DirectionOutOfRange` if `direction` exceeds the AD capacity.
    pub fn set_sensitive_parameter(&mut self, id: &ParameterId, direction: usize, seed: f64) -> ModelResult<bool> {
        self.ad.check_direction(direction)?;
        let mut hit = false;
        for unit in &mut self.units {
            hit |= unit.set_sensitive_parameter(id, direction, seed)?;
        }
        if !hit {
            debug!(parameter = %id, "sensitivity ignored, no unit owns it");
            return Ok(false);
        }

        match self.sensitive.iter_mut().find(|s| s.id == *id) {
            Some(entry) => entry.direction = direction,
            None => self.sensitive.push(NetworkSensitivity { id: *id, direction }),
        }
        debug!(parameter = %id, direction, seed, "sensitivity activated");
        Ok(true)
    }

    /// Updates the value of a sensitive parameter in every unit tracking it.
    ///
    /// # Errors
    ///
    /// `InvalidState` if `id` is not sensitive.
    pub fn set_sensitive_parameter_value(&mut self, id: &ParameterId, value: f64) -> ModelResult<()> {
        if !self.sensitive.iter().any(|s| s.id == *id) {
            return Err(CoreError::InvalidState(format!("Parameter {} is not sensitive", id)).into());
        }
        for unit in &mut self.units {
            if unit.registry().sensitive_parameters().iter().any(|s| s.id == *id) {
                unit.set_sensitive_parameter_value(id, value)?;
            }
        }
        Ok(())
    }

    /// Stops tracking every sensitive parameter in every unit.
    pub fn clear_sens_params(&mut self) {
        for unit in &mut self.units {
            unit.clear_sens_params();
        }
        self.sensitive.clear();
    }

    /// Number of network-level sensitive parameters.
    pub fn num_sens_params(&self) -> usize {
        self.sensitive.len()
    }

    /// Sensitive parameters in activation order.
    pub fn sensitive_parameters(&self) -> &[NetworkSensitivity] {
        &self.sensitive
    }

    /// Replaces the active sensitivities; entry `p` gets direction `p`.
    ///
    /// # Errors
    ///
    /// `ParameterNotFound` if no unit owns an entry, `DirectionOutOfRange`
    /// if the list is longer than the AD capacity.
    pub fn apply_sensitivities(&mut self, cfg: &SensitivityConfig) -> ModelResult<()> {
        self.clear_sens_params();
        for (direction, entry) in cfg.parameters.iter().enumerate() {
            let id = entry.parameter_id();
            if !self.set_sensitive_parameter(&id, direction, entry.factor)? {
                return Err(CoreError::ParameterNotFound(id).into());
            }
        }
        Ok(())
    }

    /// Value of `id` from the first unit that owns it.
    pub fn parameter_double(&self, id: &ParameterId) -> ModelResult<f64> {
        self.units
            .iter()
            .find(|u| u.has_parameter(id))
            .map(|u| u.parameter_double(id))
            .unwrap_or(Err(CoreError::ParameterNotFound(*id)))
            .map_err(ModelError::from)
    }

    /// Snapshot of every parameter of every unit.
    pub fn all_parameter_values(&self) -> BTreeMap<ParameterId, f64> {
        self.units
            .iter()
            .flat_map(|u| u.all_parameter_values())
            .collect()
    }

    /// One exporter per unit over its slice of the global `state`.
    pub fn exporters<'a>(&'a self, state: &'a [f64]) -> ModelResult<Vec<SolutionExporter<'a>>> {
        self.check_state(&[("state", state.len())])?;
        self.units
            .iter()
            .enumerate()
            .map(|(k, unit)| {
                unit.exporter(&state[self.offsets[k]..self.offsets[k + 1]])
                    .map_err(ModelError::from)
            })
            .collect()
    }

    /// Initial global state; coupled inlet DOFs take the upstream outlet
    /// values of the first section.
    pub fn initial_state(&self) -> ModelResult<Vec<f64>> {
        let mut y = vec![0.0; self.num_dofs()];
        for (k, out) in split_at_offsets(&mut y, &self.offsets).into_iter().enumerate() {
            self.units[k].initial_state(out)?;
        }
        let mut inlet = vec![0.0; y.len()];
        for c in self.couplings(0) {
            inlet[c.dst] += c.weight * y[c.src];
        }
        for c in self.couplings(0) {
            y[c.dst] = inlet[c.dst];
        }
        Ok(y)
    }
}
