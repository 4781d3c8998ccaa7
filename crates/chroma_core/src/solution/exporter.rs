//! Read-only strided view over a unit operation's state vector.

use super::layout::{BlockLayout, PortLayout, StateLayout};
use super::ordering::StateOrdering;
use crate::types::{CoreError, CoreResult};

/// Slice whose logical elements are `stride` elements apart.
///
/// Replaces the pointer + out-parameter stride pair of inlet/outlet access.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StridedView<'a> {
    data: &'a [f64],
    stride: usize,
    len: usize,
}

impl<'a> StridedView<'a> {
    /// View without elements.
    pub fn empty() -> Self {
        Self {
            data: &[],
            stride: 1,
            len: 0,
        }
    }

    fn over(state: &'a [f64], port: PortLayout, len: usize) -> Self {
        if len == 0 {
            return Self::empty();
        }
        let end = port.offset + (len - 1) * port.stride + 1;
        Self {
            data: &state[port.offset..end],
            stride: port.stride,
            len,
        }
    }

    /// Number of logical elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the view has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Elements between two consecutive logical elements.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Underlying buffer, starting at the first logical element.
    pub fn raw(&self) -> &'a [f64] {
        self.data
    }

    /// Logical element `i`.
    pub fn get(&self, i: usize) -> Option<f64> {
        if i < self.len {
            Some(self.data[i * self.stride])
        } else {
            None
        }
    }

    /// Iterates over the logical elements.
    pub fn iter(&self) -> impl Iterator<Item = f64> + 'a {
        let data = self.data;
        data.iter().step_by(self.stride.max(1)).take(self.len).copied()
    }

    /// Copies the logical elements into a dense vector.
    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }
}

/// Loop indices of one logical element.
#[derive(Clone, Copy, Debug, Default)]
struct Coord {
    component: usize,
    axial: usize,
    radial: usize,
    bound: usize,
}

impl Coord {
    fn get(&self, tag: StateOrdering) -> usize {
        match tag {
            StateOrdering::Component => self.component,
            StateOrdering::AxialCell => self.axial,
            StateOrdering::RadialCell => self.radial,
            StateOrdering::BoundState => self.bound,
        }
    }
}

/// Read-only, self-describing view over a state buffer.
///
/// The exporter borrows both the layout and the buffer, so it cannot outlive
/// either and cannot be kept across a change of discretisation. It is cheap
/// to construct and `Copy`.
///
/// # Examples
///
/// ```
/// use chroma_core::solution::{BlockLayout, SolutionExporter, StateLayout, StateOrdering};
///
/// let layout = StateLayout::builder(2)
///     .axial_cells(3)
///     .bulk(BlockLayout::dense(0, &[StateOrdering::AxialCell, StateOrdering::Component], &[3, 2]))
///     .outlet(4, 1)
///     .build()
///     .unwrap();
/// let state = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
/// let exporter = SolutionExporter::new(&layout, &state).unwrap();
///
/// assert_eq!(exporter.concentration_at(1, 2), 5.0);
/// assert_eq!(exporter.outlet().to_vec(), vec![4.0, 5.0]);
/// assert!(exporter.flux().is_empty());
/// ```
#[derive(Clone, Copy, Debug)]
pub struct SolutionExporter<'a> {
    layout: &'a StateLayout,
    state: &'a [f64],
}

impl<'a> SolutionExporter<'a> {
    /// Creates a view of `state` described by `layout`.
    ///
    /// # Errors
    ///
    /// `BufferSize` if `state` does not hold exactly `layout.num_dofs()` values.
    pub fn new(layout: &'a StateLayout, state: &'a [f64]) -> CoreResult<Self> {
        CoreError::check_len("state", layout.num_dofs(), state.len())?;
        Ok(Self { layout, state })
    }

    /// Layout behind this view.
    pub fn layout(&self) -> &'a StateLayout {
        self.layout
    }

    // --- Structural queries ---

    /// Returns true if any component has more than one bound state.
    pub fn has_multiple_bound_states(&self) -> bool {
        self.layout.bound_states.iter().any(|n| *n > 1)
    }

    /// Returns true if the model has a bulk-to-particle flux.
    pub fn has_particle_flux(&self) -> bool {
        self.layout.flux.is_some()
    }

    /// Returns true if the model has a particle mobile phase.
    pub fn has_particle_mobile_phase(&self) -> bool {
        self.layout.particle_mobile.is_some()
    }

    /// Returns true if the model has a solid phase.
    pub fn has_solid_phase(&self) -> bool {
        self.layout.solid.is_some()
    }

    /// Returns true if any component has no bound state.
    pub fn has_non_binding_components(&self) -> bool {
        self.layout.bound_states.iter().any(|n| *n == 0)
    }

    /// Returns true if the model has volume DOFs.
    pub fn has_volume(&self) -> bool {
        self.layout.volume.is_some()
    }

    /// Number of components.
    pub fn num_components(&self) -> usize {
        self.layout.num_components
    }

    /// Number of axial cells.
    pub fn num_axial_cells(&self) -> usize {
        self.layout.num_axial_cells
    }

    /// Number of radial cells.
    pub fn num_radial_cells(&self) -> usize {
        self.layout.num_radial_cells
    }

    /// Total number of bound states over all components.
    pub fn num_bound_states(&self) -> usize {
        self.layout.total_bound_states()
    }

    /// Bound states of every component.
    pub fn num_bound_states_per_component(&self) -> &'a [usize] {
        &self.layout.bound_states
    }

    /// Bound states of component `comp`.
    pub fn num_bound_states_of(&self, comp: usize) -> usize {
        self.layout.bound_states[comp]
    }

    /// DOFs of the bulk mobile phase.
    pub fn num_bulk_dofs(&self) -> usize {
        self.layout.block_dofs(&self.layout.bulk)
    }

    /// DOFs of the particle mobile phase over all cells.
    pub fn num_particle_mobile_phase_dofs(&self) -> usize {
        self.dofs_of(self.layout.particle_mobile.as_ref())
    }

    /// DOFs of the solid phase over all cells.
    pub fn num_solid_phase_dofs(&self) -> usize {
        self.dofs_of(self.layout.solid.as_ref())
    }

    /// DOFs of the particle flux.
    pub fn num_flux_dofs(&self) -> usize {
        self.dofs_of(self.layout.flux.as_ref())
    }

    /// Volume DOFs.
    pub fn num_volume_dofs(&self) -> usize {
        self.layout.volume.as_ref().map_or(0, |r| r.len())
    }

    fn dofs_of(&self, block: Option<&BlockLayout>) -> usize {
        block.map_or(0, |b| self.layout.block_dofs(b))
    }

    // --- Indexed scalar accessors ---
    //
    // Indices are not range-checked in release builds beyond slice indexing;
    // an absent feature reads as zero.

    fn read(&self, block: Option<&BlockLayout>, coord: Coord) -> f64 {
        let Some(block) = block else {
            return 0.0;
        };
        let offset = block.offset()
            + block
                .ordering()
                .iter()
                .zip(block.strides())
                .map(|(tag, stride)| {
                    let idx = coord.get(*tag);
                    debug_assert!(
                        idx < self.layout.extent(*tag),
                        "{} index {} out of range",
                        tag,
                        idx
                    );
                    idx * stride
                })
                .sum::<usize>();
        self.state[offset]
    }

    /// Bulk concentration of `component` in `axial_cell`.
    pub fn concentration_at(&self, component: usize, axial_cell: usize) -> f64 {
        self.read(
            Some(&self.layout.bulk),
            Coord {
                component,
                axial: axial_cell,
                ..Coord::default()
            },
        )
    }

    /// Bulk-to-particle flux of `component` in `axial_cell`.
    pub fn flux_at(&self, component: usize, axial_cell: usize) -> f64 {
        self.read(
            self.layout.flux.as_ref(),
            Coord {
                component,
                axial: axial_cell,
                ..Coord::default()
            },
        )
    }

    /// Particle mobile phase concentration.
    pub fn mobile_phase_at(&self, component: usize, axial_cell: usize, radial_cell: usize) -> f64 {
        self.read(
            self.layout.particle_mobile.as_ref(),
            Coord {
                component,
                axial: axial_cell,
                radial: radial_cell,
                bound: 0,
            },
        )
    }

    /// Solid phase concentration of bound state `bound_state` of `component`.
    pub fn solid_phase_at(
        &self,
        component: usize,
        axial_cell: usize,
        radial_cell: usize,
        bound_state: usize,
    ) -> f64 {
        if self.layout.solid.is_none() {
            return 0.0;
        }
        self.read(
            self.layout.solid.as_ref(),
            Coord {
                component,
                axial: axial_cell,
                radial: radial_cell,
                bound: self.layout.bound_index(component, bound_state),
            },
        )
    }

    /// Volume DOF `dof`.
    pub fn volume_at(&self, dof: usize) -> f64 {
        match &self.layout.volume {
            Some(range) => {
                debug_assert!(dof < range.len());
                self.state[range.start + dof]
            }
            None => 0.0,
        }
    }

    // --- Bulk accessors ---

    fn slice_of(&self, block: Option<&BlockLayout>) -> &'a [f64] {
        match block {
            Some(b) => {
                let start = b.offset();
                &self.state[start..start + self.layout.block_span(b)]
            }
            None => &[],
        }
    }

    /// Bulk mobile phase block, ordered by [`Self::concentration_ordering`].
    pub fn concentration(&self) -> &'a [f64] {
        self.slice_of(Some(&self.layout.bulk))
    }

    /// Flux block; empty without particle flux.
    pub fn flux(&self) -> &'a [f64] {
        self.slice_of(self.layout.flux.as_ref())
    }

    /// Particle mobile phase block; empty without particles.
    pub fn mobile_phase(&self) -> &'a [f64] {
        self.slice_of(self.layout.particle_mobile.as_ref())
    }

    /// Solid phase block; empty without bound states.
    pub fn solid_phase(&self) -> &'a [f64] {
        self.slice_of(self.layout.solid.as_ref())
    }

    /// Volume DOFs; empty without volume.
    pub fn volume(&self) -> &'a [f64] {
        match &self.layout.volume {
            Some(range) => &self.state[range.clone()],
            None => &[],
        }
    }

    /// Inlet concentrations, one per component.
    pub fn inlet(&self) -> StridedView<'a> {
        self.port(self.layout.inlet)
    }

    /// Outlet concentrations, one per component.
    pub fn outlet(&self) -> StridedView<'a> {
        self.port(self.layout.outlet)
    }

    fn port(&self, port: Option<PortLayout>) -> StridedView<'a> {
        match port {
            Some(p) => StridedView::over(self.state, p, self.layout.num_components),
            None => StridedView::empty(),
        }
    }

    // --- Ordering descriptors ---

    /// Loop order of the bulk mobile phase block.
    pub fn concentration_ordering(&self) -> &'a [StateOrdering] {
        self.layout.bulk.ordering()
    }

    /// Loop order of the flux block; empty when absent.
    pub fn flux_ordering(&self) -> &'a [StateOrdering] {
        self.layout
            .flux
            .as_ref()
            .map(|b| b.ordering())
            .unwrap_or(&[])
    }

    /// Loop order of the particle mobile phase block; empty when absent.
    pub fn mobile_phase_ordering(&self) -> &'a [StateOrdering] {
        self.layout
            .particle_mobile
            .as_ref()
            .map(|b| b.ordering())
            .unwrap_or(&[])
    }

    /// Loop order of the solid phase block; empty when absent.
    pub fn solid_phase_ordering(&self) -> &'a [StateOrdering] {
        self.layout
            .solid
            .as_ref()
            .map(|b| b.ordering())
            .unwrap_or(&[])
    }

    // --- Stride queries ---

    /// Elements between two consecutive bulk mobile phase runs.
    pub fn bulk_mobile_phase_stride(&self) -> usize {
        self.layout.block_stride(&self.layout.bulk)
    }

    /// Elements between two consecutive particle mobile phase runs.
    pub fn particle_mobile_phase_stride(&self) -> usize {
        self.layout
            .particle_mobile
            .as_ref()
            .map_or(0, |b| self.layout.block_stride(b))
    }

    /// Elements between two consecutive solid phase runs.
    pub fn solid_phase_stride(&self) -> usize {
        self.layout
            .solid
            .as_ref()
            .map_or(0, |b| self.layout.block_stride(b))
    }
}
