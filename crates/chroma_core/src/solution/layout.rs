//! Structural description of a unit operation's state vector.
//!
//! A [`StateLayout`] is built once from a model's discretisation and never
//! changes afterwards; a refined discretisation gets a new layout. Each state
//! block is a [`BlockLayout`]: an offset into the state vector plus, for
//! every loop tag, the number of elements between two consecutive indices.
//! Element strides allow blocks to interleave (e.g. particle mobile and solid
//! phase sharing one shell-major layout).

use std::ops::Range;

use super::ordering::StateOrdering;
use crate::types::{CoreError, CoreResult};

/// Location of one state block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockLayout {
    offset: usize,
    ordering: Vec<StateOrdering>,
    strides: Vec<usize>,
}

impl BlockLayout {
    /// Creates a block from `(tag, element stride)` pairs, outermost first.
    pub fn new(offset: usize, loops: &[(StateOrdering, usize)]) -> Self {
        Self {
            offset,
            ordering: loops.iter().map(|(tag, _)| *tag).collect(),
            strides: loops.iter().map(|(_, stride)| *stride).collect(),
        }
    }

    /// Dense block: strides follow from the extents of the tags.
    pub fn dense(offset: usize, ordering: &[StateOrdering], extents: &[usize]) -> Self {
        debug_assert_eq!(ordering.len(), extents.len());
        let mut strides = vec![1; ordering.len()];
        for i in (0..ordering.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * extents[i + 1];
        }
        Self {
            offset,
            ordering: ordering.to_vec(),
            strides,
        }
    }

    /// Offset of the first element.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Loop tags, outermost first.
    pub fn ordering(&self) -> &[StateOrdering] {
        &self.ordering
    }

    /// Element stride of each loop tag.
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Element stride of `tag`, if the block loops over it.
    pub fn stride_of(&self, tag: StateOrdering) -> Option<usize> {
        self.ordering
            .iter()
            .position(|t| *t == tag)
            .map(|i| self.strides[i])
    }
}

/// Location of the inlet or outlet slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortLayout {
    /// Offset of the first component
    pub offset: usize,
    /// Elements between two consecutive components
    pub stride: usize,
}

/// Structural description of a state vector.
#[derive(Clone, Debug, PartialEq)]
pub struct StateLayout {
    pub(super) num_dofs: usize,
    pub(super) num_components: usize,
    pub(super) num_axial_cells: usize,
    pub(super) num_radial_cells: usize,
    pub(super) bound_states: Vec<usize>,
    pub(super) bound_offsets: Vec<usize>,
    pub(super) inlet: Option<PortLayout>,
    pub(super) outlet: Option<PortLayout>,
    pub(super) bulk: BlockLayout,
    pub(super) flux: Option<BlockLayout>,
    pub(super) particle_mobile: Option<BlockLayout>,
    pub(super) solid: Option<BlockLayout>,
    pub(super) volume: Option<Range<usize>>,
}

impl StateLayout {
    /// Starts a layout for `num_components` components.
    pub fn builder(num_components: usize) -> StateLayoutBuilder {
        StateLayoutBuilder::new(num_components)
    }

    /// Total number of DOFs.
    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    /// Extent of a loop tag.
    pub fn extent(&self, tag: StateOrdering) -> usize {
        match tag {
            StateOrdering::Component => self.num_components,
            StateOrdering::AxialCell => self.num_axial_cells,
            StateOrdering::RadialCell => self.num_radial_cells,
            StateOrdering::BoundState => self.total_bound_states(),
        }
    }

    /// Sum of bound states over all components.
    pub fn total_bound_states(&self) -> usize {
        self.bound_states.iter().sum()
    }

    /// Number of logical elements in `block`.
    pub fn block_dofs(&self, block: &BlockLayout) -> usize {
        if block.ordering.is_empty() {
            return 0;
        }
        block.ordering.iter().map(|t| self.extent(*t)).product()
    }

    /// Number of buffer elements from the first to one past the last
    /// element of `block`.
    pub fn block_span(&self, block: &BlockLayout) -> usize {
        if self.block_dofs(block) == 0 {
            return 0;
        }
        1 + block
            .ordering
            .iter()
            .zip(&block.strides)
            .map(|(t, s)| (self.extent(*t) - 1) * s)
            .sum::<usize>()
    }

    /// Elements between two consecutive innermost runs of `block`.
    ///
    /// This is the stride of the second-innermost loop; a single-loop block
    /// has exactly one run, so its stride is the run length.
    pub fn block_stride(&self, block: &BlockLayout) -> usize {
        match block.ordering.len() {
            0 => 0,
            1 => self.extent(block.ordering[0]) * block.strides[0],
            n => block.strides[n - 2],
        }
    }

    /// Flat index of bound state `bound` of component `comp`.
    #[inline]
    pub fn bound_index(&self, comp: usize, bound: usize) -> usize {
        debug_assert!(bound < self.bound_states[comp]);
        self.bound_offsets[comp] + bound
    }

    /// Bulk mobile phase block.
    pub fn bulk(&self) -> &BlockLayout {
        &self.bulk
    }

    /// Particle flux block.
    pub fn flux(&self) -> Option<&BlockLayout> {
        self.flux.as_ref()
    }

    /// Particle mobile phase block.
    pub fn particle_mobile_phase(&self) -> Option<&BlockLayout> {
        self.particle_mobile.as_ref()
    }

    /// Solid phase block.
    pub fn solid_phase(&self) -> Option<&BlockLayout> {
        self.solid.as_ref()
    }

    /// Range of the volume DOFs.
    pub fn volume(&self) -> Option<Range<usize>> {
        self.volume.clone()
    }

    /// Inlet slice.
    pub fn inlet(&self) -> Option<PortLayout> {
        self.inlet
    }

    /// Outlet slice.
    pub fn outlet(&self) -> Option<PortLayout> {
        self.outlet
    }
}

/// Builder for [`StateLayout`]; validation happens in [`StateLayoutBuilder::build`].
#[derive(Clone, Debug)]
pub struct StateLayoutBuilder {
    num_components: usize,
    num_axial_cells: usize,
    num_radial_cells: usize,
    bound_states: Vec<usize>,
    num_dofs: Option<usize>,
    inlet: Option<PortLayout>,
    outlet: Option<PortLayout>,
    bulk: Option<BlockLayout>,
    flux: Option<BlockLayout>,
    particle_mobile: Option<BlockLayout>,
    solid: Option<BlockLayout>,
    volume: Option<Range<usize>>,
}

impl StateLayoutBuilder {
    fn new(num_components: usize) -> Self {
        Self {
            num_components,
            num_axial_cells: 0,
            num_radial_cells: 0,
            bound_states: vec![0; num_components],
            num_dofs: None,
            inlet: None,
            outlet: None,
            bulk: None,
            flux: None,
            particle_mobile: None,
            solid: None,
            volume: None,
        }
    }

    /// Number of axial cells.
    pub fn axial_cells(mut self, n: usize) -> Self {
        self.num_axial_cells = n;
        self
    }

    /// Number of radial (particle shell) cells.
    pub fn radial_cells(mut self, n: usize) -> Self {
        self.num_radial_cells = n;
        self
    }

    /// Bound states per component.
    pub fn bound_states(mut self, per_component: Vec<usize>) -> Self {
        self.bound_states = per_component;
        self
    }

    /// Total number of DOFs; defaults to the end of the furthest block.
    pub fn num_dofs(mut self, n: usize) -> Self {
        self.num_dofs = Some(n);
        self
    }

    /// Inlet slice.
    pub fn inlet(mut self, offset: usize, stride: usize) -> Self {
        self.inlet = Some(PortLayout { offset, stride });
        self
    }

    /// Outlet slice.
    pub fn outlet(mut self, offset: usize, stride: usize) -> Self {
        self.outlet = Some(PortLayout { offset, stride });
        self
    }

    /// Bulk mobile phase block (mandatory).
    pub fn bulk(mut self, block: BlockLayout) -> Self {
        self.bulk = Some(block);
        self
    }

    /// Particle flux block.
    pub fn flux(mut self, block: BlockLayout) -> Self {
        self.flux = Some(block);
        self
    }

    /// Particle mobile phase block.
    pub fn particle_mobile_phase(mut self, block: BlockLayout) -> Self {
        self.particle_mobile = Some(block);
        self
    }

    /// Solid phase block.
    pub fn solid_phase(mut self, block: BlockLayout) -> Self {
        self.solid = Some(block);
        self
    }

    /// Volume DOFs.
    pub fn volume(mut self, offset: usize, len: usize) -> Self {
        self.volume = Some(offset..offset + len);
        self
    }

    /// Validates and freezes the layout.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the bulk block is missing, the bound state vector
    /// does not match the component count, a block repeats a loop tag, a
    /// block is empty, or any block or port lies outside the state vector.
    pub fn build(self) -> CoreResult<StateLayout> {
        if self.bound_states.len() != self.num_components {
            return Err(CoreError::InvalidState(format!(
                "{} bound state counts given for {} components",
                self.bound_states.len(),
                self.num_components
            )));
        }
        let bulk = self
            .bulk
            .ok_or_else(|| CoreError::InvalidState("State layout without bulk block".into()))?;

        let mut bound_offsets = Vec::with_capacity(self.num_components);
        let mut acc = 0;
        for n in &self.bound_states {
            bound_offsets.push(acc);
            acc += n;
        }

        let mut layout = StateLayout {
            num_dofs: 0,
            num_components: self.num_components,
            num_axial_cells: self.num_axial_cells,
            num_radial_cells: self.num_radial_cells,
            bound_states: self.bound_states,
            bound_offsets,
            inlet: self.inlet,
            outlet: self.outlet,
            bulk,
            flux: self.flux,
            particle_mobile: self.particle_mobile,
            solid: self.solid,
            volume: self.volume,
        };

        let blocks = [
            ("bulk", Some(&layout.bulk)),
            ("flux", layout.flux.as_ref()),
            ("particle mobile phase", layout.particle_mobile.as_ref()),
            ("solid phase", layout.solid.as_ref()),
        ];
        let mut end = 0;
        for (name, block) in blocks {
            let Some(block) = block else { continue };
            let mut tags = block.ordering.clone();
            tags.sort_by_key(|t| *t as u8);
            tags.dedup();
            if tags.len() != block.ordering.len() {
                return Err(CoreError::InvalidState(format!(
                    "Ordering of {} block repeats a loop tag",
                    name
                )));
            }
            if layout.block_dofs(block) == 0 {
                return Err(CoreError::InvalidState(format!("Empty {} block", name)));
            }
            end = end.max(block.offset + layout.block_span(block));
        }
        let port_span = layout.num_components.saturating_sub(1);
        for port in [layout.inlet, layout.outlet].into_iter().flatten() {
            end = end.max(port.offset + port_span * port.stride + 1);
        }
        if let Some(volume) = &layout.volume {
            end = end.max(volume.end);
        }

        layout.num_dofs = self.num_dofs.unwrap_or(end);
        if end > layout.num_dofs {
            return Err(CoreError::InvalidState(format!(
                "State layout needs {} DOFs but declares {}",
                end, layout.num_dofs
            )));
        }
        Ok(layout)
    }
}
