//! Solution export capability.

use crate::solution::{SolutionExporter, StateLayout};
use crate::types::CoreResult;

/// Unit operations with a fixed state layout.
pub trait ExportSolution {
    /// Layout of the unit's state vector.
    fn layout(&self) -> &StateLayout;

    /// Total number of DOFs.
    fn num_dofs(&self) -> usize {
        self.layout().num_dofs()
    }

    /// Read-only view of `state`.
    ///
    /// # Errors
    ///
    /// `BufferSize` if `state` does not match [`Self::num_dofs`].
    fn exporter<'a>(&'a self, state: &'a [f64]) -> CoreResult<SolutionExporter<'a>> {
        SolutionExporter::new(self.layout(), state)
    }
}
