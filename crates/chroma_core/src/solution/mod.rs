//! Solution export: structural description and read-only views of a unit
//! operation's state vector.
//!
//! - [`StateOrdering`]: loop tags describing how a block is linearised
//! - [`StateLayout`]: offsets, orderings and strides of every block
//! - [`SolutionExporter`]: borrowed view over one state buffer

mod exporter;
mod layout;
mod ordering;

pub use exporter::{SolutionExporter, StridedView};
pub use layout::{BlockLayout, PortLayout, StateLayout, StateLayoutBuilder};
pub use ordering::StateOrdering;
