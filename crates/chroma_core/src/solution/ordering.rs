//! Elements of state vector orderings.

use std::fmt;

/// Loop index tag used to describe how a state block is linearised.
///
/// An ordering is a sequence of tags from the outermost to the innermost
/// loop. `BoundState` runs over the flattened bound states of all components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StateOrdering {
    /// Component index
    Component,
    /// Axial cell index
    AxialCell,
    /// Radial (particle shell) cell index
    RadialCell,
    /// Flattened bound state index
    BoundState,
}

impl StateOrdering {
    /// Short label, as written by output consumers.
    pub fn name(&self) -> &'static str {
        match self {
            StateOrdering::Component => "Component",
            StateOrdering::AxialCell => "AxialCell",
            StateOrdering::RadialCell => "RadialCell",
            StateOrdering::BoundState => "BoundState",
        }
    }
}

impl fmt::Display for StateOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
