//! Parameter identities.
//!
//! A [`ParameterId`] names one physical parameter of one unit operation. It
//! is a plain value type: equality, hashing and ordering are field-wise and
//! include the "unset" state of every optional index, so it backs hash and
//! tree maps directly.

use std::fmt;
use std::str::FromStr;

use super::error::CoreError;

/// Index of a unit operation within a model system.
pub type UnitOpIdx = u32;

/// Enumerated physical parameter symbols.
///
/// The string form (see [`ParameterName::as_str`]) is the upper-case key used
/// in configuration files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParameterName {
    /// Interstitial velocity of the column
    #[cfg_attr(feature = "serde", serde(rename = "VELOCITY"))]
    Velocity,
    /// Axial dispersion coefficient
    #[cfg_attr(feature = "serde", serde(rename = "COL_DISPERSION"))]
    ColDispersion,
    /// Column length
    #[cfg_attr(feature = "serde", serde(rename = "COL_LENGTH"))]
    ColLength,
    /// Column (bed) porosity
    #[cfg_attr(feature = "serde", serde(rename = "COL_POROSITY"))]
    ColPorosity,
    /// Particle radius
    #[cfg_attr(feature = "serde", serde(rename = "PAR_RADIUS"))]
    ParRadius,
    /// Particle porosity
    #[cfg_attr(feature = "serde", serde(rename = "PAR_POROSITY"))]
    ParPorosity,
    /// Film diffusion coefficient (per component)
    #[cfg_attr(feature = "serde", serde(rename = "FILM_DIFFUSION"))]
    FilmDiffusion,
    /// Pore diffusion coefficient (per component)
    #[cfg_attr(feature = "serde", serde(rename = "PAR_DIFFUSION"))]
    ParDiffusion,
    /// Surface diffusion coefficient (per bound state)
    #[cfg_attr(feature = "serde", serde(rename = "PAR_SURFDIFFUSION"))]
    ParSurfDiffusion,
    /// Linear binding adsorption rate
    #[cfg_attr(feature = "serde", serde(rename = "LIN_KA"))]
    LinKa,
    /// Linear binding desorption rate
    #[cfg_attr(feature = "serde", serde(rename = "LIN_KD"))]
    LinKd,
    /// Constant coefficient of the inlet polynomial
    #[cfg_attr(feature = "serde", serde(rename = "CONST_COEFF"))]
    ConstCoeff,
    /// Linear coefficient of the inlet polynomial
    #[cfg_attr(feature = "serde", serde(rename = "LIN_COEFF"))]
    LinCoeff,
    /// Quadratic coefficient of the inlet polynomial
    #[cfg_attr(feature = "serde", serde(rename = "QUAD_COEFF"))]
    QuadCoeff,
    /// Cubic coefficient of the inlet polynomial
    #[cfg_attr(feature = "serde", serde(rename = "CUBE_COEFF"))]
    CubeCoeff,
    /// Tank porosity (liquid fraction)
    #[cfg_attr(feature = "serde", serde(rename = "POROSITY"))]
    Porosity,
    /// Volumetric flow rate entering a tank
    #[cfg_attr(feature = "serde", serde(rename = "FLOWRATE_IN"))]
    FlowrateIn,
    /// Volumetric flow rate leaving a tank
    #[cfg_attr(feature = "serde", serde(rename = "FLOWRATE_OUT"))]
    FlowrateOut,
}

impl ParameterName {
    /// Every parameter name, in declaration order.
    pub const ALL: [ParameterName; 18] = [
        ParameterName::Velocity,
        ParameterName::ColDispersion,
        ParameterName::ColLength,
        ParameterName::ColPorosity,
        ParameterName::ParRadius,
        ParameterName::ParPorosity,
        ParameterName::FilmDiffusion,
        ParameterName::ParDiffusion,
        ParameterName::ParSurfDiffusion,
        ParameterName::LinKa,
        ParameterName::LinKd,
        ParameterName::ConstCoeff,
        ParameterName::LinCoeff,
        ParameterName::QuadCoeff,
        ParameterName::CubeCoeff,
        ParameterName::Porosity,
        ParameterName::FlowrateIn,
        ParameterName::FlowrateOut,
    ];

    /// Configuration key of this parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterName::Velocity => "VELOCITY",
            ParameterName::ColDispersion => "COL_DISPERSION",
            ParameterName::ColLength => "COL_LENGTH",
            ParameterName::ColPorosity => "COL_POROSITY",
            ParameterName::ParRadius => "PAR_RADIUS",
            ParameterName::ParPorosity => "PAR_POROSITY",
            ParameterName::FilmDiffusion => "FILM_DIFFUSION",
            ParameterName::ParDiffusion => "PAR_DIFFUSION",
            ParameterName::ParSurfDiffusion => "PAR_SURFDIFFUSION",
            ParameterName::LinKa => "LIN_KA",
            ParameterName::LinKd => "LIN_KD",
            ParameterName::ConstCoeff => "CONST_COEFF",
            ParameterName::LinCoeff => "LIN_COEFF",
            ParameterName::QuadCoeff => "QUAD_COEFF",
            ParameterName::CubeCoeff => "CUBE_COEFF",
            ParameterName::Porosity => "POROSITY",
            ParameterName::FlowrateIn => "FLOWRATE_IN",
            ParameterName::FlowrateOut => "FLOWRATE_OUT",
        }
    }
}

impl fmt::Display for ParameterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_uppercase();
        ParameterName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == key)
            .ok_or_else(|| CoreError::InvalidState(format!("Unknown parameter name: {}", s)))
    }
}

/// Identity of one physical parameter.
///
/// Optional indices left at `None` mean "not applicable" (or "all" for the
/// component index); `None` is a value in its own right and two identities
/// only compare equal when every field matches.
///
/// # Examples
///
/// ```
/// use chroma_core::types::{ParameterId, ParameterName};
///
/// let a = ParameterId::new(ParameterName::LinKa).unit(0).component(1).bound_state(0);
/// let b = ParameterId::new(ParameterName::LinKa).unit(0).component(1);
/// assert_ne!(a, b);
/// assert_eq!(a.component_index(), Some(1));
/// assert_eq!(b.bound_state_index(), None);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterId {
    #[cfg_attr(feature = "serde", serde(default))]
    unit: Option<UnitOpIdx>,
    name: ParameterName,
    #[cfg_attr(feature = "serde", serde(default))]
    component: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    section: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    bound_state: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    reaction: Option<u32>,
}

impl ParameterId {
    /// Creates an identity with every index unset.
    #[inline]
    pub const fn new(name: ParameterName) -> Self {
        Self {
            unit: None,
            name,
            component: None,
            section: None,
            bound_state: None,
            reaction: None,
        }
    }

    /// Sets the unit operation index.
    #[inline]
    pub const fn unit(mut self, unit: UnitOpIdx) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the component index.
    #[inline]
    pub const fn component(mut self, component: u32) -> Self {
        self.component = Some(component);
        self
    }

    /// Sets the section index.
    #[inline]
    pub const fn section(mut self, section: u32) -> Self {
        self.section = Some(section);
        self
    }

    /// Sets the bound state index.
    #[inline]
    pub const fn bound_state(mut self, bound_state: u32) -> Self {
        self.bound_state = Some(bound_state);
        self
    }

    /// Sets the reaction index.
    #[inline]
    pub const fn reaction(mut self, reaction: u32) -> Self {
        self.reaction = Some(reaction);
        self
    }

    /// Parameter name.
    #[inline]
    pub fn name(&self) -> ParameterName {
        self.name
    }

    /// Unit operation index, if set.
    #[inline]
    pub fn unit_index(&self) -> Option<UnitOpIdx> {
        self.unit
    }

    /// Component index, if set.
    #[inline]
    pub fn component_index(&self) -> Option<u32> {
        self.component
    }

    /// Section index, if set.
    #[inline]
    pub fn section_index(&self) -> Option<u32> {
        self.section
    }

    /// Bound state index, if set.
    #[inline]
    pub fn bound_state_index(&self) -> Option<u32> {
        self.bound_state
    }

    /// Reaction index, if set.
    #[inline]
    pub fn reaction_index(&self) -> Option<u32> {
        self.reaction
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            ("unit", self.unit),
            ("comp", self.component),
            ("sec", self.section),
            ("bound", self.bound_state),
            ("reac", self.reaction),
        ];
        write!(f, "{}", self.name)?;
        let mut first = true;
        for (label, value) in fields {
            if let Some(v) = value {
                f.write_str(if first { "[" } else { ", " })?;
                write!(f, "{}={}", label, v)?;
                first = false;
            }
        }
        if !first {
            f.write_str("]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::{BTreeSet, HashSet};

    #[test]
    fn test_display_all_unset() {
        let id = ParameterId::new(ParameterName::ColLength);
        assert_eq!(id.to_string(), "COL_LENGTH");
    }

    #[test]
    fn test_display_all_set() {
        let id = ParameterId::new(ParameterName::LinKd)
            .unit(3)
            .component(1)
            .section(0)
            .bound_state(2)
            .reaction(4);
        assert_eq!(
            id.to_string(),
            "LIN_KD[unit=3, comp=1, sec=0, bound=2, reac=4]"
        );
    }

    #[test]
    fn test_unset_differs_from_zero() {
        let unset = ParameterId::new(ParameterName::FilmDiffusion).unit(0);
        let zero = unset.component(0);
        assert_ne!(unset, zero);

        let set: HashSet<ParameterId> = [unset, zero].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_name_round_trip() {
        for name in ParameterName::ALL {
            assert_eq!(name.as_str().parse::<ParameterName>().unwrap(), name);
        }
    }

    #[test]
    fn test_name_parse_is_case_insensitive() {
        assert_eq!(
            "par_surfdiffusion".parse::<ParameterName>().unwrap(),
            ParameterName::ParSurfDiffusion
        );
        assert!("VISCOSITY".parse::<ParameterName>().is_err());
    }

    fn id_strategy() -> impl Strategy<Value = ParameterId> {
        (
            0usize..ParameterName::ALL.len(),
            proptest::option::of(0u32..3),
            proptest::option::of(0u32..3),
            proptest::option::of(0u32..3),
            proptest::option::of(0u32..3),
        )
            .prop_map(|(name, unit, comp, sec, bound)| {
                let mut id = ParameterId::new(ParameterName::ALL[name]);
                if let Some(u) = unit {
                    id = id.unit(u);
                }
                if let Some(c) = comp {
                    id = id.component(c);
                }
                if let Some(s) = sec {
                    id = id.section(s);
                }
                if let Some(b) = bound {
                    id = id.bound_state(b);
                }
                id
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn test_equality_is_field_wise(a in id_strategy(), b in id_strategy()) {
            let fields_equal = a.name() == b.name()
                && a.unit_index() == b.unit_index()
                && a.component_index() == b.component_index()
                && a.section_index() == b.section_index()
                && a.bound_state_index() == b.bound_state_index()
                && a.reaction_index() == b.reaction_index();
            prop_assert_eq!(a == b, fields_equal);
            prop_assert_eq!(a.cmp(&b) == std::cmp::Ordering::Equal, fields_equal);
        }

        #[test]
        fn test_tree_and_hash_sets_agree(ids in proptest::collection::vec(id_strategy(), 0..40)) {
            let hashed: HashSet<ParameterId> = ids.iter().copied().collect();
            let ordered: BTreeSet<ParameterId> = ids.iter().copied().collect();
            prop_assert_eq!(hashed.len(), ordered.len());
        }
    }
}
