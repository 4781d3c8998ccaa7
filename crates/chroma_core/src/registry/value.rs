//! Values accepted by `set_parameter`.

/// Parameter value as supplied by a configuration loader.
///
/// Every variant is stored as the primal `f64` of the target cell; booleans
/// map to `1.0` / `0.0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParameterValue {
    /// Integer value
    Int(i64),
    /// Floating point value
    Double(f64),
    /// Boolean flag
    Bool(bool),
}

impl ParameterValue {
    /// Value as stored in the parameter cell.
    pub fn as_f64(&self) -> f64 {
        match *self {
            ParameterValue::Int(v) => v as f64,
            ParameterValue::Double(v) => v,
            ParameterValue::Bool(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Double(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        ParameterValue::Int(i64::from(v))
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}
