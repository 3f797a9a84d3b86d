//! Variables and their domains.
//!
//! ```
//! use dcop_core::domain::{Domain, Value, Variable};
//!
//! let domain = Domain::new(vec![Value::Int(0), Value::Int(1), Value::Int(2)]);
//! let x = Variable::new("x", domain);
//! assert_eq!(3, x.domain().len());
//! assert_eq!("x", x.name());
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One value a variable may be assigned. Only the two scalar shapes DPOP,
/// DSA and SyncBB ever instantiate are modeled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

/// Whether an algorithm is minimizing or maximizing the global objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Min,
    Max,
}

impl Mode {
    /// The value worse than every achievable cost under this mode, used to
    /// seed a running optimum before any candidate has been seen.
    pub fn worst_value(self) -> i64 {
        match self {
            Mode::Min => i64::MAX,
            Mode::Max => i64::MIN,
        }
    }

    /// True if `candidate` improves on `incumbent` under this mode.
    pub fn improves(self, candidate: i64, incumbent: i64) -> bool {
        match self {
            Mode::Min => candidate < incumbent,
            Mode::Max => candidate > incumbent,
        }
    }
}

/// An ordered, finite set of values a variable may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain(Vec<Value>);

impl Domain {
    pub fn new(values: Vec<Value>) -> Self {
        Domain(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.0.contains(value)
    }

    /// Index of `value` within this domain's fixed ordering, if present.
    pub fn position(&self, value: &Value) -> Option<usize> {
        self.0.iter().position(|v| v == value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }

    /// The suffix of the domain strictly after `value`, or the whole domain
    /// if `value` is `None`. Used by SyncBB's candidate-generation.
    pub fn suffix_after(&self, value: Option<&Value>) -> &[Value] {
        match value.and_then(|v| self.position(v)) {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0[..],
        }
    }
}

/// A decision variable: a name, a domain, and an optional unary cost
/// function (the "hosting"/self cost pydcop calls `cost_for_val`).
pub struct Variable {
    name: String,
    domain: Domain,
    cost_fn: Option<Arc<dyn Fn(&Value) -> i64 + Send + Sync>>,
}

impl Variable {
    pub fn new(name: impl Into<String>, domain: Domain) -> Self {
        Variable {
            name: name.into(),
            domain,
            cost_fn: None,
        }
    }

    pub fn with_cost(
        name: impl Into<String>,
        domain: Domain,
        cost_fn: impl Fn(&Value) -> i64 + Send + Sync + 'static,
    ) -> Self {
        Variable {
            name: name.into(),
            domain,
            cost_fn: Some(Arc::new(cost_fn)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// `Some(cost)` if this variable carries a unary cost function, applied
    /// to `value`; `None` if the variable is unconstrained by itself.
    pub fn cost_for_val(&self, value: &Value) -> Option<i64> {
        self.cost_fn.as_ref().map(|f| f(value))
    }

    pub fn has_cost_fn(&self) -> bool {
        self.cost_fn.is_some()
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("has_cost_fn", &self.cost_fn.is_some())
            .finish()
    }
}

impl Clone for Variable {
    fn clone(&self) -> Self {
        Variable {
            name: self.name.clone(),
            domain: self.domain.clone(),
            cost_fn: self.cost_fn.clone(),
        }
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.domain == other.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_position_and_suffix() {
        let d = Domain::new(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(Some(1), d.position(&Value::Int(2)));
        assert_eq!(&[Value::Int(3)], d.suffix_after(Some(&Value::Int(2))));
        assert_eq!(d.values(), d.suffix_after(None));
    }

    #[test]
    fn mode_worst_value_and_improves() {
        assert!(Mode::Min.improves(1, 2));
        assert!(!Mode::Min.improves(2, 1));
        assert!(Mode::Max.improves(2, 1));
        assert_eq!(i64::MAX, Mode::Min.worst_value());
        assert_eq!(i64::MIN, Mode::Max.worst_value());
    }

    #[test]
    fn variable_cost_fn_is_optional() {
        let v = Variable::new("x", Domain::new(vec![Value::Int(0), Value::Int(1)]));
        assert_eq!(None, v.cost_for_val(&Value::Int(0)));

        let v = Variable::with_cost(
            "x",
            Domain::new(vec![Value::Int(0), Value::Int(1)]),
            |val| if *val == Value::Int(1) { 5 } else { 0 },
        );
        assert_eq!(Some(5), v.cost_for_val(&Value::Int(1)));
    }
}
