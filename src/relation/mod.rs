//! The relation algebra: `join`, `project`, `find_arg_optimal`, implemented
//! once against a `Relation` trait so DPOP's dense-matrix utility joins and
//! DSA's closure-evaluated constraints share one abstraction — the same
//! shape `ddo::Problem`/`ddo::Relaxation` give two very different state
//! representations a common trait-object interface.

mod functional;
mod tabular;

pub use functional::FunctionRelation;
pub use tabular::TabularRelation;

use std::sync::Arc;

use crate::assignment::Assignment;
use crate::domain::{Mode, Value, Variable};
use crate::error::RelationError;

/// A constraint over an ordered scope of variables: given a complete
/// assignment to that scope, it yields a cost (or utility) contribution.
pub trait Relation: Send + Sync {
    /// Name, for logging and for `DpopMessage`/error messages. Defaults to
    /// a generic label; concrete relations usually override it.
    fn name(&self) -> &str {
        "relation"
    }

    /// The ordered scope this relation depends on.
    fn scope(&self) -> &[Arc<Variable>];

    /// The scope's variable names, in scope order.
    fn dimensions(&self) -> Vec<String> {
        self.scope().iter().map(|v| v.name().to_string()).collect()
    }

    /// Evaluate this relation against a complete assignment to its scope.
    /// Returns `RelationError::MissingVariable` if `assignment` does not
    /// cover every variable in `scope()`.
    fn apply(&self, assignment: &Assignment) -> Result<i64, RelationError>;
}

/// The union scope of `a` and `b`, preserving `a`'s variables first in their
/// existing order, then any variable of `b` not already present.
fn union_scope(a: &[Arc<Variable>], b: &[Arc<Variable>]) -> Vec<Arc<Variable>> {
    let mut result: Vec<Arc<Variable>> = a.to_vec();
    for var in b {
        if !result.iter().any(|v| v.name() == var.name()) {
            result.push(var.clone());
        }
    }
    result
}

/// `join(a, b)`: the relation over the union scope whose value at any
/// complete assignment is `a`'s value plus `b`'s value (pydcop's
/// `join_utils`, generalized to any two relations rather than only dense
/// matrices).
pub fn join(a: &dyn Relation, b: &dyn Relation) -> Result<TabularRelation, RelationError> {
    let scope = union_scope(a.scope(), b.scope());
    TabularRelation::build(scope, |assignment| {
        Ok(a.apply(assignment)? + b.apply(assignment)?)
    })
}

/// `project(r, x, mode)`: eliminate `x` from `r`'s scope by optimizing
/// (min/max, per `mode`) over `x`'s domain at each assignment to the
/// remaining variables (pydcop's `projection`).
pub fn project(
    r: &dyn Relation,
    x: &Arc<Variable>,
    mode: Mode,
) -> Result<TabularRelation, RelationError> {
    let remaining: Vec<Arc<Variable>> = r
        .scope()
        .iter()
        .filter(|v| v.name() != x.name())
        .cloned()
        .collect();

    TabularRelation::build(remaining, |partial| {
        let mut best = mode.worst_value();
        for value in x.domain().iter() {
            let mut full = partial.clone();
            full.insert(x.name().to_string(), value.clone());
            let cost = r.apply(&full)?;
            if mode.improves(cost, best) {
                best = cost;
            }
        }
        Ok(best)
    })
}

/// `find_arg_optimal(x, r, mode)`: the set of values of `x` achieving the
/// optimum of `r` (which must depend on exactly `x`), and that optimal
/// value. Ties are all returned, in domain order, matching pydcop's
/// `find_arg_optimal`.
pub fn find_arg_optimal(
    x: &Arc<Variable>,
    r: &dyn Relation,
    mode: Mode,
) -> Result<(Vec<Value>, i64), RelationError> {
    if r.scope().len() != 1 || r.scope()[0].name() != x.name() {
        return Err(RelationError::MultiVariableArgOpt(r.scope().len()));
    }

    let mut best = mode.worst_value();
    let mut best_values = Vec::new();
    for value in x.domain().iter() {
        let mut a = Assignment::default();
        a.insert(x.name().to_string(), value.clone());
        let cost = r.apply(&a)?;
        if mode.improves(cost, best) {
            best = cost;
            best_values.clear();
            best_values.push(value.clone());
        } else if cost == best {
            best_values.push(value.clone());
        }
    }
    Ok((best_values, best))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;

    fn var(name: &str, vals: &[i64]) -> Arc<Variable> {
        Arc::new(Variable::new(
            name,
            Domain::new(vals.iter().map(|v| Value::Int(*v)).collect()),
        ))
    }

    #[test]
    fn join_sums_overlapping_scopes() {
        let x = var("x", &[0, 1]);
        let y = var("y", &[0, 1]);

        let r1 = TabularRelation::build(vec![x.clone(), y.clone()], |a| {
            let xv = a.get("x").unwrap();
            let yv = a.get("y").unwrap();
            Ok(if xv == yv { 0 } else { 1 })
        })
        .unwrap();

        let r2 = FunctionRelation::new("unary-y", vec![y.clone()], |a| {
            Ok(if a.get("y").unwrap() == &Value::Int(1) { 10 } else { 0 })
        });

        let joined = join(&r1, &r2).unwrap();
        assert_eq!(2, joined.scope().len());

        let mut a = Assignment::default();
        a.insert("x".to_string(), Value::Int(0));
        a.insert("y".to_string(), Value::Int(1));
        assert_eq!(1 + 10, joined.apply(&a).unwrap());
    }

    #[test]
    fn project_eliminates_a_variable_by_optimizing_over_it() {
        let x = var("x", &[0, 1, 2]);
        let y = var("y", &[0, 1]);
        let r = TabularRelation::build(vec![x.clone(), y.clone()], |a| {
            let xv = match a.get("x").unwrap() {
                Value::Int(i) => *i,
                _ => unreachable!(),
            };
            let yv = match a.get("y").unwrap() {
                Value::Int(i) => *i,
                _ => unreachable!(),
            };
            Ok(xv + yv)
        })
        .unwrap();

        let projected = project(&r, &x, Mode::Min).unwrap();
        assert_eq!(vec!["y".to_string()], projected.dimensions());

        let mut a = Assignment::default();
        a.insert("y".to_string(), Value::Int(1));
        assert_eq!(1, projected.apply(&a).unwrap());
    }

    #[test]
    fn find_arg_optimal_returns_all_ties() {
        let x = var("x", &[0, 1, 2]);
        let r = FunctionRelation::new("unary", vec![x.clone()], |a| {
            match a.get("x").unwrap() {
                Value::Int(0) => Ok(5),
                Value::Int(1) => Ok(5),
                _ => Ok(9),
            }
        });
        let (values, cost) = find_arg_optimal(&x, &r, Mode::Min).unwrap();
        assert_eq!(5, cost);
        assert_eq!(vec![Value::Int(0), Value::Int(1)], values);
    }

    #[test]
    fn find_arg_optimal_rejects_multivariable_relations() {
        let x = var("x", &[0, 1]);
        let y = var("y", &[0, 1]);
        let r = TabularRelation::build(vec![x.clone(), y.clone()], |_| Ok(0)).unwrap();
        let err = find_arg_optimal(&x, &r, Mode::Min).unwrap_err();
        assert_eq!(RelationError::MultiVariableArgOpt(2), err);
    }
}
