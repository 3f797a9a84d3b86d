//! Assignments: partial or complete mappings from variable name to value,
//! and the small set of pure helpers the relation algebra and the three
//! algorithms build on (`pydcop/algorithms/objects.py`'s
//! `generate_assignment_as_dict`, `filter_assignment_dict`,
//! `assignment_cost`).

use std::sync::Arc;

use fxhash::FxHashMap;

use crate::domain::{Value, Variable};
use crate::relation::Relation;

/// A (partial) assignment: variable name to value. Order-independent, so a
/// hash map rather than the scope-ordered `Vec` a `Relation` uses internally.
pub type Assignment = FxHashMap<String, Value>;

/// The sub-assignment of `assignment` restricted to `names`, in the order
/// `names` is given. Panics-free: names absent from `assignment` are simply
/// absent from the result (mirrors pydcop's `filter_assignment_dict`, which
/// is always called with a superset).
pub fn restrict(assignment: &Assignment, names: &[String]) -> Assignment {
    names
        .iter()
        .filter_map(|n| assignment.get(n).map(|v| (n.clone(), v.clone())))
        .collect()
}

/// Every complete assignment over `scope`'s cartesian product of domains, in
/// the scope's variable order. Used by tests and by dense-matrix relation
/// construction.
pub fn enumerate_assignments(scope: &[Arc<Variable>]) -> Vec<Assignment> {
    let mut results = vec![Assignment::default()];
    for var in scope {
        let mut next = Vec::with_capacity(results.len() * var.domain().len());
        for partial in &results {
            for value in var.domain().iter() {
                let mut extended = partial.clone();
                extended.insert(var.name().to_string(), value.clone());
                next.push(extended);
            }
        }
        results = next;
    }
    results
}

/// Total cost of a complete assignment over a set of constraints plus each
/// variable's own unary cost function, as pydcop's `assignment_cost` does.
pub fn cost_of_assignment(
    assignment: &Assignment,
    variables: &[Arc<Variable>],
    constraints: &[Arc<dyn Relation>],
) -> Result<i64, crate::error::RelationError> {
    let mut total = 0i64;
    for var in variables {
        if let Some(value) = assignment.get(var.name()) {
            if let Some(cost) = var.cost_for_val(value) {
                total += cost;
            }
        }
    }
    for constraint in constraints {
        total += constraint.apply(assignment)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;

    fn bool_var(name: &str) -> Arc<Variable> {
        Arc::new(Variable::new(
            name,
            Domain::new(vec![Value::Int(0), Value::Int(1)]),
        ))
    }

    #[test]
    fn enumerate_assignments_is_the_full_cartesian_product() {
        let scope = vec![bool_var("x"), bool_var("y")];
        let all = enumerate_assignments(&scope);
        assert_eq!(4, all.len());
        assert!(all.contains(
            &[("x".to_string(), Value::Int(1)), ("y".to_string(), Value::Int(0))]
                .into_iter()
                .collect()
        ));
    }

    #[test]
    fn restrict_drops_names_not_in_the_scope() {
        let mut a = Assignment::default();
        a.insert("x".to_string(), Value::Int(1));
        a.insert("y".to_string(), Value::Int(2));
        let restricted = restrict(&a, &["y".to_string()]);
        assert_eq!(1, restricted.len());
        assert_eq!(Some(&Value::Int(2)), restricted.get("y"));
    }
}
