use std::sync::Arc;

use crate::assignment::{enumerate_assignments, Assignment};
use crate::domain::Variable;
use crate::error::RelationError;
use crate::relation::Relation;

/// A relation stored as a dense matrix over its scope's cartesian product,
/// matching pydcop's `NAryMatrixRelation` (whose `UTIL` message size is
/// reported as the product of the matrix's shape, see `DpopMessage`).
#[derive(Clone)]
pub struct TabularRelation {
    name: String,
    scope: Vec<Arc<Variable>>,
    values: Vec<i64>,
}

impl TabularRelation {
    /// Eagerly evaluate `f` at every complete assignment to `scope` and
    /// store the result as a dense matrix. A zero-arity scope produces a
    /// single-cell constant relation.
    pub fn build(
        scope: Vec<Arc<Variable>>,
        f: impl Fn(&Assignment) -> Result<i64, RelationError>,
    ) -> Result<Self, RelationError> {
        let values = if scope.is_empty() {
            vec![f(&Assignment::default())?]
        } else {
            enumerate_assignments(&scope)
                .iter()
                .map(&f)
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(TabularRelation {
            name: "tabular".to_string(),
            scope,
            values,
        })
    }

    /// A zero-arity relation whose value is always `value`.
    pub fn constant(value: i64) -> Self {
        TabularRelation {
            name: "constant".to_string(),
            scope: Vec::new(),
            values: vec![value],
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of cells in the dense matrix: the product of the scope's
    /// domain sizes (pydcop's `NAryMatrixRelation.shape` product).
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// The dense cell values, in the same mixed-radix order `index_of`
    /// computes (first scope variable most significant). Used to encode a
    /// relation into a `UTIL` message payload.
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Rebuild a relation directly from a scope and a dense value vector
    /// already in that order — the inverse of `values()`, used to decode a
    /// `UTIL` message payload. `values.len()` must equal the product of
    /// `scope`'s domain sizes (or be 1 for an empty scope); trusted caller,
    /// not re-validated here.
    pub fn from_dense(scope: Vec<Arc<Variable>>, values: Vec<i64>) -> Self {
        TabularRelation {
            name: "tabular".to_string(),
            scope,
            values,
        }
    }

    fn index_of(&self, assignment: &Assignment) -> Result<usize, RelationError> {
        if self.scope.is_empty() {
            return Ok(0);
        }
        let mut idx = 0usize;
        for var in &self.scope {
            let value = assignment
                .get(var.name())
                .ok_or_else(|| RelationError::MissingVariable(var.name().to_string()))?;
            let pos = var
                .domain()
                .position(value)
                .ok_or_else(|| RelationError::MissingVariable(var.name().to_string()))?;
            idx = idx * var.domain().len() + pos;
        }
        Ok(idx)
    }

    /// Fix every variable named in `partial` and return the relation over
    /// the remaining scope (pydcop's `NAryMatrixRelation.slices`).
    pub fn slice(&self, partial: &Assignment) -> Result<TabularRelation, RelationError> {
        let remaining: Vec<Arc<Variable>> = self
            .scope
            .iter()
            .filter(|v| !partial.contains_key(v.name()))
            .cloned()
            .collect();

        TabularRelation::build(remaining, |rest| {
            let mut full = partial.clone();
            for (k, v) in rest.iter() {
                full.insert(k.clone(), v.clone());
            }
            self.apply(&full)
        })
    }
}

impl Relation for TabularRelation {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> &[Arc<Variable>] {
        &self.scope
    }

    fn apply(&self, assignment: &Assignment) -> Result<i64, RelationError> {
        let idx = self.index_of(assignment)?;
        Ok(self.values[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, Value};

    fn var(name: &str, vals: &[i64]) -> Arc<Variable> {
        Arc::new(Variable::new(
            name,
            Domain::new(vals.iter().map(|v| Value::Int(*v)).collect()),
        ))
    }

    #[test]
    fn size_is_the_product_of_domain_sizes() {
        let x = var("x", &[0, 1, 2]);
        let y = var("y", &[0, 1]);
        let r = TabularRelation::build(vec![x, y], |_| Ok(0)).unwrap();
        assert_eq!(6, r.size());
    }

    #[test]
    fn constant_has_a_single_cell_and_empty_scope() {
        let r = TabularRelation::constant(42);
        assert_eq!(1, r.size());
        assert!(r.scope().is_empty());
        assert_eq!(42, r.apply(&Assignment::default()).unwrap());
    }

    #[test]
    fn slice_fixes_named_variables_and_keeps_the_rest() {
        let x = var("x", &[0, 1]);
        let y = var("y", &[0, 1]);
        let r = TabularRelation::build(vec![x.clone(), y.clone()], |a| {
            let xv = if a.get("x").unwrap() == &Value::Int(1) { 10 } else { 0 };
            let yv = if a.get("y").unwrap() == &Value::Int(1) { 1 } else { 0 };
            Ok(xv + yv)
        })
        .unwrap();

        let mut partial = Assignment::default();
        partial.insert("x".to_string(), Value::Int(1));
        let sliced = r.slice(&partial).unwrap();
        assert_eq!(vec!["y".to_string()], sliced.dimensions());

        let mut a = Assignment::default();
        a.insert("y".to_string(), Value::Int(1));
        assert_eq!(11, sliced.apply(&a).unwrap());
    }

    #[test]
    fn apply_reports_missing_variables() {
        let x = var("x", &[0, 1]);
        let r = TabularRelation::build(vec![x], |_| Ok(0)).unwrap();
        let err = r.apply(&Assignment::default()).unwrap_err();
        assert_eq!(RelationError::MissingVariable("x".to_string()), err);
    }
}
