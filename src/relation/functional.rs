use std::fmt;
use std::sync::Arc;

use crate::assignment::Assignment;
use crate::domain::Variable;
use crate::error::RelationError;
use crate::relation::Relation;

/// A relation evaluated by a closure rather than materialized as a dense
/// matrix — used for unary hosting-cost relations and for constraints DSA
/// evaluates directly against a neighbor assignment without ever building
/// the full matrix pydcop's `NAryMatrixRelation` would.
#[derive(Clone)]
pub struct FunctionRelation {
    name: String,
    scope: Vec<Arc<Variable>>,
    f: Arc<dyn Fn(&Assignment) -> Result<i64, RelationError> + Send + Sync>,
}

impl FunctionRelation {
    pub fn new(
        name: impl Into<String>,
        scope: Vec<Arc<Variable>>,
        f: impl Fn(&Assignment) -> Result<i64, RelationError> + Send + Sync + 'static,
    ) -> Self {
        FunctionRelation {
            name: name.into(),
            scope,
            f: Arc::new(f),
        }
    }
}

impl Relation for FunctionRelation {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> &[Arc<Variable>] {
        &self.scope
    }

    fn apply(&self, assignment: &Assignment) -> Result<i64, RelationError> {
        (self.f)(assignment)
    }
}

impl fmt::Debug for FunctionRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRelation")
            .field("name", &self.name)
            .field("scope", &self.dimensions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, Value};

    #[test]
    fn evaluates_its_closure_against_the_assignment() {
        let x = Arc::new(Variable::new(
            "x",
            Domain::new(vec![Value::Int(0), Value::Int(1)]),
        ));
        let r = FunctionRelation::new("double", vec![x], |a| match a.get("x") {
            Some(Value::Int(i)) => Ok(i * 2),
            _ => Err(RelationError::MissingVariable("x".to_string())),
        });

        let mut a = Assignment::default();
        a.insert("x".to_string(), Value::Int(3));
        assert_eq!(6, r.apply(&a).unwrap());
    }
}
