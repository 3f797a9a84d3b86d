//! The algorithm registry: `AlgorithmParameterDef`, `AlgorithmDef`, and an
//! explicit registration table that replaces pydcop's
//! `pkgutil.iter_modules`-based reflective discovery
//! (`list_available_algorithms`/`load_algorithm_module`) with a static map
//! built once at first access, per the redesign note in spec.md §9.

use std::collections::HashMap;
use std::sync::OnceLock;

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::domain::Mode;
use crate::engine::Computation;
use crate::error::ConfigurationError;
use crate::graph::ComputationNode;

/// The scalar shapes an algorithm parameter's value can take. String inputs
/// that look numeric are coerced to the declared type (pydcop's
/// `check_param_value`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
    /// The absence of a value — pydcop's `None`, used for parameters like
    /// DSA's `stop_cycle: int|None` whose declared type is scalar but whose
    /// default (and a valid explicit choice) is "unset".
    None,
}

impl ParamValue {
    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Str(_) => "str",
            ParamValue::None => "none",
        }
    }
}

/// The kind of computation graph an algorithm is built over, used by the
/// generation machinery to pick the right graph builder (external to this
/// crate; recorded here only so `AlgorithmDescriptor` can advertise it).
/// `serde` renames match the tag vocabulary spec.md §6 names directly
/// (`"pseudotree"`/`"constraints_hypergraph"`/`"ordered_graph"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphType {
    #[serde(rename = "pseudotree")]
    PseudoTree,
    ConstraintsHypergraph,
    OrderedGraph,
}

/// The declared shape of one algorithm parameter (pydcop's `AlgoParameterDef`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmParameterDef {
    pub name: String,
    pub type_name: &'static str,
    pub allowed_values: Option<Vec<ParamValue>>,
    pub default: ParamValue,
}

impl AlgorithmParameterDef {
    pub fn new(
        name: impl Into<String>,
        type_name: &'static str,
        allowed_values: Option<Vec<ParamValue>>,
        default: ParamValue,
    ) -> Self {
        AlgorithmParameterDef {
            name: name.into(),
            type_name,
            allowed_values,
            default,
        }
    }

    /// Coerce and validate `value` against this parameter's declared type
    /// and allowed-values list (pydcop's `check_param_value`).
    fn check(&self, value: &ParamValue) -> Result<ParamValue, ConfigurationError> {
        let coerced = match (self.type_name, value) {
            (_, ParamValue::None) => ParamValue::None,
            ("int", ParamValue::Int(_)) => value.clone(),
            ("float", ParamValue::Float(_)) => value.clone(),
            ("float", ParamValue::Int(i)) => ParamValue::Float(*i as f64),
            ("str", ParamValue::Str(_)) => value.clone(),
            ("int", ParamValue::Str(s)) => s.parse::<i64>().map(ParamValue::Int).map_err(|_| {
                ConfigurationError::InvalidParameter {
                    param: self.name.clone(),
                    value: s.clone(),
                    reason: "not an int".to_string(),
                }
            })?,
            ("float", ParamValue::Str(s)) => {
                s.parse::<f64>().map(ParamValue::Float).map_err(|_| {
                    ConfigurationError::InvalidParameter {
                        param: self.name.clone(),
                        value: s.clone(),
                        reason: "not a float".to_string(),
                    }
                })?
            }
            _ => {
                return Err(ConfigurationError::InvalidParameter {
                    param: self.name.clone(),
                    value: format!("{value:?}"),
                    reason: format!(
                        "expected a {}, got a {}",
                        self.type_name,
                        value.type_name()
                    ),
                })
            }
        };

        if let Some(allowed) = &self.allowed_values {
            if !allowed.contains(&coerced) {
                return Err(ConfigurationError::InvalidParameter {
                    param: self.name.clone(),
                    value: format!("{coerced:?}"),
                    reason: format!("must be one of {allowed:?}"),
                });
            }
        }

        Ok(coerced)
    }
}

/// A fully-resolved algorithm configuration: the algorithm's name, its
/// mode, and a complete set of parameter values (pydcop's `AlgoDef`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmDef {
    pub algo: String,
    pub mode: Mode,
    pub params: FxHashMap<String, ParamValue>,
}

impl AlgorithmDef {
    /// Validate `params` against `defs`: unknown keys are rejected, known
    /// keys are type-checked, and every parameter missing from `params` is
    /// filled in with its declared default (pydcop's
    /// `AlgoDef.build_with_default_param` + `prepare_algo_params`).
    pub fn build_with_default_param(
        algo: impl Into<String>,
        mode: Mode,
        params: HashMap<String, ParamValue>,
        defs: &[AlgorithmParameterDef],
    ) -> Result<Self, ConfigurationError> {
        let algo = algo.into();
        let mut resolved = FxHashMap::default();

        for (name, value) in &params {
            let def = defs.iter().find(|d| &d.name == name).ok_or_else(|| {
                ConfigurationError::UnknownParameter {
                    algo: algo.clone(),
                    param: name.clone(),
                }
            })?;
            resolved.insert(name.clone(), def.check(value)?);
        }

        for def in defs {
            resolved
                .entry(def.name.clone())
                .or_insert_with(|| def.default.clone());
        }

        Ok(AlgorithmDef {
            algo,
            mode,
            params: resolved,
        })
    }

    pub fn param_value(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }
}

/// A computation's position in the computation graph plus its resolved
/// algorithm configuration — the unit that an algorithm's `build` function
/// turns into a live `Computation`.
#[derive(Clone)]
pub struct ComputationDef {
    pub node: ComputationNode,
    pub algo: AlgorithmDef,
}

/// Everything the registry needs to know about one algorithm: its
/// parameter schema, the graph shape it runs over, and how to build a live
/// `Computation` from a `ComputationDef`. `computation_memory`/
/// `communication_load` are optional per spec.md §6 ("missing optional
/// members are substituted with default constants"); `None` here means the
/// algorithm didn't supply one, and callers should use
/// `AlgorithmDescriptor::computation_memory`/`communication_load` rather
/// than the fields directly to get that substitution for free.
pub struct AlgorithmDescriptor {
    pub name: &'static str,
    pub graph_type: GraphType,
    pub params: Vec<AlgorithmParameterDef>,
    pub build: fn(&ComputationDef) -> Box<dyn Computation>,
    pub computation_memory_fn: Option<fn(&ComputationNode) -> f64>,
    pub communication_load_fn: Option<fn(&ComputationNode, &str) -> f64>,
}

impl AlgorithmDescriptor {
    /// The estimated memory footprint of hosting `node` under this
    /// algorithm, or the default constant `1.0` if the algorithm declares
    /// none (spec.md §6).
    pub fn computation_memory(&self, node: &ComputationNode) -> f64 {
        self.computation_memory_fn.map_or(1.0, |f| f(node))
    }

    /// The estimated communication load between `node` and `target` under
    /// this algorithm, or the default constant `1.0` if the algorithm
    /// declares none (spec.md §6).
    pub fn communication_load(&self, node: &ComputationNode, target: &str) -> f64 {
        self.communication_load_fn.map_or(1.0, |f| f(node, target))
    }
}

fn registry() -> &'static HashMap<&'static str, AlgorithmDescriptor> {
    static REGISTRY: OnceLock<HashMap<&'static str, AlgorithmDescriptor>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        for descriptor in crate::algorithms::builtin_descriptors() {
            map.insert(descriptor.name, descriptor);
        }
        map
    })
}

/// Look up an algorithm by name, analogous to pydcop's
/// `load_algorithm_module`, but against the explicit table above instead of
/// reflecting over installed modules.
pub fn lookup_algorithm(name: &str) -> Result<&'static AlgorithmDescriptor, ConfigurationError> {
    registry()
        .get(name)
        .ok_or_else(|| ConfigurationError::UnknownAlgorithm(name.to_string()))
}

/// The names of every registered algorithm (pydcop's
/// `list_available_algorithms`).
pub fn list_available_algorithms() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = registry().keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prob_def() -> AlgorithmParameterDef {
        AlgorithmParameterDef::new("probability", "float", None, ParamValue::Float(0.7))
    }

    fn variant_def() -> AlgorithmParameterDef {
        AlgorithmParameterDef::new(
            "variant",
            "str",
            Some(vec![
                ParamValue::Str("A".to_string()),
                ParamValue::Str("B".to_string()),
                ParamValue::Str("C".to_string()),
            ]),
            ParamValue::Str("B".to_string()),
        )
    }

    #[test]
    fn missing_params_are_filled_with_defaults() {
        let def = AlgorithmDef::build_with_default_param(
            "dsa",
            Mode::Min,
            HashMap::new(),
            &[prob_def(), variant_def()],
        )
        .unwrap();
        assert_eq!(Some(&ParamValue::Float(0.7)), def.param_value("probability"));
        assert_eq!(
            Some(&ParamValue::Str("B".to_string())),
            def.param_value("variant")
        );
    }

    #[test]
    fn unknown_param_is_rejected() {
        let mut params = HashMap::new();
        params.insert("nope".to_string(), ParamValue::Int(1));
        let err =
            AlgorithmDef::build_with_default_param("dsa", Mode::Min, params, &[prob_def()])
                .unwrap_err();
        assert_eq!(
            ConfigurationError::UnknownParameter {
                algo: "dsa".to_string(),
                param: "nope".to_string(),
            },
            err
        );
    }

    #[test]
    fn string_values_are_coerced_to_the_declared_numeric_type() {
        let mut params = HashMap::new();
        params.insert("probability".to_string(), ParamValue::Str("0.3".to_string()));
        let def =
            AlgorithmDef::build_with_default_param("dsa", Mode::Min, params, &[prob_def()])
                .unwrap();
        assert_eq!(Some(&ParamValue::Float(0.3)), def.param_value("probability"));
    }

    #[test]
    fn values_outside_the_allowed_set_are_rejected() {
        let mut params = HashMap::new();
        params.insert("variant".to_string(), ParamValue::Str("Z".to_string()));
        let err =
            AlgorithmDef::build_with_default_param("dsa", Mode::Min, params, &[variant_def()])
                .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidParameter { .. }));
    }

    #[test]
    fn graph_type_serializes_to_the_spec_vocabulary() {
        assert_eq!("\"pseudotree\"", serde_json::to_string(&GraphType::PseudoTree).unwrap());
        assert_eq!(
            "\"constraints_hypergraph\"",
            serde_json::to_string(&GraphType::ConstraintsHypergraph).unwrap()
        );
        assert_eq!(
            "\"ordered_graph\"",
            serde_json::to_string(&GraphType::OrderedGraph).unwrap()
        );
    }

    #[test]
    fn registry_resolves_the_three_builtin_algorithms() {
        let names = list_available_algorithms();
        assert_eq!(vec!["dpop", "dsa", "syncbb"], names);
        assert!(lookup_algorithm("dpop").is_ok());
        assert!(lookup_algorithm("nonexistent").is_err());
    }

    #[test]
    fn missing_optional_members_fall_back_to_the_default_constant() {
        let descriptor = lookup_algorithm("syncbb").unwrap();
        let node = crate::graph::ComputationNode::new(
            std::sync::Arc::new(crate::domain::Variable::new(
                "x1",
                crate::domain::Domain::new(vec![crate::domain::Value::Int(0)]),
            )),
            Vec::new(),
        );
        assert_eq!(1.0, descriptor.computation_memory(&node));
        assert_eq!(1.0, descriptor.communication_load(&node, "x2"));
    }

    #[test]
    fn dpop_computation_memory_is_the_product_of_mentioned_domain_sizes() {
        let descriptor = lookup_algorithm("dpop").unwrap();
        let x1 = std::sync::Arc::new(crate::domain::Variable::new(
            "x1",
            crate::domain::Domain::new(vec![
                crate::domain::Value::Int(0),
                crate::domain::Value::Int(1),
                crate::domain::Value::Int(2),
            ]),
        ));
        let node = crate::graph::ComputationNode::new(x1, Vec::new());
        assert_eq!(3.0, descriptor.computation_memory(&node));
    }

    #[test]
    fn dsa_computation_memory_and_communication_load_match_pydcop_constants() {
        let descriptor = lookup_algorithm("dsa").unwrap();
        let x1 = std::sync::Arc::new(crate::domain::Variable::new(
            "x1",
            crate::domain::Domain::new(vec![crate::domain::Value::Int(0)]),
        ));
        let x2 = std::sync::Arc::new(crate::domain::Variable::new(
            "x2",
            crate::domain::Domain::new(vec![crate::domain::Value::Int(0)]),
        ));
        let constraint = std::sync::Arc::new(crate::relation::FunctionRelation::new(
            "x1-x2",
            vec![x1.clone(), x2],
            |_| Ok(0),
        ));
        let node = crate::graph::ComputationNode::new(x1, vec![constraint]);
        assert_eq!(5.0, descriptor.computation_memory(&node));
        assert_eq!(105.0, descriptor.communication_load(&node, "x2"));
    }
}
