//! The three built-in algorithm state machines and the descriptor table the
//! registry (`crate::algorithm`) consults. Adding a fourth algorithm means
//! adding one more entry to `builtin_descriptors`; nothing else in the
//! registry changes, per the redesign note in spec.md §9.

mod dpop;
mod dsa;
mod syncbb;

pub use dpop::DpopComputation;
pub use dsa::DsaComputation;
pub use syncbb::SyncBBComputation;

use crate::algorithm::{AlgorithmDescriptor, AlgorithmParameterDef, GraphType, ParamValue};
use crate::graph::ComputationNode;
use crate::relation::Relation;

/// DPOP's per-node memory cost: the size of the UTIL matrix it must hold
/// once every child has reported in — the product of the domain sizes of
/// its own variable and every other variable its local constraints mention
/// (spec.md §4.4's "UTIL size = product of dimensions of its matrix",
/// generalized from message size to resident memory).
fn dpop_computation_memory(node: &ComputationNode) -> f64 {
    let mut names = std::collections::BTreeSet::new();
    names.insert(node.variable.name().to_string());
    let mut size = node.variable.domain().len() as f64;
    for c in &node.constraints {
        for v in c.scope() {
            if names.insert(v.name().to_string()) {
                size *= v.domain().len() as f64;
            }
        }
    }
    size
}

/// DSA only ever remembers the current value of each neighbor, so its
/// footprint is linear in neighbor count (pydcop's `dsa.computation_memory`:
/// `len(neighbors) * UNIT_SIZE`).
const DSA_UNIT_SIZE: f64 = 5.0;
/// Flat per-message overhead pydcop charges on top of `DSA_UNIT_SIZE` for the
/// single `dsa_value` message type (pydcop's `dsa.HEADER_SIZE`).
const DSA_HEADER_SIZE: f64 = 100.0;

fn dsa_computation_memory(node: &ComputationNode) -> f64 {
    let own = node.variable.name();
    let mut neighbors = std::collections::BTreeSet::new();
    for c in &node.constraints {
        for v in c.scope() {
            if v.name() != own {
                neighbors.insert(v.name().to_string());
            }
        }
    }
    neighbors.len() as f64 * DSA_UNIT_SIZE
}

fn dsa_communication_load(_node: &ComputationNode, _target: &str) -> f64 {
    DSA_UNIT_SIZE + DSA_HEADER_SIZE
}

/// Every algorithm this crate ships, registered once at first access of the
/// registry (`crate::algorithm::lookup_algorithm`).
pub fn builtin_descriptors() -> Vec<AlgorithmDescriptor> {
    vec![
        AlgorithmDescriptor {
            name: "dpop",
            graph_type: GraphType::PseudoTree,
            params: Vec::new(),
            build: |def| Box::new(DpopComputation::new(def.node.clone(), def.algo.mode)),
            computation_memory_fn: Some(dpop_computation_memory),
            communication_load_fn: None,
        },
        AlgorithmDescriptor {
            name: "dsa",
            graph_type: GraphType::ConstraintsHypergraph,
            params: vec![
                AlgorithmParameterDef::new("probability", "float", None, ParamValue::Float(0.7)),
                AlgorithmParameterDef::new(
                    "variant",
                    "str",
                    Some(vec![
                        ParamValue::Str("A".to_string()),
                        ParamValue::Str("B".to_string()),
                        ParamValue::Str("C".to_string()),
                    ]),
                    ParamValue::Str("B".to_string()),
                ),
                AlgorithmParameterDef::new("stop_cycle", "int", None, ParamValue::None),
            ],
            build: |def| Box::new(DsaComputation::from_def(def)),
            computation_memory_fn: Some(dsa_computation_memory),
            communication_load_fn: Some(dsa_communication_load),
        },
        AlgorithmDescriptor {
            name: "syncbb",
            graph_type: GraphType::OrderedGraph,
            params: Vec::new(),
            build: |def| Box::new(SyncBBComputation::new(def.node.clone(), def.algo.mode)),
            computation_memory_fn: None,
            communication_load_fn: None,
        },
    ]
}
