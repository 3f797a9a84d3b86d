//! # dcop-core
//!
//! `dcop-core` is the algorithm execution substrate of a distributed
//! constraint-optimization (DCOP) runtime: the data model for variables,
//! domains and n-ary constraints, a relation algebra (`join`/`project`/
//! `find_arg_optimal`), a message-passing computation engine that runs one
//! cooperative event loop per agent, an explicit algorithm registry, and
//! three representative algorithm state machines — DPOP (tree inference),
//! DSA (stochastic local search) and SyncBB (synchronous branch-and-bound).
//!
//! ## Quick example
//! The following wires up a two-variable DPOP run on a single agent: `x1`
//! and `x2` each take a color, and a disagreement constraint between them
//! pays a cost of 1 if they end up equal.
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use dcop_core::algorithms::DpopComputation;
//! use dcop_core::domain::{Domain, Mode, Value, Variable};
//! use dcop_core::engine::{Agent, Transport};
//! use dcop_core::graph::{ComputationNode, Link, LinkKind};
//! use dcop_core::relation::FunctionRelation;
//!
//! fn color_var(name: &str) -> Arc<Variable> {
//!     Arc::new(Variable::new(name, Domain::new(vec![Value::Int(0), Value::Int(1)])))
//! }
//!
//! let x1 = color_var("x1");
//! let x2 = color_var("x2");
//! let disagree = Arc::new(FunctionRelation::new(
//!     "disagree",
//!     vec![x1.clone(), x2.clone()],
//!     |a| Ok(if a.get("x1") == a.get("x2") { 1 } else { 0 }),
//! ));
//!
//! let root = ComputationNode::new(x1, vec![])
//!     .with_links(vec![Link { kind: LinkKind::Children, target: "x2".to_string() }]);
//! let child = ComputationNode::new(x2, vec![disagree])
//!     .with_links(vec![Link { kind: LinkKind::Parent, target: "x1".to_string() }]);
//!
//! let transport = Transport::new();
//! let agent = Agent::new("a1", transport);
//! agent.host_all(vec![
//!     Box::new(DpopComputation::new(child, Mode::Min)),
//!     Box::new(DpopComputation::new(root, Mode::Min)),
//! ]);
//! agent.run_until_idle(Duration::from_millis(10), Duration::from_secs(2));
//! assert_eq!(0, agent.hosted_count());
//! ```
//!
//! ## Going further
//! Start with `domain`/`relation`/`graph` for the data model, `algorithm`
//! for how a named algorithm (plus its parameters) turns a `ComputationDef`
//! into a live computation, and `engine` for the `Computation` trait and the
//! `Agent` that hosts and drives it. `algorithms::dpop`/`dsa`/`syncbb` are
//! the three built-in state machines built on top of that substrate.

pub mod algorithm;
pub mod algorithms;
pub mod assignment;
pub mod domain;
pub mod engine;
pub mod error;
pub mod graph;
pub mod relation;
pub mod result;
pub mod support;
