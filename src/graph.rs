//! The computation graph: how a `Variable` becomes a node wired to its
//! neighbors, and the agents that host computations. Grounded on
//! `pydcop/computations_graph/objects.py`'s `ComputationNode` (referenced,
//! not retrieved directly, from `dpop.py`'s use of `comp_def.node.links`)
//! and spec.md §3/§6.

use std::collections::BTreeSet;
use std::sync::Arc;

use derive_builder::Builder;
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::domain::Variable;
use crate::relation::Relation;

/// The role a link plays relative to the node it's attached to. DPOP uses
/// `Parent`/`Children`/`PseudoParent`; DSA uses `Neighbor`; SyncBB uses
/// `Predecessor`/`Successor` along its total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkKind {
    Neighbor,
    Parent,
    Children,
    PseudoParent,
    Predecessor,
    Successor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub kind: LinkKind,
    pub target: String,
}

/// One computation's position in the graph: the variable it owns, the
/// constraints whose scope includes that variable, and the typed links to
/// its neighbors.
#[derive(Clone)]
pub struct ComputationNode {
    pub name: String,
    pub variable: Arc<Variable>,
    pub links: Vec<Link>,
    pub constraints: Vec<Arc<dyn Relation>>,
}

impl ComputationNode {
    pub fn new(variable: Arc<Variable>, constraints: Vec<Arc<dyn Relation>>) -> Self {
        ComputationNode {
            name: variable.name().to_string(),
            variable,
            links: Vec::new(),
            constraints,
        }
    }

    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = links;
        self
    }

    fn targets_of(&self, kind: LinkKind) -> Vec<String> {
        self.links
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| l.target.clone())
            .collect()
    }

    /// DPOP's single pseudo-tree parent, if any.
    pub fn parent(&self) -> Option<String> {
        self.targets_of(LinkKind::Parent).into_iter().next()
    }

    /// DPOP's pseudo-tree children.
    pub fn children(&self) -> Vec<String> {
        self.targets_of(LinkKind::Children)
    }

    /// DPOP's pseudo-parents (constraint-sharing ancestors outside the tree
    /// edges).
    pub fn pseudo_parents(&self) -> Vec<String> {
        self.targets_of(LinkKind::PseudoParent)
    }

    /// SyncBB's predecessor in the variable ordering.
    pub fn previous(&self) -> Option<String> {
        self.targets_of(LinkKind::Predecessor).into_iter().next()
    }

    /// SyncBB's successor in the variable ordering.
    pub fn next(&self) -> Option<String> {
        self.targets_of(LinkKind::Successor).into_iter().next()
    }

    /// DSA's neighbors: every other variable appearing in one of this
    /// node's constraints, deduplicated and order-independent.
    pub fn neighbors(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self
            .targets_of(LinkKind::Neighbor)
            .into_iter()
            .collect();
        for c in &self.constraints {
            for var in c.scope() {
                if var.name() != self.variable.name() {
                    names.insert(var.name().to_string());
                }
            }
        }
        names.into_iter().collect()
    }
}

/// An agent's definition: how many computations it may host and, where
/// relevant, the routing/hosting costs external placement algorithms use
/// (out of scope for this crate to compute, but part of the external
/// interface per spec.md §6).
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct AgentDef {
    pub name: String,
    #[builder(default = "1")]
    pub capacity: usize,
    #[builder(default)]
    pub hosting_costs: Option<FxHashMap<String, i64>>,
    #[builder(default)]
    pub default_hosting_cost: Option<i64>,
    #[builder(default)]
    pub default_route: Option<i64>,
}

impl AgentDef {
    pub fn builder() -> AgentDefBuilder {
        AgentDefBuilder::default()
    }

    /// The cost of hosting `computation_name` on this agent: its entry in
    /// `hosting_costs` if present, else `default_hosting_cost`, else zero.
    pub fn hosting_cost(&self, computation_name: &str) -> i64 {
        self.hosting_costs
            .as_ref()
            .and_then(|m| m.get(computation_name))
            .copied()
            .or(self.default_hosting_cost)
            .unwrap_or(0)
    }
}
