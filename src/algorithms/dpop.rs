//! DPOP: a complete, exact pseudo-tree inference algorithm run in two
//! phases, UTIL (leaves to root) and VALUE (root to leaves). Grounded
//! directly on `pydcop/algorithms/dpop.py`.

use std::sync::Arc;

use fxhash::FxHashMap;
use rand::Rng;
use serde_json::Value as Json;

use crate::domain::{Domain, Mode, Value, Variable};
use crate::engine::{Computation, MessageSender, VariableComputationBase};
use crate::error::{ComputationError, DcopError, ProtocolViolation};
use crate::graph::ComputationNode;
use crate::message_type;
use crate::relation::{find_arg_optimal, join, project, Relation, TabularRelation};

// A UTIL message carries each dimension's variable (name + domain) alongside
// the dense values, not just a name: the receiver generally cannot resolve a
// separator variable by name against its own local constraints (a pseudo-
// parent's variable may reach a node only through a descendant's message),
// so the message is self-contained the same way pydcop passes live `Variable`
// object references inside `NAryMatrixRelation.dimensions`.
message_type!(UtilPayload {
    dimensions: Vec<(String, Vec<Value>)>,
    values: Vec<i64>,
});

message_type!(ValuePayload {
    assignment: FxHashMap<String, Value>,
});

const UTIL: &str = "UTIL";
const VALUE: &str = "VALUE";

fn encode_relation(r: &TabularRelation) -> Json {
    let dimensions = r
        .scope()
        .iter()
        .map(|v| (v.name().to_string(), v.domain().values().to_vec()))
        .collect();
    serde_json::to_value(UtilPayload::new(dimensions, r.values().to_vec()))
        .expect("UtilPayload is always representable as JSON")
}

fn decode_relation(content: &Json) -> Result<TabularRelation, DcopError> {
    let payload: UtilPayload = serde_json::from_value(content.clone()).map_err(|_| {
        ComputationError::UnhandledMessage {
            computation: "dpop".to_string(),
            message_type: UTIL.to_string(),
        }
    })?;
    let scope = payload
        .dimensions
        .into_iter()
        .map(|(name, values)| Arc::new(Variable::new(name, Domain::new(values))))
        .collect();
    Ok(TabularRelation::from_dense(scope, payload.values))
}

/// One computation in a DPOP run: exactly one pseudo-tree node.
pub struct DpopComputation {
    base: VariableComputationBase,
    node: ComputationNode,
    mode: Mode,
    parent: Option<String>,
    children: Vec<String>,
    joined_utils: TabularRelation,
    waited_children: Vec<String>,
    /// Each child's separator — the scope of the UTIL relation it sent —
    /// recorded as it arrives, so the VALUE phase can forward each child
    /// only the slice of the known assignment it actually needs.
    children_separator: FxHashMap<String, Vec<String>>,
}

impl DpopComputation {
    pub fn new(node: ComputationNode, mode: Mode) -> Self {
        let parent = node.parent();
        let children = node.children();
        let joined_utils = if node.variable.has_cost_fn() {
            let var = node.variable.clone();
            TabularRelation::build(vec![var.clone()], |a| {
                let value = a.get(var.name()).expect("scope is exactly [self]");
                Ok(var.cost_for_val(value).unwrap_or(0))
            })
            .expect("unary cost relations always build")
        } else {
            TabularRelation::constant(0)
        };
        let waited_children = children.clone();

        DpopComputation {
            base: VariableComputationBase::new(node.variable.clone()),
            node,
            mode,
            parent,
            children,
            joined_utils,
            waited_children,
            children_separator: FxHashMap::default(),
        }
    }

    fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Join this node's own constraints into `joined_utils`, then project
    /// `self` out — the message sent up to the parent (`_compute_utils_msg`).
    fn compute_utils_msg(&self) -> Result<TabularRelation, DcopError> {
        let mut acc: TabularRelation = self.joined_utils.clone();
        for c in &self.node.constraints {
            acc = join(&acc, c.as_ref())?;
        }
        Ok(project(&acc, &self.node.variable, self.mode)?)
    }

    fn send_util_to_parent(&self) -> Result<(), DcopError> {
        let Some(parent) = &self.parent else {
            return Ok(());
        };
        let relation = self.compute_utils_msg()?;
        let size = relation.size();
        self.base.post_msg(
            parent,
            crate::engine::Message::new(UTIL, encode_relation(&relation), size),
        )?;
        Ok(())
    }

    /// A root that has already received UTIL from every child: always pick
    /// the joint optimum and notify children, regardless of whether this
    /// node carries its own constraints (`dpop.py`'s `_on_util_message` root
    /// branch never special-cases the unconstrained case — by the time a
    /// root has children, `joined_utils` already carries their contribution).
    fn finalize_as_root(&mut self) -> Result<(), DcopError> {
        let mut relation: TabularRelation = self.joined_utils.clone();
        for c in &self.node.constraints {
            relation = join(&relation, c.as_ref())?;
        }
        let (values, cost) = find_arg_optimal(&self.node.variable, &relation, self.mode)?;
        let value = values[0].clone();
        self.send_value_to_children(&value)?;
        self.base.select_value_and_finish(value, cost);
        Ok(())
    }

    /// A root with no children at all: an isolated variable. Whether it has
    /// anything to optimize is decided by its explicit constraint list, not
    /// by whether a unary cost function happened to seed `joined_utils`
    /// (`dpop.py`'s isolated-variable branch in `on_start` checks
    /// `self._constraints`, nothing else).
    fn finalize_as_isolated_root(&mut self) -> Result<(), DcopError> {
        if self.node.constraints.is_empty() {
            let mut rng = rand::thread_rng();
            let domain = self.node.variable.domain();
            let idx = rng.gen_range(0..domain.len());
            let value = domain.values()[idx].clone();
            self.base.select_value_and_finish(value, 0);
        } else {
            let mut relation: TabularRelation = self.joined_utils.clone();
            for c in &self.node.constraints {
                relation = join(&relation, c.as_ref())?;
            }
            let (values, cost) = find_arg_optimal(&self.node.variable, &relation, self.mode)?;
            let value = values[0].clone();
            self.base.select_value_and_finish(value, cost);
        }
        Ok(())
    }

    fn send_value_to_children(&self, own_value: &Value) -> Result<(), DcopError> {
        for child in &self.children {
            let mut assignment = FxHashMap::default();
            assignment.insert(self.node.variable.name().to_string(), own_value.clone());
            self.base.post_msg(
                child,
                crate::engine::Message::new(
                    VALUE,
                    serde_json::to_value(ValuePayload::new(assignment)).unwrap(),
                    1,
                ),
            )?;
        }
        Ok(())
    }

    fn on_util(&mut self, sender: &str, content: &Json) -> Result<(), DcopError> {
        if !self.children.iter().any(|c| c == sender) {
            return Err(ComputationError::UnexpectedSender {
                computation: self.base.name().to_string(),
                sender: sender.to_string(),
            }
            .into());
        }
        let incoming = decode_relation(content)?;
        self.children_separator
            .insert(sender.to_string(), incoming.dimensions());
        self.joined_utils = join(&self.joined_utils, &incoming)?;
        self.waited_children.retain(|c| c != sender);

        if !self.waited_children.is_empty() {
            return Ok(());
        }

        if self.is_root() {
            self.finalize_as_root()
        } else {
            self.send_util_to_parent()
        }
    }

    fn on_value(&mut self, content: &Json) -> Result<(), DcopError> {
        if self.base.current_value.is_some() {
            return Err(
                ProtocolViolation::UnexpectedDpopValue(self.base.name().to_string()).into(),
            );
        }
        let payload: ValuePayload = serde_json::from_value(content.clone()).map_err(|_| {
            ComputationError::UnhandledMessage {
                computation: self.base.name().to_string(),
                message_type: VALUE.to_string(),
            }
        })?;

        let mut relation: TabularRelation = self.joined_utils.clone();
        for c in &self.node.constraints {
            relation = join(&relation, c.as_ref())?;
        }
        let sliced = relation.slice(&payload.assignment)?;
        let (values, cost) = find_arg_optimal(&self.node.variable, &sliced, self.mode)?;
        let own_value = values[0].clone();

        for child in &self.children {
            let mut child_assignment = FxHashMap::default();
            child_assignment.insert(self.node.variable.name().to_string(), own_value.clone());
            if let Some(separator) = self.children_separator.get(child) {
                for name in separator {
                    if let Some(v) = payload.assignment.get(name) {
                        child_assignment.insert(name.clone(), v.clone());
                    }
                }
            }
            self.base.post_msg(
                child,
                crate::engine::Message::new(
                    VALUE,
                    serde_json::to_value(ValuePayload::new(child_assignment)).unwrap(),
                    1,
                ),
            )?;
        }

        self.base.select_value_and_finish(own_value, cost);
        Ok(())
    }
}

impl Computation for DpopComputation {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn message_types(&self) -> &'static [&'static str] {
        &[UTIL, VALUE]
    }

    fn set_sender(&mut self, sender: Arc<dyn MessageSender>) -> Result<(), ComputationError> {
        self.base.set_sender(sender)
    }

    fn on_start(&mut self) {
        let outcome = if self.is_root() && self.is_leaf() {
            self.finalize_as_isolated_root()
        } else if !self.is_root() && self.is_leaf() {
            self.send_util_to_parent()
        } else {
            Ok(())
        };
        if let Err(e) = outcome {
            tracing::error!(computation = self.base.name(), error = %e, "dpop on_start failed");
        }
    }

    fn dispatch(&mut self, sender: &str, msg_type: &str, content: &Json) -> Result<(), DcopError> {
        match msg_type {
            UTIL => self.on_util(sender, content),
            VALUE => self.on_value(content),
            other => Err(ComputationError::UnhandledMessage {
                computation: self.base.name().to_string(),
                message_type: other.to_string(),
            }
            .into()),
        }
    }

    fn is_finished(&self) -> bool {
        self.base.is_finished()
    }

    fn finished_state(&self) -> Option<(Value, Option<i64>)> {
        self.base.finished_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;
    use crate::engine::{Agent, Transport};
    use crate::graph::{Link, LinkKind};
    use crate::relation::FunctionRelation;
    use std::time::Duration;

    fn bool_var(name: &str) -> Arc<Variable> {
        Arc::new(Variable::new(
            name,
            Domain::new(vec![Value::Int(0), Value::Int(1)]),
        ))
    }

    /// Two variables x1-x2 wired parent/child, constrained to disagree.
    /// Minimizing, the only optimal complete assignment has cost 0.
    #[test]
    fn two_variable_chain_converges_to_the_optimal_assignment() {
        let x1 = bool_var("x1");
        let x2 = bool_var("x2");

        let disagree = Arc::new(FunctionRelation::new(
            "disagree",
            vec![x1.clone(), x2.clone()],
            |a| {
                let v1 = a.get("x1").unwrap();
                let v2 = a.get("x2").unwrap();
                Ok(if v1 == v2 { 1 } else { 0 })
            },
        ));

        let root_node = ComputationNode::new(x1.clone(), vec![]).with_links(vec![Link {
            kind: LinkKind::Children,
            target: "x2".to_string(),
        }]);
        let child_node = ComputationNode::new(x2.clone(), vec![disagree]).with_links(vec![Link {
            kind: LinkKind::Parent,
            target: "x1".to_string(),
        }]);

        let transport = Transport::new();
        let agent = Agent::new("a1", transport.clone());

        agent.host_all(vec![
            Box::new(DpopComputation::new(child_node, Mode::Min)),
            Box::new(DpopComputation::new(root_node, Mode::Min)),
        ]);

        agent.run_until_idle(Duration::from_millis(20), Duration::from_secs(2));
        assert_eq!(0, agent.hosted_count());

        let (v1, c1) = agent.result_of("x1").expect("x1 finished");
        let (v2, c2) = agent.result_of("x2").expect("x2 finished");
        assert_ne!(v1, v2);
        assert_eq!(Some(0), c1);
        assert_eq!(Some(0), c2);
    }

    /// An isolated root (no children, and critically no explicit
    /// constraints list) picks uniformly at random at cost 0 — a unary cost
    /// function alone does not make it "constrained" (`dpop.py` keys this
    /// branch on `self._constraints`, not on whatever seeded `joined_utils`).
    #[test]
    fn isolated_root_with_a_unary_cost_but_no_constraints_picks_randomly_at_zero_cost() {
        let x1 = Arc::new(Variable::with_cost(
            "x1",
            Domain::new(vec![Value::Int(0), Value::Int(1), Value::Int(2)]),
            |v| match v {
                Value::Int(2) => 0,
                Value::Int(1) => 3,
                _ => 9,
            },
        ));
        let node = ComputationNode::new(x1.clone(), vec![]);

        let transport = Transport::new();
        let agent = Agent::new("a1", transport);
        agent.host(Box::new(DpopComputation::new(node, Mode::Min)));
        agent.run_until_idle(Duration::from_millis(20), Duration::from_secs(1));
        assert_eq!(0, agent.hosted_count());

        let (value, cost) = agent.result_of("x1").expect("x1 finished");
        assert_eq!(Some(0), cost);
        assert!(x1.domain().values().contains(&value));
    }

    /// An isolated root that DOES carry an explicit constraint (here, a
    /// unary one) argopts over it instead of picking randomly.
    #[test]
    fn isolated_root_with_a_unary_constraint_picks_its_cheapest_value() {
        let x1 = Arc::new(Variable::new(
            "x1",
            Domain::new(vec![Value::Int(0), Value::Int(1), Value::Int(2)]),
        ));
        let cheap_at_two = Arc::new(crate::relation::FunctionRelation::new(
            "cheap-at-two",
            vec![x1.clone()],
            |a| {
                Ok(match a.get("x1").unwrap() {
                    Value::Int(2) => 0,
                    Value::Int(1) => 3,
                    _ => 9,
                })
            },
        ));
        let node = ComputationNode::new(x1.clone(), vec![cheap_at_two]);

        let transport = Transport::new();
        let agent = Agent::new("a1", transport);
        agent.host(Box::new(DpopComputation::new(node, Mode::Min)));
        agent.run_until_idle(Duration::from_millis(20), Duration::from_secs(1));
        assert_eq!(0, agent.hosted_count());

        let (value, cost) = agent.result_of("x1").expect("x1 finished");
        assert_eq!(Value::Int(2), value);
        assert_eq!(Some(0), cost);
    }

    #[test]
    fn util_from_a_non_child_sender_is_rejected() {
        let x1 = bool_var("x1");
        let node = ComputationNode::new(x1, vec![]);
        let mut computation = DpopComputation::new(node, Mode::Min);

        let relation = TabularRelation::constant(0);
        let err = computation
            .on_util("not-a-child", &encode_relation(&relation))
            .unwrap_err();
        assert!(matches!(
            err,
            DcopError::Computation(ComputationError::UnexpectedSender { .. })
        ));
    }
}
