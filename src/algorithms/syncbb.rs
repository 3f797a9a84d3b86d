//! SyncBB: synchronous branch-and-bound search over an ordered chain of
//! variables. Grounded on spec.md §4.6 directly — the corresponding
//! `pydcop/algorithms/syncbb.py` handlers for `forward`/`backward` are dead
//! code past an early `pass`, so there is no source behavior to imitate
//! beyond the message field names and the chain-link vocabulary
//! (`get_value_candidates`, `constraints_for_variable`) the module also
//! exposes.

use std::sync::Arc;

use serde_json::Value as Json;

use crate::assignment::Assignment;
use crate::domain::{Mode, Value};
use crate::engine::{Computation, MessageSender, VariableComputationBase};
use crate::error::{ComputationError, DcopError, ProtocolViolation};
use crate::graph::ComputationNode;
use crate::message_type;
use crate::relation::Relation;

/// One entry of the path threaded through `forward`/`backward`: the
/// variable name, the value assigned to it, and the marginal cost that
/// assignment added over already-assigned predecessors.
pub type PathEntry = (String, Value, i64);

message_type!(ChainMessage {
    path: Vec<PathEntry>,
    ub: i64,
});

message_type!(TerminateMessage { ub: i64 });

const FORWARD: &str = "forward";
const BACKWARD: &str = "backward";
const TERMINATE: &str = "terminate";

fn path_cost(path: &[PathEntry]) -> i64 {
    path.iter().map(|(_, _, c)| c).sum()
}

/// One computation in a SyncBB run: exactly one link of the ordered chain.
pub struct SyncBBComputation {
    base: VariableComputationBase,
    mode: Mode,
    constraints: Vec<Arc<dyn Relation>>,
    predecessor: Option<String>,
    successor: Option<String>,
    upper_bound: i64,
    /// Whether this node has already started searching: for the first
    /// variable in the chain, set once `on_start` assigns its own value; for
    /// every other variable, set on the first `forward` it receives. A
    /// `backward` arriving before this is a protocol violation (spec.md §7),
    /// since there is no assigned value yet to backtrack from.
    search_started: bool,
    /// This node's value within the best complete assignment seen so far,
    /// recorded the moment an improving bound (`ub`) is observed, whether
    /// discovered locally (this node is last in the chain) or relayed from
    /// downstream via a `backward` message. Used to finalize once
    /// `terminate` arrives.
    own_best_value: Option<(Value, i64)>,
}

impl SyncBBComputation {
    pub fn new(node: ComputationNode, mode: Mode) -> Self {
        SyncBBComputation {
            predecessor: node.previous(),
            successor: node.next(),
            base: VariableComputationBase::new(node.variable.clone()),
            mode,
            constraints: node.constraints,
            upper_bound: mode.worst_value(),
            search_started: false,
            own_best_value: None,
        }
    }

    fn is_last(&self) -> bool {
        self.successor.is_none()
    }

    /// The cost contributed by assigning `value` to self, given `prior` —
    /// own unary cost plus every owned constraint whose scope is already
    /// fully assigned (spec.md §4.6: "path costs must account only for
    /// constraints whose entire scope is assigned").
    fn marginal_cost(&self, prior: &[PathEntry], value: &Value) -> Result<i64, DcopError> {
        let mut assignment: Assignment = prior
            .iter()
            .map(|(n, v, _)| (n.clone(), v.clone()))
            .collect();
        assignment.insert(self.base.name().to_string(), value.clone());

        let mut total = self.base.variable.cost_for_val(value).unwrap_or(0);
        for c in &self.constraints {
            if c.scope().iter().all(|v| assignment.contains_key(v.name())) {
                total += c.apply(&assignment)?;
            }
        }
        Ok(total)
    }

    fn feasible(&self, total: i64, ub: i64) -> bool {
        match self.mode {
            Mode::Min => total < ub,
            Mode::Max => total > ub,
        }
    }

    /// Record `value` (at `cost`) as part of the best complete assignment,
    /// if `ub` actually improves on what this node has seen so far. A `ub`
    /// equal to the still-unset sentinel worst value is not a real solution
    /// and must not be recorded.
    fn note_improvement(&mut self, value: &Value, cost: i64, ub: i64) {
        if self.mode.improves(ub, self.upper_bound) {
            self.upper_bound = ub;
            self.own_best_value = Some((value.clone(), cost));
        }
    }

    fn send_forward(&self, path: Vec<PathEntry>, ub: i64) -> Result<(), DcopError> {
        let successor = self
            .successor
            .clone()
            .expect("send_forward is only called when a successor exists");
        self.base.post_msg(
            &successor,
            crate::engine::Message::new(
                FORWARD,
                serde_json::to_value(ChainMessage::new(path, ub)).unwrap(),
                1,
            ),
        )?;
        Ok(())
    }

    fn send_backward(&self, path: Vec<PathEntry>, ub: i64) -> Result<(), DcopError> {
        let predecessor = self
            .predecessor
            .clone()
            .expect("send_backward is only called when a predecessor exists");
        self.base.post_msg(
            &predecessor,
            crate::engine::Message::new(
                BACKWARD,
                serde_json::to_value(ChainMessage::new(path, ub)).unwrap(),
                1,
            ),
        )?;
        Ok(())
    }

    /// The search is complete: no predecessor remains to extend it. Start
    /// `terminate` flowing down the chain and finalize this node with
    /// whatever value it last recorded as part of the best assignment.
    fn conclude_search(&mut self) -> Result<(), DcopError> {
        if let Some(successor) = self.successor.clone() {
            self.base.post_msg(
                &successor,
                crate::engine::Message::new(
                    TERMINATE,
                    serde_json::to_value(TerminateMessage::new(self.upper_bound)).unwrap(),
                    1,
                ),
            )?;
        }
        self.finalize();
        Ok(())
    }

    fn finalize(&mut self) {
        let (value, cost) = self
            .own_best_value
            .clone()
            .unwrap_or_else(|| (self.base.variable.domain().values()[0].clone(), 0));
        self.base.select_value_and_finish(value, cost);
    }

    /// Try every value of `candidates` in order against `ub`, given the
    /// already-assigned `prior` path; take the first feasible one and
    /// either extend the search (forward) or, at the tail of the chain,
    /// treat the completed path as a candidate solution. Returns whether a
    /// feasible value was found.
    fn try_candidates(
        &mut self,
        candidates: &[Value],
        prior: &[PathEntry],
        ub: i64,
    ) -> Result<bool, DcopError> {
        let prior_cost = path_cost(prior);
        for value in candidates {
            let marginal = self.marginal_cost(prior, value)?;
            let total = prior_cost + marginal;
            if !self.feasible(total, ub) {
                continue;
            }

            if self.is_last() {
                if self.mode.improves(total, self.upper_bound) {
                    self.note_improvement(value, marginal, total);
                    self.send_backward(prior.to_vec(), total)?;
                } else {
                    self.send_backward(prior.to_vec(), ub)?;
                }
            } else {
                let mut extended = prior.to_vec();
                extended.push((self.base.name().to_string(), value.clone(), marginal));
                self.send_forward(extended, ub)?;
            }
            return Ok(true);
        }
        Ok(false)
    }

    fn on_forward(&mut self, content: &Json) -> Result<(), DcopError> {
        let payload: ChainMessage = serde_json::from_value(content.clone()).map_err(|_| {
            ComputationError::UnhandledMessage {
                computation: self.base.name().to_string(),
                message_type: FORWARD.to_string(),
            }
        })?;
        self.search_started = true;

        let candidates = self.base.variable.domain().values().to_vec();
        let found = self.try_candidates(&candidates, &payload.path, payload.ub)?;
        if !found {
            if self.predecessor.is_some() {
                self.send_backward(payload.path, payload.ub)?;
            } else {
                self.conclude_search()?;
            }
        }
        Ok(())
    }

    fn on_backward(&mut self, content: &Json) -> Result<(), DcopError> {
        if !self.search_started {
            return Err(
                ProtocolViolation::BackwardWithoutForward(self.base.name().to_string()).into(),
            );
        }

        let payload: ChainMessage = serde_json::from_value(content.clone()).map_err(|_| {
            ComputationError::UnhandledMessage {
                computation: self.base.name().to_string(),
                message_type: BACKWARD.to_string(),
            }
        })?;

        let own_entry = payload
            .path
            .last()
            .cloned()
            .ok_or_else(|| ComputationError::UnhandledMessage {
                computation: self.base.name().to_string(),
                message_type: BACKWARD.to_string(),
            })?;
        let (_, current_value, current_cost) = own_entry;
        self.note_improvement(&current_value, current_cost, payload.ub);

        let prior = &payload.path[..payload.path.len() - 1];
        let candidates: Vec<Value> = self
            .base
            .variable
            .domain()
            .suffix_after(Some(&current_value))
            .to_vec();

        let found = self.try_candidates(&candidates, prior, payload.ub)?;
        if !found {
            if self.predecessor.is_some() {
                self.send_backward(prior.to_vec(), payload.ub)?;
            } else {
                self.conclude_search()?;
            }
        }
        Ok(())
    }

    fn on_terminate(&mut self, content: &Json) -> Result<(), DcopError> {
        let payload: TerminateMessage = serde_json::from_value(content.clone()).map_err(|_| {
            ComputationError::UnhandledMessage {
                computation: self.base.name().to_string(),
                message_type: TERMINATE.to_string(),
            }
        })?;
        if self.mode.improves(payload.ub, self.upper_bound) {
            self.upper_bound = payload.ub;
        }
        if let Some(successor) = self.successor.clone() {
            self.base.post_msg(
                &successor,
                crate::engine::Message::new(TERMINATE, content.clone(), 1),
            )?;
        }
        self.finalize();
        Ok(())
    }
}

impl Computation for SyncBBComputation {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn message_types(&self) -> &'static [&'static str] {
        &[FORWARD, BACKWARD, TERMINATE]
    }

    fn set_sender(&mut self, sender: Arc<dyn MessageSender>) -> Result<(), ComputationError> {
        self.base.set_sender(sender)
    }

    fn on_start(&mut self) {
        if self.predecessor.is_some() {
            return;
        }
        self.search_started = true;
        let domain = self.base.variable.domain();
        let first_value = domain.values()[0].clone();
        let path = vec![(self.base.name().to_string(), first_value, 0)];
        if self.successor.is_some() {
            if let Err(e) = self.send_forward(path, self.upper_bound) {
                tracing::error!(computation = self.base.name(), error = %e, "syncbb on_start failed");
            }
        } else {
            // A lone variable with neither predecessor nor successor: the
            // chain of one finalizes immediately with its cheapest value.
            let mut best = self.mode.worst_value();
            let mut best_value = domain.values()[0].clone();
            for value in domain.iter() {
                let cost = self.base.variable.cost_for_val(value).unwrap_or(0);
                if self.mode.improves(cost, best) {
                    best = cost;
                    best_value = value.clone();
                }
            }
            self.base.select_value_and_finish(best_value, best);
        }
    }

    fn dispatch(&mut self, _sender: &str, msg_type: &str, content: &Json) -> Result<(), DcopError> {
        match msg_type {
            FORWARD => self.on_forward(content),
            BACKWARD => self.on_backward(content),
            TERMINATE => self.on_terminate(content),
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
    use crate::domain::{Domain, Variable};
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

    /// Three variables in a chain x1-x2-x3, each pair constrained to agree;
    /// minimizing, the unique optimum is a uniform assignment at cost 0.
    #[test]
    fn three_variable_chain_finds_the_zero_cost_assignment() {
        let x1 = bool_var("x1");
        let x2 = bool_var("x2");
        let x3 = bool_var("x3");

        let agree_12 = Arc::new(FunctionRelation::new(
            "x1-x2",
            vec![x1.clone(), x2.clone()],
            |a| {
                let v1 = a.get("x1").unwrap();
                let v2 = a.get("x2").unwrap();
                Ok(if v1 == v2 { 0 } else { 1 })
            },
        ));
        let agree_23 = Arc::new(FunctionRelation::new(
            "x2-x3",
            vec![x2.clone(), x3.clone()],
            |a| {
                let v2 = a.get("x2").unwrap();
                let v3 = a.get("x3").unwrap();
                Ok(if v2 == v3 { 0 } else { 1 })
            },
        ));

        let node1 = ComputationNode::new(x1.clone(), vec![]).with_links(vec![Link {
            kind: LinkKind::Successor,
            target: "x2".to_string(),
        }]);
        let node2 = ComputationNode::new(x2.clone(), vec![agree_12]).with_links(vec![
            Link {
                kind: LinkKind::Predecessor,
                target: "x1".to_string(),
            },
            Link {
                kind: LinkKind::Successor,
                target: "x3".to_string(),
            },
        ]);
        let node3 = ComputationNode::new(x3.clone(), vec![agree_23]).with_links(vec![Link {
            kind: LinkKind::Predecessor,
            target: "x2".to_string(),
        }]);

        let transport = Transport::new();
        let agent = Agent::new("a1", transport.clone());
        agent.host_all(vec![
            Box::new(SyncBBComputation::new(node1, Mode::Min)),
            Box::new(SyncBBComputation::new(node2, Mode::Min)),
            Box::new(SyncBBComputation::new(node3, Mode::Min)),
        ]);

        agent.run_until_idle(Duration::from_millis(10), Duration::from_secs(5));
        assert_eq!(0, agent.hosted_count());

        let (v1, c1) = agent.result_of("x1").expect("x1 finished");
        let (v2, c2) = agent.result_of("x2").expect("x2 finished");
        let (v3, c3) = agent.result_of("x3").expect("x3 finished");
        assert_eq!(v1, v2);
        assert_eq!(v2, v3);
        assert_eq!(Some(0), c1);
        assert_eq!(Some(0), c2);
        assert_eq!(Some(0), c3);
    }

    #[test]
    fn single_variable_chain_finalizes_at_its_cheapest_value() {
        let x1 = Arc::new(Variable::with_cost(
            "x1",
            Domain::new(vec![Value::Int(0), Value::Int(1), Value::Int(2)]),
            |v| match v {
                Value::Int(1) => 0,
                _ => 5,
            },
        ));
        let node = ComputationNode::new(x1, vec![]);
        let transport = Transport::new();
        let agent = Agent::new("a1", transport);
        agent.host(Box::new(SyncBBComputation::new(node, Mode::Min)));
        assert_eq!(0, agent.hosted_count());

        let (value, cost) = agent.result_of("x1").expect("x1 finished");
        assert_eq!(Value::Int(1), value);
        assert_eq!(Some(0), cost);
    }

    #[test]
    fn backward_without_a_prior_forward_is_rejected() {
        let x2 = bool_var("x2");
        let node = ComputationNode::new(x2, vec![]).with_links(vec![Link {
            kind: LinkKind::Predecessor,
            target: "x1".to_string(),
        }]);
        let mut computation = SyncBBComputation::new(node, Mode::Min);

        let content = serde_json::to_value(ChainMessage::new(
            vec![("x2".to_string(), Value::Int(0), 0)],
            0,
        ))
        .unwrap();
        let err = computation.on_backward(&content).unwrap_err();
        assert!(matches!(
            err,
            DcopError::Protocol(ProtocolViolation::BackwardWithoutForward(_))
        ));
    }
}
