//! DSA: Distributed Stochastic Algorithm, a synchronous stochastic local
//! search run over the constraint hypergraph. Grounded directly on
//! `pydcop/algorithms/dsa.py`, with the A/B/C decision rule implemented
//! exactly per spec.md §4.5 (the source's `_compute_best_value` augments a
//! candidate's cost with `cost_for_val` of the variable's *current* value
//! rather than the candidate being evaluated, which would break the
//! monotonicity testable property in spec.md §8; the per-candidate-value
//! cost used here is the one spec.md §4.5 describes).

use std::sync::Arc;

use fxhash::FxHashMap;
use rand::Rng;
use serde_json::Value as Json;

use crate::algorithm::ComputationDef;
use crate::assignment::{cost_of_assignment, enumerate_assignments, Assignment};
use crate::domain::{Mode, Value, Variable};
use crate::engine::{Computation, MessageSender, VariableComputationBase};
use crate::error::{ComputationError, DcopError};
use crate::graph::ComputationNode;
use crate::message_type;
use crate::relation::Relation;

message_type!(DsaValueMessage { value: Value });

const DSA_VALUE: &str = "dsa_value";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    A,
    B,
    C,
}

impl Variant {
    fn parse(s: &str) -> Variant {
        match s {
            "A" => Variant::A,
            "C" => Variant::C,
            _ => Variant::B,
        }
    }
}

/// The global optimum of a constraint over its own scope, precomputed once
/// (pydcop's `find_optimum`), used by `exists_violated_constraint` to detect
/// whether the current assignment still conflicts with `c`.
fn find_optimum(r: &dyn Relation, mode: Mode) -> i64 {
    let mut best = mode.worst_value();
    for a in enumerate_assignments(r.scope()) {
        if let Ok(cost) = r.apply(&a) {
            if mode.improves(cost, best) {
                best = cost;
            }
        }
    }
    best
}

/// One computation in a DSA run: exactly one hypergraph node.
pub struct DsaComputation {
    base: VariableComputationBase,
    mode: Mode,
    variant: Variant,
    probability: f64,
    stop_cycle: Option<u64>,
    constraints: Vec<Arc<dyn Relation>>,
    constraint_optimum: Vec<i64>,
    /// Every variable referenced by any local constraint (self included),
    /// for `cost_of_assignment`'s unary-cost lookups.
    related_variables: Vec<Arc<Variable>>,
    neighbors: Vec<String>,
    neighbors_values: FxHashMap<String, Value>,
    postponed_messages: Vec<(String, Value)>,
}

impl DsaComputation {
    pub fn new(
        node: ComputationNode,
        mode: Mode,
        variant: &str,
        probability: f64,
        stop_cycle: Option<u64>,
    ) -> Self {
        let neighbors = node.neighbors();
        let constraint_optimum = node
            .constraints
            .iter()
            .map(|c| find_optimum(c.as_ref(), mode))
            .collect();

        let mut related_variables = vec![node.variable.clone()];
        for c in &node.constraints {
            for v in c.scope() {
                if !related_variables.iter().any(|r| r.name() == v.name()) {
                    related_variables.push(v.clone());
                }
            }
        }

        DsaComputation {
            base: VariableComputationBase::new(node.variable.clone()),
            mode,
            variant: Variant::parse(variant),
            probability,
            stop_cycle,
            constraints: node.constraints,
            constraint_optimum,
            related_variables,
            neighbors,
            neighbors_values: FxHashMap::default(),
            postponed_messages: Vec::new(),
        }
    }

    pub fn from_def(def: &ComputationDef) -> Self {
        let variant = match def.algo.param_value("variant") {
            Some(crate::algorithm::ParamValue::Str(s)) => s.clone(),
            _ => "B".to_string(),
        };
        let probability = match def.algo.param_value("probability") {
            Some(crate::algorithm::ParamValue::Float(f)) => *f,
            Some(crate::algorithm::ParamValue::Int(i)) => *i as f64,
            _ => 0.7,
        };
        let stop_cycle = match def.algo.param_value("stop_cycle") {
            Some(crate::algorithm::ParamValue::Int(i)) => Some(*i as u64),
            _ => None,
        };
        DsaComputation::new(def.node.clone(), def.algo.mode, &variant, probability, stop_cycle)
    }

    fn assignment_with_self(&self, value: &Value) -> Assignment {
        let mut a = self.neighbors_values.clone();
        a.insert(self.base.name().to_string(), value.clone());
        a
    }

    fn cost_of(&self, assignment: &Assignment) -> Result<i64, DcopError> {
        Ok(cost_of_assignment(
            assignment,
            &self.related_variables,
            &self.constraints,
        )?)
    }

    /// The optimal value(s) of `self`'s domain given the currently known
    /// neighbor values, and their shared cost (spec.md §4.5 step 3).
    fn compute_best_value(&self) -> Result<(Vec<Value>, i64), DcopError> {
        let mut best = self.mode.worst_value();
        let mut best_values = Vec::new();
        for value in self.base.variable.domain().iter() {
            let assignment = self.assignment_with_self(value);
            let cost = self.cost_of(&assignment)?;
            if self.mode.improves(cost, best) {
                best = cost;
                best_values.clear();
                best_values.push(value.clone());
            } else if cost == best {
                best_values.push(value.clone());
            }
        }
        Ok((best_values, best))
    }

    /// Whether the current assignment violates any local constraint, i.e.
    /// some constraint's value under the current assignment differs from
    /// its precomputed global optimum (spec.md §4.5's
    /// `exists_violated_constraint`).
    fn exists_violated_constraint(&self) -> Result<bool, DcopError> {
        let Some(current) = self.base.current_value.clone() else {
            return Ok(false);
        };
        let assignment = self.assignment_with_self(&current);
        for (c, optimum) in self.constraints.iter().zip(&self.constraint_optimum) {
            if c.apply(&assignment)? != *optimum {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Start a new cycle: bump the counter, terminate if `stop_cycle` is
    /// reached, else clear `neighbors_values`, drain `postponed_messages`
    /// into it, and resend the current value to every neighbor
    /// (spec.md §4.5 step 5).
    fn start_new_cycle(&mut self) -> Result<(), DcopError> {
        self.base.new_cycle();
        if let Some(stop) = self.stop_cycle {
            if self.base.cycle_count() >= stop {
                self.base.stop();
                self.base.finished();
                return Ok(());
            }
        }

        self.neighbors_values.clear();
        for (sender, value) in self.postponed_messages.drain(..) {
            self.neighbors_values.insert(sender, value);
        }

        let current = self
            .base
            .current_value
            .clone()
            .expect("a cycle only starts once a value has been selected");
        for neighbor in self.neighbors.clone() {
            self.base.post_msg(
                &neighbor,
                crate::engine::Message::new(
                    DSA_VALUE,
                    serde_json::to_value(DsaValueMessage::new(current.clone())).unwrap(),
                    1,
                ),
            )?;
        }
        Ok(())
    }

    /// Re-evaluate once every neighbor's value for the current cycle is
    /// known; apply the A/B/C decision rule, then roll into the next cycle
    /// (spec.md §4.5 steps 3-5).
    fn on_neighbors_values(&mut self) -> Result<(), DcopError> {
        if self.neighbors_values.len() < self.neighbors.len() || self.base.current_value.is_none()
        {
            return Ok(());
        }

        let current = self.base.current_value.clone().unwrap();
        let current_cost = self.cost_of(&self.assignment_with_self(&current))?;
        let (bests, best_cost) = self.compute_best_value()?;
        let delta = match self.mode {
            Mode::Min => current_cost - best_cost,
            Mode::Max => best_cost - current_cost,
        };

        let mut rng = rand::thread_rng();
        let roll: f64 = rng.gen();

        if delta > 0 {
            if self.probability > roll {
                let pick = bests[rng.gen_range(0..bests.len())].clone();
                self.base.value_selection(pick, Some(best_cost));
            }
        } else if delta == 0
            && matches!(self.variant, Variant::B | Variant::C)
            && self.exists_violated_constraint()?
        {
            let others: Vec<Value> = bests.iter().filter(|v| **v != current).cloned().collect();
            if !others.is_empty() && self.probability > roll {
                let pick = others[rng.gen_range(0..others.len())].clone();
                self.base.value_selection(pick, Some(best_cost));
            }
        } else if delta == 0 && self.variant == Variant::C {
            let others: Vec<Value> = bests.iter().filter(|v| **v != current).cloned().collect();
            if !others.is_empty() && self.probability > roll {
                let pick = others[rng.gen_range(0..others.len())].clone();
                self.base.value_selection(pick, Some(best_cost));
            }
        }

        self.start_new_cycle()
    }

    fn on_dsa_value(&mut self, sender: &str, content: &Json) -> Result<(), DcopError> {
        let payload: DsaValueMessage = serde_json::from_value(content.clone()).map_err(|_| {
            ComputationError::UnhandledMessage {
                computation: self.base.name().to_string(),
                message_type: DSA_VALUE.to_string(),
            }
        })?;

        if !self.neighbors_values.contains_key(sender) {
            self.neighbors_values.insert(sender.to_string(), payload.value);
        } else {
            self.postponed_messages.push((sender.to_string(), payload.value));
        }
        self.on_neighbors_values()
    }
}

impl Computation for DsaComputation {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn message_types(&self) -> &'static [&'static str] {
        &[DSA_VALUE]
    }

    fn set_sender(&mut self, sender: Arc<dyn MessageSender>) -> Result<(), ComputationError> {
        self.base.set_sender(sender)
    }

    fn on_start(&mut self) {
        if self.neighbors.is_empty() {
            // Isolated variable (spec.md §9 open question 3): pick the
            // cheapest value under the unary cost function if one exists,
            // else a uniform random value, and finalize without ever
            // entering a cycle.
            let var = self.base.variable.clone();
            if var.has_cost_fn() {
                let mut best = self.mode.worst_value();
                let mut best_value = var.domain().values()[0].clone();
                for value in var.domain().iter() {
                    let cost = var.cost_for_val(value).unwrap_or(0);
                    if self.mode.improves(cost, best) {
                        best = cost;
                        best_value = value.clone();
                    }
                }
                self.base.select_value_and_finish(best_value, best);
            } else {
                let mut rng = rand::thread_rng();
                self.base.random_value_selection(&mut rng);
                let value = self.base.current_value.clone().unwrap();
                self.base.select_value_and_finish(value, 0);
            }
            return;
        }

        let mut rng = rand::thread_rng();
        self.base.random_value_selection(&mut rng);
        if let Err(e) = self.start_new_cycle() {
            tracing::error!(computation = self.base.name(), error = %e, "dsa on_start failed");
            return;
        }
        if let Err(e) = self.on_neighbors_values() {
            tracing::error!(computation = self.base.name(), error = %e, "dsa on_start failed");
        }
    }

    fn dispatch(&mut self, sender: &str, msg_type: &str, content: &Json) -> Result<(), DcopError> {
        match msg_type {
            DSA_VALUE => self.on_dsa_value(sender, content),
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
