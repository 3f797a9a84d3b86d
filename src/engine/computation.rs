//! The `Computation` trait every algorithm implements, the `MessageSender`
//! capability an `Agent` injects into a computation exactly once, and
//! `VariableComputationBase`, the shared state (current value, cycle
//! count, termination flags) every variable-oriented algorithm embeds —
//! grounded in how `dpop.py`/`dsa.py`/`syncbb.py` all call
//! `register`/`post_msg`/`value_selection`/`new_cycle`/`stop`/`finished` on
//! their common `VariableComputation` base class.

use std::sync::Arc;

use rand::Rng;
use serde_json::Value as Json;

use crate::domain::{Value, Variable};
use crate::engine::message::Message;
use crate::error::{ComputationError, DcopError};

/// The capability to hand a message to another computation's mailbox. An
/// `Agent` implements this once per hosted computation and injects it via
/// `Computation::set_sender`.
pub trait MessageSender: Send + Sync {
    fn post(&self, target: &str, message: Message);
}

/// A live, message-driven unit of computation hosted on exactly one agent.
pub trait Computation: Send {
    fn name(&self) -> &str;

    /// The message types this computation's `dispatch` understands. An
    /// agent rejects any message whose tag is absent from this list with
    /// `ComputationError::UnhandledMessage` rather than invoking `dispatch`.
    fn message_types(&self) -> &'static [&'static str];

    /// Injected exactly once by the hosting agent, right before
    /// `on_start`. A second call is a programming error
    /// (`ComputationError::DuplicateSenderInjection`).
    fn set_sender(&mut self, sender: Arc<dyn MessageSender>) -> Result<(), ComputationError>;

    /// Called once, after the sender has been injected.
    fn on_start(&mut self);

    /// Handle one message already known to be of a registered type. The
    /// full `DcopError` taxonomy is available here (not just
    /// `ComputationError`) since a handler may also detect a relation-shape
    /// problem or a protocol violation specific to its algorithm.
    fn dispatch(
        &mut self,
        sender: &str,
        msg_type: &str,
        content: &Json,
    ) -> Result<(), DcopError>;

    fn is_finished(&self) -> bool;

    /// The value and cost this computation settled on, once finished —
    /// `None` while still running. The hosting `Agent` reads this right
    /// before evicting a finished computation from its table, so a harness
    /// can still recover `current_value`/`current_cost` afterwards
    /// (spec.md §7's `{assignment, cost, ...}` run result).
    fn finished_state(&self) -> Option<(Value, Option<i64>)>;
}

/// Shared bookkeeping for a computation whose job is to decide the value of
/// exactly one `Variable`. DPOP, DSA and SyncBB each embed one of these and
/// delegate the mechanical parts (`post_msg`, cycle counting,
/// `value_selection`, termination) to it.
pub struct VariableComputationBase {
    name: String,
    pub variable: Arc<Variable>,
    pub current_value: Option<Value>,
    pub current_cost: Option<i64>,
    cycle_count: u64,
    finished: bool,
    stopped: bool,
    sender: Option<Arc<dyn MessageSender>>,
}

impl VariableComputationBase {
    pub fn new(variable: Arc<Variable>) -> Self {
        VariableComputationBase {
            name: variable.name().to_string(),
            variable,
            current_value: None,
            current_cost: None,
            cycle_count: 0,
            finished: false,
            stopped: false,
            sender: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_sender(&mut self, sender: Arc<dyn MessageSender>) -> Result<(), ComputationError> {
        if self.sender.is_some() {
            return Err(ComputationError::DuplicateSenderInjection(self.name.clone()));
        }
        self.sender = Some(sender);
        Ok(())
    }

    /// Hand `message` to `target`'s mailbox. Errors (rather than silently
    /// dropping) if this computation has already finished, or if no sender
    /// was ever injected — both are programming errors, not normal runtime
    /// conditions.
    pub fn post_msg(&self, target: &str, message: Message) -> Result<(), ComputationError> {
        if self.finished {
            return Err(ComputationError::PostAfterFinish(self.name.clone()));
        }
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ComputationError::PostAfterFinish(self.name.clone()))?;
        sender.post(target, message);
        Ok(())
    }

    /// Advance and return the local cycle counter (pydcop's `new_cycle`).
    pub fn new_cycle(&mut self) -> u64 {
        self.cycle_count += 1;
        self.cycle_count
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Record the decided value and its cost (pydcop's `value_selection`).
    pub fn value_selection(&mut self, value: Value, cost: Option<i64>) {
        tracing::info!(computation = %self.name, value = %value, cost = ?cost, "value selected");
        self.current_value = Some(value);
        self.current_cost = cost;
    }

    /// Pick uniformly at random among the variable's domain, with no
    /// associated cost yet known (pydcop's `random_value_selection`, used
    /// when a computation has no constraints to optimize against).
    pub fn random_value_selection(&mut self, rng: &mut impl Rng) {
        let domain = self.variable.domain();
        let idx = rng.gen_range(0..domain.len());
        let value = domain.values()[idx].clone();
        self.value_selection(value, None);
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn finished(&mut self) {
        tracing::debug!(computation = %self.name, "finished");
        self.finished = true;
    }

    /// Stop and finish in one call, after recording the final value
    /// (pydcop's `select_value_and_finish`).
    pub fn select_value_and_finish(&mut self, value: Value, cost: i64) {
        self.value_selection(value, Some(cost));
        self.stop();
        self.finished();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The decided value and cost, once `finished()` has been called —
    /// `None` beforehand.
    pub fn finished_state(&self) -> Option<(Value, Option<i64>)> {
        if !self.finished {
            return None;
        }
        self.current_value.clone().map(|v| (v, self.current_cost))
    }
}
