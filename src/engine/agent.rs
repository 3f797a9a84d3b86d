//! `Agent`: a single OS thread hosting a small table of computations and a
//! `crossbeam_channel` mailbox, plus `Transport`, the in-process logical
//! router between agents' mailboxes. Grounded on spec.md §5's "per-agent
//! task reading from a bounded queue" design note and on `inputlayer`'s use
//! of `crossbeam-channel` for inter-worker communication; the small
//! `parking_lot::Mutex`-guarded table of hosted computations mirrors the
//! `Critical`/`Shared` split in `ddo::implementation::solver::parallel`.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};

use crate::domain::Value;
use crate::engine::computation::{Computation, MessageSender};
use crate::engine::message::Message;

/// A message in flight between two named computations, however they are
/// hosted.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub target: String,
    pub sender: String,
    pub message: Message,
}

/// The in-process logical transport: a registry mapping a computation's
/// name to the mailbox `Sender` of the agent currently hosting it. Real
/// network transport is out of scope (spec.md §1 Non-goals); this is the
/// substrate every `Agent` shares to route `post_msg` calls.
pub struct Transport {
    routes: RwLock<FxHashMap<String, Sender<Envelope>>>,
}

impl Transport {
    pub fn new() -> Arc<Self> {
        Arc::new(Transport {
            routes: RwLock::new(FxHashMap::default()),
        })
    }

    fn register(&self, computation_name: &str, mailbox: Sender<Envelope>) {
        self.routes
            .write()
            .insert(computation_name.to_string(), mailbox);
    }

    fn unregister(&self, computation_name: &str) {
        self.routes.write().remove(computation_name);
    }

    /// Deliver `envelope` to its target's mailbox, if that target is
    /// currently registered. Messages to an unregistered (stopped, or
    /// never-hosted) target are dropped silently, matching "posts after
    /// termination are dropped" in spec.md §5.
    fn send(&self, envelope: Envelope) {
        if let Some(tx) = self.routes.read().get(&envelope.target) {
            let _ = tx.send(envelope);
        }
    }
}

struct ComputationSender {
    transport: Arc<Transport>,
    from: String,
}

impl MessageSender for ComputationSender {
    fn post(&self, target: &str, message: Message) {
        self.transport.send(Envelope {
            target: target.to_string(),
            sender: self.from.clone(),
            message,
        });
    }
}

struct PeriodicEntry {
    computation_name: String,
    period: Duration,
    next_fire: Instant,
    action: Box<dyn Fn(&mut dyn Computation) + Send>,
}

struct Hosted {
    computation: Box<dyn Computation>,
}

/// One agent: a single worker thread, a mailbox, and the computations it
/// currently hosts. Spec.md §5: "each agent owns exactly one worker"; the
/// worker here is the thread spawned by `Agent::start`.
pub struct Agent {
    name: String,
    transport: Arc<Transport>,
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
    computations: Mutex<FxHashMap<String, Hosted>>,
    periodic: Mutex<Vec<PeriodicEntry>>,
    /// Final `(value, cost)` of every computation this agent has hosted to
    /// completion, captured at the moment it's evicted from `computations`
    /// so a harness can still recover it after `hosted_count()` drops to 0
    /// (spec.md §7's run result).
    results: Mutex<FxHashMap<String, (Value, Option<i64>)>>,
}

impl Agent {
    pub fn new(name: impl Into<String>, transport: Arc<Transport>) -> Arc<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        Arc::new(Agent {
            name: name.into(),
            transport,
            tx,
            rx,
            computations: Mutex::new(FxHashMap::default()),
            periodic: Mutex::new(Vec::new()),
            results: Mutex::new(FxHashMap::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host `computation` on this agent: register its name in the shared
    /// transport, inject its `MessageSender`, then call `on_start`.
    ///
    /// A lone `host` call is only safe when `computation` has no peer on
    /// this same agent that it addresses during `on_start` (the single-node
    /// tests below, or a computation added to an already-running agent).
    /// Wiring up a multi-node computation graph on one agent should use
    /// `host_all`, which registers every node before starting any of them —
    /// otherwise an early node's `on_start` can address a sibling not yet
    /// registered in the transport, and that first message is silently
    /// dropped per `Transport::send`'s documented semantics.
    pub fn host(self: &Arc<Self>, computation: Box<dyn Computation>) {
        self.host_all(vec![computation]);
    }

    /// Host every computation in `computations` as one atomic batch:
    /// register all of their names in the transport first, then call
    /// `on_start` on each in order. Mirrors a pydcop agent's startup, which
    /// adds every hosted computation before any of them starts running, so
    /// a node's first message to a same-agent sibling is never lost to
    /// registration ordering.
    pub fn host_all(self: &Arc<Self>, computations: Vec<Box<dyn Computation>>) {
        let mut named: Vec<(String, Box<dyn Computation>)> = Vec::with_capacity(computations.len());
        for computation in computations {
            let comp_name = computation.name().to_string();
            self.transport.register(&comp_name, self.tx.clone());
            named.push((comp_name, computation));
        }

        for (comp_name, mut computation) in named {
            let sender = Arc::new(ComputationSender {
                transport: self.transport.clone(),
                from: comp_name.clone(),
            });
            if let Err(e) = computation.set_sender(sender) {
                tracing::error!(computation = %comp_name, error = %e, "failed to inject sender");
                self.transport.unregister(&comp_name);
                continue;
            }

            computation.on_start();
            let finished = computation.is_finished();
            self.computations
                .lock()
                .insert(comp_name.clone(), Hosted { computation });
            if finished {
                self.stop(&comp_name);
            }
        }
    }

    /// Register a periodic action against a hosted computation. Re-armed on
    /// every mailbox poll by comparing wall-clock time against `next_fire`
    /// (spec.md §4.2/§9: handlers and periodic actions run serialized on
    /// the single worker thread, so no extra synchronization is needed
    /// between them).
    pub fn add_periodic_action(
        &self,
        computation_name: impl Into<String>,
        period: Duration,
        action: impl Fn(&mut dyn Computation) + Send + 'static,
    ) {
        self.periodic.lock().push(PeriodicEntry {
            computation_name: computation_name.into(),
            period,
            next_fire: Instant::now() + period,
            action: Box::new(action),
        });
    }

    /// Stop hosting `computation_name`: capture its final value/cost (if
    /// any) into `results`, unregister it from the transport (so further
    /// posts to it are dropped), and drop it from the local table.
    pub fn stop(&self, computation_name: &str) {
        self.transport.unregister(computation_name);
        if let Some(hosted) = self.computations.lock().remove(computation_name) {
            if let Some(state) = hosted.computation.finished_state() {
                self.results
                    .lock()
                    .insert(computation_name.to_string(), state);
            }
        }
    }

    pub fn is_hosting(&self, computation_name: &str) -> bool {
        self.computations.lock().contains_key(computation_name)
    }

    pub fn hosted_count(&self) -> usize {
        self.computations.lock().len()
    }

    /// The final `(value, cost)` of a computation this agent has hosted to
    /// completion, if any. Available even after the computation has been
    /// evicted from the hosted table.
    pub fn result_of(&self, computation_name: &str) -> Option<(Value, Option<i64>)> {
        self.results.lock().get(computation_name).cloned()
    }

    /// Every finished computation's final `(value, cost)`, keyed by name.
    pub fn results(&self) -> FxHashMap<String, (Value, Option<i64>)> {
        self.results.lock().clone()
    }

    fn fire_due_periodics(&self) {
        let now = Instant::now();
        let mut periodics = self.periodic.lock();
        for entry in periodics.iter_mut() {
            if now >= entry.next_fire {
                entry.next_fire = now + entry.period;
                if let Some(hosted) = self.computations.lock().get_mut(&entry.computation_name) {
                    (entry.action)(&mut *hosted.computation);
                }
            }
        }
    }

    fn dispatch(&self, envelope: Envelope) {
        let finished_after = {
            let mut computations = self.computations.lock();
            let Some(hosted) = computations.get_mut(&envelope.target) else {
                return;
            };
            let msg_type = envelope.message.type_tag.as_str();
            if !hosted.computation.message_types().contains(&msg_type) {
                tracing::error!(
                    computation = %envelope.target,
                    message_type = msg_type,
                    "no handler registered for message type"
                );
                true
            } else {
                if let Err(e) = hosted.computation.dispatch(
                    &envelope.sender,
                    msg_type,
                    &envelope.message.content,
                ) {
                    tracing::error!(computation = %envelope.target, error = %e, "handler error");
                }
                hosted.computation.is_finished()
            }
        };
        if finished_after {
            self.stop(&envelope.target);
        }
    }

    /// Block for up to `timeout` waiting for one message; process it (or
    /// any due periodic actions) and return whether a message was handled.
    pub fn run_once(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(envelope) => {
                self.dispatch(envelope);
                self.fire_due_periodics();
                true
            }
            Err(_) => {
                self.fire_due_periodics();
                false
            }
        }
    }

    /// Run the worker loop until every hosted computation has finished, or
    /// `deadline` elapses.
    pub fn run_until_idle(&self, tick: Duration, deadline: Duration) {
        let start = Instant::now();
        while self.hosted_count() > 0 && start.elapsed() < deadline {
            self.run_once(tick);
        }
    }

    /// Spawn the worker thread and run it until every hosted computation
    /// finishes or `deadline` elapses.
    pub fn start(self: Arc<Self>, tick: Duration, deadline: Duration) -> JoinHandle<()> {
        std::thread::spawn(move || self.run_until_idle(tick, deadline))
    }
}
