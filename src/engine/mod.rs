//! The message-passing computation engine: agents, mailboxes, and the
//! `Computation` trait algorithms implement against.

mod agent;
mod computation;
mod message;

pub use agent::{Agent, Envelope, Transport};
pub use computation::{Computation, MessageSender, VariableComputationBase};
pub use message::Message;
