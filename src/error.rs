//! The error taxonomy for the DCOP execution substrate.
//!
//! Four classes mirror the boundaries described for the runtime: problems
//! discovered while building an `AlgorithmDef`/`ComputationDef` surface as
//! [`ConfigurationError`], problems discovered while a computation is
//! running surface as [`ComputationError`], problems in the relation
//! algebra surface as [`RelationError`], and algorithm-specific protocol
//! misuse surfaces as [`ProtocolViolation`]. [`DcopError`] unifies them for
//! callers that just want a single `Result` type and a classifier string.

use thiserror::Error;

/// Unknown algorithm, unknown parameter, or an out-of-range parameter value.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("unknown algorithm `{0}`")]
    UnknownAlgorithm(String),

    #[error("unknown parameter `{param}` for algorithm `{algo}`")]
    UnknownParameter { algo: String, param: String },

    #[error("invalid value `{value}` for parameter `{param}`: {reason}")]
    InvalidParameter {
        param: String,
        value: String,
        reason: String,
    },
}

/// Runtime misuse of the message-passing computation engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ComputationError {
    #[error("computation `{computation}` has no handler registered for message type `{message_type}`")]
    UnhandledMessage {
        computation: String,
        message_type: String,
    },

    #[error("message sender was already injected for computation `{0}`")]
    DuplicateSenderInjection(String),

    #[error("post_msg called on computation `{0}` after it finished")]
    PostAfterFinish(String),

    #[error("computation `{computation}` received a message from unexpected sender `{sender}`")]
    UnexpectedSender { computation: String, sender: String },
}

/// Mismatched assignment/scope lengths, or an argopt query on a relation
/// that depends on more than one variable.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RelationError {
    #[error("assignment of length {got} does not match scope of length {expected}")]
    ScopeMismatch { expected: usize, got: usize },

    #[error("find_arg_optimal requires a relation depending on exactly one variable, got {0}")]
    MultiVariableArgOpt(usize),

    #[error("assignment is missing a value for variable `{0}`")]
    MissingVariable(String),
}

/// An algorithm observed a message sequence its state machine does not allow.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolViolation {
    #[error("DPOP computation `{0}` received VALUE while not expecting one")]
    UnexpectedDpopValue(String),

    #[error("SyncBB computation `{0}` received backward without a prior forward")]
    BackwardWithoutForward(String),
}

/// The unified error type returned at the boundary of the core substrate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DcopError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Computation(#[from] ComputationError),
    #[error(transparent)]
    Relation(#[from] RelationError),
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
}

impl DcopError {
    /// The taxonomy class name, for the `{status: ERROR, classifier}`
    /// user-visible shape.
    pub fn classifier(&self) -> &'static str {
        match self {
            DcopError::Configuration(_) => "ConfigurationError",
            DcopError::Computation(_) => "ComputationError",
            DcopError::Relation(_) => "RelationError",
            DcopError::Protocol(_) => "ProtocolViolation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_names_the_taxonomy_class() {
        let e: DcopError = ConfigurationError::UnknownAlgorithm("foo".into()).into();
        assert_eq!("ConfigurationError", e.classifier());

        let e: DcopError = ComputationError::PostAfterFinish("x1".into()).into();
        assert_eq!("ComputationError", e.classifier());

        let e: DcopError = RelationError::MultiVariableArgOpt(2).into();
        assert_eq!("RelationError", e.classifier());

        let e: DcopError = ProtocolViolation::BackwardWithoutForward("x1".into()).into();
        assert_eq!("ProtocolViolation", e.classifier());
    }
}
