//! Three-stage lab result workflow: result entry → AI suggestion → completion.
//!
//! The server owns the record; the client only ever reads it back and
//! derives where the workflow stands. `Orchestrator` is the single owner of
//! the stage pointer, the stages themselves report success and never move it.

pub mod ai_suggestion;
pub mod completion;
pub mod context;
pub mod in_flight;
pub mod orchestrator;
pub mod result_entry;
pub mod stage;

pub use ai_suggestion::*;
pub use completion::*;
pub use context::*;
pub use in_flight::*;
pub use orchestrator::*;
pub use result_entry::*;
pub use stage::*;

use thiserror::Error;

use crate::gateway::GatewayError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Result form has invalid fields: {0}")]
    Validation(FieldErrors),

    #[error("Result fields must be recorded before requesting an AI suggestion")]
    IncompleteResult,

    #[error("{0} is already in progress")]
    Busy(&'static str),

    #[error("Operation belongs to stage {expected} but the workflow is at stage {current}")]
    WrongStage { expected: Stage, current: Stage },

    #[error("No AI suggestion has been generated yet")]
    SuggestionMissing,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
