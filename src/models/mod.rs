//! Core data models for zsh-kernel
//!
//! Records exchanged between the engine and its caller: execution requests,
//! streamed output events, execution results and auxiliary replies.

pub mod execution;
pub mod replies;

// Re-exports for convenience
pub use execution::{
    ErrorKind, ErrorRecord, ExecutionRequest, ExecutionResult, ExecutionStatus, OutputEvent,
    StreamName,
};
pub use replies::{CompletenessStatus, CompletionReply, InspectionReply};
