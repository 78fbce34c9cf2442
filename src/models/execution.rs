//! Execution Models
//!
//! The request submitted to the engine, the output events it streams while
//! the shell runs, and the final result of one execution.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A block of code to run in the shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Source code; each line is sent to the shell separately
    pub code: String,

    /// Suppress forwarding of output events
    #[serde(default)]
    pub silent: bool,

    /// Opaque to the engine, kept for the caller's bookkeeping
    #[serde(default = "default_store_history")]
    pub store_history: bool,
}

fn default_store_history() -> bool {
    true
}

impl ExecutionRequest {
    /// Create a non-silent request that is stored in history
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            silent: false,
            store_history: true,
        }
    }

    /// Create a silent request
    pub fn silent(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            silent: true,
            store_history: false,
        }
    }

    /// Lines in submission order
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.code.lines()
    }
}

/// Output stream classification
///
/// The pseudoterminal merges the child's stdout and stderr, so everything is
/// reported as stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    #[default]
    Stdout,
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamName::Stdout => write!(f, "stdout"),
        }
    }
}

/// A chunk of shell output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub name: StreamName,
    pub text: String,
}

impl OutputEvent {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            name: StreamName::Stdout,
            text: text.into(),
        }
    }
}

/// Final status of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Ok,
    Error,
}

/// Classification of a failed execution or auxiliary call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The session could not be started
    SpawnError,
    /// Write attempted on a dead session
    WriteError,
    /// No sentinel observed within the allotted wait
    Timeout,
    /// Child process terminated unexpectedly
    EndOfFile,
    /// Cancellation requested by the caller completed
    Interrupted,
    /// Continuation or selection prompt reached
    IncompleteInput,
    /// Completion helper failed
    CompletionError,
    /// Inspection helper failed
    InspectionError,
    /// Anything else
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::SpawnError => "SpawnError",
            ErrorKind::WriteError => "WriteError",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::EndOfFile => "EndOfFile",
            ErrorKind::Interrupted => "Interrupted",
            ErrorKind::IncompleteInput => "IncompleteInput",
            ErrorKind::CompletionError => "CompletionError",
            ErrorKind::InspectionError => "InspectionError",
            ErrorKind::Other => "Other",
        };
        f.write_str(name)
    }
}

/// Details of a failed execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    /// Always empty: the shell produces no structured tracebacks
    #[serde(default)]
    pub traceback: Vec<String>,
}

/// Outcome of one `execute` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

impl ExecutionResult {
    pub fn ok() -> Self {
        Self {
            status: ExecutionStatus::Ok,
            error: None,
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Error,
            error: Some(ErrorRecord {
                kind,
                message: message.into(),
                traceback: Vec::new(),
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ExecutionStatus::Ok
    }

    /// Error kind, if the execution failed
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|record| record.kind)
    }
}

impl From<&crate::error::Error> for ExecutionResult {
    fn from(err: &crate::error::Error) -> Self {
        ExecutionResult::error(err.kind(), err.to_string())
    }
}
