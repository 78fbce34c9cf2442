//! Error types and Result aliases for zsh-kernel

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::ErrorKind;
use crate::prompt::SentinelKind;

/// Result type alias for zsh-kernel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for zsh-kernel
#[derive(Debug)]
pub enum Error {
    // === Session errors ===
    /// Failed to open the pseudoterminal
    PtyCreationFailed {
        command: String,
        reason: String,
    },

    /// Shell executable could not be found or started
    SpawnFailed {
        command: String,
        reason: String,
    },

    /// Shell did not reach the ready prompt while being initialized
    StartupFailed {
        step: String,
        reason: String,
    },

    /// Failed to clone PTY reader
    PtyReaderCloneFailed {
        reason: String,
    },

    /// Failed to take PTY writer
    PtyWriterTakeFailed {
        reason: String,
    },

    /// Failed to hand input to the PTY writer
    PtyInputSendFailed {
        reason: String,
    },

    /// Session has been closed or its child exited
    SessionDead,

    /// Failed to send signal to process
    SignalSendFailed {
        signal: String,
        reason: String,
    },

    // === Execution errors ===
    /// No sentinel seen within the allotted wait
    Timeout {
        waited: Duration,
    },

    /// Child closed the pseudoterminal
    EndOfFile,

    /// Execution was interrupted on request
    Interrupted,

    /// Shell was left at a continuation or selection prompt
    IncompleteInput {
        prompt: SentinelKind,
    },

    // === Helper process errors ===
    /// A disposable helper process failed
    HelperFailed {
        command: String,
        reason: String,
    },

    // === Configuration errors ===
    /// Failed to load configuration file
    ConfigLoadFailed {
        path: PathBuf,
        reason: String,
    },

    /// Configuration file not found
    ConfigNotFound,

    /// Configuration validation failed
    ConfigValidationFailed {
        field: String,
        reason: String,
    },

    /// Failed to serialize configuration
    ConfigSerializationFailed {
        format: String,
        reason: String,
    },

    /// Failed to parse configuration
    ConfigParseFailed {
        format: String,
        reason: String,
    },

    // === I/O and serialization errors ===
    /// I/O errors
    Io(std::io::Error),

    /// Serialization errors
    Serde(serde_json::Error),

    /// TOML parsing errors
    Toml(toml::de::Error),

    /// Regex compilation errors
    Regex(regex::Error),

    /// Generic errors
    Other(String),
}

impl Error {
    /// Classify this error for an execution or auxiliary reply
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PtyCreationFailed { .. }
            | Error::SpawnFailed { .. }
            | Error::StartupFailed { .. }
            | Error::PtyReaderCloneFailed { .. }
            | Error::PtyWriterTakeFailed { .. } => ErrorKind::SpawnError,
            Error::SessionDead | Error::PtyInputSendFailed { .. } => ErrorKind::WriteError,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::EndOfFile => ErrorKind::EndOfFile,
            Error::Interrupted => ErrorKind::Interrupted,
            Error::IncompleteInput { .. } => ErrorKind::IncompleteInput,
            _ => ErrorKind::Other,
        }
    }

    /// Whether the session can no longer be used after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::SessionDead | Error::EndOfFile | Error::SpawnFailed { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Session errors
            Error::PtyCreationFailed { command, reason } => {
                write!(f, "Failed to create PTY for command '{}': {}", command, reason)
            }
            Error::SpawnFailed { command, reason } => {
                write!(f, "Failed to spawn shell '{}': {}", command, reason)
            }
            Error::StartupFailed { step, reason } => {
                write!(f, "Shell initialization failed at '{}': {}", step, reason)
            }
            Error::PtyReaderCloneFailed { reason } => {
                write!(f, "Failed to clone PTY reader: {}", reason)
            }
            Error::PtyWriterTakeFailed { reason } => {
                write!(f, "Failed to take PTY writer: {}", reason)
            }
            Error::PtyInputSendFailed { reason } => {
                write!(f, "Failed to send input to PTY: {}", reason)
            }
            Error::SessionDead => write!(f, "Shell session is dead"),
            Error::SignalSendFailed { signal, reason } => {
                write!(f, "Failed to send signal '{}': {}", signal, reason)
            }

            // Execution errors
            Error::Timeout { waited } => {
                write!(f, "No prompt seen after {:?}", waited)
            }
            Error::EndOfFile => write!(f, "Shell closed the terminal"),
            Error::Interrupted => write!(f, "Interrupted"),
            Error::IncompleteInput { prompt } => {
                write!(
                    f,
                    "Code left the shell at the {} prompt; continuation and selection prompts are not supported",
                    prompt
                )
            }

            // Helper errors
            Error::HelperFailed { command, reason } => {
                write!(f, "Helper '{}' failed: {}", command, reason)
            }

            // Configuration errors
            Error::ConfigLoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path.display(), reason)
            }
            Error::ConfigNotFound => write!(f, "Configuration file not found"),
            Error::ConfigValidationFailed { field, reason } => {
                write!(f, "Configuration validation failed for '{}': {}", field, reason)
            }
            Error::ConfigSerializationFailed { format, reason } => {
                write!(f, "Failed to serialize config as {}: {}", format, reason)
            }
            Error::ConfigParseFailed { format, reason } => {
                write!(f, "Failed to parse {} config: {}", format, reason)
            }

            // I/O and serialization errors
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Serde(err) => write!(f, "Serialization error: {}", err),
            Error::Toml(err) => write!(f, "TOML parsing error: {}", err),
            Error::Regex(err) => write!(f, "Regex compilation error: {}", err),

            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Serde(err) => Some(err),
            Error::Toml(err) => Some(err),
            Error::Regex(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Toml(err)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Regex(err)
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error::Other(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Error::Other(err.to_string())
    }
}
