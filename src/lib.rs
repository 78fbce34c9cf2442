//! zsh-kernel - drive an interactive Z shell as a request/response service
//!
//! A single long-lived `zsh` runs on a pseudoterminal. Its prompts are
//! replaced by unusual sentinel strings so the engine can tell, from the
//! output alone, when a submitted line has finished, when the shell is
//! waiting for a continuation and when output should be flushed.
//!
//! ## Module Organization
//!
//! - [`prompt`] - Sentinel prompts and the commands that install them
//! - [`word`] - Token lookup at a cursor position
//! - [`pty`] - PTY spawning, I/O streams, signals, raw output mirror
//! - [`session`] - One shell behind a PTY: send lines, wait for sentinels
//! - [`engine`] - Multi-line execution, interrupts, auxiliary operations
//! - [`helpers`] - Completeness, inspection and completion helpers
//! - [`config`] - Configuration values and the file loader
//! - [`models`] - Requests, output events, results and replies
//! - [`mod@error`] - Error types and Result aliases
//!
//! ## Quick Start
//!
//! ```no_run
//! use zsh_kernel::{init, ExecutionEngine, ExecutionRequest, OutputEvent};
//!
//! # async fn run() -> zsh_kernel::Result<()> {
//! let config = init()?;
//! let mut engine = ExecutionEngine::start(config).await?;
//!
//! let mut events: Vec<OutputEvent> = Vec::new();
//! let result = engine
//!     .execute(&ExecutionRequest::new("echo 1"), &mut events)
//!     .await;
//! assert!(result.is_ok());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **PTY Reader Thread:** blocking reads forwarded over a tokio channel
//! - **PTY Writer Thread:** drains a channel of input lines
//! - **Engine:** async; waits race against interrupt requests
//!
//! Helper processes for completeness checks and manual pages are disposable
//! `tokio::process` children guarded by a watchdog.

#[macro_use]
extern crate tracing;

pub mod config;
pub mod engine;
pub mod error;
pub mod helpers;
pub mod info;
pub mod interrupt;
pub mod models;
pub mod prompt;
pub mod pty;
pub mod session;
pub mod word;

pub use config::loader::ConfigLoader;
pub use config::Config;
pub use engine::{ExecutionEngine, OutputSink};
pub use error::{Error, Result};
pub use info::KernelInfo;
pub use interrupt::InterruptHandle;
pub use models::{
    CompletenessStatus, CompletionReply, ErrorKind, ExecutionRequest, ExecutionResult,
    InspectionReply, OutputEvent,
};
pub use prompt::{PromptRegistry, PromptSet, Sentinel, SentinelKind};
pub use session::{Match, MatchKind, ShellSession};

/// The current version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The package name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Load configuration from the default locations
///
/// A broken configuration file is reported and replaced by defaults.
pub fn init() -> Result<Config> {
    info!("Initializing {} v{}", NAME, VERSION);
    validate_system_requirements();

    match ConfigLoader::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            warn!("Failed to load configuration: {}. Using defaults", e);
            let config = Config::default();
            ConfigLoader::new().validate_config(&config)?;
            Ok(config)
        }
    }
}

/// Load configuration from an explicit file
pub fn init_with_config(config_path: &std::path::Path) -> Result<Config> {
    info!(
        "Initializing {} v{} with config: {}",
        NAME,
        VERSION,
        config_path.display()
    );
    validate_system_requirements();

    if !config_path.exists() {
        return Err(Error::ConfigLoadFailed {
            path: config_path.to_path_buf(),
            reason: "Configuration file does not exist".to_string(),
        });
    }

    ConfigLoader::load_from_file(config_path).inspect_err(|e| {
        error!(
            "Failed to load configuration from {}: {}",
            config_path.display(),
            e
        );
    })
}

/// Warn about missing pieces of the environment
pub fn validate_system_requirements() {
    if std::env::var("HOME").is_err() {
        warn!("HOME environment variable not set");
    }
    if !pty::is_command_available("man") {
        debug!("man not found; inspection will report nothing");
    }
}

/// Human-readable explanation of a startup failure
pub fn handle_startup_error(error: &Error) -> String {
    match error {
        Error::ConfigLoadFailed { path, reason } => format!(
            "Configuration Error: Failed to load config from '{}': {}",
            path.display(),
            reason
        ),
        Error::ConfigParseFailed { format, reason } => {
            format!("Configuration Error: Failed to parse {} config: {}", format, reason)
        }
        Error::ConfigValidationFailed { field, reason } => format!(
            "Configuration Error: Validation failed for '{}': {}",
            field, reason
        ),
        Error::SpawnFailed { command, reason } => format!(
            "Shell Error: cannot start '{}': {}\n\nTry:\n• Install zsh\n• Set shell.program in the configuration",
            command, reason
        ),
        Error::StartupFailed { step, reason } => format!(
            "Shell Error: initialization step '{}' failed: {}\n\nTry:\n• Check your .zshrc for interactive prompts\n• Raise execution.startup_timeout_ms",
            step, reason
        ),
        _ => format!("Unexpected Error: {}", error),
    }
}
