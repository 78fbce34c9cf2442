//! Configuration management for zsh-kernel
//!
//! One immutable [`Config`] value is built at startup (from defaults or a
//! TOML/JSON file) and passed into the engine. Nothing here is global.

pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for zsh-kernel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell process and preparation commands
    pub shell: ShellConfig,

    /// Sentinel prompts
    pub prompts: PromptConfig,

    /// Execution waits
    pub execution: ExecutionConfig,

    /// Disposable helper processes
    pub helpers: HelperConfig,

    /// Logging
    pub log: LogConfig,
}

/// Shell executable and the commands sent when a session starts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Shell executable, looked up in PATH when not absolute
    pub program: String,

    /// Startup flags
    pub args: Vec<String>,

    /// Extra environment variables
    pub environment: HashMap<String, String>,

    /// Working directory for the shell
    pub working_directory: Option<PathBuf>,

    /// Commands that strip hooks and banners; sent together with the prompts
    pub prepare_commands: Vec<String>,

    /// Commands that disable line editing features
    pub line_editing_commands: Vec<String>,

    /// Commands run once the prompts are installed
    pub startup_commands: Vec<String>,

    /// Terminal size (cols, rows)
    pub dimensions: (u16, u16),
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: "zsh".to_string(),
            args: [
                "INTERACTIVE",
                "NO_ZLE",
                "NO_BEEP",
                "TRANSIENT_RPROMPT",
                "NO_PROMPT_CR",
                "INTERACTIVE_COMMENTS",
            ]
            .iter()
            .flat_map(|option| ["-o".to_string(), option.to_string()])
            .collect(),
            environment: HashMap::new(),
            working_directory: None,
            prepare_commands: vec![
                "TERM=dumb".to_string(),
                "autoload -Uz add-zsh-hook".to_string(),
                r"add-zsh-hook -D precmd \*".to_string(),
                r"add-zsh-hook -D preexec \*".to_string(),
                "precmd() {}".to_string(),
                "preexec() {}".to_string(),
            ],
            line_editing_commands: vec![
                "unset zle_bracketed_paste".to_string(),
                "zle_highlight=(none)".to_string(),
            ],
            startup_commands: vec!["tty".to_string()],
            dimensions: (80, 24),
        }
    }
}

/// A prompt literal and an optional regular expression to match it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptDefinition {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl PromptDefinition {
    pub fn literal(text: &str) -> Self {
        Self {
            text: text.to_string(),
            pattern: None,
        }
    }
}

/// Sentinel prompt configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub ps1: PromptDefinition,
    pub ps2: PromptDefinition,
    pub ps3: PromptDefinition,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            ps1: PromptDefinition::literal("ZSH_KERNEL_PS1 > "),
            ps2: PromptDefinition::literal("ZSH_KERNEL_PS2 + "),
            ps3: PromptDefinition::literal("ZSH_KERNEL_PS3 : "),
        }
    }
}

impl PromptConfig {
    pub fn definitions(&self) -> [(&'static str, &PromptDefinition); 3] {
        [("ps1", &self.ps1), ("ps2", &self.ps2), ("ps3", &self.ps3)]
    }
}

/// Waits applied while executing user code
///
/// Unset values wait indefinitely: a user command may legitimately run for
/// any amount of time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Wait for a sentinel after each line
    pub timeout_ms: Option<u64>,

    /// Wait for PS1 after an interrupt
    pub interrupt_timeout_ms: Option<u64>,

    /// Wait for PS1 during session initialization
    pub startup_timeout_ms: u64,

    /// After an interrupt, how long to watch for a second prompt from a
    /// shell that had already finished
    pub interrupt_settle_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            interrupt_timeout_ms: None,
            startup_timeout_ms: 10_000,
            interrupt_settle_ms: 100,
        }
    }
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn interrupt_timeout(&self) -> Option<Duration> {
        self.interrupt_timeout_ms.map(Duration::from_millis)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn interrupt_settle(&self) -> Duration {
        Duration::from_millis(self.interrupt_settle_ms)
    }
}

/// An argv template; `{}` in any argument is replaced by the subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub program: String,
    pub args: Vec<String>,
}

/// Placeholder replaced inside [`CommandTemplate`] arguments
pub const PLACEHOLDER: &str = "{}";

impl CommandTemplate {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    /// Arguments with the placeholder substituted
    pub fn render(&self, subject: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(PLACEHOLDER, subject))
            .collect()
    }

    pub fn has_placeholder(&self) -> bool {
        self.args.iter().any(|arg| arg.contains(PLACEHOLDER))
    }
}

/// Helper processes for the auxiliary operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HelperConfig {
    /// Watchdog for helper processes and completion capture
    pub timeout_ms: u64,

    /// Syntax-check-only invocation
    pub completeness: CommandTemplate,

    /// Manual page renderer
    pub inspection: CommandTemplate,

    /// Completion capture script
    pub completion_script: Option<PathBuf>,

    /// Line sent to the session; `{script}` and `{context}` are substituted,
    /// the context already quoted for the shell
    pub completion_command: String,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            completeness: CommandTemplate::new("zsh", &["-n", "-c", PLACEHOLDER]),
            inspection: CommandTemplate::new("man", &["-P", "col -b", PLACEHOLDER]),
            completion_script: None,
            completion_command: "{script} {context}".to_string(),
        }
    }
}

impl HelperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,

    /// Append kernel logs here instead of stderr
    pub file: Option<PathBuf>,

    /// Mirror raw PTY output here
    pub pty_log: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            pty_log: None,
        }
    }
}
