//! Sentinel Prompts
//!
//! Defines the deliberately unusual prompt strings installed in the shell and
//! the matchers used to recognize them in PTY output, plus the command lines
//! that install them when a session starts.

use regex::Regex;
use std::fmt;

use crate::config::{Config, PromptDefinition};
use crate::error::{Error, Result};

/// Shell state announced by a sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SentinelKind {
    /// Primary prompt: the shell is ready for a new command
    Ps1,
    /// Continuation prompt: a construct is still open
    Ps2,
    /// Selection prompt: a `select` menu is waiting for a choice
    Ps3,
    /// A bare line separator: output was flushed before any prompt
    LineBreak,
}

impl SentinelKind {
    /// Shell parameter holding this prompt, if it is one
    pub fn parameter(&self) -> Option<&'static str> {
        match self {
            SentinelKind::Ps1 => Some("PS1"),
            SentinelKind::Ps2 => Some("PS2"),
            SentinelKind::Ps3 => Some("PS3"),
            SentinelKind::LineBreak => None,
        }
    }

    /// Whether the shell is waiting for more input to finish a construct
    pub fn is_pending_input(&self) -> bool {
        matches!(self, SentinelKind::Ps2 | SentinelKind::Ps3)
    }
}

impl fmt::Display for SentinelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parameter() {
            Some(name) => f.write_str(name),
            None => f.write_str("line break"),
        }
    }
}

/// How a sentinel is recognized on read-back
#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(String),
    Pattern(Regex),
}

impl Matcher {
    /// Byte span of the first occurrence in `haystack`
    pub fn find(&self, haystack: &str) -> Option<(usize, usize)> {
        match self {
            Matcher::Exact(needle) => haystack
                .find(needle.as_str())
                .map(|start| (start, start + needle.len())),
            Matcher::Pattern(regex) => regex.find(haystack).map(|m| (m.start(), m.end())),
        }
    }
}

/// One sentinel: the text sent to the shell and its matcher
#[derive(Debug, Clone)]
pub struct Sentinel {
    pub kind: SentinelKind,
    /// Literal assigned to the prompt parameter
    pub text: String,
    pub matcher: Matcher,
}

impl Sentinel {
    /// Sentinel matched by its own literal text
    pub fn exact(kind: SentinelKind, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            kind,
            matcher: Matcher::Exact(text.clone()),
            text,
        }
    }

    /// Sentinel matched by a regular expression
    pub fn pattern(kind: SentinelKind, text: impl Into<String>, pattern: &str) -> Result<Self> {
        Ok(Self {
            kind,
            text: text.into(),
            matcher: Matcher::Pattern(Regex::new(pattern)?),
        })
    }

    fn from_definition(kind: SentinelKind, definition: &PromptDefinition) -> Result<Self> {
        match &definition.pattern {
            Some(pattern) => Self::pattern(kind, definition.text.clone(), pattern),
            None => Ok(Self::exact(kind, definition.text.clone())),
        }
    }
}

/// The three prompt sentinels plus the bare line separator
///
/// Sentinels are stored ready first, so pattern subsets are prefixes.
#[derive(Debug, Clone)]
pub struct PromptSet {
    sentinels: [Sentinel; 4],
}

impl PromptSet {
    pub fn new(ps1: Sentinel, ps2: Sentinel, ps3: Sentinel) -> Self {
        Self {
            sentinels: [ps1, ps2, ps3, Sentinel::exact(SentinelKind::LineBreak, "\n")],
        }
    }

    /// Build the set described by configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let prompts = &config.prompts;
        Ok(Self::new(
            Sentinel::from_definition(SentinelKind::Ps1, &prompts.ps1)?,
            Sentinel::from_definition(SentinelKind::Ps2, &prompts.ps2)?,
            Sentinel::from_definition(SentinelKind::Ps3, &prompts.ps3)?,
        ))
    }

    pub fn get(&self, kind: SentinelKind) -> &Sentinel {
        match kind {
            SentinelKind::Ps1 => &self.sentinels[0],
            SentinelKind::Ps2 => &self.sentinels[1],
            SentinelKind::Ps3 => &self.sentinels[2],
            SentinelKind::LineBreak => &self.sentinels[3],
        }
    }

    /// PS1 only
    pub fn ready(&self) -> &[Sentinel] {
        &self.sentinels[..1]
    }

    /// PS1, PS2 and PS3
    pub fn prompts(&self) -> &[Sentinel] {
        &self.sentinels[..3]
    }

    /// All prompts plus the line separator
    pub fn with_line_break(&self) -> &[Sentinel] {
        &self.sentinels
    }

    /// Compound assignment installing all three prompts at once
    pub fn assignment(&self) -> String {
        self.prompts()
            .iter()
            .filter_map(|sentinel| {
                sentinel
                    .kind
                    .parameter()
                    .map(|name| format!("{}='{}'", name, sentinel.text))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Sentinels plus the command lines that prepare a fresh shell
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    prompts: PromptSet,
    prepare_commands: Vec<String>,
    line_editing_commands: Vec<String>,
}

impl PromptRegistry {
    pub fn new(
        prompts: PromptSet,
        prepare_commands: Vec<String>,
        line_editing_commands: Vec<String>,
    ) -> Self {
        Self {
            prompts,
            prepare_commands,
            line_editing_commands,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let prompts = PromptSet::from_config(config).map_err(|e| Error::ConfigValidationFailed {
            field: "prompts".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(
            prompts,
            config.shell.prepare_commands.clone(),
            config.shell.line_editing_commands.clone(),
        ))
    }

    pub fn prompts(&self) -> &PromptSet {
        &self.prompts
    }

    /// Command lines to send, in order, each followed by a wait for PS1
    ///
    /// The first line clears hooks and assigns all prompts in one statement
    /// so a single wait observes the new PS1.
    pub fn init_commands(&self) -> Vec<String> {
        let mut first: Vec<String> = self.prepare_commands.clone();
        first.push(self.prompts.assignment());

        let mut lines = vec![first.join("; ")];
        if !self.line_editing_commands.is_empty() {
            lines.push(self.line_editing_commands.join("; "));
        }
        lines
    }
}
