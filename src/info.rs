//! Kernel and language metadata reported to frontends

use serde::{Deserialize, Serialize};

/// Messaging protocol version the driver speaks
pub const PROTOCOL_VERSION: &str = "5.3";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub mimetype: String,
    pub file_extension: String,
    pub pygments_lexer: String,
    pub codemirror_mode: String,
}

impl Default for LanguageInfo {
    fn default() -> Self {
        Self {
            name: "zsh".to_string(),
            version: None,
            mimetype: "text/x-zsh".to_string(),
            file_extension: ".zsh".to_string(),
            pygments_lexer: "shell".to_string(),
            codemirror_mode: "shell".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelInfo {
    pub protocol_version: String,
    pub implementation: String,
    pub implementation_version: String,
    pub language_info: LanguageInfo,
    pub banner: String,
}

impl KernelInfo {
    pub fn new() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            implementation: crate::NAME.to_string(),
            implementation_version: crate::VERSION.to_string(),
            language_info: LanguageInfo::default(),
            banner: format!("Z shell kernel {}", crate::VERSION),
        }
    }

    /// Record the shell version, e.g. from `$ZSH_VERSION`
    pub fn with_language_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        if !version.trim().is_empty() {
            self.language_info.version = Some(version.trim().to_string());
        }
        self
    }
}

impl Default for KernelInfo {
    fn default() -> Self {
        Self::new()
    }
}
