//! Auxiliary reply records

use serde::{Deserialize, Serialize};

/// Whether a code string is a complete, self-contained unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletenessStatus {
    Complete,
    Incomplete,
    Unknown,
}

/// Result of inspecting the token under the cursor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionReply {
    pub found: bool,
    /// Rendered manual page text; empty when not found
    pub data: String,
}

impl InspectionReply {
    pub fn found(data: impl Into<String>) -> Self {
        Self {
            found: true,
            data: data.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            found: false,
            data: String::new(),
        }
    }
}

/// Completion candidates and the replaced cursor span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReply {
    pub matches: Vec<String>,
    pub cursor_start: usize,
    pub cursor_end: usize,
}

impl CompletionReply {
    pub fn empty(cursor_start: usize, cursor_end: usize) -> Self {
        Self {
            matches: Vec::new(),
            cursor_start,
            cursor_end,
        }
    }
}
