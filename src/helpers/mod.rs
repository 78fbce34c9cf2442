//! Auxiliary operations
//!
//! Completeness checks and inspection run disposable helper processes;
//! completion reuses the live session.

pub mod completeness;
pub mod completion;
pub mod inspection;
pub mod runner;

pub use completion::{parse_completee, parse_completions, shell_quote, Completee};
pub use runner::{HelperOutput, HelperRunner};
