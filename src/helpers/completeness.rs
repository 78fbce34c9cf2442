//! Syntax completeness check

use super::HelperRunner;
use crate::config::CommandTemplate;
use crate::models::CompletenessStatus;

/// Map the syntax checker's exit code to a status
pub fn classify(status: Option<i32>) -> CompletenessStatus {
    match status {
        Some(0) => CompletenessStatus::Complete,
        Some(1) => CompletenessStatus::Incomplete,
        _ => CompletenessStatus::Unknown,
    }
}

/// Ask a non-interactive shell whether `code` parses on its own
///
/// Helper failures are logged and reported as unknown.
pub async fn check(runner: &HelperRunner, template: &CommandTemplate, code: &str) -> CompletenessStatus {
    match runner.run(template, code).await {
        Ok(output) => {
            let status = classify(output.status);
            debug!("completeness {:?} (exit {:?})", status, output.status);
            status
        }
        Err(e) => {
            warn!("Completeness check failed: {}", e);
            CompletenessStatus::Unknown
        }
    }
}
