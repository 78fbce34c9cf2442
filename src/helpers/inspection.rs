//! Manual page lookup for the token under the cursor

use super::HelperRunner;
use crate::config::CommandTemplate;
use crate::models::{ErrorKind, InspectionReply};
use crate::word;

pub async fn inspect(
    runner: &HelperRunner,
    template: &CommandTemplate,
    code: &str,
    cursor: usize,
) -> InspectionReply {
    let token = word::locate(code, cursor);
    if token.is_empty() {
        return InspectionReply::not_found();
    }

    match runner.run(template, &token).await {
        Ok(output) if output.success() && !output.stdout.trim().is_empty() => {
            InspectionReply::found(output.stdout)
        }
        Ok(output) => {
            debug!(
                "No page for {:?} (exit {:?}): {}",
                token,
                output.status,
                output.stderr.trim()
            );
            InspectionReply::not_found()
        }
        Err(e) => {
            warn!("{}: {}", ErrorKind::InspectionError, e);
            InspectionReply::not_found()
        }
    }
}
