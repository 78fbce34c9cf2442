//! Completion candidates captured from the live session
//!
//! A capture script run inside the shell prints one candidate per line,
//! optionally followed by `" -- "` and a description.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::config::HelperConfig;
use crate::models::{CompletionReply, ErrorKind};
use crate::prompt::{PromptSet, SentinelKind};
use crate::session::{MatchKind, ShellSession};

static NON_SPACE_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+$").expect("valid regex"));
static WORD_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+$").expect("valid regex"));

const DESCRIPTION_SEPARATOR: &str = " -- ";

/// Text before the cursor and the partial token being completed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completee {
    pub context: String,
    pub completee: String,
    /// Character offset where the completee starts
    pub cursor_start: usize,
    pub cursor_end: usize,
}

/// Split `code` at `cursor` (in characters) into context and completee
pub fn parse_completee(code: &str, cursor: usize) -> Completee {
    let context: String = code.chars().take(cursor).collect();
    let cursor_end = context.chars().count();

    let completee = NON_SPACE_TAIL
        .find(&context)
        .or_else(|| WORD_TAIL.find(&context))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let cursor_start = cursor_end - completee.chars().count();

    Completee {
        context,
        completee,
        cursor_start,
        cursor_end,
    }
}

/// Quote `text` as a single shell word
pub fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Candidate names from the capture script output
pub fn parse_completions(output: &str) -> Vec<String> {
    output
        .trim()
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.split_once(DESCRIPTION_SEPARATOR)
                .map_or(line, |(candidate, _)| candidate)
                .to_string()
        })
        .collect()
}

/// Line sent to the session to run the capture script
pub fn render_command(template: &str, script: &Path, context: &str) -> String {
    template
        .replace("{script}", &shell_quote(&script.to_string_lossy()))
        .replace("{context}", &shell_quote(context))
}

/// Collect completion candidates for the code before `cursor`
///
/// Failures are logged and produce an empty candidate list.
pub async fn complete(
    session: &mut ShellSession,
    prompts: &PromptSet,
    helpers: &HelperConfig,
    code: &str,
    cursor: usize,
) -> CompletionReply {
    let parsed = parse_completee(code, cursor);
    let mut reply = CompletionReply::empty(parsed.cursor_start, parsed.cursor_end);

    let Some(script) = helpers.completion_script.as_deref() else {
        debug!("No completion script configured");
        return reply;
    };
    if !session.is_alive() {
        warn!("{}: session is dead", ErrorKind::CompletionError);
        return reply;
    }

    let command = render_command(&helpers.completion_command, script, &parsed.context);
    if let Err(e) = session.send_line(&command) {
        warn!("{}: {}", ErrorKind::CompletionError, e);
        return reply;
    }

    let found = session
        .await_pattern(prompts.ready(), Some(helpers.timeout()))
        .await;
    match found.kind {
        MatchKind::Sentinel(_) => {
            reply.matches = parse_completions(&found.before);
            debug!("{} candidates for {:?}", reply.matches.len(), parsed.completee);
        }
        MatchKind::Timeout => {
            warn!(
                "{}: no prompt within {:?}, interrupting",
                ErrorKind::CompletionError,
                helpers.timeout()
            );
            resync(session, prompts, helpers).await;
        }
        MatchKind::EndOfFile => {
            warn!("{}: shell exited", ErrorKind::CompletionError);
        }
    }

    reply
}

async fn resync(session: &mut ShellSession, prompts: &PromptSet, helpers: &HelperConfig) {
    if let Err(e) = session.interrupt() {
        warn!("Cannot interrupt completion capture: {}", e);
        return;
    }
    let found = session
        .await_pattern(prompts.ready(), Some(helpers.timeout()))
        .await;
    if found.kind != MatchKind::Sentinel(SentinelKind::Ps1) {
        warn!("Session did not return to the prompt after completion ({:?})", found.kind);
    }
}
