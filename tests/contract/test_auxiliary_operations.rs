//! Auxiliary Operation Contract Tests
//!
//! Completeness, inspection and completion requests handled next to a
//! scripted shell session.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::path::PathBuf;

use test_utils::{test_config, FakeShell, PS1};
use zsh_kernel::config::CommandTemplate;
use zsh_kernel::{CompletenessStatus, Config, ExecutionEngine, ExecutionRequest};

fn engine_with(config: Config) -> ExecutionEngine {
    let (session, _inputs) = FakeShell::spawn(|_| Some(vec![PS1.to_string()]));
    ExecutionEngine::with_session(config, session).unwrap()
}

fn capture_config() -> Config {
    let mut config = test_config();
    config.helpers.completion_script = Some(PathBuf::from("/opt/capture.zsh"));
    config
}

#[tokio::test]
async fn test_completion_runs_capture_script_in_session() {
    let (session, inputs) = FakeShell::spawn(|line| {
        if line.starts_with("'/opt/capture.zsh'") {
            Some(vec![
                "--color -- colorize output\r\n".to_string(),
                "--columns\r\n".to_string(),
                PS1.to_string(),
            ])
        } else {
            None
        }
    });
    let mut engine = ExecutionEngine::with_session(capture_config(), session).unwrap();
    assert!(engine.completion_enabled());

    let reply = engine.complete("ls --col", 8).await;

    assert_eq!(reply.matches, vec!["--color", "--columns"]);
    assert_eq!((reply.cursor_start, reply.cursor_end), (3, 8));
    assert_eq!(
        FakeShell::inputs(&inputs),
        vec!["'/opt/capture.zsh' 'ls --col'\n"]
    );
}

#[tokio::test]
async fn test_completion_context_stops_at_cursor() {
    let (session, inputs) = FakeShell::spawn(|_| Some(vec![PS1.to_string()]));
    let mut engine = ExecutionEngine::with_session(capture_config(), session).unwrap();

    let reply = engine.complete("echo it's here", 9).await;

    assert!(reply.matches.is_empty());
    assert_eq!((reply.cursor_start, reply.cursor_end), (5, 9));
    assert_eq!(
        FakeShell::inputs(&inputs),
        vec!["'/opt/capture.zsh' 'echo it'\\''s'\n"]
    );
}

#[tokio::test]
async fn test_completion_without_script_sends_nothing() {
    let (session, inputs) = FakeShell::spawn(|_| Some(vec![PS1.to_string()]));
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();

    assert!(!engine.completion_enabled());
    let reply = engine.complete("git ch", 6).await;

    assert!(reply.matches.is_empty());
    assert_eq!((reply.cursor_start, reply.cursor_end), (4, 6));
    assert!(FakeShell::inputs(&inputs).is_empty());
}

#[tokio::test]
async fn test_stuck_completion_is_interrupted() {
    let (session, inputs) = FakeShell::spawn(|line| match line {
        "\x03" => Some(vec![PS1.to_string()]),
        "echo 1\n" => Some(vec!["1\r\n".to_string(), PS1.to_string()]),
        _ => Some(Vec::new()),
    });
    let mut config = capture_config();
    config.helpers.timeout_ms = 200;
    let mut engine = ExecutionEngine::with_session(config, session).unwrap();

    let reply = engine.complete("ls ", 3).await;
    assert!(reply.matches.is_empty());
    assert_eq!(FakeShell::inputs(&inputs)[1], "\x03");

    let mut events = Vec::new();
    let result = engine.execute(&ExecutionRequest::new("echo 1"), &mut events).await;
    assert!(result.is_ok());
    assert_eq!(events[0].text, "1\n");
}

#[tokio::test]
async fn test_is_complete_uses_syntax_checker() {
    let mut config = test_config();
    config.helpers.completeness = CommandTemplate::new("sh", &["-n", "-c", "{}"]);
    let engine = engine_with(config);

    assert_eq!(engine.is_complete("echo 1").await, CompletenessStatus::Complete);
    assert_ne!(
        engine.is_complete("if true; then").await,
        CompletenessStatus::Complete
    );
}

#[tokio::test]
async fn test_is_complete_without_checker_is_unknown() {
    let mut config = test_config();
    config.helpers.completeness = CommandTemplate::new("no-such-checker-zk", &["{}"]);
    let engine = engine_with(config);

    assert_eq!(engine.is_complete("echo 1").await, CompletenessStatus::Unknown);
}

#[tokio::test]
async fn test_inspect_renders_token_under_cursor() {
    let mut config = test_config();
    config.helpers.inspection = CommandTemplate::new("sh", &["-c", "echo \"page for $0\"", "{}"]);
    let engine = engine_with(config);

    let reply = engine.inspect("print -l foo", 2).await;
    assert!(reply.found);
    assert_eq!(reply.data.trim(), "page for print");

    let reply = engine.inspect("print  foo", 6).await;
    assert!(!reply.found);
    assert!(reply.data.is_empty());
}

#[tokio::test]
async fn test_inspect_failure_is_not_found() {
    let mut config = test_config();
    config.helpers.inspection = CommandTemplate::new("sh", &["-c", "exit 16", "{}"]);
    let engine = engine_with(config);

    let reply = engine.inspect("nosuchcommand", 3).await;
    assert!(!reply.found);
}
