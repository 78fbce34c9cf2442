//! Execution Engine Contract Tests
//!
//! Drives the engine against a scripted shell that answers each line the
//! way zsh does on a terminal: output lines end in CRLF and every command
//! ends with a sentinel prompt.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use test_utils::{test_config, FakeShell, PS1, PS2, PS3};
use zsh_kernel::{
    Error, ErrorKind, ExecutionEngine, ExecutionRequest, InterruptHandle, OutputEvent,
};

/// Lets a scripted response request an interrupt from the engine under test
type HandleSlot = Arc<OnceLock<InterruptHandle>>;

fn request_from(slot: &HandleSlot) {
    if let Some(handle) = slot.get() {
        handle.request();
    }
}

fn interrupt_later(engine: &ExecutionEngine, delay: Duration) {
    let handle = engine.interrupt_handle();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        handle.request();
    });
}

fn texts(events: &[OutputEvent]) -> Vec<&str> {
    events.iter().map(|event| event.text.as_str()).collect()
}

fn chunks(parts: &[&str]) -> Option<Vec<String>> {
    Some(parts.iter().map(|part| part.to_string()).collect())
}

#[tokio::test]
async fn test_single_line_round_trip() {
    let (session, inputs) = FakeShell::spawn(|line| match line {
        "echo 1\n" => chunks(&["1\r\n", PS1]),
        _ => chunks(&[PS1]),
    });
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();
    let mut events = Vec::new();

    let result = engine.execute(&ExecutionRequest::new("echo 1"), &mut events).await;

    assert!(result.is_ok());
    assert_eq!(texts(&events), vec!["1\n"]);
    assert_eq!(FakeShell::inputs(&inputs), vec!["echo 1\n"]);
}

#[tokio::test]
async fn test_each_line_waits_for_prompt() {
    let (session, inputs) = FakeShell::spawn(|line| match line {
        "echo a\n" => chunks(&["a\r\n", PS1]),
        "echo b\n" => chunks(&["b\r\n", PS1]),
        _ => None,
    });
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();
    let mut events = Vec::new();

    let result = engine
        .execute(&ExecutionRequest::new("echo a\necho b"), &mut events)
        .await;

    assert!(result.is_ok());
    assert_eq!(texts(&events), vec!["a\n", "b\n"]);
    assert_eq!(FakeShell::inputs(&inputs), vec!["echo a\n", "echo b\n"]);
}

#[tokio::test]
async fn test_continuation_on_inner_lines_is_fed() {
    let (session, inputs) = FakeShell::spawn(|line| match line {
        "for i in 1 2\n" | "do echo $i\n" => chunks(&[PS2]),
        "done\n" => chunks(&["1\r\n", "2\r\n", PS1]),
        _ => None,
    });
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();
    let mut events = Vec::new();

    let result = engine
        .execute(&ExecutionRequest::new("for i in 1 2\ndo echo $i\ndone"), &mut events)
        .await;

    assert!(result.is_ok());
    assert_eq!(texts(&events), vec!["1\n", "2\n"]);
    assert_eq!(FakeShell::inputs(&inputs).len(), 3);
}

#[tokio::test]
async fn test_continuation_after_last_line_is_abandoned() {
    let (session, inputs) = FakeShell::spawn(|line| match line {
        "if true; then\n" | "\n" => chunks(&[PS2]),
        "\x03" => chunks(&["\r\n", PS1]),
        "echo ok\n" => chunks(&["ok\r\n", PS1]),
        _ => None,
    });
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();
    let mut events = Vec::new();

    let result = engine
        .execute(&ExecutionRequest::new("if true; then"), &mut events)
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::IncompleteInput));
    assert_eq!(
        FakeShell::inputs(&inputs),
        vec!["if true; then\n", "\n", "\x03"]
    );

    // The session is back at PS1 and usable
    events.clear();
    let result = engine.execute(&ExecutionRequest::new("echo ok"), &mut events).await;
    assert!(result.is_ok());
    assert_eq!(texts(&events), vec!["ok\n"]);
}

#[tokio::test]
async fn test_selection_prompt_after_last_line_is_abandoned() {
    let (session, inputs) = FakeShell::spawn(|line| match line {
        "select x in a b; do break; done\n" => chunks(&["1) a  2) b\r\n", PS3]),
        "\n" => chunks(&["1) a  2) b\r\n", PS3]),
        "\x03" => chunks(&[PS1]),
        _ => None,
    });
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();
    let mut events = Vec::new();

    let result = engine
        .execute(
            &ExecutionRequest::new("select x in a b; do break; done"),
            &mut events,
        )
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::IncompleteInput));
    let message = result.error.unwrap().message;
    assert!(message.contains("PS3"), "{}", message);
    assert_eq!(events[0].text, "1) a  2) b\n");
    assert_eq!(FakeShell::inputs(&inputs).last().unwrap(), "\x03");
}

#[tokio::test]
async fn test_interrupt_recovers_to_prompt() {
    let (session, inputs) = FakeShell::spawn(|line| match line {
        "sleep 100\n" => Some(Vec::new()),
        "\x03" => chunks(&["^C\r\n", PS1]),
        "echo 1\n" => chunks(&["1\r\n", PS1]),
        _ => None,
    });
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();
    let handle = engine.interrupt_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.request();
    });

    let mut events = Vec::new();
    let result = engine
        .execute(&ExecutionRequest::new("sleep 100"), &mut events)
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::Interrupted));
    assert_eq!(texts(&events), vec!["^C\n"]);
    assert_eq!(FakeShell::inputs(&inputs), vec!["sleep 100\n", "\x03"]);

    events.clear();
    let result = engine.execute(&ExecutionRequest::new("echo 1"), &mut events).await;
    assert!(result.is_ok());
    assert_eq!(texts(&events), vec!["1\n"]);
}

#[tokio::test]
async fn test_stale_interrupt_is_discarded() {
    let (session, inputs) = FakeShell::spawn(|line| match line {
        "echo 1\n" => chunks(&["1\r\n", PS1]),
        _ => None,
    });
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();
    engine.interrupt_handle().request();

    let mut events = Vec::new();
    let result = engine.execute(&ExecutionRequest::new("echo 1"), &mut events).await;

    assert!(result.is_ok());
    assert_eq!(FakeShell::inputs(&inputs), vec!["echo 1\n"]);
}

#[tokio::test]
async fn test_silent_multi_line_request() {
    let (session, _inputs) = FakeShell::spawn(|_| chunks(&["noise\r\n", PS1]));
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();
    let mut events = Vec::new();

    let result = engine
        .execute(&ExecutionRequest::silent("echo 1\necho 2"), &mut events)
        .await;

    assert!(result.is_ok());
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_exit_reports_end_of_file_then_write_error() {
    let (session, _inputs) = FakeShell::spawn(|_| None);
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();
    let mut events = Vec::new();

    let result = engine.execute(&ExecutionRequest::new("exit"), &mut events).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::EndOfFile));
    assert!(!engine.is_alive());

    let result = engine.execute(&ExecutionRequest::new("echo 1"), &mut events).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::WriteError));
}

#[tokio::test]
async fn test_long_output_is_flushed_line_by_line() {
    let (session, _inputs) = FakeShell::spawn(|_| {
        let mut out: Vec<String> = (0..200).map(|i| format!("line {}\r\n", i)).collect();
        out.push(PS1.to_string());
        Some(out)
    });
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();
    let mut events = Vec::new();

    let result = engine
        .execute(&ExecutionRequest::new("seq 200"), &mut events)
        .await;

    assert!(result.is_ok());
    assert_eq!(events.len(), 200);
    assert_eq!(events[0].text, "line 0\n");
    assert_eq!(events[199].text, "line 199\n");
}

#[tokio::test]
async fn test_partial_output_before_prompt_is_emitted() {
    let (session, _inputs) = FakeShell::spawn(|_| chunks(&["no newline", PS1]));
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();
    let mut events = Vec::new();

    let result = engine
        .execute(&ExecutionRequest::new("print -n no newline"), &mut events)
        .await;

    assert!(result.is_ok());
    assert_eq!(texts(&events), vec!["no newline"]);
}

#[tokio::test]
async fn test_initialize_installs_prompts_then_probes() {
    let (session, inputs) = FakeShell::spawn(|line| {
        if line.starts_with("TERM=dumb") {
            chunks(&["old prompt% ", PS1])
        } else {
            chunks(&[PS1])
        }
    });
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();

    engine.initialize().await.unwrap();

    let sent = FakeShell::inputs(&inputs);
    assert_eq!(sent.len(), 3);
    assert!(sent[0].ends_with("PS3='ZSH_KERNEL_PS3 : '\n"));
    assert_eq!(sent[1], "unset zle_bracketed_paste; zle_highlight=(none)\n");
    assert_eq!(sent[2], "tty\n");
}

#[tokio::test]
async fn test_initialize_without_prompt_fails() {
    let (session, _inputs) = FakeShell::spawn(|_| Some(Vec::new()));
    let mut config = test_config();
    config.execution.startup_timeout_ms = 50;
    let mut engine = ExecutionEngine::with_session(config, session).unwrap();

    let err = engine.initialize().await.unwrap_err();
    assert!(matches!(err, Error::StartupFailed { .. }));
}

#[tokio::test]
async fn test_events_stream_through_channel() {
    let (session, _inputs) = FakeShell::spawn(|_| chunks(&["a\r\n", "b\r\n", PS1]));
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();
    let (mut tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<OutputEvent>();

    let result = engine.execute(&ExecutionRequest::new("print -l a b"), &mut tx).await;
    drop(tx);

    assert!(result.is_ok());
    let mut received = Vec::new();
    while let Some(event) = rx.recv().await {
        received.push(event.text);
    }
    assert_eq!(received, vec!["a\n", "b\n"]);
}

#[tokio::test]
async fn test_interrupt_racing_completion_keeps_replies_in_sync() {
    let slot: HandleSlot = Arc::new(OnceLock::new());
    let in_shell = Arc::clone(&slot);
    let (session, _inputs) = FakeShell::spawn(move |line| match line {
        "true\n" => {
            request_from(&in_shell);
            chunks(&[PS1])
        }
        // An idle shell answers SIGINT with a fresh prompt
        "\x03" => chunks(&["\r\n", PS1]),
        "echo 1\n" => chunks(&["1\r\n", PS1]),
        "echo 2\n" => chunks(&["2\r\n", PS1]),
        _ => None,
    });
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();
    slot.set(engine.interrupt_handle()).unwrap();

    let mut events = Vec::new();
    let result = engine.execute(&ExecutionRequest::new("true"), &mut events).await;
    assert!(result.is_ok() || result.error_kind() == Some(ErrorKind::Interrupted));

    events.clear();
    let result = engine.execute(&ExecutionRequest::new("echo 1"), &mut events).await;
    assert!(result.is_ok());
    assert_eq!(texts(&events), vec!["1\n"]);

    events.clear();
    let result = engine.execute(&ExecutionRequest::new("echo 2"), &mut events).await;
    assert!(result.is_ok());
    assert_eq!(texts(&events), vec!["2\n"]);
}

#[tokio::test]
async fn test_prompt_received_before_interrupt_completes_normally() {
    let (session, inputs) = FakeShell::spawn(|line| match line {
        "true\n" => chunks(&[PS1]),
        "echo 1\n" => chunks(&["1\r\n", PS1]),
        _ => None,
    });
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();

    let mut events = Vec::new();
    let result = engine.execute(&ExecutionRequest::new("true"), &mut events).await;
    assert!(result.is_ok());

    // A request landing after the command finished is stale
    engine.interrupt_handle().request();
    let result = engine.execute(&ExecutionRequest::new("echo 1"), &mut events).await;
    assert!(result.is_ok());
    assert_eq!(texts(&events), vec!["1\n"]);
    assert_eq!(FakeShell::inputs(&inputs), vec!["true\n", "echo 1\n"]);
}

#[tokio::test]
async fn test_interrupt_without_prompt_times_out() {
    let (session, _inputs) = FakeShell::spawn(|_| Some(Vec::new()));
    let mut config = test_config();
    config.execution.interrupt_timeout_ms = Some(50);
    let mut engine = ExecutionEngine::with_session(config, session).unwrap();
    interrupt_later(&engine, Duration::from_millis(30));

    let mut events = Vec::new();
    let result = engine
        .execute(&ExecutionRequest::new("sleep 100"), &mut events)
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
    assert!(engine.is_alive());
}

#[tokio::test]
async fn test_shell_exiting_on_interrupt_is_end_of_file() {
    let (session, _inputs) = FakeShell::spawn(|line| match line {
        "sleep 100\n" => Some(Vec::new()),
        _ => None,
    });
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();
    interrupt_later(&engine, Duration::from_millis(30));

    let mut events = Vec::new();
    let result = engine
        .execute(&ExecutionRequest::new("sleep 100"), &mut events)
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::EndOfFile));
    assert!(!engine.is_alive());
}

#[tokio::test]
async fn test_abandon_without_prompt_still_reports_incomplete_input() {
    let (session, inputs) = FakeShell::spawn(|line| match line {
        "if true; then\n" => chunks(&[PS2]),
        _ => Some(Vec::new()),
    });
    let mut config = test_config();
    config.execution.timeout_ms = Some(200);
    let mut engine = ExecutionEngine::with_session(config, session).unwrap();

    let mut events = Vec::new();
    let result = engine
        .execute(&ExecutionRequest::new("if true; then"), &mut events)
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::IncompleteInput));
    assert_eq!(FakeShell::inputs(&inputs), vec!["if true; then\n", "\n"]);
}

#[tokio::test]
async fn test_shell_exiting_while_abandoning_is_end_of_file() {
    let (session, _inputs) = FakeShell::spawn(|line| match line {
        "if true; then\n" => chunks(&[PS2]),
        _ => None,
    });
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();

    let mut events = Vec::new();
    let result = engine
        .execute(&ExecutionRequest::new("if true; then"), &mut events)
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::EndOfFile));
    assert!(!engine.is_alive());
}

#[tokio::test]
async fn test_interrupt_while_abandoning() {
    let slot: HandleSlot = Arc::new(OnceLock::new());
    let in_shell = Arc::clone(&slot);
    let (session, inputs) = FakeShell::spawn(move |line| match line {
        "if true; then\n" => chunks(&[PS2]),
        "\n" => {
            request_from(&in_shell);
            Some(Vec::new())
        }
        "\x03" => chunks(&["\r\n", PS1]),
        _ => None,
    });
    let mut engine = ExecutionEngine::with_session(test_config(), session).unwrap();
    slot.set(engine.interrupt_handle()).unwrap();

    let mut events = Vec::new();
    let result = engine
        .execute(&ExecutionRequest::new("if true; then"), &mut events)
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::Interrupted));
    assert_eq!(texts(&events), vec!["\n"]);
    assert_eq!(
        FakeShell::inputs(&inputs),
        vec!["if true; then\n", "\n", "\x03"]
    );
}
