//! Execution Engine
//!
//! Drives multi-line executions against one shell session. Each submitted
//! line is followed by a wait for a sentinel; bare line separators flush
//! output incrementally, the ready prompt advances to the next line and a
//! pending continuation or selection prompt after the last line aborts the
//! execution.
//!
//! ```text
//! SendingLine -> AwaitingSentinel -> StreamFlush          -> AwaitingSentinel
//!                                 -> NextLine             -> SendingLine | Done
//!                                 -> ContinuationDetected -> Error
//! ```

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::helpers::{completeness, completion, inspection, HelperRunner};
use crate::interrupt::InterruptHandle;
use crate::models::{
    CompletenessStatus, CompletionReply, ExecutionRequest, ExecutionResult, InspectionReply,
    OutputEvent,
};
use crate::prompt::{PromptRegistry, SentinelKind};
use crate::session::{Match, MatchKind, ShellSession};

/// Receiver of output events produced during an execution
pub trait OutputSink {
    fn emit(&mut self, event: OutputEvent);
}

impl OutputSink for Vec<OutputEvent> {
    fn emit(&mut self, event: OutputEvent) {
        self.push(event);
    }
}

impl OutputSink for UnboundedSender<OutputEvent> {
    fn emit(&mut self, event: OutputEvent) {
        if self.send(event).is_err() {
            trace!("output receiver dropped");
        }
    }
}

/// Which sentinels a wait listens for
#[derive(Debug, Clone, Copy)]
enum PatternSet {
    /// PS1, PS2, PS3
    Prompts,
    /// Prompts plus the bare line separator
    Output,
}

/// What ended a wait
enum Step {
    Matched(Match),
    Interrupted,
}

/// One shell session plus the policy for driving it
pub struct ExecutionEngine {
    config: Config,
    registry: PromptRegistry,
    session: ShellSession,
    interrupt: InterruptHandle,
    helpers: HelperRunner,
}

impl ExecutionEngine {
    /// Spawn the configured shell and install the sentinel prompts
    pub async fn start(config: Config) -> Result<Self> {
        let session = ShellSession::spawn(&config.shell, config.log.pty_log.as_deref())?;
        let mut engine = Self::with_session(config, session)?;
        engine.initialize().await?;
        if !engine.completion_enabled() {
            info!("Completion disabled: helpers.completion_script is not set");
        }
        info!("Shell ready (session {})", engine.session.id());
        Ok(engine)
    }

    /// Engine over an existing session; no initialization is sent
    pub fn with_session(config: Config, session: ShellSession) -> Result<Self> {
        let registry = PromptRegistry::from_config(&config)?;
        let helpers = HelperRunner::from_config(&config);
        Ok(Self {
            config,
            registry,
            session,
            interrupt: InterruptHandle::new(),
            helpers,
        })
    }

    /// Send the init lines and startup probes, waiting for PS1 after each
    pub async fn initialize(&mut self) -> Result<()> {
        let timeout = self.config.execution.startup_timeout();
        let mut lines = self.registry.init_commands();
        lines.extend(self.config.shell.startup_commands.iter().cloned());

        for line in lines {
            self.session.send_line(&line)?;
            let found = self
                .session
                .await_pattern(self.registry.prompts().ready(), Some(timeout))
                .await;
            match found.kind {
                MatchKind::Sentinel(_) => {
                    debug!("startup step done: {:?}", found.before.trim());
                }
                MatchKind::Timeout => {
                    return Err(Error::StartupFailed {
                        step: line,
                        reason: format!("no prompt within {:?}", timeout),
                    });
                }
                MatchKind::EndOfFile => {
                    return Err(Error::StartupFailed {
                        step: line,
                        reason: format!("shell exited: {}", found.before.trim()),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &ShellSession {
        &self.session
    }

    pub fn is_alive(&self) -> bool {
        self.session.is_alive()
    }

    /// Whether a completion capture script is configured
    pub fn completion_enabled(&self) -> bool {
        self.config.helpers.completion_script.is_some()
    }

    /// Handle for requesting an interrupt from another task or thread
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Run every line of `request`, streaming output into `sink`
    pub async fn execute<S>(&mut self, request: &ExecutionRequest, sink: &mut S) -> ExecutionResult
    where
        S: OutputSink + ?Sized,
    {
        self.interrupt.clear();
        if !self.session.is_alive() {
            return failure(Error::SessionDead);
        }

        let silent = request.silent;
        let timeout = self.config.execution.timeout();
        let lines: Vec<&str> = request.lines().collect();
        let last = lines.len().saturating_sub(1);

        for (index, line) in lines.iter().enumerate() {
            if let Err(e) = self.session.send_line(line) {
                return failure(e);
            }

            loop {
                let found = match self.next_step(PatternSet::Output, timeout).await {
                    Step::Matched(found) => found,
                    Step::Interrupted => return self.recover_from_interrupt(silent, sink).await,
                };

                match found.kind {
                    MatchKind::Sentinel(SentinelKind::LineBreak) => {
                        emit_text(sink, silent, found.before + "\n");
                    }
                    MatchKind::Sentinel(SentinelKind::Ps1) => {
                        emit_text(sink, silent, found.before);
                        break;
                    }
                    MatchKind::Sentinel(prompt) if prompt.is_pending_input() && index < last => {
                        trace!("{} after line {}, feeding next line", prompt, index + 1);
                        emit_text(sink, silent, found.before);
                        break;
                    }
                    MatchKind::Sentinel(prompt) => {
                        return self.abandon_incomplete(prompt, found.before, silent, sink).await;
                    }
                    MatchKind::Timeout => {
                        let waited = timeout.unwrap_or_default();
                        warn!("No prompt within {:?} after {:?}", waited, line);
                        return failure(Error::Timeout { waited });
                    }
                    MatchKind::EndOfFile => {
                        emit_text(sink, silent, found.before);
                        return failure(Error::EndOfFile);
                    }
                }
            }
        }

        ExecutionResult::ok()
    }

    /// Whether `code` is a complete unit according to the syntax checker
    pub async fn is_complete(&self, code: &str) -> CompletenessStatus {
        completeness::check(&self.helpers, &self.config.helpers.completeness, code).await
    }

    /// Manual page for the token under `cursor`
    pub async fn inspect(&self, code: &str, cursor: usize) -> InspectionReply {
        inspection::inspect(&self.helpers, &self.config.helpers.inspection, code, cursor).await
    }

    /// Completion candidates for the token before `cursor`
    pub async fn complete(&mut self, code: &str, cursor: usize) -> CompletionReply {
        completion::complete(
            &mut self.session,
            self.registry.prompts(),
            &self.config.helpers,
            code,
            cursor,
        )
        .await
    }

    /// Terminate the shell
    pub fn shutdown(&mut self) {
        self.session.close();
    }

    async fn next_step(&mut self, set: PatternSet, timeout: Option<Duration>) -> Step {
        let prompts = self.registry.prompts();
        let patterns = match set {
            PatternSet::Prompts => prompts.prompts(),
            PatternSet::Output => prompts.with_line_break(),
        };

        // Output already received wins over a concurrent interrupt request
        tokio::select! {
            biased;
            found = self.session.await_pattern(patterns, timeout) => Step::Matched(found),
            _ = self.interrupt.requested() => Step::Interrupted,
        }
    }

    async fn recover_from_interrupt<S>(&mut self, silent: bool, sink: &mut S) -> ExecutionResult
    where
        S: OutputSink + ?Sized,
    {
        info!("Interrupting shell");
        if let Err(e) = self.session.interrupt() {
            warn!("Interrupt failed: {}", e);
            return failure(e);
        }

        let ready = self.registry.prompts().ready();
        let timeout = self.config.execution.interrupt_timeout();
        let found = self.session.await_pattern(ready, timeout).await;
        match found.kind {
            MatchKind::Sentinel(_) => emit_text(sink, silent, found.before),
            MatchKind::Timeout => {
                return failure(Error::Timeout {
                    waited: timeout.unwrap_or_default(),
                })
            }
            MatchKind::EndOfFile => {
                emit_text(sink, silent, found.before);
                return failure(Error::EndOfFile);
            }
        }

        // A command that finished just before the signal leaves the shell
        // printing one more prompt in answer to it
        let settle = self.config.execution.interrupt_settle();
        loop {
            let extra = self.session.await_pattern(ready, Some(settle)).await;
            match extra.kind {
                MatchKind::Sentinel(_) => {
                    debug!("Discarding extra prompt after interrupt");
                    emit_text(sink, silent, extra.before);
                }
                MatchKind::Timeout => break,
                MatchKind::EndOfFile => {
                    emit_text(sink, silent, extra.before);
                    return failure(Error::EndOfFile);
                }
            }
        }

        failure(Error::Interrupted)
    }

    /// Push the shell back to PS1 after the code left a construct open
    async fn abandon_incomplete<S>(
        &mut self,
        prompt: SentinelKind,
        before: String,
        silent: bool,
        sink: &mut S,
    ) -> ExecutionResult
    where
        S: OutputSink + ?Sized,
    {
        warn!("Code ended at {}; abandoning input", prompt);
        let mut drained = before;
        if let Err(e) = self.session.send_line("") {
            return failure(e);
        }

        let timeout = self.config.execution.timeout();
        let mut interrupted = false;
        loop {
            let found = match self.next_step(PatternSet::Prompts, timeout).await {
                Step::Matched(found) => found,
                Step::Interrupted => return self.recover_from_interrupt(silent, sink).await,
            };
            drained.push_str(&found.before);

            match found.kind {
                MatchKind::Sentinel(SentinelKind::Ps1) => break,
                // Empty lines never close the construct; cancel it once
                MatchKind::Sentinel(_) if !interrupted => {
                    interrupted = true;
                    if let Err(e) = self.session.interrupt() {
                        warn!("Interrupt failed: {}", e);
                        break;
                    }
                }
                MatchKind::Sentinel(still) => {
                    warn!("Shell still at {} after interrupt", still);
                    break;
                }
                MatchKind::Timeout => break,
                MatchKind::EndOfFile => {
                    emit_text(sink, silent, drained);
                    return failure(Error::EndOfFile);
                }
            }
        }

        emit_text(sink, silent, drained);
        failure(Error::IncompleteInput { prompt })
    }
}

impl Drop for ExecutionEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Forward shell text with terminal line endings folded to `\n`
fn emit_text<S>(sink: &mut S, silent: bool, text: String)
where
    S: OutputSink + ?Sized,
{
    if !silent && !text.is_empty() {
        sink.emit(OutputEvent::stdout(text.replace("\r\n", "\n")));
    }
}

fn failure(err: Error) -> ExecutionResult {
    if err.is_fatal() {
        error!("Execution failed, session unusable: {}", err);
    } else {
        debug!("Execution ended: {}", err);
    }
    ExecutionResult::from(&err)
}
