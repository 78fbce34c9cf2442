//! Disposable helper processes
//!
//! Runs a configured argv template to completion under a watchdog. The
//! child is killed if the watchdog fires.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::{CommandTemplate, Config};
use crate::error::{Error, Result};

/// Captured result of a helper run
#[derive(Debug, Clone)]
pub struct HelperOutput {
    /// Exit code; `None` when terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl HelperOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs helper commands with the session's environment
#[derive(Debug, Clone)]
pub struct HelperRunner {
    /// Watchdog for each run
    timeout: Duration,
    /// Extra environment variables
    env_vars: HashMap<String, String>,
    /// Working directory, inherited when unset
    working_dir: Option<PathBuf>,
}

impl HelperRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            env_vars: HashMap::new(),
            working_dir: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.helpers.timeout(),
            env_vars: config.shell.environment.clone(),
            working_dir: config.shell.working_directory.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `template` with `subject` substituted and capture its output
    pub async fn run(&self, template: &CommandTemplate, subject: &str) -> Result<HelperOutput> {
        let args = template.render(subject);
        debug!("helper: {} {:?}", template.program, args);

        let mut command = Command::new(&template.program);
        command
            .args(&args)
            .envs(&self.env_vars)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        match timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => Ok(HelperOutput {
                status: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(e)) => Err(Error::HelperFailed {
                command: template.program.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::HelperFailed {
                command: template.program.clone(),
                reason: format!("no exit within {:?}", self.timeout),
            }),
        }
    }
}
