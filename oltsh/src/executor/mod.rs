//! Single command execution against the session.
//!
//! [`CommandExecutor::execute`] sends one command and waits for the prompt.
//! It needs `&mut SessionManager`, which callers only get through the
//! serializer guard, so two executions can never overlap on one session.

mod response;

pub use response::{Response, detect_failure, normalize_output};

use std::time::{Duration, Instant};

use log::{debug, warn};
use regex::bytes::Regex;
use secrecy::{ExposeSecret, SecretString};

use crate::channel::last_line;
use crate::error::{ChannelError, CommandError, Result};
use crate::session::SessionManager;
use crate::transport::{Connector, OltConfig};

/// Replacement for secrets in anything shown to callers or logs.
pub const MASK: &str = "******";

/// One command to run.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    command: String,
    display: Option<String>,
    secrets: Vec<SecretString>,
    prompt: Option<Regex>,
    timeout: Option<Duration>,
}

impl CommandRequest {
    /// Request using the shell prompt and the default timeout.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            display: None,
            secrets: Vec::new(),
            prompt: None,
            timeout: None,
        }
    }

    /// Wait for this prompt instead of the shell prompt.
    pub fn with_prompt(mut self, prompt: Regex) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Override the executor's default timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Text shown in logs, errors and the response instead of the command.
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Mask every occurrence of `secret` in the device output.
    ///
    /// Covers echoes the device wraps or redraws, where the full command
    /// text never appears verbatim.
    pub fn with_secret(mut self, secret: SecretString) -> Self {
        self.secrets.push(secret);
        self
    }

    /// The command as sent to the device.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The command as it may be shown.
    pub fn display(&self) -> &str {
        self.display.as_deref().unwrap_or(&self.command)
    }

    /// The timeout override, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl From<&str> for CommandRequest {
    fn from(command: &str) -> Self {
        Self::new(command)
    }
}

/// Sends commands and turns the device's answers into [`Response`]s.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    failed_when_contains: Vec<String>,
    default_timeout: Duration,
}

impl CommandExecutor {
    pub fn new(failed_when_contains: Vec<String>, default_timeout: Duration) -> Self {
        Self {
            failed_when_contains,
            default_timeout,
        }
    }

    /// Executor using the configured failure markers and command timeout.
    pub fn from_config(config: &OltConfig) -> Self {
        Self::new(config.failed_when_contains.clone(), config.command_timeout)
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Run one command on the managed session.
    ///
    /// Connects first if there is no usable session. A timeout or transport
    /// failure invalidates the session before the error is returned; a device
    /// error marker only marks the response as failed.
    pub async fn execute<C: Connector>(
        &self,
        manager: &mut SessionManager<C>,
        request: &CommandRequest,
    ) -> Result<Response> {
        let prompt = request
            .prompt
            .clone()
            .unwrap_or_else(|| manager.shell_prompt().clone());
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let display = request.display();

        let session = manager.ensure_connected().await?;
        debug!("executing: {}", display);
        let start = Instant::now();

        let outcome = session.exchange(&request.command, &prompt, timeout).await;
        let data = match outcome {
            Ok(data) => data,
            Err(err) => {
                let partial = mask(&session.take_partial_output(), request);
                manager.invalidate();
                warn!("'{}' failed: {}", display, err);
                return Err(command_error(err, display, timeout, partial).into());
            }
        };

        let elapsed = start.elapsed();
        let raw_result = mask(&String::from_utf8_lossy(&data), request);
        let prompt_text = last_line(&data);
        let result = normalize_output(&raw_result, display, &prompt_text);

        if let Some(failure) = detect_failure(&result, &self.failed_when_contains) {
            debug!("'{}' rejected by device: {}", display, failure);
            return Ok(Response::failed(
                display,
                result,
                raw_result,
                prompt_text,
                elapsed,
                failure,
            ));
        }

        debug!("'{}' completed in {:?}", display, elapsed);
        Ok(Response::new(display, result, raw_result, prompt_text, elapsed))
    }
}

/// Replace the real command with its display text, then any remaining
/// secret values with [`MASK`].
fn mask(output: &str, request: &CommandRequest) -> String {
    let mut masked = match &request.display {
        Some(display) if !request.command.is_empty() => {
            output.replace(request.command.as_str(), display)
        }
        _ => output.to_string(),
    };
    for secret in &request.secrets {
        let secret = secret.expose_secret();
        if !secret.is_empty() {
            masked = masked.replace(secret, MASK);
        }
    }
    masked
}

fn command_error(
    err: ChannelError,
    command: &str,
    timeout: Duration,
    partial_output: String,
) -> CommandError {
    let command = command.to_string();
    match err {
        ChannelError::PatternTimeout(_) => CommandError::Timeout {
            command,
            timeout,
            partial_output,
        },
        ChannelError::Closed => CommandError::Closed {
            command,
            partial_output,
        },
        ChannelError::Transport(source) => CommandError::Transport { command, source },
    }
}
