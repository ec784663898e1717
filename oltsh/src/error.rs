//! Error types for oltsh.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for oltsh operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration. Never retried.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Telnet transport-level errors (connect, login, disconnect).
    #[error("Connection error: {0}")]
    Transport(#[from] TransportError),

    /// A single command failed to complete.
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// A multi-step provisioning sequence failed.
    #[error("Provisioning error: {0}")]
    Provisioning(#[from] ProvisioningError),
}

impl Error {
    /// Whether this error tore down the cached session.
    ///
    /// Transport and command errors always invalidate the session; the next
    /// operation reconnects from scratch.
    pub fn invalidated_session(&self) -> bool {
        match self {
            Error::Transport(_) | Error::Command(_) => true,
            Error::Provisioning(ProvisioningError::Partial { .. }) => true,
            Error::Config(_) | Error::Provisioning(_) => false,
        }
    }
}

/// Configuration errors (missing host or credentials, bad prompt patterns).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required field was not supplied.
    #[error("missing required setting '{field}'")]
    Missing { field: &'static str },

    /// A prompt or marker pattern failed to compile.
    #[error("invalid pattern for '{field}': {source}")]
    InvalidPattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },
}

/// Transport layer errors (TCP connection, Telnet login).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// A login step did not see its prompt in time.
    #[error("Login handshake timed out after {timeout:?} waiting for {stage} prompt")]
    HandshakeTimeout {
        stage: &'static str,
        timeout: Duration,
    },

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (prompt matching on the live session).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Pattern matching timed out
    #[error("Pattern not found within {0:?}")]
    PatternTimeout(Duration),

    /// Channel closed unexpectedly
    #[error("Channel closed")]
    Closed,

    /// Reading or writing the transport failed
    #[error("Channel transport error: {0}")]
    Transport(#[source] TransportError),
}

/// Command execution errors.
///
/// Each variant carries the command text and whatever output had arrived, so
/// the failure can be reproduced by hand against the device.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The prompt never reappeared.
    #[error("'{command}' timed out after {timeout:?} waiting for prompt")]
    Timeout {
        command: String,
        timeout: Duration,
        partial_output: String,
    },

    /// The device closed the connection mid-command.
    #[error("connection closed while running '{command}'")]
    Closed {
        command: String,
        partial_output: String,
    },

    /// Reading or writing the socket failed.
    #[error("transport failure while running '{command}': {source}")]
    Transport {
        command: String,
        #[source]
        source: TransportError,
    },
}

impl CommandError {
    /// The command that failed.
    pub fn command(&self) -> &str {
        match self {
            CommandError::Timeout { command, .. }
            | CommandError::Closed { command, .. }
            | CommandError::Transport { command, .. } => command,
        }
    }

    /// Output received before the failure, if any.
    pub fn partial_output(&self) -> &str {
        match self {
            CommandError::Timeout { partial_output, .. }
            | CommandError::Closed { partial_output, .. } => partial_output,
            CommandError::Transport { .. } => "",
        }
    }
}

/// Provisioning workflow errors.
#[derive(Error, Debug)]
pub enum ProvisioningError {
    /// The request was rejected before any command was sent.
    #[error("invalid {field}: {message}")]
    InvalidRequest {
        field: &'static str,
        message: String,
    },

    /// A step failed after earlier steps had already been applied.
    ///
    /// The device is left in whatever state the completed steps produced;
    /// no rollback is attempted.
    #[error(
        "{operation} failed at step {step_index} ('{command}') after {} completed step(s): {reason}",
        completed.len()
    )]
    Partial {
        operation: &'static str,
        step_index: usize,
        command: String,
        reason: String,
        response: String,
        completed: Vec<crate::workflow::StepOutcome>,
    },
}

/// Result type alias using oltsh's Error.
pub type Result<T> = std::result::Result<T, Error>;
