//! Prompt-driven CLI channel over a Telnet transport.

use std::time::Duration;

use log::{debug, trace};
use regex::bytes::Regex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

use super::buffer::PatternBuffer;
use crate::error::ChannelError;
use crate::transport::TelnetTransport;

/// Configuration for CLI channel behavior.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Line terminator appended to every input.
    pub line_ending: String,

    /// Search depth for pattern matching.
    pub search_depth: usize,

    /// Pager marker to answer with a space, if any.
    pub pager: Option<Regex>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            line_ending: "\r\n".to_string(),
            search_depth: 1000,
            pager: None,
        }
    }
}

/// Interactive CLI channel.
///
/// Wraps the Telnet transport and provides pattern-based reads with
/// timeout handling. On error the buffer keeps whatever arrived, so callers
/// can report it with [`take_output`](Self::take_output).
pub struct CliChannel<S> {
    transport: TelnetTransport<S>,
    buffer: PatternBuffer,
    config: ChannelConfig,
}

impl<S> CliChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Create a new channel over a transport.
    pub fn new(transport: TelnetTransport<S>, config: ChannelConfig) -> Self {
        Self {
            transport,
            buffer: PatternBuffer::new(config.search_depth),
            config,
        }
    }

    /// Whether the peer is still connected as far as we know.
    pub fn is_open(&self) -> bool {
        !self.transport.is_eof()
    }

    /// Send a line of input.
    pub async fn send(&mut self, input: &str) -> Result<(), ChannelError> {
        trace!("send: {:?}", input);
        self.transport
            .write_line(input, &self.config.line_ending)
            .await
            .map_err(ChannelError::Transport)
    }

    /// Send a line of input that must not appear in logs.
    pub async fn send_hidden(&mut self, input: &str) -> Result<(), ChannelError> {
        trace!("send: <hidden>");
        self.transport
            .write_line(input, &self.config.line_ending)
            .await
            .map_err(ChannelError::Transport)
    }

    /// Throw away anything already buffered or sitting in the socket.
    pub fn discard_pending(&mut self) -> Result<(), ChannelError> {
        self.buffer.clear();
        self.transport
            .drain_pending()
            .map(|_| ())
            .map_err(ChannelError::Transport)
    }

    /// Read until `pattern` matches the tail of the output.
    ///
    /// Pager markers are answered and removed along the way. On success the
    /// buffer is taken and returned.
    pub async fn read_until(
        &mut self,
        pattern: &Regex,
        timeout: Duration,
    ) -> Result<Vec<u8>, ChannelError> {
        let deadline = Instant::now() + timeout;
        let mut after_pager = false;

        loop {
            if self.buffer.tail_contains(pattern) {
                return Ok(self.buffer.take());
            }

            if let Some(pager) = &self.config.pager {
                if self.buffer.remove_from_tail(pager) {
                    debug!("pager prompt detected, requesting next page");
                    self.transport
                        .write_raw(b" ")
                        .await
                        .map_err(ChannelError::Transport)?;
                    after_pager = true;
                    continue;
                }
            }

            let chunk = match tokio::time::timeout_at(deadline, self.transport.read_chunk()).await
            {
                Err(_) => return Err(ChannelError::PatternTimeout(timeout)),
                Ok(Err(e)) => return Err(ChannelError::Transport(e)),
                Ok(Ok(None)) => return Err(ChannelError::Closed),
                Ok(Ok(Some(chunk))) => chunk,
            };

            trace!(
                "read {} bytes, buffer: {} bytes",
                chunk.len(),
                self.buffer.len()
            );
            if after_pager {
                after_pager = false;
                self.buffer.extend(strip_pager_erase(&chunk));
            } else {
                self.buffer.extend(&chunk);
            }
        }
    }

    /// Take whatever output has accumulated (e.g. after a failed read).
    pub fn take_output(&mut self) -> String {
        String::from_utf8_lossy(&self.buffer.take()).into_owned()
    }

    /// Get a reference to the buffer.
    pub fn buffer(&self) -> &PatternBuffer {
        &self.buffer
    }

    /// Get the configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Shut down the underlying transport.
    pub async fn shutdown(&mut self) -> Result<(), ChannelError> {
        self.transport
            .shutdown()
            .await
            .map_err(ChannelError::Transport)
    }
}

/// Skip the run that wipes the pager marker off the screen once it has been
/// answered: backspaces (or a CR), spaces, then backspaces (or a CR) again.
///
/// Left alone, the spaces would end up in front of the next line.
fn strip_pager_erase(chunk: &[u8]) -> &[u8] {
    let is_rewind = |b: &u8| matches!(b, b'\x08' | b'\r');
    let lead = chunk.iter().take_while(|b| is_rewind(b)).count();
    let spaces = chunk[lead..].iter().take_while(|&&b| b == b' ').count();
    // A bare CR is a line ending, not an erase
    if lead == 0 || (spaces == 0 && chunk[..lead].contains(&b'\r')) {
        return chunk;
    }
    let trail = chunk[lead + spaces..]
        .iter()
        .take_while(|b| is_rewind(b))
        .count();
    &chunk[lead + spaces + trail..]
}
