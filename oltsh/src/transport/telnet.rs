//! Telnet transport: option negotiation and line I/O over a byte stream.
//!
//! OLTs speak a minimal NVT dialect. We accept the server's ECHO and
//! SUPPRESS-GO-AHEAD offers, offer SUPPRESS-GO-AHEAD ourselves, and refuse
//! everything else. Negotiation bytes are removed from the data stream before
//! it reaches the pattern buffer.

use bytes::BytesMut;
use futures_util::FutureExt;
use log::{debug, trace};
use memchr::memchr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransportError;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;

const READ_CHUNK: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    Iac,
    Verb(u8),
    Sub,
    SubIac,
}

/// Incremental Telnet option negotiator.
///
/// Feed raw socket bytes through [`filter`](Self::filter); it returns the
/// payload with all IAC sequences removed and queues any replies the server
/// is owed. Sequences split across reads are handled.
#[derive(Debug)]
pub struct OptionNegotiator {
    state: State,
    /// Options the server performs, as agreed so far.
    remote: [Option<bool>; 256],
    /// Options we perform, as agreed so far.
    local: [Option<bool>; 256],
    replies: Vec<u8>,
}

impl Default for OptionNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionNegotiator {
    pub fn new() -> Self {
        Self {
            state: State::Data,
            remote: [None; 256],
            local: [None; 256],
            replies: Vec::new(),
        }
    }

    /// Strip negotiation from `input`, appending payload bytes to `out`.
    pub fn filter(&mut self, input: &[u8], out: &mut Vec<u8>) {
        let mut rest = input;
        while !rest.is_empty() {
            if self.state == State::Data {
                match memchr(IAC, rest) {
                    Some(pos) => {
                        push_data(out, &rest[..pos]);
                        self.state = State::Iac;
                        rest = &rest[pos + 1..];
                    }
                    None => {
                        push_data(out, rest);
                        return;
                    }
                }
                continue;
            }

            let byte = rest[0];
            rest = &rest[1..];
            self.state = match self.state {
                State::Iac => match byte {
                    IAC => {
                        out.push(IAC);
                        State::Data
                    }
                    WILL | WONT | DO | DONT => State::Verb(byte),
                    SB => State::Sub,
                    // NOP, GA, DM and friends carry no payload
                    _ => State::Data,
                },
                State::Verb(verb) => {
                    self.negotiate(verb, byte);
                    State::Data
                }
                State::Sub => {
                    if byte == IAC {
                        State::SubIac
                    } else {
                        State::Sub
                    }
                }
                State::SubIac => {
                    if byte == SE {
                        State::Data
                    } else {
                        State::Sub
                    }
                }
                State::Data => State::Data,
            };
        }
    }

    /// Take the replies queued by [`filter`](Self::filter).
    pub fn take_replies(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.replies)
    }

    fn negotiate(&mut self, verb: u8, option: u8) {
        let idx = option as usize;
        match verb {
            WILL => {
                let accept = matches!(option, OPT_ECHO | OPT_SGA);
                if self.remote[idx] != Some(accept) {
                    self.remote[idx] = Some(accept);
                    self.reply(if accept { DO } else { DONT }, option);
                }
            }
            WONT => {
                if self.remote[idx] != Some(false) {
                    self.remote[idx] = Some(false);
                    self.reply(DONT, option);
                }
            }
            DO => {
                let accept = option == OPT_SGA;
                if self.local[idx] != Some(accept) {
                    self.local[idx] = Some(accept);
                    self.reply(if accept { WILL } else { WONT }, option);
                }
            }
            DONT => {
                if self.local[idx] != Some(false) {
                    self.local[idx] = Some(false);
                    self.reply(WONT, option);
                }
            }
            _ => {}
        }
        trace!("telnet: verb {} option {}", verb, option);
    }

    fn reply(&mut self, verb: u8, option: u8) {
        self.replies.extend_from_slice(&[IAC, verb, option]);
    }
}

/// Copy payload bytes, dropping the NUL that NVT puts after a bare CR.
fn push_data(out: &mut Vec<u8>, data: &[u8]) {
    out.extend(data.iter().copied().filter(|&b| b != 0));
}

/// Telnet transport over any async byte stream.
///
/// In production the stream is a `TcpStream`; tests substitute in-memory
/// duplex pipes.
pub struct TelnetTransport<S> {
    stream: S,
    negotiator: OptionNegotiator,
    read_buf: BytesMut,
    pending_replies: Vec<u8>,
    eof: bool,
}

impl<S> TelnetTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            negotiator: OptionNegotiator::new(),
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            pending_replies: Vec::new(),
            eof: false,
        }
    }

    /// Whether the peer has closed its side.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Read the next chunk of payload.
    ///
    /// Returns `Ok(None)` once the peer closes the connection. Chunks that
    /// contain nothing but negotiation are answered and skipped.
    pub async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            self.flush_replies().await?;

            self.read_buf.clear();
            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                self.eof = true;
                return Ok(None);
            }

            let mut payload = Vec::with_capacity(n);
            self.negotiator.filter(&self.read_buf, &mut payload);
            self.pending_replies
                .extend(self.negotiator.take_replies());

            if !payload.is_empty() {
                return Ok(Some(payload));
            }
        }
    }

    /// Discard whatever the peer has already sent without waiting for more.
    ///
    /// Returns the number of payload bytes thrown away.
    pub fn drain_pending(&mut self) -> Result<usize, TransportError> {
        let mut discarded = 0;
        loop {
            self.read_buf.clear();
            match self.stream.read_buf(&mut self.read_buf).now_or_never() {
                None => break,
                Some(Ok(0)) => {
                    self.eof = true;
                    return Err(TransportError::Disconnected);
                }
                Some(Ok(_)) => {
                    let mut payload = Vec::new();
                    self.negotiator.filter(&self.read_buf, &mut payload);
                    self.pending_replies
                        .extend(self.negotiator.take_replies());
                    discarded += payload.len();
                }
                Some(Err(e)) => return Err(e.into()),
            }
        }
        if discarded > 0 {
            debug!("telnet: discarded {} stale bytes", discarded);
        }
        Ok(discarded)
    }

    /// Send a line of input followed by `line_ending`.
    pub async fn write_line(&mut self, line: &str, line_ending: &str) -> Result<(), TransportError> {
        let mut data = Vec::with_capacity(line.len() + line_ending.len());
        escape_iac(line.as_bytes(), &mut data);
        data.extend_from_slice(line_ending.as_bytes());
        self.write_raw(&data).await
    }

    /// Send raw bytes (already escaped).
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.flush_replies().await?;
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Shut down the write half.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    async fn flush_replies(&mut self) -> Result<(), TransportError> {
        if self.pending_replies.is_empty() {
            return Ok(());
        }
        let replies = std::mem::take(&mut self.pending_replies);
        self.stream.write_all(&replies).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

fn escape_iac(data: &[u8], out: &mut Vec<u8>) {
    for &b in data {
        if b == IAC {
            out.push(IAC);
        }
        out.push(b);
    }
}
