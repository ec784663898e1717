//! Pattern buffer with tail-search optimization.
//!
//! Prompt detection only searches the last N bytes of the buffer rather than
//! the entire output. Running-config dumps from a loaded OLT run to
//! megabytes, so this matters.

use std::fmt;

use regex::bytes::Regex;
use vte::{Parser, Perform};

/// Buffer for accumulating output and searching its tail for patterns.
///
/// Incoming bytes are run through a VT parser so colour codes, cursor
/// movement and backspaces never reach the prompt regexes. The parser keeps
/// its state between calls, so escape sequences split across reads are
/// handled.
pub struct PatternBuffer {
    /// The accumulated (cleaned) output.
    buffer: Vec<u8>,

    /// How many bytes from the end to search for patterns.
    search_depth: usize,

    /// VT parser used for stripping escape sequences.
    parser: Parser,
}

/// Collects printable output from the VT parser.
struct Printable<'a>(&'a mut Vec<u8>);

impl Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.0.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        // Keep line structure, drop bells, backspaces and the like
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.0.push(byte);
        }
    }
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
            parser: Parser::new(),
        }
    }

    /// Extend the buffer with new data, stripping ANSI escape codes.
    pub fn extend(&mut self, data: &[u8]) {
        let mut sink = Printable(&mut self.buffer);
        self.parser.advance(&mut sink, data);
    }

    /// Search only the tail of the buffer for the pattern.
    ///
    /// Returns the match with byte offsets relative to the start of the
    /// search region (not the full buffer).
    pub fn search_tail(&self, pattern: &Regex) -> Option<regex::bytes::Match<'_>> {
        pattern.find(self.tail())
    }

    /// Search the entire buffer for a pattern.
    ///
    /// Use sparingly - prefer `search_tail` for prompt detection.
    pub fn search_full(&self, pattern: &Regex) -> Option<regex::bytes::Match<'_>> {
        pattern.find(&self.buffer)
    }

    /// Check if the tail contains a pattern match.
    ///
    /// The text before the window still counts as context, so `^` in
    /// multi-line patterns only matches at a real line start.
    pub fn tail_contains(&self, pattern: &Regex) -> bool {
        pattern.is_match_at(&self.buffer, self.tail_start())
    }

    /// Remove the first match of `pattern` from the tail.
    ///
    /// Used to cut pager markers out of the collected output. Returns whether
    /// anything was removed.
    pub fn remove_from_tail(&mut self, pattern: &Regex) -> bool {
        let start = self.tail_start();
        let range = match pattern.find(&self.buffer[start..]) {
            Some(m) => (start + m.start())..(start + m.end()),
            None => return false,
        };
        self.buffer.drain(range);
        true
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset the VT parser.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.parser = Parser::new();
    }

    /// Get the search depth setting.
    pub fn search_depth(&self) -> usize {
        self.search_depth
    }

    fn tail_start(&self) -> usize {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        // Don't split a UTF-8 sequence at the window edge
        (start..self.buffer.len())
            .find(|&i| (self.buffer[i] & 0xC0) != 0x80)
            .unwrap_or(self.buffer.len())
    }

    fn tail(&self) -> &[u8] {
        &self.buffer[self.tail_start()..]
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("len", &self.buffer.len())
            .field("search_depth", &self.search_depth)
            .finish()
    }
}
