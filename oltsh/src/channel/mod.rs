//! Channel layer for pattern matching over the interactive session.
//!
//! This module handles prompt detection, pager handling and ANSI stripping
//! on top of the raw Telnet transport.

mod buffer;
mod cli;
mod patterns;

pub use buffer::PatternBuffer;
pub use cli::{ChannelConfig, CliChannel};
pub use patterns::{any_prompt, compile_prompt_pattern, last_line};
