//! Interactive shell channel.
//!
//! [`Shell`] is the line-oriented seam the session driver talks to;
//! [`PtyChannel`] implements it over an SSH PTY.

mod buffer;
mod pty;

use std::time::Duration;

use async_trait::async_trait;
use regex::bytes::Regex;

pub use buffer::{PatternBuffer, split_last_line};
pub use pty::PtyChannel;

use crate::transport::TransportError;

/// A device shell driven one line at a time.
#[async_trait]
pub trait Shell: Send {
    /// Send one line; the newline is added here.
    async fn send(&mut self, line: &str) -> Result<(), TransportError>;

    /// Collect output until `pattern` matches its tail, returning
    /// everything read so far, prompt included.
    async fn read_until(&mut self, pattern: &Regex, timeout: Duration) -> Result<String, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}
