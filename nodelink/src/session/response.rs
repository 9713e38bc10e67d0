//! Result of one command sent over the shell.

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Response {
    pub command: String,
    /// Output with the echo and trailing prompt removed.
    pub output: String,
    /// The prompt line the command finished at.
    pub prompt: String,
    pub elapsed: Duration,
    /// Failure substring found in the output, if any.
    pub failure: Option<String>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.output)
    }
}
