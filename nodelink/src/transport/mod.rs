//! SSH transport wrapping russh.
//!
//! Connection setup, host key checking and authentication for the
//! interactive session driver. Faults are reported as [`TransportError`]
//! and folded into the crate taxonomy before they leave the driver.

mod config;
mod ssh;

use std::time::Duration;

use thiserror::Error;

use crate::error::Error;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use ssh::SshTransport;

/// SSH-level faults.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("could not reach {address}: {source}")]
    Unreachable {
        address: String,
        #[source]
        source: russh::Error,
    },

    #[error("SSH handshake with {address} did not finish within {after:?}")]
    HandshakeTimeout { address: String, after: Duration },

    #[error("{address} rejected the credentials for user '{user}'")]
    AuthenticationFailed { address: String, user: String },

    #[error("host key for {host}:{port} does not match known_hosts line {line}")]
    HostKeyChanged { host: String, port: u16, line: usize },

    #[error("host key for {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    #[error("known_hosts: {0}")]
    KnownHosts(String),

    #[error("unusable private key: {0}")]
    Key(String),

    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("device closed the session")]
    Disconnected,

    #[error("no prompt within {0:?}")]
    PromptTimeout(Duration),
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        let message = err.to_string();
        match err {
            TransportError::Unreachable { .. }
            | TransportError::HandshakeTimeout { .. }
            | TransportError::HostKeyChanged { .. }
            | TransportError::HostKeyUnknown { .. } => Error::ConnectionRefused(message),
            TransportError::AuthenticationFailed { .. } => Error::AuthenticationFailed(message),
            TransportError::Key(_) => Error::InvalidArgument(message),
            TransportError::KnownHosts(_)
            | TransportError::Ssh(_)
            | TransportError::Disconnected
            | TransportError::PromptTimeout(_) => Error::Client(message),
        }
    }
}
