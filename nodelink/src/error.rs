//! Error types for nodelink.
//!
//! Every driver translates its transport-native faults into [`Error`] before
//! they leave the driver. Callers match on the variant (or on [`ErrorKind`])
//! instead of inspecting message text.

use std::fmt;

use thiserror::Error;

use crate::filter::FilterError;

/// Main error type for nodelink operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed constructor or request input. Never reaches the device.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A required argument was absent where the transport demands one.
    #[error("Type error: {0}")]
    TypeError(String),

    /// The transport is unreachable (socket absent, reset, handshake deadline).
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// The device rejected the supplied credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The data format or operation is not offered by this driver or device.
    #[error("Request not supported: {0}")]
    RequestNotSupported(String),

    /// A well-formed request was rejected for a reason other than CLI syntax.
    #[error("Request failed: {0}")]
    RequestFailed(RequestFailure),

    /// The device rejected a command as invalid input.
    #[error("CLI error: {0}")]
    Cli(CliFailure),

    /// The channel is unusable for a reason not covered above.
    #[error("Client error: {0}")]
    Client(String),

    /// Fatal local configuration problem (no drivers, bad profile file).
    #[error("Configuration error: {0}")]
    Config(String),

    /// An output filter could not resolve its lookup.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Details of a rejected request, with batch attribution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFailure {
    /// Human-readable reason reported by the device or driver.
    pub message: String,
    /// Inputs the device refused.
    pub rejected_input: Vec<String>,
    /// Inputs of the same batch that were applied before the failure.
    pub successful_input: Vec<String>,
}

impl RequestFailure {
    /// A failure with no attribution yet.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Set the inputs the device refused.
    pub fn with_rejected(mut self, rejected: Vec<String>) -> Self {
        self.rejected_input = rejected;
        self
    }

    /// Set the inputs applied before the failure.
    pub fn with_successful(mut self, successful: Vec<String>) -> Self {
        self.successful_input = successful;
        self
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.rejected_input.is_empty() {
            write!(f, " (rejected: {:?})", self.rejected_input)?;
        }
        Ok(())
    }
}

/// Details of a CLI syntax or semantic rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliFailure {
    /// The offending command(s).
    pub rejected_input: Vec<String>,
    /// Raw error text from the device.
    pub clierror: String,
    /// Commands of the same batch that were applied before the rejection.
    pub successful_input: Vec<String>,
}

impl CliFailure {
    /// A rejection of a single command.
    pub fn new(rejected: impl Into<String>, clierror: impl Into<String>) -> Self {
        Self {
            rejected_input: vec![rejected.into()],
            clierror: clierror.into(),
            successful_input: Vec::new(),
        }
    }

    /// Set the commands applied before the rejection.
    pub fn with_successful(mut self, successful: Vec<String>) -> Self {
        self.successful_input = successful;
        self
    }
}

impl fmt::Display for CliFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' rejected: {}",
            self.rejected_input.join("; "),
            self.clierror.trim()
        )
    }
}

/// Fieldless mirror of [`Error`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    TypeError,
    ConnectionRefused,
    AuthenticationFailed,
    RequestNotSupported,
    RequestFailed,
    Cli,
    Client,
    Config,
    Filter,
}

impl Error {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::TypeError(_) => ErrorKind::TypeError,
            Self::ConnectionRefused(_) => ErrorKind::ConnectionRefused,
            Self::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            Self::RequestNotSupported(_) => ErrorKind::RequestNotSupported,
            Self::RequestFailed(_) => ErrorKind::RequestFailed,
            Self::Cli(_) => ErrorKind::Cli,
            Self::Client(_) => ErrorKind::Client,
            Self::Config(_) => ErrorKind::Config,
            Self::Filter(_) => ErrorKind::Filter,
        }
    }

    /// Whether this error came from the device or the channel to it.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConnectionRefused
                | ErrorKind::AuthenticationFailed
                | ErrorKind::RequestNotSupported
                | ErrorKind::RequestFailed
                | ErrorKind::Cli
                | ErrorKind::Client
        )
    }

    /// The message carried by this error, without the kind prefix.
    pub fn message(&self) -> String {
        match self {
            Self::InvalidArgument(m)
            | Self::TypeError(m)
            | Self::ConnectionRefused(m)
            | Self::AuthenticationFailed(m)
            | Self::RequestNotSupported(m)
            | Self::Client(m)
            | Self::Config(m) => m.clone(),
            Self::RequestFailed(f) => f.to_string(),
            Self::Cli(f) => f.to_string(),
            Self::Filter(f) => f.to_string(),
        }
    }

    /// Rebuild this error with a replacement message, keeping its kind.
    ///
    /// Structured failures keep their attribution fields.
    pub fn with_message(self, message: String) -> Self {
        match self {
            Self::InvalidArgument(_) => Self::InvalidArgument(message),
            Self::TypeError(_) => Self::TypeError(message),
            Self::ConnectionRefused(_) => Self::ConnectionRefused(message),
            Self::AuthenticationFailed(_) => Self::AuthenticationFailed(message),
            Self::RequestNotSupported(_) => Self::RequestNotSupported(message),
            Self::RequestFailed(f) => Self::RequestFailed(RequestFailure { message, ..f }),
            Self::Cli(f) => Self::Cli(CliFailure {
                clierror: message,
                ..f
            }),
            Self::Client(_) => Self::Client(message),
            Self::Config(_) => Self::Config(message),
            Self::Filter(_) => Self::Client(message),
        }
    }

    /// Rejected inputs for partial-failure errors, empty otherwise.
    pub fn rejected_input(&self) -> &[String] {
        match self {
            Self::RequestFailed(f) => &f.rejected_input,
            Self::Cli(f) => &f.rejected_input,
            _ => &[],
        }
    }

    /// Inputs applied before a partial failure, empty otherwise.
    pub fn successful_input(&self) -> &[String] {
        match self {
            Self::RequestFailed(f) => &f.successful_input,
            Self::Cli(f) => &f.successful_input,
            _ => &[],
        }
    }
}

/// Result type alias using nodelink's Error.
pub type Result<T> = std::result::Result<T, Error>;
