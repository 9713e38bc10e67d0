//! HTTP driver for the NX-API JSON interface.
//!
//! With no address the driver talks to the device-local nginx socket and
//! authenticates with a fixed cookie; with an address it posts to
//! `http://{address}/ins` using basic authentication.
//!
//! # Example
//!
//! ```rust,no_run
//! use nodelink::{Client, Credentials, GetRequest};
//! use nodelink::nxapi::{NxapiClient, NxapiConfig};
//!
//! # async fn example() -> Result<(), nodelink::Error> {
//! let creds = Credentials::remote("192.0.2.10", "admin", "secret");
//! let mut client = NxapiClient::connect(&creds, NxapiConfig::default()).await?;
//!
//! let version = client
//!     .get(GetRequest::structured("show version").value("nxos_ver_str"))
//!     .await?;
//! println!("{:?}", version);
//! # Ok(())
//! # }
//! ```

pub mod wire;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace, warn};
use reqwest::StatusCode;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::client::command::context_then_values;
use crate::client::{
    Client, ClientState, Credentials, DataFormat, DriverFactory, GetRequest, Output, RequestKind,
    ResponseCache, SetRequest,
};
use crate::config::Environment;
use crate::error::{Error, RequestFailure, Result};

use wire::{COMMAND_SEPARATOR, Envelope, MessageType};

/// Device-local NX-API socket.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/nginx_local/nginx_1_be_nxapi.sock";

/// Cookie accepted on the local socket in place of credentials.
pub const DEFAULT_LOCAL_COOKIE: &str = "nxapi_auth=admin:local";

/// Command used as the liveness probe.
const PROBE_COMMAND: &str = "show hostname";

const DATA_FORMATS: &[DataFormat] = &[DataFormat::Cli, DataFormat::Structured];

/// NX-API driver options.
#[derive(Debug, Clone)]
pub struct NxapiConfig {
    /// Unix socket used when no address is given.
    pub socket_path: PathBuf,
    /// Request path on the device.
    pub endpoint: String,
    /// Cookie sent on the local socket.
    pub local_cookie: String,
    /// Cookie sent to remote devices along with basic authentication.
    pub cookie: Option<String>,
    /// URL scheme for remote devices.
    pub scheme: String,
    /// Whole-request timeout, generous enough for bulk configuration.
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for NxapiConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            endpoint: "/ins".into(),
            local_cookie: DEFAULT_LOCAL_COOKIE.into(),
            cookie: None,
            scheme: "http".into(),
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl NxapiConfig {
    /// Use a different local socket.
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    /// Use a different cookie on the local socket.
    pub fn local_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.local_cookie = cookie.into();
        self
    }

    /// Talk HTTPS to remote devices.
    pub fn https(mut self) -> Self {
        self.scheme = "https".into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Pick up driver settings carried by a profile.
    ///
    /// A profile cookie replaces the local-socket cookie and is also sent to
    /// remote devices.
    pub fn with_environment(mut self, environment: &Environment) -> Self {
        if let Some(cookie) = &environment.cookie {
            self.local_cookie = cookie.clone();
            self.cookie = Some(cookie.clone());
        }
        self
    }
}

/// Client for one NX-API endpoint.
pub struct NxapiClient {
    http: reqwest::Client,
    url: String,
    address: Option<String>,
    username: Option<String>,
    password: Option<SecretString>,
    state: ClientState,
    cache: ResponseCache,
}

impl NxapiClient {
    /// Validate arguments, build the HTTP client and probe the device.
    pub async fn connect(credentials: &Credentials, config: NxapiConfig) -> Result<Self> {
        credentials.validate()?;

        let (http, url) = match &credentials.address {
            Some(address) => {
                let mut builder = base_builder(&config);
                if let Some(cookie) = &config.cookie {
                    builder = builder.default_headers(cookie_header(cookie)?);
                }
                let http = builder
                    .build()
                    .map_err(|e| Error::Client(format!("failed to build HTTP client: {e}")))?;
                (http, format!("{}://{}{}", config.scheme, address, config.endpoint))
            }
            None => (local_client(&config)?, format!("http://localhost{}", config.endpoint)),
        };

        let mut client = Self {
            http,
            url,
            address: credentials.address.clone(),
            username: credentials.username.clone(),
            password: credentials.password.clone(),
            state: ClientState::Constructed,
            cache: ResponseCache::new(),
        };

        debug!("nxapi: probing {}", client.url);
        client
            .send_commands(MessageType::ShowAscii, &[PROBE_COMMAND.to_string()])
            .await?;
        client.state = ClientState::Ready;
        Ok(client)
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Post one batch and return the per-command bodies.
    async fn send_commands(
        &self,
        message_type: MessageType,
        commands: &[String],
    ) -> Result<Vec<Option<Value>>> {
        let input = commands.join(COMMAND_SEPARATOR);
        debug!("nxapi: {} '{}'", message_type.as_str(), input);

        let envelope = Envelope::new(message_type, &input);
        let document = self.post(&envelope).await?;
        trace!("nxapi: response {}", document);

        let outputs = wire::parse_outputs(&document)?;
        wire::check_outputs(commands, outputs)
    }

    async fn post(&self, envelope: &Envelope<'_>) -> Result<Value> {
        let mut retried = false;
        loop {
            let mut request = self.http.post(&self.url).json(envelope);
            if let (Some(user), Some(pass)) = (&self.username, &self.password) {
                request = request.basic_auth(user, Some(pass.expose_secret()));
            }

            match request.send().await {
                Ok(response) => return self.read_response(response).await,
                Err(e) if !retried && is_end_of_stream(&e) => {
                    warn!("nxapi: connection closed mid-request, retrying once");
                    retried = true;
                }
                Err(e) => return Err(self.transport_error(e)),
            }
        }
    }

    async fn read_response(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => {
                return Err(Error::AuthenticationFailed(format!(
                    "{} rejected the credentials for user {:?}",
                    self.target(),
                    self.username
                )));
            }
            StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(Error::RequestNotSupported(
                    "request too large for the device".into(),
                ));
            }
            _ => {}
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        match serde_json::from_str::<Value>(&body) {
            // Command errors come back as a non-2xx status with per-command codes.
            Ok(document) if document.pointer("/ins_api/outputs").is_some() => Ok(document),
            Ok(_) | Err(_) if !status.is_success() => Err(Error::RequestFailed(
                RequestFailure::new(format!("HTTP {}: {}", status, body.trim())),
            )),
            Ok(document) => Ok(document),
            Err(e) => Err(Error::Client(format!("malformed NX-API response: {e}"))),
        }
    }

    fn transport_error(&self, error: reqwest::Error) -> Error {
        let message = format!("{}: {}", self.target(), error);
        if error.is_connect() {
            Error::ConnectionRefused(message)
        } else if error.is_timeout() {
            match self.state {
                ClientState::Constructed => Error::ConnectionRefused(message),
                ClientState::Ready => Error::Client(message),
            }
        } else {
            Error::Client(message)
        }
    }

    fn target(&self) -> &str {
        self.address.as_deref().unwrap_or("local NX-API socket")
    }
}

fn base_builder(config: &NxapiConfig) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
}

fn cookie_header(cookie: &str) -> Result<HeaderMap> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| Error::InvalidArgument(format!("invalid cookie: {e}")))?;
    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, value);
    Ok(headers)
}

#[cfg(unix)]
fn local_client(config: &NxapiConfig) -> Result<reqwest::Client> {
    base_builder(config)
        .unix_socket(config.socket_path.clone())
        .default_headers(cookie_header(&config.local_cookie)?)
        .build()
        .map_err(|e| Error::Client(format!("failed to build HTTP client: {e}")))
}

#[cfg(not(unix))]
fn local_client(config: &NxapiConfig) -> Result<reqwest::Client> {
    Err(Error::ConnectionRefused(format!(
        "local socket {} is not available on this platform",
        config.socket_path.display()
    )))
}

/// Whether the server dropped the connection before answering.
fn is_end_of_stream(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = Some(error);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::UnexpectedEof {
                return true;
            }
        }
        if err
            .to_string()
            .contains("connection closed before message completed")
        {
            return true;
        }
        source = err.source();
    }
    false
}

/// Turn command bodies into caller-facing output.
fn into_output(format: DataFormat, command: &str, bodies: Vec<Option<Value>>) -> Result<Output> {
    match format {
        DataFormat::Cli => {
            let text: String = bodies
                .into_iter()
                .flatten()
                .filter_map(|body| match body {
                    Value::String(s) => Some(s),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect();
            Ok(if text.is_empty() {
                Output::Empty
            } else {
                Output::Text(text)
            })
        }
        _ => {
            let mut bodies: Vec<Value> = bodies.into_iter().flatten().collect();
            if bodies.iter().any(Value::is_string) {
                return Err(Error::RequestNotSupported(format!(
                    "structured output not supported for '{command}'"
                )));
            }
            Ok(match bodies.len() {
                0 => Output::Empty,
                1 => Output::Structured(bodies.remove(0)),
                _ => Output::Structured(Value::Array(bodies)),
            })
        }
    }
}

#[async_trait]
impl Client for NxapiClient {
    fn driver_name(&self) -> &'static str {
        "nxapi"
    }

    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    fn platform(&self) -> &str {
        "nexus"
    }

    fn data_formats(&self) -> &[DataFormat] {
        DATA_FORMATS
    }

    fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut ResponseCache {
        &mut self.cache
    }

    async fn execute_set(&mut self, request: &SetRequest) -> Result<()> {
        // Each cli_conf batch runs in one session, so sub-mode commands
        // are sent as-is ahead of the values.
        let commands = context_then_values(&request.context, &request.values);
        if commands.is_empty() {
            return Err(Error::InvalidArgument(
                "set requires at least one context or value command".into(),
            ));
        }
        self.send_commands(MessageType::Config, &commands).await?;
        Ok(())
    }

    async fn execute_get(&mut self, request: &GetRequest) -> Result<Output> {
        let (kind, message_type) = match request.data_format {
            DataFormat::Cli => (RequestKind::ShowText, MessageType::ShowAscii),
            DataFormat::Structured => (RequestKind::ShowStructured, MessageType::Show),
            DataFormat::Yang => {
                return Err(Error::RequestNotSupported(
                    "nxapi driver does not support YANG requests".into(),
                ));
            }
        };

        if let Some(hit) = self.cache.lookup(kind, &request.command) {
            return Ok(hit.clone());
        }

        let bodies = self
            .send_commands(message_type, &[request.command.clone()])
            .await?;
        let output = into_output(request.data_format, &request.command, bodies)?;
        self.cache.store(kind, &request.command, &output);
        Ok(output)
    }
}

/// Registry entry for [`NxapiClient`].
#[derive(Debug, Clone, Default)]
pub struct NxapiDriver {
    config: NxapiConfig,
}

impl NxapiDriver {
    pub fn new(config: NxapiConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DriverFactory for NxapiDriver {
    fn name(&self) -> &'static str {
        "nxapi"
    }

    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn Client>> {
        let client = NxapiClient::connect(credentials, self.config.clone()).await?;
        Ok(Box::new(client))
    }

    async fn connect_with_environment(&self, environment: &Environment) -> Result<Box<dyn Client>> {
        let config = self.config.clone().with_environment(environment);
        let client = NxapiClient::connect(&environment.credentials(), config).await?;
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    #[error("error sending request")]
    struct Wrapped(#[source] std::io::Error);

    #[test]
    fn test_end_of_stream_detection() {
        use std::io::{Error as IoError, ErrorKind};

        let eof = Wrapped(IoError::new(ErrorKind::UnexpectedEof, "early eof"));
        assert!(is_end_of_stream(&eof));

        let incomplete = Wrapped(IoError::other("connection closed before message completed"));
        assert!(is_end_of_stream(&incomplete));

        let refused = Wrapped(IoError::new(ErrorKind::ConnectionRefused, "refused"));
        assert!(!is_end_of_stream(&refused));
    }

    #[test]
    fn test_default_config() {
        let config = NxapiConfig::default();
        assert_eq!(config.socket_path, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert_eq!(config.endpoint, "/ins");
        assert_eq!(config.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_environment_cookie() {
        let env = Environment {
            cookie: Some("nxapi_auth=ops:local".into()),
            ..Default::default()
        };
        let config = NxapiConfig::default().with_environment(&env);
        assert_eq!(config.local_cookie, "nxapi_auth=ops:local");
        assert_eq!(config.cookie.as_deref(), Some("nxapi_auth=ops:local"));

        let config = NxapiConfig::default().with_environment(&Environment::default());
        assert_eq!(config.local_cookie, DEFAULT_LOCAL_COOKIE);
        assert!(config.cookie.is_none());
    }

    #[test]
    fn test_invalid_cookie() {
        assert!(matches!(cookie_header("bad\ncookie"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_text_output() {
        let out = into_output(DataFormat::Cli, "show hostname", vec![Some(json!("n9k\n"))]).unwrap();
        assert_eq!(out, Output::Text("n9k\n".into()));

        let out = into_output(DataFormat::Cli, "show run | i nothing", vec![None]).unwrap();
        assert_eq!(out, Output::Empty);
    }

    #[test]
    fn test_structured_output_requires_json() {
        let err = into_output(DataFormat::Structured, "show clock", vec![Some(json!("text"))])
            .unwrap_err();
        assert!(matches!(err, Error::RequestNotSupported(_)));

        let out = into_output(
            DataFormat::Structured,
            "show version",
            vec![Some(json!({"host_name": "n9k"}))],
        )
        .unwrap();
        assert_eq!(out, Output::Structured(json!({"host_name": "n9k"})));
    }

    #[test]
    fn test_connect_rejects_bad_arguments() {
        let creds = Credentials {
            username: Some("admin".into()),
            ..Default::default()
        };
        let result = tokio_test::block_on(NxapiClient::connect(&creds, NxapiConfig::default()));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
