//! Transport-independent client contract.
//!
//! Every driver implements [`Client`]. Callers normally obtain one through
//! [`ClientRegistry::create`](registry::ClientRegistry::create) and never
//! name a concrete driver type.
//!
//! A client is meant for one logical caller at a time; methods take
//! `&mut self` so sharing one across tasks requires the caller to wrap it
//! in a lock.

pub mod cache;
pub mod command;
pub mod registry;

use std::fmt;

use async_trait::async_trait;
use log::debug;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

pub use cache::{RequestKind, ResponseCache};
pub use command::IntoLines;
pub use registry::{ClientRegistry, DriverFactory};

use crate::error::{Error, Result};
use crate::filter::{self, CliMatch, DataKey};

/// Shape of data a request works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFormat {
    /// Free-form CLI text.
    Cli,
    /// Device-native structured show output.
    Structured,
    /// YANG-modelled JSON.
    Yang,
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cli => "cli",
            Self::Structured => "structured",
            Self::Yang => "yang",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a driver instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Arguments validated, liveness probe not yet answered.
    Constructed,
    /// Probe succeeded; normal use.
    Ready,
}

/// Address and credentials for one device.
///
/// No address means the device-local channel, which takes no credentials.
#[derive(Clone, Default)]
pub struct Credentials {
    pub address: Option<String>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

impl Credentials {
    /// Credentials for the device-local channel.
    pub fn local() -> Self {
        Self::default()
    }

    /// Credentials for a remote device.
    pub fn remote(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: Some(address.into()),
            username: Some(username.into()),
            password: Some(SecretString::from(password.into())),
        }
    }

    /// Whether these credentials select the device-local channel.
    pub fn is_local(&self) -> bool {
        self.address.is_none()
    }

    /// Password text, for drivers that must place it on the wire.
    pub fn password_str(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.expose_secret())
    }

    /// Check argument shape before any connection attempt.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("address", self.address.as_deref()),
            ("username", self.username.as_deref()),
            ("password", self.password_str()),
        ];
        for (name, value) in fields {
            if value.is_some_and(str::is_empty) {
                return Err(Error::InvalidArgument(format!("{name} must not be empty")));
            }
        }

        match (&self.address, &self.username, &self.password) {
            (None, None, None) => Ok(()),
            (None, _, _) => Err(Error::InvalidArgument(
                "username and password are not accepted for local connections".into(),
            )),
            (Some(_), None, _) => Err(Error::TypeError(
                "username is required for remote connections".into(),
            )),
            (Some(_), _, None) => Err(Error::TypeError(
                "password is required for remote connections".into(),
            )),
            (Some(_), Some(_), Some(_)) => Ok(()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// How a YANG set request applies its payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum YangMode {
    /// Merge the payload into the running configuration.
    #[default]
    Merge,
    /// Replace the addressed subtree with the payload.
    Replace,
    /// Remove the addressed subtree.
    Delete,
}

/// A configuration request.
#[derive(Debug, Clone, PartialEq)]
pub struct SetRequest {
    /// Format the values are written in.
    pub data_format: DataFormat,
    /// Sub-mode entry commands sent ahead of the values.
    pub context: Vec<String>,
    /// Configuration lines, or a single YANG payload.
    pub values: Vec<String>,
    /// Only used for [`DataFormat::Yang`].
    pub yang_mode: YangMode,
}

impl SetRequest {
    /// An empty request in `data_format`.
    pub fn new(data_format: DataFormat) -> Self {
        Self {
            data_format,
            context: Vec::new(),
            values: Vec::new(),
            yang_mode: YangMode::default(),
        }
    }

    /// CLI configuration lines.
    pub fn cli(values: impl IntoLines) -> Self {
        Self::new(DataFormat::Cli).values(values)
    }

    /// A YANG JSON payload applied with `mode`.
    pub fn yang(payload: impl Into<String>, mode: YangMode) -> Self {
        let mut request = Self::new(DataFormat::Yang).values(payload.into());
        request.yang_mode = mode;
        request
    }

    /// Sub-mode entry commands.
    pub fn context(mut self, context: impl IntoLines) -> Self {
        self.context = context.into_lines();
        self
    }

    /// Configuration lines applied under the context.
    pub fn values(mut self, values: impl IntoLines) -> Self {
        self.values = values.into_lines();
        self
    }
}

/// A retrieval request.
#[derive(Debug, Clone, PartialEq)]
pub struct GetRequest {
    /// Format the output is requested in.
    pub data_format: DataFormat,
    /// Show command, or YANG path.
    pub command: String,
    /// CLI: patterns narrowing the output. Structured: leading map keys.
    pub context: Vec<String>,
    /// CLI: pattern scanned in the narrowed output. Structured: final key.
    pub value: Option<String>,
    /// Structured: keys/predicates applied after `context`.
    pub keys: Vec<DataKey>,
}

impl GetRequest {
    /// A request for `command` in `data_format` with no filters.
    pub fn new(data_format: DataFormat, command: impl Into<String>) -> Self {
        Self {
            data_format,
            command: command.into(),
            context: Vec::new(),
            value: None,
            keys: Vec::new(),
        }
    }

    /// Raw text output of a show command.
    pub fn cli(command: impl Into<String>) -> Self {
        Self::new(DataFormat::Cli, command)
    }

    /// Device-native JSON output of a show command.
    pub fn structured(command: impl Into<String>) -> Self {
        Self::new(DataFormat::Structured, command)
    }

    /// Retrieve configuration at a YANG path (JSON).
    pub fn yang(path: impl Into<String>) -> Self {
        Self::new(DataFormat::Yang, path)
    }

    /// Narrow the output before the value is extracted.
    pub fn context(mut self, context: impl IntoLines) -> Self {
        self.context = context.into_lines();
        self
    }

    /// Pattern (CLI) or final key (structured) to extract.
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Append a key or row predicate to the structured walk.
    pub fn key(mut self, key: impl Into<DataKey>) -> Self {
        self.keys.push(key.into());
        self
    }

    fn has_filter(&self) -> bool {
        !self.context.is_empty() || self.value.is_some() || !self.keys.is_empty()
    }

    /// Apply this request's filters to raw driver output.
    pub fn filter(&self, raw: Output) -> Result<Output> {
        if !self.has_filter() {
            return Ok(raw);
        }

        match raw {
            Output::Text(text) => {
                let context = self
                    .context
                    .iter()
                    .map(|c| filter::to_regex(c))
                    .collect::<std::result::Result<Vec<Regex>, _>>()?;
                let value = self.value.as_deref().map(filter::to_regex).transpose()?;
                Ok(filter::filter_cli(&text, &context, value.as_ref()).map_or(Output::Empty, Output::from))
            }
            Output::Structured(data) => {
                let keys: Vec<DataKey> = self
                    .context
                    .iter()
                    .cloned()
                    .map(DataKey::Key)
                    .chain(self.keys.iter().cloned())
                    .chain(self.value.iter().cloned().map(DataKey::Key))
                    .collect();
                Ok(Output::Structured(filter::filter_data(&data, &keys)?))
            }
            other => Ok(other),
        }
    }
}

/// What a request returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Nothing: a configuration acknowledgement or a filter with no match.
    Empty,
    /// Unfiltered command text.
    Text(String),
    /// Flat list of filter captures.
    Values(Vec<String>),
    /// Per-match capture tuples.
    Groups(Vec<Vec<String>>),
    /// JSON tree, whole or narrowed by a key walk.
    Structured(Value),
}

impl Output {
    /// Whether there is nothing worth caching or returning.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(t) => t.trim().is_empty(),
            Self::Values(v) => v.is_empty(),
            Self::Groups(g) => g.is_empty(),
            Self::Structured(v) => match v {
                Value::Null => true,
                Value::String(s) => s.is_empty(),
                Value::Array(a) => a.is_empty(),
                Value::Object(o) => o.is_empty(),
                _ => false,
            },
        }
    }

    /// The text of a [`Output::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    /// The tree of a [`Output::Structured`].
    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Self::Structured(v) => Some(v),
            _ => None,
        }
    }

    /// The captures of a single-group CLI filter.
    pub fn into_values(self) -> Option<Vec<String>> {
        match self {
            Self::Values(v) => Some(v),
            _ => None,
        }
    }
}

impl From<CliMatch> for Output {
    fn from(m: CliMatch) -> Self {
        match m {
            CliMatch::Block(text) => Self::Text(text),
            CliMatch::Values(values) => Self::Values(values),
            CliMatch::Groups(groups) => Self::Groups(groups),
        }
    }
}

/// Contract every transport driver honours.
#[async_trait]
pub trait Client: Send {
    /// Short driver name used in logs and aggregated errors.
    fn driver_name(&self) -> &'static str;

    /// Remote address, `None` for the local channel.
    fn address(&self) -> Option<&str>;

    fn username(&self) -> Option<&str>;

    /// Device family tag.
    fn platform(&self) -> &str;

    /// Formats fixed at construction.
    fn data_formats(&self) -> &[DataFormat];

    fn cache(&self) -> &ResponseCache;

    fn cache_mut(&mut self) -> &mut ResponseCache;

    /// Driver-specific configuration call. Format support and auto-flush
    /// have already been handled.
    async fn execute_set(&mut self, request: &SetRequest) -> Result<()>;

    /// Driver-specific retrieval returning raw (unfiltered) output.
    /// Format support has already been checked.
    async fn execute_get(&mut self, request: &GetRequest) -> Result<Output>;

    fn supports(&self, format: DataFormat) -> bool {
        self.data_formats().contains(&format)
    }

    fn cache_enabled(&self) -> bool {
        self.cache().enabled()
    }

    /// Disabling the cache flushes it.
    fn set_cache_enabled(&mut self, enabled: bool) {
        self.cache_mut().set_enabled(enabled);
    }

    fn cache_auto_flush(&self) -> bool {
        self.cache().auto_flush()
    }

    fn set_cache_auto_flush(&mut self, auto_flush: bool) {
        self.cache_mut().set_auto_flush(auto_flush);
    }

    fn cache_flush(&mut self) {
        self.cache_mut().flush();
    }

    /// Apply configuration.
    async fn set(&mut self, request: SetRequest) -> Result<()> {
        self.check_format(request.data_format)?;
        if self.cache_auto_flush() {
            self.cache_flush();
        }
        debug!(
            "{}: set {} context={:?} values={:?}",
            self.driver_name(),
            request.data_format,
            request.context,
            request.values
        );
        self.execute_set(&request).await
    }

    /// Retrieve state or configuration, filtered per the request.
    async fn get(&mut self, request: GetRequest) -> Result<Output> {
        self.check_format(request.data_format)?;
        debug!(
            "{}: get {} '{}'",
            self.driver_name(),
            request.data_format,
            request.command
        );
        let raw = self.execute_get(&request).await?;
        request.filter(raw)
    }

    fn check_format(&self, format: DataFormat) -> Result<()> {
        if self.supports(format) {
            Ok(())
        } else {
            Err(Error::RequestNotSupported(format!(
                "{} driver does not support the {} data format",
                self.driver_name(),
                format
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_local() {
        assert!(Credentials::local().validate().is_ok());

        let creds = Credentials {
            username: Some("admin".into()),
            ..Default::default()
        };
        assert!(matches!(creds.validate(), Err(Error::InvalidArgument(_))));

        let creds = Credentials {
            password: Some(SecretString::from("pw".to_string())),
            ..Default::default()
        };
        assert!(matches!(creds.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_validate_remote() {
        assert!(Credentials::remote("n9k", "admin", "pw").validate().is_ok());

        let creds = Credentials {
            address: Some("n9k".into()),
            username: Some("admin".into()),
            password: None,
        };
        assert!(matches!(creds.validate(), Err(Error::TypeError(_))));

        let creds = Credentials {
            address: Some("n9k".into()),
            username: None,
            password: Some(SecretString::from("pw".to_string())),
        };
        assert!(matches!(creds.validate(), Err(Error::TypeError(_))));
    }

    #[test]
    fn test_validate_empty_strings() {
        for creds in [
            Credentials::remote("", "admin", "pw"),
            Credentials::remote("n9k", "", "pw"),
            Credentials::remote("n9k", "admin", ""),
        ] {
            assert!(matches!(creds.validate(), Err(Error::InvalidArgument(_))));
        }
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", Credentials::remote("n9k", "admin", "hunter2"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_get_request_filters_text() {
        let request = GetRequest::cli("show running-config")
            .context("/^router ospf 1/")
            .value(r"/router-id (\S+)/");
        let raw = Output::Text("router ospf 1\n  router-id 9.9.9.9\n".into());
        assert_eq!(
            request.filter(raw).unwrap(),
            Output::Values(vec!["9.9.9.9".into()])
        );
    }

    #[test]
    fn test_get_request_no_match_is_empty() {
        let request = GetRequest::cli("show running-config").context("router bgp 1");
        let raw = Output::Text("router ospf 1\n  router-id 9.9.9.9\n".into());
        assert_eq!(request.filter(raw).unwrap(), Output::Empty);
    }

    #[test]
    fn test_get_request_filters_structured() {
        let request = GetRequest::structured("show vlan brief")
            .context(["TABLE_vlanbrief", "ROW_vlanbrief"])
            .key(DataKey::matching([("vlanshowbr-vlanid", "10")]))
            .value("vlanshowbr-vlanname");
        let raw = Output::Structured(json!({
            "TABLE_vlanbrief": {"ROW_vlanbrief": [
                {"vlanshowbr-vlanid": "1", "vlanshowbr-vlanname": "default"},
                {"vlanshowbr-vlanid": "10", "vlanshowbr-vlanname": "users"}
            ]}
        }));
        assert_eq!(request.filter(raw).unwrap(), Output::Structured(json!("users")));
    }

    #[test]
    fn test_get_request_without_filters_passes_through() {
        let raw = Output::Text("anything".into());
        assert_eq!(GetRequest::cli("show clock").filter(raw.clone()).unwrap(), raw);
    }
}
