//! Named connection profiles loaded from YAML.
//!
//! A profile file maps environment names to connection settings:
//!
//! ```yaml
//! default:
//!   host: 192.0.2.10
//!   username: admin
//!   password: admin
//! lab-xr:
//!   host: 192.0.2.20
//!   port: 57400
//!   username: cisco
//!   password: cisco
//! ```
//!
//! [`Environments::load_default`] reads `/etc/nodelink.yaml` and then
//! `$HOME/.nodelink.yaml`; settings in the later file override the earlier
//! one field by field.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::debug;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::client::Credentials;
use crate::error::{Error, Result};

/// System-wide profile file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/nodelink.yaml";

/// Per-user profile file name, relative to `$HOME`.
pub const USER_CONFIG_FILE: &str = ".nodelink.yaml";

/// Profile used when no name is given.
pub const DEFAULT_ENVIRONMENT: &str = "default";

/// Profile as it appears on disk.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawEnvironment {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    cookie: Option<String>,
}

/// Connection settings for one device.
#[derive(Clone, Default)]
pub struct Environment {
    /// Host name or address. `None` selects the local channel.
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Authentication cookie for the HTTP driver's local channel.
    pub cookie: Option<String>,
}

impl Environment {
    /// Overlay the fields set in `other` onto this profile.
    fn merge(&mut self, other: Environment) {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.username.is_some() {
            self.username = other.username;
        }
        if other.password.is_some() {
            self.password = other.password;
        }
        if other.cookie.is_some() {
            self.cookie = other.cookie;
        }
    }

    /// Address in `host[:port]` form, `None` for the local channel.
    pub fn address(&self) -> Option<String> {
        let host = self.host.as_ref()?;
        Some(match self.port {
            Some(port) => format!("{host}:{port}"),
            None => host.clone(),
        })
    }

    /// Password text, for drivers that must place it on the wire.
    pub fn password_str(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.expose_secret())
    }

    /// Credentials for [`ClientRegistry::create`](crate::ClientRegistry::create).
    pub fn credentials(&self) -> Credentials {
        Credentials {
            address: self.address(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl From<RawEnvironment> for Environment {
    fn from(raw: RawEnvironment) -> Self {
        Self {
            host: raw.host,
            port: raw.port,
            username: raw.username,
            password: raw.password.map(SecretString::from),
            cookie: raw.cookie,
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("cookie", &self.cookie.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// All known profiles, in file order.
#[derive(Debug, Clone, Default)]
pub struct Environments {
    entries: IndexMap<String, Environment>,
}

impl Environments {
    /// No profiles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a profile document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::new());
        }
        let raw: Option<IndexMap<String, Option<RawEnvironment>>> = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("invalid profile document: {e}")))?;

        let entries = raw
            .unwrap_or_default()
            .into_iter()
            .map(|(name, env)| (name, env.unwrap_or_default().into()))
            .collect();
        Ok(Self { entries })
    }

    /// Load one profile file. A missing file yields no profiles.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("profile file {} not found, skipping", path.display());
                return Ok(Self::new());
            }
            Err(e) => {
                return Err(Error::Config(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        debug!("loading profiles from {}", path.display());
        Self::from_yaml_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e.message())))
    }

    /// Load each file in order, later files overriding earlier ones.
    pub fn load_paths<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut merged = Self::new();
        for path in paths {
            merged.merge(Self::load(path)?);
        }
        Ok(merged)
    }

    /// Load the system file and then the user's file.
    pub fn load_default() -> Result<Self> {
        Self::load_paths(default_paths())
    }

    /// Overlay `other` onto these profiles, field by field.
    pub fn merge(&mut self, other: Environments) {
        for (name, env) in other.entries {
            self.entries.entry(name).or_default().merge(env);
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, environment: Environment) {
        self.entries.insert(name.into(), environment);
    }

    /// Look up a profile; `None` selects [`DEFAULT_ENVIRONMENT`].
    pub fn get(&self, name: Option<&str>) -> Result<&Environment> {
        let name = name.unwrap_or(DEFAULT_ENVIRONMENT);
        self.entries
            .get(name)
            .ok_or_else(|| Error::Config(format!("no environment named '{name}'")))
    }

    /// Profile names in file order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(SYSTEM_CONFIG_PATH)];
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(USER_CONFIG_FILE));
    }
    paths
}
