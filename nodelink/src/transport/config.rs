//! SSH connection settings.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// Host key checking, after OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostKeyVerification {
    /// Only hosts already in known_hosts are accepted.
    Strict,

    /// Unknown hosts are learned; changed keys are still rejected.
    #[default]
    AcceptNew,

    /// No checking. Lab use only.
    Disabled,
}

/// How the session authenticates.
#[derive(Clone)]
pub enum AuthMethod {
    Password(SecretString),
    PrivateKey {
        path: PathBuf,
        passphrase: Option<SecretString>,
    },
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::PrivateKey { path, .. } => f.debug_struct("PrivateKey").field("path", path).finish(),
        }
    }
}

/// Everything needed to open one SSH session.
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: AuthMethod,
    /// Deadline for TCP connect plus key exchange.
    pub connect_timeout: Duration,
    pub keepalive: Option<Duration>,
    pub host_key_verification: HostKeyVerification,
    /// Defaults to the user's `~/.ssh/known_hosts`.
    pub known_hosts_path: Option<PathBuf>,
}

impl SshConfig {
    /// `host:port`, bracketing IPv6 literals.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str) -> SshConfig {
        SshConfig {
            host: host.into(),
            port: 830,
            username: "admin".into(),
            auth: AuthMethod::Password(SecretString::from("hunter2".to_string())),
            connect_timeout: Duration::from_secs(30),
            keepalive: None,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }

    #[test]
    fn test_address() {
        assert_eq!(config("r1.lab").address(), "r1.lab:830");
        assert_eq!(config("2001:db8::1").address(), "[2001:db8::1]:830");
    }

    #[test]
    fn test_debug_hides_password() {
        let rendered = format!("{:?}", config("r1"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
