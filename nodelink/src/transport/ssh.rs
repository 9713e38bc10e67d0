//! russh client session.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use russh::Channel;
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use secrecy::ExposeSecret;

use super::TransportError;
use super::config::{AuthMethod, HostKeyVerification, SshConfig};

/// An authenticated SSH connection.
pub struct SshTransport {
    session: Handle<HostKeyCheck>,
    address: String,
}

impl SshTransport {
    /// Connect, verify the host key and authenticate.
    pub async fn connect(config: &SshConfig) -> Result<Self, TransportError> {
        let address = config.address();
        let rejection = Arc::new(Mutex::new(None));
        let handler = HostKeyCheck {
            host: config.host.clone(),
            port: config.port,
            mode: config.host_key_verification,
            known_hosts: config.known_hosts_path.clone(),
            rejection: rejection.clone(),
        };
        let russh_config = Arc::new(client::Config {
            keepalive_interval: config.keepalive,
            ..Default::default()
        });

        debug!("ssh: connecting to {address}");
        let connecting = client::connect(russh_config, (config.host.as_str(), config.port), handler);
        let mut session = tokio::time::timeout(config.connect_timeout, connecting)
            .await
            .map_err(|_| TransportError::HandshakeTimeout {
                address: address.clone(),
                after: config.connect_timeout,
            })?
            .map_err(|source| {
                // A host key refusal surfaces from russh as a generic error.
                let stored = rejection.lock().ok().and_then(|mut slot| slot.take());
                stored.unwrap_or_else(|| TransportError::Unreachable {
                    address: address.clone(),
                    source,
                })
            })?;

        if !authenticate(&mut session, config).await? {
            return Err(TransportError::AuthenticationFailed {
                address,
                user: config.username.clone(),
            });
        }
        debug!("ssh: authenticated to {address} as {}", config.username);

        Ok(Self { session, address })
    }

    /// Open a session channel with a PTY and an interactive shell.
    pub async fn open_shell(&self, width: u32, height: u32) -> Result<Channel<Msg>, TransportError> {
        let channel = self.session.channel_open_session().await?;
        channel
            .request_pty(true, "vt100", width, height, 0, 0, &[])
            .await?;
        channel.request_shell(true).await?;
        Ok(channel)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn close(&self) -> Result<(), TransportError> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

async fn authenticate(
    session: &mut Handle<HostKeyCheck>,
    config: &SshConfig,
) -> Result<bool, TransportError> {
    let result = match &config.auth {
        AuthMethod::Password(password) => {
            session
                .authenticate_password(&config.username, password.expose_secret())
                .await?
        }
        AuthMethod::PrivateKey { path, passphrase } => {
            let passphrase = passphrase.as_ref().map(|p| p.expose_secret());
            let key = load_secret_key(path, passphrase)
                .map_err(|e| TransportError::Key(format!("{}: {e}", path.display())))?;
            let hash_alg = session.best_supported_rsa_hash().await?.flatten();
            session
                .authenticate_publickey(
                    &config.username,
                    PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                )
                .await?
        }
    };
    Ok(result.success())
}

/// russh handler that checks the server key against known_hosts.
struct HostKeyCheck {
    host: String,
    port: u16,
    mode: HostKeyVerification,
    known_hosts: Option<PathBuf>,
    /// Why the key was refused, read back by `connect`.
    rejection: Arc<Mutex<Option<TransportError>>>,
}

impl HostKeyCheck {
    fn verify(&self, key: &PublicKey) -> Result<(), TransportError> {
        if self.mode == HostKeyVerification::Disabled {
            return Ok(());
        }

        if self.is_known(key)? {
            return Ok(());
        }
        match self.mode {
            HostKeyVerification::AcceptNew => {
                if let Err(e) = self.learn(key) {
                    warn!("ssh: could not record host key for {}: {e}", self.host);
                }
                Ok(())
            }
            _ => Err(TransportError::HostKeyUnknown {
                host: self.host.clone(),
                port: self.port,
            }),
        }
    }

    fn is_known(&self, key: &PublicKey) -> Result<bool, TransportError> {
        let found = match &self.known_hosts {
            Some(path) => russh::keys::check_known_hosts_path(&self.host, self.port, key, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, key),
        };
        found.map_err(|e| match e {
            russh::keys::Error::KeyChanged { line } => TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            },
            other => TransportError::KnownHosts(other.to_string()),
        })
    }

    fn learn(&self, key: &PublicKey) -> Result<(), TransportError> {
        let learned = match &self.known_hosts {
            Some(path) => {
                russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, key, path)
            }
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, key),
        };
        learned.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }
}

impl client::Handler for HostKeyCheck {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        match self.verify(server_public_key) {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!("ssh: {e}");
                if let Ok(mut slot) = self.rejection.lock() {
                    *slot = Some(e);
                }
                Ok(false)
            }
        }
    }
}
