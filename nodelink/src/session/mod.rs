//! Interactive CLI session driver over SSH.
//!
//! Commands are typed into a PTY shell and their output is read back up to
//! the next prompt. Configuration is entered by walking the platform's
//! privilege graph into configuration mode; the session then returns to
//! the level it started from.
//!
//! ```no_run
//! use nodelink::session::{CliClient, SessionConfig};
//! use nodelink::{Client, Credentials, GetRequest, SetRequest};
//!
//! # async fn run() -> nodelink::Result<()> {
//! let creds = Credentials::remote("n9k-01:22", "admin", "admin");
//! let mut client = CliClient::connect(&creds, SessionConfig::default()).await?;
//! client.set(SetRequest::cli("description uplink").context("interface ethernet1/1")).await?;
//! let clock = client.get(GetRequest::cli("show clock")).await?;
//! # Ok(())
//! # }
//! ```

mod driver;
mod privilege;
mod response;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use secrecy::SecretString;

pub use crate::transport::HostKeyVerification;
pub use response::Response;

use crate::channel::PtyChannel;
use crate::client::command::context_then_values;
use crate::client::{
    Client, ClientState, Credentials, DataFormat, DriverFactory, GetRequest, Output, RequestKind,
    ResponseCache, SetRequest,
};
use crate::error::{CliFailure, Error, RequestFailure, Result};
use crate::platform::PlatformRegistry;
use crate::transport::{AuthMethod, SshConfig, SshTransport};
use driver::CliSession;

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_PLATFORM: &str = "cisco_nxos";

const DATA_FORMATS: &[DataFormat] = &[DataFormat::Cli];

/// Session driver settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// SSH port used when the address names none.
    pub port: u16,
    /// Key into the [`PlatformRegistry`].
    pub platform: String,
    /// Limit on TCP connect plus SSH handshake.
    pub connect_timeout: Duration,
    /// Per-command wait for the next prompt.
    pub timeout: Duration,
    /// SSH keepalive interval; `None` disables keepalives.
    pub keepalive: Option<Duration>,
    pub host_key_verification: HostKeyVerification,
    pub known_hosts_path: Option<PathBuf>,
    /// Authenticate with this key instead of the password.
    pub private_key: Option<PathBuf>,
    pub key_passphrase: Option<SecretString>,
    /// Answer for escalation prompts. The login password when unset.
    pub enable_secret: Option<SecretString>,
    /// Bytes of output scanned for a prompt.
    pub search_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            platform: DEFAULT_PLATFORM.into(),
            connect_timeout: Duration::from_secs(30),
            timeout: Duration::from_secs(300),
            keepalive: Some(Duration::from_secs(30)),
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            private_key: None,
            key_passphrase: None,
            enable_secret: None,
            search_depth: 1000,
        }
    }
}

impl SessionConfig {
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn platform(mut self, name: impl Into<String>) -> Self {
        self.platform = name.into();
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

    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn private_key(mut self, path: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        self.private_key = Some(path.into());
        self.key_passphrase = passphrase.map(SecretString::from);
        self
    }

    pub fn enable_secret(mut self, secret: impl Into<String>) -> Self {
        self.enable_secret = Some(SecretString::from(secret.into()));
        self
    }

    fn auth(&self, password: &SecretString) -> AuthMethod {
        match &self.private_key {
            Some(path) => AuthMethod::PrivateKey {
                path: path.clone(),
                passphrase: self.key_passphrase.clone(),
            },
            None => AuthMethod::Password(password.clone()),
        }
    }
}

/// Split `host[:port]`, accepting bare and bracketed IPv6 literals.
fn split_address(address: &str, default_port: u16) -> Result<(String, u16)> {
    if let Ok(socket) = address.parse::<SocketAddr>() {
        return Ok((socket.ip().to_string(), socket.port()));
    }
    if let Ok(ip) = address.trim_matches(['[', ']']).parse::<IpAddr>() {
        return Ok((ip.to_string(), default_port));
    }
    match address.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| Error::InvalidArgument(format!("invalid port in address '{address}'")))?;
            Ok((host.to_string(), port))
        }
        None => Ok((address.to_string(), default_port)),
    }
}

/// Client driving one device's CLI over SSH.
///
/// Unlike the HTTP and RPC drivers, an end-of-stream is not retried: the
/// shell's mode state is lost with the channel, so the call fails with
/// [`Error::Client`] and a new client must be created.
pub struct CliClient {
    session: CliSession,
    transport: Option<SshTransport>,
    address: String,
    username: String,
    state: ClientState,
    cache: ResponseCache,
}

impl CliClient {
    /// Log in, open a shell and wait for the first prompt.
    pub async fn connect(credentials: &Credentials, config: SessionConfig) -> Result<Self> {
        credentials.validate()?;
        let (Some(address), Some(username), Some(password)) =
            (&credentials.address, &credentials.username, &credentials.password)
        else {
            return Err(Error::InvalidArgument(
                "the cli driver has no local mode; an address is required".into(),
            ));
        };

        let platform = PlatformRegistry::lookup(&config.platform)?;
        let (host, port) = split_address(address, config.port)?;
        let ssh = SshConfig {
            host,
            port,
            username: username.clone(),
            auth: config.auth(password),
            connect_timeout: config.connect_timeout,
            keepalive: config.keepalive,
            host_key_verification: config.host_key_verification,
            known_hosts_path: config.known_hosts_path.clone(),
        };

        let transport = SshTransport::connect(&ssh).await?;
        let channel = transport
            .open_shell(platform.terminal_width, platform.terminal_height)
            .await?;
        let shell = PtyChannel::new(channel, config.search_depth);
        let secret = config.enable_secret.clone().or_else(|| Some(password.clone()));
        let session = CliSession::new(Box::new(shell), platform, config.timeout, secret)?;

        Self::start(session, Some(transport), address, username).await
    }

    async fn start(
        session: CliSession,
        transport: Option<SshTransport>,
        address: &str,
        username: &str,
    ) -> Result<Self> {
        let mut client = Self {
            session,
            transport,
            address: address.to_string(),
            username: username.to_string(),
            state: ClientState::Constructed,
            cache: ResponseCache::new(),
        };

        debug!("cli: waiting for the first prompt from {address}");
        if let Err(e) = client.session.open().await {
            return Err(client.classify(e));
        }
        client.state = ClientState::Ready;
        Ok(client)
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Privilege level the session is currently at.
    pub fn privilege_level(&self) -> Option<&str> {
        self.session.current_level()
    }

    /// Until the first prompt arrives the device is not usable at all.
    fn classify(&self, err: Error) -> Error {
        match (self.state, err) {
            (ClientState::Constructed, Error::Client(message)) => Error::ConnectionRefused(message),
            (_, err) => err,
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.session.close().await?;
        if let Some(transport) = self.transport.take() {
            transport.close().await?;
        }
        Ok(())
    }

    /// Enter every command, then commit where the platform stages changes.
    async fn apply(&mut self, commands: &[String]) -> Result<()> {
        let staged = self.session.platform().commit_command.is_some();
        for (index, command) in commands.iter().enumerate() {
            let response = self.session.send_command(command).await?;
            if !response.is_success() {
                let successful = if staged { Vec::new() } else { commands[..index].to_vec() };
                return Err(Error::Cli(CliFailure {
                    rejected_input: vec![command.clone()],
                    clierror: response.output,
                    successful_input: successful,
                }));
            }
        }

        if let Some(commit) = self.session.platform().commit_command.clone() {
            let response = self.session.send_command(&commit).await?;
            if !response.is_success() {
                return Err(Error::RequestFailed(
                    RequestFailure::new(response.output).with_rejected(commands.to_vec()),
                ));
            }
        }
        Ok(())
    }

    /// Discard staged changes and return to `level` after a failed set.
    async fn abandon(&mut self, level: &str) -> Result<()> {
        if let Some(abort) = self.session.platform().abort_command.clone() {
            self.session.send_command(&abort).await?;
        }
        self.session.acquire_privilege(level).await
    }
}

#[async_trait]
impl Client for CliClient {
    fn driver_name(&self) -> &'static str {
        "cli"
    }

    fn address(&self) -> Option<&str> {
        Some(&self.address)
    }

    fn username(&self) -> Option<&str> {
        Some(&self.username)
    }

    fn platform(&self) -> &str {
        &self.session.platform().tag
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
        let commands = context_then_values(&request.context, &request.values);
        if commands.is_empty() {
            return Err(Error::InvalidArgument(
                "set requires at least one context or value command".into(),
            ));
        }

        let platform = self.session.platform();
        let config_level = platform.config_privilege.clone();
        let home = self
            .session
            .current_level()
            .map(str::to_string)
            .unwrap_or_else(|| platform.exec_privilege.clone());

        self.session.acquire_privilege(&config_level).await?;
        match self.apply(&commands).await {
            Ok(()) => self.session.acquire_privilege(&home).await,
            Err(e) => {
                if let Err(cleanup) = self.abandon(&home).await {
                    warn!("cli: could not leave configuration mode after a failed set: {cleanup}");
                }
                Err(e)
            }
        }
    }

    async fn execute_get(&mut self, request: &GetRequest) -> Result<Output> {
        if let Some(hit) = self.cache.lookup(RequestKind::ShowText, &request.command) {
            return Ok(hit.clone());
        }

        let exec_level = self.session.platform().exec_privilege.clone();
        self.session.acquire_privilege(&exec_level).await?;
        let response = self.session.send_command(&request.command).await?;
        if !response.is_success() {
            return Err(Error::Cli(CliFailure::new(&request.command, response.output)));
        }

        let output = if response.output.trim().is_empty() {
            Output::Empty
        } else {
            Output::Text(response.output)
        };
        self.cache.store(RequestKind::ShowText, &request.command, &output);
        Ok(output)
    }
}

/// Factory for [`CliClient`], registered as `cli`.
#[derive(Debug, Clone, Default)]
pub struct CliDriver {
    config: SessionConfig,
}

impl CliDriver {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DriverFactory for CliDriver {
    fn name(&self) -> &'static str {
        "cli"
    }

    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn Client>> {
        let client = CliClient::connect(credentials, self.config.clone()).await?;
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use regex::bytes::Regex;

    use super::*;
    use crate::channel::Shell;
    use crate::error::ErrorKind;
    use crate::platform::PlatformDefinition;
    use crate::platform::vendors::{iosxr, nxos};
    use crate::transport::TransportError;

    /// Scripted device: tracks its mode from the commands it receives.
    struct FakeShell {
        hostname: &'static str,
        mode: &'static str,
        replies: HashMap<String, String>,
        hang_up_on: Option<String>,
        hung_up: bool,
        awaiting_secret: bool,
        pending: String,
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl FakeShell {
        fn new(hostname: &'static str, mode: &'static str) -> Self {
            Self {
                hostname,
                mode,
                replies: HashMap::new(),
                hang_up_on: None,
                hung_up: false,
                awaiting_secret: false,
                pending: format!("Cisco device\n{hostname}{mode} "),
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn reply(mut self, command: &str, output: &str) -> Self {
            self.replies.insert(command.into(), output.into());
            self
        }

        fn silent(mut self) -> Self {
            self.pending.clear();
            self
        }

        fn hang_up_on(mut self, command: &str) -> Self {
            self.hang_up_on = Some(command.into());
            self
        }
    }

    #[async_trait]
    impl Shell for FakeShell {
        async fn send(&mut self, line: &str) -> std::result::Result<(), TransportError> {
            self.sent.lock().unwrap().push(line.to_string());
            if self.hang_up_on.as_deref() == Some(line) {
                self.hung_up = true;
                return Ok(());
            }

            if self.awaiting_secret {
                self.awaiting_secret = false;
                if line == "s3cret" {
                    self.mode = "#";
                    self.pending = format!("\n{}# ", self.hostname);
                } else {
                    self.pending = format!("\n% Permission denied\n{}> ", self.hostname);
                }
                return Ok(());
            }

            let mut reply = self.replies.get(line).cloned().unwrap_or_default();
            match line {
                "enable" => {
                    self.awaiting_secret = true;
                    self.pending = "enable\nPassword: ".into();
                    return Ok(());
                }
                "configure terminal" => {
                    self.mode = "(config)#";
                    reply = "Enter configuration commands, one per line.".into();
                }
                "end" | "abort" => self.mode = "#",
                _ => {}
            }
            if !reply.is_empty() && !reply.ends_with('\n') {
                reply.push('\n');
            }
            self.pending = format!("{line}\n{reply}{}{} ", self.hostname, self.mode);
            Ok(())
        }

        async fn read_until(
            &mut self,
            pattern: &Regex,
            timeout: Duration,
        ) -> std::result::Result<String, TransportError> {
            if self.hung_up {
                return Err(TransportError::Disconnected);
            }
            if self.pending.is_empty() || !pattern.is_match(self.pending.as_bytes()) {
                return Err(TransportError::PromptTimeout(timeout));
            }
            Ok(std::mem::take(&mut self.pending))
        }

        async fn close(&mut self) -> std::result::Result<(), TransportError> {
            Ok(())
        }
    }

    async fn client(platform: PlatformDefinition, shell: FakeShell) -> (Result<CliClient>, Arc<Mutex<Vec<String>>>) {
        let sent = shell.sent.clone();
        let secret = Some(SecretString::from("s3cret".to_string()));
        let session = CliSession::new(Box::new(shell), platform, Duration::from_secs(1), secret).unwrap();
        (CliClient::start(session, None, "n9k-01", "admin").await, sent)
    }

    fn sent_after_login(sent: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        sent.lock().unwrap().iter().skip(2).cloned().collect()
    }

    #[tokio::test]
    async fn test_start_prepares_terminal() {
        let (client, sent) = client(nxos::platform(), FakeShell::new("n9k-01", "#")).await;
        let client = client.unwrap();
        assert_eq!(client.state(), ClientState::Ready);
        assert_eq!(client.platform(), "nexus");
        assert_eq!(client.privilege_level(), Some("privilege_exec"));
        assert_eq!(*sent.lock().unwrap(), ["terminal length 0", "terminal width 511"]);
    }

    #[tokio::test]
    async fn test_silent_device_is_refused() {
        let (client, _) = client(nxos::platform(), FakeShell::new("n9k-01", "#").silent()).await;
        assert_eq!(client.err().map(|e| e.kind()), Some(ErrorKind::ConnectionRefused));
    }

    #[tokio::test]
    async fn test_get_is_cached() {
        let shell = FakeShell::new("n9k-01", "#").reply("show clock", "12:00:00.000 UTC Sat Oct 17 2026");
        let (client, sent) = client(nxos::platform(), shell).await;
        let mut client = client.unwrap();

        let first = client.get(GetRequest::cli("show clock")).await.unwrap();
        let second = client.get(GetRequest::cli("show clock")).await.unwrap();
        assert_eq!(first, Output::Text("12:00:00.000 UTC Sat Oct 17 2026".into()));
        assert_eq!(first, second);
        assert_eq!(sent_after_login(&sent), ["show clock"]);
    }

    #[tokio::test]
    async fn test_get_applies_filters() {
        let shell = FakeShell::new("n9k-01", "#").reply(
            "show running-config",
            "hostname n9k-01\nrouter bgp 65000\n  router-id 10.0.0.1\n",
        );
        let (client, _) = client(nxos::platform(), shell).await;
        let output = client
            .unwrap()
            .get(
                GetRequest::cli("show running-config")
                    .context("router bgp 65000")
                    .value(r"/router-id (\S+)/"),
            )
            .await
            .unwrap();
        assert_eq!(output, Output::Values(vec!["10.0.0.1".into()]));
    }

    #[tokio::test]
    async fn test_invalid_show_is_cli_error() {
        let shell = FakeShell::new("n9k-01", "#").reply("show bogus", "              ^\n% Invalid command at '^' marker.");
        let (client, _) = client(nxos::platform(), shell).await;
        let err = client.unwrap().get(GetRequest::cli("show bogus")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cli);
        assert_eq!(err.rejected_input(), ["show bogus".to_string()]);
    }

    #[tokio::test]
    async fn test_structured_not_supported() {
        let (client, sent) = client(nxos::platform(), FakeShell::new("n9k-01", "#")).await;
        let err = client
            .unwrap()
            .get(GetRequest::structured("show version"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequestNotSupported);
        assert!(sent_after_login(&sent).is_empty());
    }

    #[tokio::test]
    async fn test_set_enters_and_leaves_config_mode() {
        let (client, sent) = client(nxos::platform(), FakeShell::new("n9k-01", "#")).await;
        let mut client = client.unwrap();
        client
            .set(SetRequest::cli("description uplink").context("interface ethernet1/1"))
            .await
            .unwrap();
        assert_eq!(
            sent_after_login(&sent),
            ["configure terminal", "interface ethernet1/1", "description uplink", "end"]
        );
        assert_eq!(client.privilege_level(), Some("privilege_exec"));
    }

    #[tokio::test]
    async fn test_set_rejection_attribution() {
        let shell = FakeShell::new("n9k-01", "#").reply("c2", "% Invalid command at '^' marker.");
        let (client, sent) = client(nxos::platform(), shell).await;
        let mut client = client.unwrap();

        let err = client.set(SetRequest::cli(["c1", "c2", "c3"])).await.unwrap_err();
        match err {
            Error::Cli(failure) => {
                assert_eq!(failure.rejected_input, ["c2"]);
                assert_eq!(failure.successful_input, ["c1"]);
                assert!(failure.clierror.contains("Invalid command"));
            }
            other => panic!("expected CLI error, got {other:?}"),
        }
        assert_eq!(sent_after_login(&sent), ["configure terminal", "c1", "c2", "end"]);
        assert_eq!(client.privilege_level(), Some("privilege_exec"));
    }

    #[tokio::test]
    async fn test_two_stage_commit() {
        let shell = FakeShell::new("RP/0/RP0/CPU0:xr", "#");
        let (client, sent) = client(iosxr::platform(), shell).await;
        let mut client = client.unwrap();
        assert_eq!(client.platform(), "ios_xr");

        client.set(SetRequest::cli("hostname xr2")).await.unwrap();
        assert_eq!(
            sent_after_login(&sent),
            ["configure terminal", "hostname xr2", "commit", "end"]
        );
    }

    #[tokio::test]
    async fn test_failed_commit_is_aborted() {
        let shell = FakeShell::new("RP/0/RP0/CPU0:xr", "#").reply(
            "commit",
            "% Failed to commit one or more configuration items during a pseudo-atomic operation.",
        );
        let (client, sent) = client(iosxr::platform(), shell).await;
        let mut client = client.unwrap();

        let err = client
            .set(SetRequest::cli(["router ospf 1", "area 0"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequestFailed);
        assert_eq!(err.rejected_input(), ["router ospf 1".to_string(), "area 0".to_string()]);
        assert_eq!(
            sent_after_login(&sent),
            ["configure terminal", "router ospf 1", "area 0", "commit", "abort"]
        );
        assert_eq!(client.privilege_level(), Some("privilege_exec"));
    }

    #[tokio::test]
    async fn test_staged_rejection_applies_nothing() {
        let shell = FakeShell::new("RP/0/RP0/CPU0:xr", "#").reply("bogus", "% Invalid input detected at '^' marker.");
        let (client, _) = client(iosxr::platform(), shell).await;
        let err = client
            .unwrap()
            .set(SetRequest::cli(["hostname xr2", "bogus"]))
            .await
            .unwrap_err();
        assert_eq!(err.rejected_input(), ["bogus".to_string()]);
        assert!(err.successful_input().is_empty());
    }

    #[tokio::test]
    async fn test_escalation_answers_secret() {
        let shell = FakeShell::new("n9k-01", ">").reply("show clock", "12:00");
        let (client, sent) = client(nxos::platform(), shell).await;
        let mut client = client.unwrap();
        assert_eq!(client.privilege_level(), Some("exec"));

        client.get(GetRequest::cli("show clock")).await.unwrap();
        assert_eq!(sent_after_login(&sent), ["enable", "s3cret", "show clock"]);
        assert_eq!(client.privilege_level(), Some("privilege_exec"));
    }

    #[tokio::test]
    async fn test_hang_up_is_terminal() {
        let shell = FakeShell::new("n9k-01", "#").hang_up_on("show tech-support");
        let (client, sent) = client(nxos::platform(), shell).await;
        let err = client
            .unwrap()
            .get(GetRequest::cli("show tech-support"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Client);
        assert_eq!(sent_after_login(&sent), ["show tech-support"]);
    }

    #[tokio::test]
    async fn test_local_mode_rejected() {
        let err = CliClient::connect(&Credentials::local(), SessionConfig::default())
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_unknown_platform() {
        let creds = Credentials::remote("n9k-01", "admin", "admin");
        let err = CliClient::connect(&creds, SessionConfig::default().platform("vax_vms"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_split_address() {
        assert_eq!(split_address("r1", 22).unwrap(), ("r1".to_string(), 22));
        assert_eq!(split_address("r1:2222", 22).unwrap(), ("r1".to_string(), 2222));
        assert_eq!(split_address("10.0.0.1:830", 22).unwrap(), ("10.0.0.1".to_string(), 830));
        assert_eq!(split_address("2001:db8::1", 22).unwrap(), ("2001:db8::1".to_string(), 22));
        assert_eq!(split_address("[2001:db8::1]:2222", 22).unwrap(), ("2001:db8::1".to_string(), 2222));
        assert!(matches!(split_address("r1:ssh", 22), Err(Error::InvalidArgument(_))));
    }
}
