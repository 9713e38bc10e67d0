//! Streaming-RPC driver for the IOS XR extensible manageability service.
//!
//! Show output and YANG configuration are server-streamed and reassembled
//! in order; configuration changes are unary calls. Credentials travel as
//! `username`/`password` request metadata.
//!
//! The driver is generic over [`EmsService`] so the wire seam can be
//! replaced; [`EmsStub`] is the tonic implementation used in production.

pub mod proto;
pub mod reply;

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace, warn};
use secrecy::ExposeSecret;
use tonic::metadata::{MetadataMap, MetadataValue};
use tonic::transport::Endpoint;
use tonic::{Code, Request, Status};

use crate::client::command::nest_in_context;
use crate::client::{
    Client, ClientState, Credentials, DataFormat, DriverFactory, GetRequest, Output, RequestKind,
    ResponseCache, SetRequest, YangMode,
};
use crate::error::{Error, Result};

pub use proto::EmsStub;
pub use reply::{PartKind, ReplyPart};

use proto::{CliConfigArgs, ConfigArgs, ConfigGetArgs, ShowCmdArgs};

/// Default EMS port.
pub const DEFAULT_PORT: u16 = 57400;

/// Command used as the liveness probe.
const PROBE_COMMAND: &str = "show clock";

const DATA_FORMATS: &[DataFormat] = &[DataFormat::Cli, DataFormat::Structured, DataFormat::Yang];

/// Outcome of one RPC before translation.
pub type RpcResult<T> = std::result::Result<T, Status>;

/// The EMS operations the driver relies on.
///
/// Streaming calls return every message of the stream; configuration
/// calls return the reply's `errors` text.
#[async_trait]
pub trait EmsService: Send {
    async fn show_text(&mut self, request: Request<ShowCmdArgs>) -> RpcResult<Vec<ReplyPart>>;

    async fn show_json(&mut self, request: Request<ShowCmdArgs>) -> RpcResult<Vec<ReplyPart>>;

    async fn get_config(&mut self, request: Request<ConfigGetArgs>) -> RpcResult<Vec<ReplyPart>>;

    async fn cli_config(&mut self, request: Request<CliConfigArgs>) -> RpcResult<String>;

    async fn merge_config(&mut self, request: Request<ConfigArgs>) -> RpcResult<String>;

    async fn replace_config(&mut self, request: Request<ConfigArgs>) -> RpcResult<String>;

    async fn delete_config(&mut self, request: Request<ConfigArgs>) -> RpcResult<String>;
}

#[async_trait]
impl EmsService for EmsStub {
    async fn show_text(&mut self, request: Request<ShowCmdArgs>) -> RpcResult<Vec<ReplyPart>> {
        let replies = self.show_cmd_text_output(request).await?;
        Ok(replies.into_iter().map(ReplyPart::from).collect())
    }

    async fn show_json(&mut self, request: Request<ShowCmdArgs>) -> RpcResult<Vec<ReplyPart>> {
        let replies = self.show_cmd_json_output(request).await?;
        Ok(replies.into_iter().map(ReplyPart::from).collect())
    }

    async fn get_config(
        &mut self,
        request: Request<ConfigGetArgs>,
    ) -> RpcResult<Vec<ReplyPart>> {
        let replies = EmsStub::get_config(self, request).await?;
        Ok(replies.into_iter().map(ReplyPart::from).collect())
    }

    async fn cli_config(&mut self, request: Request<CliConfigArgs>) -> RpcResult<String> {
        Ok(EmsStub::cli_config(self, request).await?.errors)
    }

    async fn merge_config(&mut self, request: Request<ConfigArgs>) -> RpcResult<String> {
        Ok(EmsStub::merge_config(self, request).await?.errors)
    }

    async fn replace_config(&mut self, request: Request<ConfigArgs>) -> RpcResult<String> {
        Ok(EmsStub::replace_config(self, request).await?.errors)
    }

    async fn delete_config(&mut self, request: Request<ConfigArgs>) -> RpcResult<String> {
        Ok(EmsStub::delete_config(self, request).await?.errors)
    }
}

/// gRPC driver options.
#[derive(Debug, Clone)]
pub struct GrpcConfig {
    /// Port used when the address does not name one.
    pub port: u16,
    /// Address used when no address is given.
    pub local_address: IpAddr,
    /// Per-request deadline.
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            local_address: IpAddr::from([127, 0, 0, 1]),
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl GrpcConfig {
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
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

    /// `host:port` to dial for `address`.
    pub fn target(&self, address: Option<&str>) -> String {
        let Some(address) = address else {
            return SocketAddr::new(self.local_address, self.port).to_string();
        };
        if address.parse::<SocketAddr>().is_ok() {
            return address.to_string();
        }
        if let Ok(ip) = address.parse::<IpAddr>() {
            return SocketAddr::new(ip, self.port).to_string();
        }
        match address.rsplit_once(':') {
            Some((_, port)) if port.parse::<u16>().is_ok() => address.to_string(),
            _ => format!("{}:{}", address, self.port),
        }
    }
}

/// One RPC, rebuilt on every attempt.
#[derive(Debug, Clone, Copy)]
enum Call<'a> {
    ShowText(&'a str),
    ShowJson(&'a str),
    GetConfig(&'a str),
    CliConfig(&'a str),
    Yang(YangMode, &'a str),
}

enum Reply {
    Parts(Vec<ReplyPart>),
    Errors(String),
}

/// Client for one EMS endpoint.
pub struct GrpcClient<S: EmsService = EmsStub> {
    service: S,
    address: Option<String>,
    username: Option<String>,
    metadata: MetadataMap,
    timeout: Duration,
    next_req_id: i64,
    state: ClientState,
    cache: ResponseCache,
}

impl GrpcClient<EmsStub> {
    /// Dial the device, then probe it.
    pub async fn connect(credentials: &Credentials, config: GrpcConfig) -> Result<Self> {
        credentials.validate()?;

        let target = config.target(credentials.address.as_deref());
        debug!("grpc: connecting to {}", target);
        let endpoint = Endpoint::from_shared(format!("http://{target}"))
            .map_err(|e| Error::InvalidArgument(format!("invalid address '{target}': {e}")))?
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout);
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| Error::ConnectionRefused(format!("{target}: {e}")))?;

        Self::with_service(credentials, &config, EmsStub::new(channel)).await
    }
}

impl<S: EmsService> GrpcClient<S> {
    /// Wrap an already-connected service and probe it.
    pub async fn with_service(credentials: &Credentials, config: &GrpcConfig, service: S) -> Result<Self> {
        credentials.validate()?;

        let mut metadata = MetadataMap::new();
        if let (Some(user), Some(pass)) = (&credentials.username, &credentials.password) {
            metadata.insert("username", metadata_value("username", user)?);
            metadata.insert("password", metadata_value("password", pass.expose_secret())?);
        }

        let mut client = Self {
            service,
            address: credentials.address.clone(),
            username: credentials.username.clone(),
            metadata,
            timeout: config.timeout,
            next_req_id: 0,
            state: ClientState::Constructed,
            cache: ResponseCache::new(),
        };

        let parts = client.call(Call::ShowText(PROBE_COMMAND)).await?;
        expect_parts(parts)?;
        client.state = ClientState::Ready;
        Ok(client)
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    fn request<T>(&mut self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        *request.metadata_mut() = self.metadata.clone();
        request.set_timeout(self.timeout);
        request
    }

    fn req_id(&mut self) -> i64 {
        self.next_req_id += 1;
        self.next_req_id
    }

    async fn invoke(&mut self, call: Call<'_>) -> RpcResult<Reply> {
        let req_id = self.req_id();
        match call {
            Call::ShowText(cli) => {
                let request = self.request(ShowCmdArgs {
                    req_id,
                    cli: cli.to_string(),
                });
                self.service.show_text(request).await.map(Reply::Parts)
            }
            Call::ShowJson(cli) => {
                let request = self.request(ShowCmdArgs {
                    req_id,
                    cli: cli.to_string(),
                });
                self.service.show_json(request).await.map(Reply::Parts)
            }
            Call::GetConfig(path) => {
                let request = self.request(ConfigGetArgs {
                    req_id,
                    yangpathjson: path.to_string(),
                });
                self.service.get_config(request).await.map(Reply::Parts)
            }
            Call::CliConfig(cli) => {
                let request = self.request(CliConfigArgs {
                    req_id,
                    cli: cli.to_string(),
                    confirmed: false,
                    confirm_timeout: 0,
                });
                self.service.cli_config(request).await.map(Reply::Errors)
            }
            Call::Yang(mode, payload) => {
                let request = self.request(ConfigArgs {
                    req_id,
                    yangjson: payload.to_string(),
                    confirmed: false,
                    confirm_timeout: 0,
                });
                let reply = match mode {
                    YangMode::Merge => self.service.merge_config(request).await,
                    YangMode::Replace => self.service.replace_config(request).await,
                    YangMode::Delete => self.service.delete_config(request).await,
                };
                reply.map(Reply::Errors)
            }
        }
    }

    /// Issue a call, retrying once if the stream ended early.
    async fn call(&mut self, call: Call<'_>) -> Result<Reply> {
        debug!("grpc: {:?}", call);
        let mut retried = false;
        loop {
            match self.invoke(call).await {
                Ok(reply) => return Ok(reply),
                Err(status) if !retried && is_end_of_stream(&status) => {
                    warn!("grpc: stream ended early ({}), retrying once", status.message());
                    retried = true;
                }
                Err(status) => return Err(status_error(&status, self.state)),
            }
        }
    }

    async fn show(&mut self, format: DataFormat, command: &str) -> Result<Output> {
        let (call, kind) = match format {
            DataFormat::Cli => (Call::ShowText(command), PartKind::Text),
            DataFormat::Structured => (Call::ShowJson(command), PartKind::Json),
            DataFormat::Yang => (Call::GetConfig(command), PartKind::Config),
        };
        let parts = expect_parts(self.call(call).await?)?;
        let assembled = reply::assemble(kind, parts)?;
        trace!("grpc: reply {:?}", assembled);
        reply::check_show_errors(command, &assembled.errors)?;

        match format {
            DataFormat::Cli => {
                let text = reply::show_text(command, &assembled.output)?;
                Ok(if text.trim().is_empty() {
                    Output::Empty
                } else {
                    Output::Text(text)
                })
            }
            _ => Ok(reply::parse_json(command, &assembled.output)?
                .map_or(Output::Empty, Output::Structured)),
        }
    }
}

fn expect_parts(reply: Reply) -> Result<Vec<ReplyPart>> {
    match reply {
        Reply::Parts(parts) => Ok(parts),
        Reply::Errors(_) => Err(Error::Client("expected a streamed reply".into())),
    }
}

fn expect_errors(reply: Reply) -> Result<String> {
    match reply {
        Reply::Errors(errors) => Ok(errors),
        Reply::Parts(_) => Err(Error::Client("expected a unary reply".into())),
    }
}

fn metadata_value(name: &str, value: &str) -> Result<MetadataValue<tonic::metadata::Ascii>> {
    MetadataValue::try_from(value)
        .map_err(|_| Error::InvalidArgument(format!("{name} contains characters not allowed in metadata")))
}

/// Whether the server closed the stream without a proper status.
fn is_end_of_stream(status: &Status) -> bool {
    if !matches!(status.code(), Code::Unknown | Code::Internal | Code::Unavailable) {
        return false;
    }
    let message = status.message().to_lowercase();
    message.contains("end of stream") || message.contains("eof")
}

/// Map an RPC status into the error taxonomy.
fn status_error(status: &Status, state: ClientState) -> Error {
    let message = status.message().to_string();
    match status.code() {
        Code::Unavailable => Error::ConnectionRefused(message),
        Code::DeadlineExceeded => match state {
            ClientState::Constructed => Error::ConnectionRefused(message),
            ClientState::Ready => Error::Client(format!("deadline exceeded: {message}")),
        },
        Code::Unauthenticated | Code::PermissionDenied => Error::AuthenticationFailed(message),
        _ if message.to_lowercase().contains("authentication") => {
            Error::AuthenticationFailed(message)
        }
        Code::Unimplemented => Error::RequestNotSupported(message),
        code => Error::Client(format!("{code:?}: {message}")),
    }
}

#[async_trait]
impl<S: EmsService + 'static> Client for GrpcClient<S> {
    fn driver_name(&self) -> &'static str {
        "grpc"
    }

    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    fn platform(&self) -> &str {
        "ios_xr"
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
        match request.data_format {
            DataFormat::Cli => {
                let commands = nest_in_context(&request.context, &request.values);
                if commands.is_empty() {
                    return Err(Error::InvalidArgument(
                        "set requires at least one context or value command".into(),
                    ));
                }
                let cli = commands.join("\n");
                let errors = expect_errors(self.call(Call::CliConfig(&cli)).await?)?;
                reply::check_cli_config_errors(&commands, &errors)
            }
            DataFormat::Yang => {
                let payload = request.values.join("\n");
                if payload.trim().is_empty() {
                    return Err(Error::InvalidArgument("YANG set requires a payload".into()));
                }
                let errors =
                    expect_errors(self.call(Call::Yang(request.yang_mode, &payload)).await?)?;
                reply::check_yang_errors(&payload, &errors)
            }
            DataFormat::Structured => Err(Error::RequestNotSupported(
                "grpc driver applies configuration as CLI or YANG only".into(),
            )),
        }
    }

    async fn execute_get(&mut self, request: &GetRequest) -> Result<Output> {
        let kind = match request.data_format {
            DataFormat::Cli => RequestKind::ShowText,
            DataFormat::Structured => RequestKind::ShowStructured,
            DataFormat::Yang => RequestKind::Yang,
        };
        if let Some(hit) = self.cache.lookup(kind, &request.command) {
            return Ok(hit.clone());
        }

        let output = self.show(request.data_format, &request.command).await?;
        self.cache.store(kind, &request.command, &output);
        Ok(output)
    }
}

/// Registry entry for [`GrpcClient`].
#[derive(Debug, Clone, Default)]
pub struct GrpcDriver {
    config: GrpcConfig,
}

impl GrpcDriver {
    pub fn new(config: GrpcConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DriverFactory for GrpcDriver {
    fn name(&self) -> &'static str {
        "grpc"
    }

    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn Client>> {
        let client = GrpcClient::connect(credentials, self.config.clone()).await?;
        Ok(Box::new(client))
    }
}
