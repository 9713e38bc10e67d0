//! Messages and client stub for the IOS XR extensible manageability service.
//!
//! Declared by hand with `prost` derives; only the RPCs the driver uses are
//! covered.

use http::uri::PathAndQuery;
use tonic::codec::ProstCodec;
use tonic::transport::Channel;
use tonic::{Request, Status};

const SHOW_TEXT: &str = "/IOSXRExtensibleManagabilityService.gRPCExec/ShowCmdTextOutput";
const SHOW_JSON: &str = "/IOSXRExtensibleManagabilityService.gRPCExec/ShowCmdJSONOutput";
const GET_CONFIG: &str = "/IOSXRExtensibleManagabilityService.gRPCConfigOper/GetConfig";
const CLI_CONFIG: &str = "/IOSXRExtensibleManagabilityService.gRPCConfigOper/CliConfig";
const MERGE_CONFIG: &str = "/IOSXRExtensibleManagabilityService.gRPCConfigOper/MergeConfig";
const REPLACE_CONFIG: &str = "/IOSXRExtensibleManagabilityService.gRPCConfigOper/ReplaceConfig";
const DELETE_CONFIG: &str = "/IOSXRExtensibleManagabilityService.gRPCConfigOper/DeleteConfig";

#[derive(Clone, PartialEq, prost::Message)]
pub struct ShowCmdArgs {
    #[prost(int64, tag = "1")]
    pub req_id: i64,
    #[prost(string, tag = "2")]
    pub cli: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ShowCmdTextReply {
    #[prost(int64, tag = "1")]
    pub res_req_id: i64,
    #[prost(string, tag = "2")]
    pub output: String,
    #[prost(string, tag = "3")]
    pub errors: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ShowCmdJsonReply {
    #[prost(int64, tag = "1")]
    pub res_req_id: i64,
    #[prost(string, tag = "2")]
    pub jsonoutput: String,
    #[prost(string, tag = "3")]
    pub errors: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConfigGetArgs {
    #[prost(int64, tag = "1")]
    pub req_id: i64,
    #[prost(string, tag = "2")]
    pub yangpathjson: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConfigGetReply {
    #[prost(int64, tag = "1")]
    pub res_req_id: i64,
    #[prost(string, tag = "2")]
    pub yangjson: String,
    #[prost(string, tag = "3")]
    pub errors: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConfigArgs {
    #[prost(int64, tag = "1")]
    pub req_id: i64,
    #[prost(string, tag = "2")]
    pub yangjson: String,
    #[prost(bool, tag = "3")]
    pub confirmed: bool,
    #[prost(uint32, tag = "4")]
    pub confirm_timeout: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConfigReply {
    #[prost(int64, tag = "1")]
    pub res_req_id: i64,
    #[prost(string, tag = "2")]
    pub errors: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CliConfigArgs {
    #[prost(int64, tag = "1")]
    pub req_id: i64,
    #[prost(string, tag = "2")]
    pub cli: String,
    #[prost(bool, tag = "3")]
    pub confirmed: bool,
    #[prost(uint32, tag = "4")]
    pub confirm_timeout: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CliConfigReply {
    #[prost(int64, tag = "1")]
    pub res_req_id: i64,
    #[prost(string, tag = "2")]
    pub errors: String,
}

/// Client stub over a tonic channel.
#[derive(Debug, Clone)]
pub struct EmsStub {
    inner: tonic::client::Grpc<Channel>,
}

impl EmsStub {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    async fn ready(&mut self) -> Result<(), Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| Status::unknown(format!("service was not ready: {e}")))
    }

    /// Server-streaming call, collected into a vector.
    async fn streaming<Req, Rep>(
        &mut self,
        path: &'static str,
        request: Request<Req>,
    ) -> Result<Vec<Rep>, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Rep: prost::Message + Default + Send + Sync + 'static,
    {
        self.ready().await?;
        let codec: ProstCodec<Req, Rep> = ProstCodec::default();
        let mut stream = self
            .inner
            .server_streaming(request, PathAndQuery::from_static(path), codec)
            .await?
            .into_inner();

        let mut replies = Vec::new();
        while let Some(reply) = stream.message().await? {
            replies.push(reply);
        }
        Ok(replies)
    }

    async fn unary<Req, Rep>(&mut self, path: &'static str, request: Request<Req>) -> Result<Rep, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Rep: prost::Message + Default + Send + Sync + 'static,
    {
        self.ready().await?;
        let codec: ProstCodec<Req, Rep> = ProstCodec::default();
        let response = self
            .inner
            .unary(request, PathAndQuery::from_static(path), codec)
            .await?;
        Ok(response.into_inner())
    }

    pub async fn show_cmd_text_output(
        &mut self,
        request: Request<ShowCmdArgs>,
    ) -> Result<Vec<ShowCmdTextReply>, Status> {
        self.streaming(SHOW_TEXT, request).await
    }

    pub async fn show_cmd_json_output(
        &mut self,
        request: Request<ShowCmdArgs>,
    ) -> Result<Vec<ShowCmdJsonReply>, Status> {
        self.streaming(SHOW_JSON, request).await
    }

    pub async fn get_config(
        &mut self,
        request: Request<ConfigGetArgs>,
    ) -> Result<Vec<ConfigGetReply>, Status> {
        self.streaming(GET_CONFIG, request).await
    }

    pub async fn cli_config(
        &mut self,
        request: Request<CliConfigArgs>,
    ) -> Result<CliConfigReply, Status> {
        self.unary(CLI_CONFIG, request).await
    }

    pub async fn merge_config(&mut self, request: Request<ConfigArgs>) -> Result<ConfigReply, Status> {
        self.unary(MERGE_CONFIG, request).await
    }

    pub async fn replace_config(
        &mut self,
        request: Request<ConfigArgs>,
    ) -> Result<ConfigReply, Status> {
        self.unary(REPLACE_CONFIG, request).await
    }

    pub async fn delete_config(&mut self, request: Request<ConfigArgs>) -> Result<ConfigReply, Status> {
        self.unary(DELETE_CONFIG, request).await
    }
}
