//! Authenticated calls over a byte-level transport.
//!
//! Every RPC goes through one call shape: a method name plus a
//! `tonic::Request<Bytes>` whose metadata carries the credential and whose
//! timeout carries the per-call options. Errors are classified here, at the
//! transport boundary, into [`SdkError`] variants so callers only ever ask
//! [`SdkError::is_retryable`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes};
use prost::Message;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::AsciiMetadataValue;
use tonic::transport::Channel;

use crate::auth::ClarifaiAuth;
use crate::error::{ConfigError, Result, SdkError};
use crate::proto::{self, Status, StatusCode};

/// Response messages that carry a platform [`Status`].
pub trait ApiResponse: Message + Default {
    fn status(&self) -> Option<&Status>;
}

/// Per-call options applied to the outgoing request.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A channel able to carry encoded unary calls to named methods.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether `method` exists on the remote service.
    fn supports(&self, method: &str) -> bool;

    async fn unary(
        &self,
        method: &str,
        request: tonic::Request<Bytes>,
    ) -> Result<tonic::Response<Bytes>>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn supports(&self, method: &str) -> bool {
        (**self).supports(method)
    }

    async fn unary(
        &self,
        method: &str,
        request: tonic::Request<Bytes>,
    ) -> Result<tonic::Response<Bytes>> {
        (**self).unary(method, request).await
    }
}

/// [`Transport`] over a tonic channel to the `clarifai.api.V2` service.
///
/// Routes the methods in [`proto::V2_METHODS`] plus any registered with
/// [`with_methods`](Self::with_methods).
#[derive(Debug, Clone)]
pub struct GrpcTransport {
    grpc: tonic::client::Grpc<Channel>,
    extra_methods: Arc<HashSet<String>>,
}

impl GrpcTransport {
    pub fn new(channel: Channel) -> Self {
        Self {
            grpc: tonic::client::Grpc::new(channel),
            extra_methods: Arc::default(),
        }
    }

    /// Registers additional unary V2 methods, e.g. `"PostModelOutputs"`.
    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut extra = (*self.extra_methods).clone();
        extra.extend(methods.into_iter().map(Into::into));
        self.extra_methods = Arc::new(extra);
        self
    }
}

#[async_trait]
impl Transport for GrpcTransport {
    fn supports(&self, method: &str) -> bool {
        proto::V2_METHODS.contains(&method) || self.extra_methods.contains(method)
    }

    async fn unary(
        &self,
        method: &str,
        request: tonic::Request<Bytes>,
    ) -> Result<tonic::Response<Bytes>> {
        let path = PathAndQuery::try_from(format!("/{}/{}", proto::SERVICE, method))
            .map_err(|_| SdkError::MethodNotFound(method.to_string()))?;

        let mut grpc = self.grpc.clone();
        grpc.ready().await.map_err(|e| {
            tonic::Status::unavailable(format!("service was not ready: {e}"))
        })?;

        Ok(grpc.unary(request, path, RawCodec).await?)
    }
}

/// Passes already-encoded protobuf bytes through unchanged.
#[derive(Debug, Clone, Copy, Default)]
struct RawCodec;

#[derive(Debug, Clone, Copy, Default)]
struct RawEncoder;

#[derive(Debug, Clone, Copy, Default)]
struct RawDecoder;

impl Codec for RawCodec {
    type Encode = Bytes;
    type Decode = Bytes;
    type Encoder = RawEncoder;
    type Decoder = RawDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        RawEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        RawDecoder
    }
}

impl Encoder for RawEncoder {
    type Item = Bytes;
    type Error = tonic::Status;

    fn encode(&mut self, item: Bytes, dst: &mut EncodeBuf<'_>) -> std::result::Result<(), Self::Error> {
        dst.put(item);
        Ok(())
    }
}

impl Decoder for RawDecoder {
    type Item = Bytes;
    type Error = tonic::Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> std::result::Result<Option<Bytes>, Self::Error> {
        Ok(Some(src.copy_to_bytes(src.remaining())))
    }
}

/// Attaches the auth metadata to every call. Never retries.
pub struct AuthorizedStub<T> {
    auth: Arc<ClarifaiAuth>,
    transport: T,
}

impl<T: Transport> AuthorizedStub<T> {
    pub fn new(auth: Arc<ClarifaiAuth>, transport: T) -> Self {
        Self { auth, transport }
    }

    pub fn auth(&self) -> &ClarifaiAuth {
        &self.auth
    }

    pub async fn make_call<Req, Resp>(
        &self,
        method: &str,
        request: &Req,
        options: &CallOptions,
    ) -> Result<Resp>
    where
        Req: Message,
        Resp: ApiResponse,
    {
        if !self.transport.supports(method) {
            return Err(SdkError::MethodNotFound(method.to_string()));
        }

        let mut outgoing = tonic::Request::new(Bytes::from(request.encode_to_vec()));
        for (key, value) in self.auth.metadata()? {
            let value: AsciiMetadataValue =
                value.parse().map_err(|_| ConfigError::InvalidMetadata)?;
            outgoing.metadata_mut().insert(key, value);
        }
        if let Some(timeout) = options.timeout {
            outgoing.set_timeout(timeout);
        }

        let body = self.transport.unary(method, outgoing).await?.into_inner();
        let response = Resp::decode(body)?;
        check_throttled(&response)?;
        Ok(response)
    }
}

fn check_throttled<Resp: ApiResponse>(response: &Resp) -> Result<()> {
    let Some(status) = response.status() else {
        return Ok(());
    };
    match status.code() {
        code @ (StatusCode::ConnThrottled | StatusCode::ConnExceedHourlyLimit) => {
            Err(SdkError::Throttled {
                code,
                description: status.description.clone(),
            })
        }
        _ => Ok(()),
    }
}
