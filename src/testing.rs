//! In-memory transport for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use prost::Message;

use crate::auth::{AuthConfig, ClarifaiAuth};
use crate::error::{Result, SdkError};
use crate::proto::{self, Model, MultiModelResponse, Status, StatusCode};
use crate::scheme::SchemeCache;
use crate::stub::Transport;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: String,
    pub authorization: Option<String>,
    pub timeout: Option<String>,
    pub body: Bytes,
}

impl RecordedCall {
    pub fn decode<M: Message + Default>(&self) -> M {
        M::decode(self.body.clone()).expect("recorded request decodes")
    }
}

/// Replies to calls, in order, from a queue of scripted outcomes.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<std::result::Result<Bytes, tonic::Status>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok<M: Message>(&self, response: M) {
        self.replies
            .lock()
            .push_back(Ok(Bytes::from(response.encode_to_vec())));
    }

    pub fn push_err(&self, status: tonic::Status) {
        self.replies.lock().push_back(Err(status));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn supports(&self, method: &str) -> bool {
        proto::V2_METHODS.contains(&method)
    }

    async fn unary(
        &self,
        method: &str,
        request: tonic::Request<Bytes>,
    ) -> Result<tonic::Response<Bytes>> {
        let header = |key: &str| {
            request
                .metadata()
                .get(key)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let call = RecordedCall {
            method: method.to_string(),
            authorization: header("authorization"),
            timeout: header("grpc-timeout"),
            body: request.get_ref().clone(),
        };
        self.calls.lock().push(call);

        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(tonic::Status::internal("no scripted reply left")));
        match reply {
            Ok(body) => Ok(tonic::Response::new(body)),
            Err(status) => Err(SdkError::from(status)),
        }
    }
}

pub(crate) fn test_auth() -> Arc<ClarifaiAuth> {
    let config = AuthConfig::new("test-user", "test-app")
        .with_pat("test-pat")
        .with_base("https://api.example.com");
    Arc::new(
        ClarifaiAuth::with_caches(config, SchemeCache::new(), SchemeCache::new())
            .expect("test auth is valid"),
    )
}

pub(crate) fn success() -> Option<Status> {
    Some(Status {
        code: StatusCode::Success as i32,
        description: "Ok".to_string(),
        ..Default::default()
    })
}

pub(crate) fn models_page(len: usize) -> MultiModelResponse {
    MultiModelResponse {
        status: success(),
        models: (0..len)
            .map(|i| Model {
                id: format!("model-{i}"),
                ..Default::default()
            })
            .collect(),
    }
}

pub(crate) fn failure(code: StatusCode) -> MultiModelResponse {
    failure_with(code as i32, &format!("{code:?}"))
}

/// Failed page carrying any code, named or not.
pub(crate) fn failure_with(code: i32, description: &str) -> MultiModelResponse {
    MultiModelResponse {
        status: Some(Status {
            code,
            description: description.to_string(),
            details: "scripted failure".to_string(),
            ..Default::default()
        }),
        models: Vec::new(),
    }
}
