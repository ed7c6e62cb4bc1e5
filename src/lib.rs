//! Rust SDK for the Clarifai platform.
//!
//! The SDK talks to the `clarifai.api.V2` gRPC service. Calls flow through a
//! small stack shared by every resource:
//!
//! - [`auth`] resolves identity, credential and endpoints (from explicit
//!   configuration or `CLARIFAI_*` environment variables).
//! - [`scheme`] remembers whether each host is served over HTTPS or HTTP.
//! - [`stub`] attaches the credential to each call and classifies failures.
//! - [`retry`] retries transient failures with a fixed delay.
//! - [`pagination`] drives list endpoints page by page as a `Stream`.
//!
//! [`ClarifaiClient`] ties these together and hands out [`client::User`] and
//! [`client::App`] resource handles.

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod pagination;
pub mod proto;
pub mod retry;
pub mod scheme;
pub mod stub;

#[cfg(test)]
mod testing;

pub use auth::{AuthConfig, ClarifaiAuth, ResourceType};
pub use client::ClarifaiClient;
pub use error::{ConfigError, SdkError};
pub use retry::RetryConfig;
