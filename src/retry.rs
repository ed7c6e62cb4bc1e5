use std::time::Duration;

use prost::Message;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{Result, SdkError};
use crate::stub::{ApiResponse, AuthorizedStub, CallOptions, Transport};

/// Configuration for retry behavior.
///
/// The delay between attempts is fixed; it does not grow.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// [`AuthorizedStub`] that retries transient failures.
pub struct RetryStub<T> {
    inner: AuthorizedStub<T>,
    config: RetryConfig,
}

impl<T: Transport> RetryStub<T> {
    pub fn new(inner: AuthorizedStub<T>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &AuthorizedStub<T> {
        &self.inner
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Calls `method`, retrying only errors for which
    /// [`SdkError::is_retryable`] holds. Anything else is returned at once.
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
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.inner.make_call(method, request, options).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempt >= max_attempts {
                        return Err(SdkError::RetriesExhausted {
                            attempts: attempt,
                            source: Box::new(e),
                        });
                    }
                    warn!(
                        method,
                        attempt,
                        max_attempts,
                        backoff_secs = self.config.backoff.as_secs_f64(),
                        error = %e,
                        "transient failure, retrying"
                    );
                    sleep(self.config.backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
