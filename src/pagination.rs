//! Page-by-page iteration over list endpoints.

use async_stream::stream;
use futures::Stream;
use prost::Message;
use tracing::debug;

use crate::error::{Result, SdkError};
use crate::retry::RetryStub;
use crate::stub::{ApiResponse, CallOptions, Transport};

pub const DEFAULT_PAGE_SIZE: u32 = 16;

/// List requests whose page window can be moved.
pub trait PageRequest: Message {
    fn set_page(&mut self, page: u32);
    fn set_per_page(&mut self, per_page: u32);
}

/// Where a listing starts and how large its pages are.
#[derive(Debug, Clone)]
pub struct PageParams {
    /// First page to request, 1-based.
    pub page_no: u32,
    /// Page size sent with every request. With `None` the server default
    /// applies and only an empty page ends the listing.
    pub per_page: Option<u32>,
    pub options: CallOptions,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page_no: 1,
            per_page: Some(DEFAULT_PAGE_SIZE),
            options: CallOptions::default(),
        }
    }
}

impl PageParams {
    pub fn new(page_no: u32, per_page: u32) -> Self {
        Self {
            page_no,
            per_page: Some(per_page),
            ..Default::default()
        }
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }
}

/// Lazily fetches `method` page after page, yielding each non-empty response.
///
/// `payload_len` returns the length of the response's list payload. The
/// stream ends after an empty page, or after a page shorter than
/// `per_page`. A response whose status is not SUCCESS ends the stream with
/// [`SdkError::ListingFailed`]. Pages are requested strictly one after the
/// other, and only when the consumer polls for the next one.
pub fn list_pages<'a, T, Req, Resp, F>(
    stub: &'a RetryStub<T>,
    method: &'a str,
    mut request: Req,
    params: PageParams,
    payload_len: F,
) -> impl Stream<Item = Result<Resp>> + 'a
where
    T: Transport + 'a,
    Req: PageRequest + 'a,
    Resp: ApiResponse + 'a,
    F: Fn(&Resp) -> usize + 'a,
{
    stream! {
        let mut page = params.page_no.max(1);
        loop {
            request.set_page(page);
            if let Some(per_page) = params.per_page {
                request.set_per_page(per_page);
            }
            debug!(method, page, per_page = ?params.per_page, "fetching page");

            let response: Resp = match stub.make_call(method, &request, &params.options).await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };
            if let Err(e) = ensure_success(method, &response) {
                yield Err(e);
                break;
            }

            let len = payload_len(&response);
            if len == 0 {
                break;
            }
            let last = params.per_page.is_some_and(|per_page| len < per_page as usize);
            yield Ok(response);
            if last {
                break;
            }
            page += 1;
        }
    }
}

fn ensure_success<Resp: ApiResponse>(method: &str, response: &Resp) -> Result<()> {
    let status = response.status().cloned().unwrap_or_default();
    if status.is_success() {
        return Ok(());
    }
    Err(SdkError::ListingFailed {
        method: method.to_string(),
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{ListModelsRequest, MultiModelResponse, StatusCode};
    use crate::retry::RetryConfig;
    use crate::stub::AuthorizedStub;
    use crate::testing::{failure, failure_with, models_page, test_auth, ScriptedTransport};
    use futures::{pin_mut, StreamExt};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn stub(transport: Arc<ScriptedTransport>) -> RetryStub<Arc<ScriptedTransport>> {
        RetryStub::new(
            AuthorizedStub::new(test_auth(), transport),
            RetryConfig::default(),
        )
    }

    fn model_count(response: &MultiModelResponse) -> usize {
        response.models.len()
    }

    fn requested_pages(transport: &ScriptedTransport) -> Vec<(u32, u32)> {
        transport
            .calls()
            .iter()
            .map(|call| {
                let request: ListModelsRequest = call.decode();
                (request.page, request.per_page)
            })
            .collect()
    }

    async fn collect_pages(
        stub: &RetryStub<Arc<ScriptedTransport>>,
        params: PageParams,
    ) -> Vec<Result<MultiModelResponse>> {
        list_pages(stub, "ListModels", ListModelsRequest::default(), params, model_count)
            .collect()
            .await
    }

    #[tokio::test]
    async fn stops_after_short_page() {
        let transport = Arc::new(ScriptedTransport::new());
        for len in [10, 10, 3] {
            transport.push_ok(models_page(len));
        }
        let stub = stub(transport.clone());

        let pages = collect_pages(&stub, PageParams::new(1, 10)).await;

        let sizes: Vec<usize> = pages.iter().map(|p| p.as_ref().unwrap().models.len()).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
        assert_eq!(requested_pages(&transport), vec![(1, 10), (2, 10), (3, 10)]);
    }

    #[tokio::test]
    async fn empty_first_page_yields_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(models_page(0));
        let stub = stub(transport.clone());

        let pages = collect_pages(&stub, PageParams::new(1, 10)).await;

        assert!(pages.is_empty());
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn full_last_page_needs_one_more_request() {
        let transport = Arc::new(ScriptedTransport::new());
        for len in [5, 5, 0] {
            transport.push_ok(models_page(len));
        }
        let stub = stub(transport.clone());

        let pages = collect_pages(&stub, PageParams::new(1, 5)).await;

        assert_eq!(pages.len(), 2);
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn without_page_size_only_empty_page_terminates() {
        let transport = Arc::new(ScriptedTransport::new());
        for len in [7, 2, 0] {
            transport.push_ok(models_page(len));
        }
        let stub = stub(transport.clone());
        let params = PageParams {
            per_page: None,
            ..Default::default()
        };

        let pages = collect_pages(&stub, params).await;

        assert_eq!(pages.len(), 2);
        assert_eq!(requested_pages(&transport), vec![(1, 0), (2, 0), (3, 0)]);
    }

    #[tokio::test]
    async fn starts_from_requested_page() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(models_page(1));
        let stub = stub(transport.clone());

        let pages = collect_pages(&stub, PageParams::new(4, 16)).await;

        assert_eq!(pages.len(), 1);
        assert_eq!(requested_pages(&transport), vec![(4, 16)]);
    }

    #[tokio::test]
    async fn failed_status_ends_listing_with_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(models_page(2));
        transport.push_ok(failure(StatusCode::Failure));
        let stub = stub(transport.clone());

        let pages = collect_pages(&stub, PageParams::new(1, 2)).await;

        assert_eq!(pages.len(), 2);
        assert!(pages[0].is_ok());
        match &pages[1] {
            Err(SdkError::ListingFailed { method, status }) => {
                assert_eq!(method, "ListModels");
                assert_eq!(status.code, StatusCode::Failure as i32);
                assert_eq!(status.description, "Failure");
            }
            other => panic!("unexpected page: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unnamed_failure_code_survives_listing() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(failure_with(21200, "Model does not exist"));
        let stub = stub(transport.clone());

        let mut pages = collect_pages(&stub, PageParams::new(1, 2)).await;

        assert_eq!(pages.len(), 1);
        let err = pages.remove(0).unwrap_err();
        assert_eq!(err.status_code(), Some(21200));
        assert_eq!(err.known_status_code(), None);
        assert_eq!(
            err.to_string(),
            "listing `ListModels` failed with status 21200: Model does not exist"
        );
    }

    #[tokio::test]
    async fn pages_are_fetched_only_when_polled() {
        let transport = Arc::new(ScriptedTransport::new());
        for len in [3, 3, 1] {
            transport.push_ok(models_page(len));
        }
        let stub = stub(transport.clone());

        let pages = list_pages(
            &stub,
            "ListModels",
            ListModelsRequest::default(),
            PageParams::new(1, 3),
            model_count,
        );
        pin_mut!(pages);

        assert!(transport.calls().is_empty());
        assert!(pages.next().await.unwrap().is_ok());
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn each_listing_restarts_from_its_first_page() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(models_page(1));
        transport.push_ok(models_page(1));
        let stub = stub(transport.clone());

        assert_eq!(collect_pages(&stub, PageParams::new(1, 5)).await.len(), 1);
        assert_eq!(collect_pages(&stub, PageParams::new(1, 5)).await.len(), 1);
        assert_eq!(requested_pages(&transport), vec![(1, 5), (1, 5)]);
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_page_is_retried_transparently() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(models_page(2));
        transport.push_ok(failure(StatusCode::ConnThrottled));
        transport.push_ok(models_page(1));
        let stub = stub(transport.clone());

        let pages = collect_pages(&stub, PageParams::new(1, 2)).await;

        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|p| p.is_ok()));
        assert_eq!(requested_pages(&transport), vec![(1, 2), (2, 2), (2, 2)]);
    }
}
