use std::sync::Arc;

use async_stream::stream;
use futures::Stream;
use prost::Message;

use crate::auth::ClarifaiAuth;
use crate::error::{Result, SdkError};
use crate::models;
use crate::pagination::{self, PageParams, PageRequest};
use crate::proto::*;
use crate::retry::{RetryConfig, RetryStub};
use crate::stub::{ApiResponse, AuthorizedStub, CallOptions, GrpcTransport, Transport};

/// Unified client for the Clarifai platform.
///
/// Every call is authenticated with the client's credential and retried on
/// transient failures; list methods stream items across all pages.
///
/// # Example
/// ```no_run
/// use clarifai_sdk::pagination::PageParams;
/// use clarifai_sdk::ClarifaiClient;
/// use futures::{pin_mut, StreamExt};
///
/// #[tokio::main]
/// async fn main() {
///     let client = ClarifaiClient::from_env().unwrap();
///     let app = client.app(client.auth().app_id());
///     let models = app.list_models(PageParams::default());
///     pin_mut!(models);
///     while let Some(model) = models.next().await {
///         println!("{}", model.unwrap().id);
///     }
/// }
/// ```
pub struct ClarifaiClient<T = GrpcTransport> {
    auth: Arc<ClarifaiAuth>,
    stub: RetryStub<T>,
    default_page_size: u32,
}

impl ClarifaiClient<GrpcTransport> {
    pub fn connect(auth: ClarifaiAuth) -> Result<Self> {
        Self::connect_with(auth, RetryConfig::default())
    }

    pub fn connect_with(auth: ClarifaiAuth, retry: RetryConfig) -> Result<Self> {
        let channel = auth.channel()?;
        Ok(Self::with_transport(auth, GrpcTransport::new(channel), retry))
    }

    pub fn from_env() -> Result<Self> {
        Self::connect(ClarifaiAuth::from_env()?)
    }
}

impl<T: Transport> ClarifaiClient<T> {
    pub fn with_transport(auth: ClarifaiAuth, transport: T, retry: RetryConfig) -> Self {
        let auth = Arc::new(auth);
        let stub = RetryStub::new(AuthorizedStub::new(auth.clone(), transport), retry);
        Self {
            auth,
            stub,
            default_page_size: pagination::DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_default_page_size(mut self, per_page: u32) -> Self {
        self.default_page_size = per_page;
        self
    }

    pub fn auth(&self) -> &ClarifaiAuth {
        &self.auth
    }

    pub fn stub(&self) -> &RetryStub<T> {
        &self.stub
    }

    /// Page parameters starting at page 1 with the client's page size.
    pub fn page_params(&self) -> PageParams {
        PageParams::new(1, self.default_page_size)
    }

    /// Unary call that fails with [`SdkError::Api`] unless the response
    /// status is SUCCESS.
    pub async fn call<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Message,
        Resp: ApiResponse,
    {
        let response: Resp = self
            .stub
            .make_call(method, request, &CallOptions::default())
            .await?;
        let status = response.status().cloned().unwrap_or_default();
        if !status.is_success() {
            return Err(SdkError::Api { status });
        }
        Ok(response)
    }

    pub fn list_pages<'a, Req, Resp, F>(
        &'a self,
        method: &'static str,
        request: Req,
        params: PageParams,
        payload_len: F,
    ) -> impl Stream<Item = Result<Resp>> + 'a
    where
        Req: PageRequest + 'a,
        Resp: ApiResponse + 'a,
        F: Fn(&Resp) -> usize + 'a,
    {
        pagination::list_pages(&self.stub, method, request, params, payload_len)
    }

    /// The authenticated user.
    pub fn user(&self) -> User<'_, T> {
        User {
            client: self,
            user_id: self.auth.user_id().to_string(),
        }
    }

    /// An app owned by the authenticated user.
    pub fn app(&self, app_id: &str) -> App<'_, T> {
        App {
            client: self,
            user_app_id: UserAppIdSet {
                user_id: self.auth.user_id().to_string(),
                app_id: app_id.to_string(),
            },
        }
    }
}

pub struct User<'a, T> {
    client: &'a ClarifaiClient<T>,
    user_id: String,
}

impl<'a, T: Transport> User<'a, T> {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn list_apps(&self, params: PageParams) -> impl Stream<Item = Result<models::App>> + 'a {
        let request = ListAppsRequest {
            user_app_id: Some(UserAppIdSet {
                user_id: self.user_id.clone(),
                app_id: String::new(),
            }),
            ..Default::default()
        };
        let pages = self.client.list_pages("ListApps", request, params, |r: &MultiAppResponse| {
            r.apps.len()
        });
        flatten::<models::App, _, _, _>(pages, |r: MultiAppResponse| r.apps)
    }

    pub async fn app(&self, app_id: &str) -> Result<models::App> {
        let request = GetAppRequest {
            user_app_id: Some(UserAppIdSet {
                user_id: self.user_id.clone(),
                app_id: app_id.to_string(),
            }),
        };
        let response: SingleAppResponse = self.client.call("GetApp", &request).await?;
        response
            .app
            .map(models::App::from)
            .ok_or_else(|| SdkError::Api {
                status: Status {
                    code: StatusCode::Failure as i32,
                    description: format!("app `{app_id}` missing from response"),
                    ..Default::default()
                },
            })
    }
}

pub struct App<'a, T> {
    client: &'a ClarifaiClient<T>,
    user_app_id: UserAppIdSet,
}

impl<'a, T: Transport> App<'a, T> {
    pub fn app_id(&self) -> &str {
        &self.user_app_id.app_id
    }

    pub fn list_models(&self, params: PageParams) -> impl Stream<Item = Result<models::Model>> + 'a {
        let request = ListModelsRequest {
            user_app_id: Some(self.user_app_id.clone()),
            ..Default::default()
        };
        let pages = self.client.list_pages("ListModels", request, params, |r: &MultiModelResponse| {
            r.models.len()
        });
        flatten::<models::Model, _, _, _>(pages, |r: MultiModelResponse| r.models)
    }

    pub fn list_workflows(
        &self,
        params: PageParams,
    ) -> impl Stream<Item = Result<models::Workflow>> + 'a {
        let request = ListWorkflowsRequest {
            user_app_id: Some(self.user_app_id.clone()),
            ..Default::default()
        };
        let pages = self.client.list_pages(
            "ListWorkflows",
            request,
            params,
            |r: &MultiWorkflowResponse| r.workflows.len(),
        );
        flatten::<models::Workflow, _, _, _>(pages, |r: MultiWorkflowResponse| r.workflows)
    }

    pub fn list_datasets(
        &self,
        params: PageParams,
    ) -> impl Stream<Item = Result<models::Dataset>> + 'a {
        let request = ListDatasetsRequest {
            user_app_id: Some(self.user_app_id.clone()),
            ..Default::default()
        };
        let pages = self.client.list_pages(
            "ListDatasets",
            request,
            params,
            |r: &MultiDatasetResponse| r.datasets.len(),
        );
        flatten::<models::Dataset, _, _, _>(pages, |r: MultiDatasetResponse| r.datasets)
    }

    pub fn list_inputs(&self, params: PageParams) -> impl Stream<Item = Result<models::Input>> + 'a {
        let request = ListInputsRequest {
            user_app_id: Some(self.user_app_id.clone()),
            ..Default::default()
        };
        let pages = self.client.list_pages("ListInputs", request, params, |r: &MultiInputResponse| {
            r.inputs.len()
        });
        flatten::<models::Input, _, _, _>(pages, |r: MultiInputResponse| r.inputs)
    }

    pub fn list_concepts(
        &self,
        params: PageParams,
    ) -> impl Stream<Item = Result<models::Concept>> + 'a {
        let request = ListConceptsRequest {
            user_app_id: Some(self.user_app_id.clone()),
            ..Default::default()
        };
        let pages = self.client.list_pages(
            "ListConcepts",
            request,
            params,
            |r: &MultiConceptResponse| r.concepts.len(),
        );
        flatten::<models::Concept, _, _, _>(pages, |r: MultiConceptResponse| r.concepts)
    }
}

/// Turns a stream of pages into a stream of converted items.
fn flatten<'a, O, S, Resp, P>(pages: S, payload: fn(Resp) -> Vec<P>) -> impl Stream<Item = Result<O>> + 'a
where
    S: Stream<Item = Result<Resp>> + 'a,
    Resp: 'a,
    P: 'a,
    O: From<P> + 'a,
{
    stream! {
        for await page in pages {
            match page {
                Ok(response) => {
                    for item in payload(response) {
                        yield Ok(O::from(item));
                    }
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
}
