//! Messages for the subset of the `clarifai.api.V2` service used by this SDK,
//! generated from `proto/clarifai/api` by `build.rs`.

use crate::pagination::PageRequest;
use crate::stub::ApiResponse;

tonic::include_proto!("clarifai.api");

pub mod status {
    tonic::include_proto!("clarifai.api.status");

    impl Status {
        pub fn is_success(&self) -> bool {
            self.code == StatusCode::Success as i32
        }
    }
}

pub use status::{Status, StatusCode};

/// Fully-qualified name of the gRPC service.
pub const SERVICE: &str = "clarifai.api.V2";

/// Unary methods routed by [`GrpcTransport`](crate::stub::GrpcTransport)
/// without extra registration.
pub const V2_METHODS: &[&str] = &[
    "ListApps",
    "GetApp",
    "ListModels",
    "ListWorkflows",
    "ListDatasets",
    "ListInputs",
    "ListConcepts",
];

macro_rules! impl_api_response {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ApiResponse for $ty {
                fn status(&self) -> Option<&Status> {
                    self.status.as_ref()
                }
            }
        )*
    };
}

macro_rules! impl_page_request {
    ($($ty:ty),* $(,)?) => {
        $(
            impl PageRequest for $ty {
                fn set_page(&mut self, page: u32) {
                    self.page = page;
                }

                fn set_per_page(&mut self, per_page: u32) {
                    self.per_page = per_page;
                }
            }
        )*
    };
}

impl_api_response!(
    SingleAppResponse,
    MultiAppResponse,
    MultiModelResponse,
    MultiWorkflowResponse,
    MultiDatasetResponse,
    MultiInputResponse,
    MultiConceptResponse,
);

impl_page_request!(
    ListAppsRequest,
    ListModelsRequest,
    ListWorkflowsRequest,
    ListDatasetsRequest,
    ListInputsRequest,
    ListConceptsRequest,
);
