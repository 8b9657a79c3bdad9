#![warn(missing_docs)]

//! Provides GraphQL Middleware for HTTP Services
//!
//! Requests carry their document as text, so operations assembled at
//! runtime travel the same path as hand-written ones.

use std::{future::Future, pin::Pin, str::FromStr};

use adminql_http::{HttpRequest, HttpResponse};
use bytes::Bytes;
use http::{HeaderValue, Method, StatusCode, Uri, uri::InvalidUri};
use http_body_util::Full;
use serde::Serialize;
use serde_json::{Map, Value};
use tower::{Layer, Service};
use url::Url;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Re-export / renamed type alias for [`graphql_client::Response`]
pub type GraphQLResponse = graphql_client::Response<Value>;

/// Re-export of a single entry of a response's `errors` array
pub type GraphQLError = graphql_client::Error;

/// Errors that may occur from using a [`GraphQLService`]
#[derive(thiserror::Error, Debug)]
pub enum GraphQLServiceError {
    /// The endpoint answered with a non-empty `errors` array. Any `data`
    /// that came with it is kept but never treated as a success.
    #[error("{}", join_messages(errors))]
    Remote {
        /// The GraphQL errors that were produced
        errors: Vec<GraphQLError>,
        /// The partial data returned, if any
        data: Option<Value>,
    },
    /// There was no data field provided in the response
    #[error("No data field provided")]
    NoData,
    /// Data serialization error
    #[error("Serialization error: {}", .0)]
    Serialization(serde_json::Error),
    /// The body was not a GraphQL response
    #[error("Unable to read a GraphQL response (status {status_code}): {error}")]
    Deserialization {
        /// The source error
        error: serde_json::Error,
        /// The data that was attempted to be deserialized
        data: Bytes,
        /// The [`StatusCode`] of the request
        status_code: StatusCode,
    },
    /// [`http`]-related error, probably from header-related tasks
    #[error("HTTP error: {:?}", .0)]
    Http(#[from] http::Error),
    /// Error that occurs from a failure to parse a [`Uri`] from a [`Url`]
    #[error("Unable to convert URL to URI.")]
    InvalidUri(#[from] InvalidUri),
    /// Errors that occur as a result of the underlying HTTP service failing
    #[error("Upstream service error: {}", .0)]
    UpstreamService(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl GraphQLServiceError {
    /// Whether the endpoint was reached and answered with GraphQL errors
    pub fn is_remote(&self) -> bool {
        matches!(self, GraphQLServiceError::Remote { .. })
    }
}

/// Concatenates the messages of a response's errors, one per line
pub fn join_messages(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|err| err.message.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// The JSON body of a GraphQL HTTP request
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    query: String,
    variables: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    operation_name: Option<String>,
}

impl GraphQLRequest {
    /// Constructs a new [`GraphQLRequest`]
    pub fn new(query: impl Into<String>, variables: Map<String, Value>) -> GraphQLRequest {
        GraphQLRequest {
            query: query.into(),
            variables,
            operation_name: None,
        }
    }

    /// Selects one operation of a document holding several
    pub fn with_operation_name(mut self, operation_name: impl Into<String>) -> GraphQLRequest {
        self.operation_name = Some(operation_name.into());
        self
    }

    /// The document text
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The variable bag
    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }
}

/// [`Layer`] that wraps a service with GraphQL middleware
#[derive(Default)]
pub struct GraphQLLayer {
    endpoint: Option<Url>,
}

impl GraphQLLayer {
    /// Constructs a new [`GraphQLLayer`]
    pub fn new(endpoint: Url) -> GraphQLLayer {
        GraphQLLayer {
            endpoint: Some(endpoint),
        }
    }
}

impl<S> Layer<S> for GraphQLLayer {
    type Service = GraphQLService<S>;
    fn layer(&self, inner: S) -> Self::Service {
        GraphQLService::new(self.endpoint.clone(), inner)
    }
}

/// Middleware that wraps a service in GraphQL functionality
#[derive(Clone, Debug)]
pub struct GraphQLService<S> {
    inner: S,
    endpoint: Option<Url>,
}

impl<S> GraphQLService<S> {
    /// Constructs a new [`GraphQLService`]
    pub fn new(endpoint: Option<Url>, inner: S) -> GraphQLService<S> {
        GraphQLService { endpoint, inner }
    }
}

fn into_result(response: GraphQLResponse) -> Result<Value, GraphQLServiceError> {
    match response.errors {
        Some(errors) if !errors.is_empty() => Err(GraphQLServiceError::Remote {
            errors,
            data: response.data,
        }),
        _ => response.data.ok_or(GraphQLServiceError::NoData),
    }
}

impl<S> Service<GraphQLRequest> for GraphQLService<S>
where
    S: Service<HttpRequest, Response = HttpResponse> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    type Response = Value;
    type Error = GraphQLServiceError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        tower::Service::poll_ready(&mut self.inner, cx)
            .map_err(|err| GraphQLServiceError::UpstreamService(Box::new(err)))
    }

    fn call(&mut self, req: GraphQLRequest) -> Self::Future {
        // https://docs.rs/tower/latest/tower/trait.Service.html#be-careful-when-cloning-inner-services
        let cloned = self.inner.clone();
        let mut client = std::mem::replace(&mut self.inner, cloned);

        let url = self.endpoint.clone();

        let fut = async move {
            tracing::trace!(query = %req.query, variables = ?req.variables, "sending GraphQL request");
            let body_bytes =
                Bytes::from(serde_json::to_vec(&req).map_err(GraphQLServiceError::Serialization)?);
            let req = http::Request::builder();
            let req = if let Some(url) = url.as_ref() {
                req.uri(Uri::from_str(url.as_ref())?)
            } else {
                req
            };
            let req = req
                .method(Method::POST)
                .header(
                    http::header::CONTENT_TYPE,
                    HeaderValue::from_static(JSON_CONTENT_TYPE),
                )
                .body(Full::new(body_bytes))
                .map_err(GraphQLServiceError::Http)?;
            let resp = client
                .call(req)
                .await
                .map_err(|err| GraphQLServiceError::UpstreamService(Box::new(err)))?;
            let body = resp.body();
            let graphql_response: GraphQLResponse =
                serde_json::from_slice(body).map_err(|err| {
                    GraphQLServiceError::Deserialization {
                        error: err,
                        data: body.clone(),
                        status_code: resp.status(),
                    }
                })?;
            into_result(graphql_response)
        };
        Box::pin(fut)
    }
}
