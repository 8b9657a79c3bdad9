use std::sync::{Arc, Mutex};

use adminql_graphql::{GraphQLLayer, GraphQLRequest, GraphQLServiceError};
use adminql_http::{
    HttpService, HttpServiceConfig, ReqwestService,
    extend_headers::{ExtendHeadersLayer, HeaderSource},
    retry::RetryPolicy,
};
use serde_json::{Map, Value};
use tower::{Service, ServiceBuilder, ServiceExt, util::BoxCloneService};
use url::Url;

use crate::{AdapterError, AdapterResult};

type InnerService = BoxCloneService<GraphQLRequest, Value, GraphQLServiceError>;

/// Sends GraphQL documents to one endpoint and returns their `data`.
///
/// Cloning is cheap; every clone shares the underlying HTTP client. The
/// boxed stack is not `Sync`, so it sits behind a lock that is only held
/// while a per-call copy is cloned out of it.
#[derive(Clone)]
pub struct GraphQLClient {
    endpoint: Url,
    inner: Arc<Mutex<InnerService>>,
}

impl std::fmt::Debug for GraphQLClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQLClient")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl GraphQLClient {
    /// Builds the default stack over [`reqwest`]
    pub fn new(
        endpoint: Url,
        headers: HeaderSource,
        config: HttpServiceConfig,
    ) -> AdapterResult<GraphQLClient> {
        let retry = RetryPolicy::layer(&config);
        let http_service: HttpService = ReqwestService::builder()
            .config(config)
            .build()
            .map_err(|err| AdapterError::Config {
                msg: err.to_string(),
            })?
            .into();
        let http_service = ServiceBuilder::new()
            .option_layer(retry)
            .service(http_service)
            .boxed_clone();
        Ok(GraphQLClient::with_http_service(endpoint, headers, http_service))
    }

    /// Builds the stack over any HTTP service, e.g. one with extra middleware
    pub fn with_http_service(
        endpoint: Url,
        headers: HeaderSource,
        http_service: HttpService,
    ) -> GraphQLClient {
        let inner = ServiceBuilder::new()
            .layer(GraphQLLayer::new(endpoint.clone()))
            .layer(ExtendHeadersLayer::new(headers))
            .service(http_service)
            .boxed_clone();
        GraphQLClient {
            endpoint,
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Executes one document. A response carrying any GraphQL errors is a
    /// failure even when it also carries data.
    pub async fn execute(
        &self,
        query: impl Into<String>,
        variables: Map<String, Value>,
    ) -> AdapterResult<Value> {
        let request = GraphQLRequest::new(query, variables);
        tracing::debug!(endpoint = %self.endpoint, "executing GraphQL request");
        let mut service = self
            .inner
            .lock()
            .map_err(|_| AdapterError::Transport {
                msg: "the GraphQL client was poisoned by a panicking request".to_string(),
            })?
            .clone();
        let data = service.ready().await?.call(request).await.map_err(|err| {
            tracing::debug!(error = %err, "GraphQL request failed");
            AdapterError::from(err)
        })?;
        tracing::trace!(?data);
        Ok(data)
    }
}
