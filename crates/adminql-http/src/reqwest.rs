use std::pin::Pin;

use buildstructor::buildstructor;
use bytes::Bytes;
use futures::Future;
use http_body::Body;
use http_body_util::BodyExt;
use reqwest::ClientBuilder;
use tower::{BoxError, Service, ServiceBuilder, ServiceExt, util::BoxCloneService};

use crate::{
    DEFAULT_TIMEOUT, HttpRequest, HttpResponse, HttpService, HttpServiceConfig, HttpServiceError,
};

/// A [`Service`] that wraps a [`reqwest`] client and uses [`http`] constructs for requests and responses
#[derive(Clone, Debug)]
pub struct ReqwestService {
    client: BoxCloneService<reqwest::Request, reqwest::Response, HttpServiceError>,
}

#[buildstructor]
impl ReqwestService {
    /// Constructs a new [`ReqwestService`]
    #[builder]
    pub fn new(
        config: Option<HttpServiceConfig>,
        client: Option<reqwest::Client>,
    ) -> Result<ReqwestService, reqwest::Error> {
        let config = config.unwrap_or_default();
        let client = match client {
            Some(client) => client,
            None => ClientBuilder::new()
                .danger_accept_invalid_certs(
                    (*config.accept_invalid_certificates()).unwrap_or_default(),
                )
                .build()?,
        };
        let client = ServiceBuilder::new()
            .map_err(|err: BoxError| match err.downcast::<reqwest::Error>() {
                Ok(err) => HttpServiceError::from(*err),
                Err(err) => HttpServiceError::from(err),
            })
            .timeout((*config.timeout()).unwrap_or(DEFAULT_TIMEOUT))
            .service(client)
            .boxed_clone();
        Ok(ReqwestService { client })
    }
}

impl From<reqwest::Error> for HttpServiceError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_body() {
            HttpServiceError::Body(value.into())
        } else if value.is_connect() {
            HttpServiceError::Connect(value.into())
        } else if value.is_timeout() {
            HttpServiceError::TimedOut(value.into())
        } else if value.is_decode() {
            HttpServiceError::Decode(value.into())
        } else {
            HttpServiceError::Unexpected(value.into())
        }
    }
}

async fn collect_bytes<B>(body: &mut B) -> Result<Bytes, HttpServiceError>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    BodyExt::collect(body)
        .await
        .map(|buf| buf.to_bytes())
        .map_err(|err| HttpServiceError::Body(Box::new(err)))
}

impl Service<HttpRequest> for ReqwestService {
    type Response = HttpResponse;
    type Error = HttpServiceError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.client.poll_ready(cx)
    }

    fn call(&mut self, req: HttpRequest) -> Self::Future {
        // https://docs.rs/tower/latest/tower/trait.Service.html#be-careful-when-cloning-inner-services
        let cloned = self.client.clone();
        let mut client = std::mem::replace(&mut self.client, cloned);
        let fut = async move {
            let mut req = req;
            let bytes = collect_bytes(req.body_mut()).await?;
            let req = req.map(move |_| reqwest::Body::from(bytes));
            let req = reqwest::Request::try_from(req)?;
            let mut resp = http::Response::from(client.call(req).await?);
            let bytes = collect_bytes(resp.body_mut()).await?;
            tracing::trace!(status = %resp.status(), length = bytes.len(), "received response");
            Ok::<_, HttpServiceError>(resp.map(|_| bytes))
        };
        Box::pin(fut)
    }
}

impl From<ReqwestService> for HttpService {
    fn from(value: ReqwestService) -> Self {
        value.boxed_clone()
    }
}
