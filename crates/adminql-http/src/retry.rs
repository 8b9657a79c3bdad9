//! Opt-in retries for transient transport failures

use std::time::Duration;

use http::StatusCode;
use tap::TapFallible;
use tower::{
    retry::{
        Policy, RetryLayer,
        backoff::{Backoff, ExponentialBackoff, ExponentialBackoffMaker, MakeBackoff},
    },
    util::rng::HasherRng,
};

use crate::{HttpRequest, HttpResponse, HttpServiceConfig};

use super::HttpServiceError;

/// Retries connect failures, timeouts, `429` and `5xx` responses with an
/// exponential backoff, at most `max` times per request
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    count: usize,
    max: usize,
    backoff: Option<ExponentialBackoff>,
}

impl RetryPolicy {
    /// Creates a policy that gives up after `max` retries
    pub fn new(max: usize) -> RetryPolicy {
        let backoff = ExponentialBackoffMaker::new(
            Duration::from_millis(50),
            Duration::from_millis(1000),
            0.99,
            HasherRng::default(),
        )
        .tap_err(|err| tracing::error!("{:?}", err))
        .ok()
        .map(|mut maker| maker.make_backoff());
        RetryPolicy {
            count: 0,
            max,
            backoff,
        }
    }

    /// The layer for a config, if it asks for retries at all
    pub fn layer(config: &HttpServiceConfig) -> Option<RetryLayer<RetryPolicy>> {
        match config.retries() {
            Some(max) if *max > 0 => Some(RetryLayer::new(RetryPolicy::new(*max))),
            _ => None,
        }
    }

    fn can_retry(&self) -> bool {
        self.count < self.max
    }

    fn is_retryable(result: &Result<HttpResponse, HttpServiceError>) -> bool {
        match result {
            Err(err) => err.is_transient(),
            Ok(resp) => {
                let status = resp.status();
                status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
            }
        }
    }
}

impl Policy<HttpRequest, HttpResponse, HttpServiceError> for RetryPolicy {
    type Future = tokio::time::Sleep;

    fn retry(
        &mut self,
        _: &mut HttpRequest,
        result: &mut Result<HttpResponse, HttpServiceError>,
    ) -> Option<Self::Future> {
        if !self.can_retry() || !Self::is_retryable(result) {
            return None;
        }
        self.count += 1;
        tracing::debug!(attempt = self.count, max = self.max, "retrying request");
        let backoff = self.backoff.as_mut()?;
        Some(backoff.next_backoff())
    }

    fn clone_request(&mut self, req: &HttpRequest) -> Option<HttpRequest> {
        Some(req.clone())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use http::StatusCode;
    use http_body_util::Full;
    use httpmock::MockServer;
    use rstest::{fixture, rstest};
    use speculoos::prelude::*;
    use tower::{Service, ServiceBuilder, ServiceExt};

    use crate::{HttpService, HttpServiceConfig, ReqwestService};

    use super::RetryPolicy;

    #[fixture]
    pub fn raw_service() -> HttpService {
        ReqwestService::builder().build().unwrap().boxed_clone()
    }

    #[rstest]
    #[case::server_error(500, 4)]
    #[case::rate_limited(429, 4)]
    #[case::bad_request(400, 1)]
    #[case::ok(200, 1)]
    #[tokio::test]
    pub async fn retries_only_transient_statuses(
        raw_service: HttpService,
        #[case] status: u16,
        #[case] expected_hits: usize,
    ) -> Result<()> {
        let server = MockServer::start_async().await;

        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::POST).path("/graphql");
            then.status(status).body("");
        });

        let mut service = ServiceBuilder::new()
            .retry(RetryPolicy::new(3))
            .service(raw_service);

        let request = http::Request::builder()
            .uri(server.url("/graphql"))
            .method(http::Method::POST)
            .body(Full::default())?;

        let resp = service.ready().await?.call(request).await;

        mock.assert_calls(expected_hits);
        assert_that!(resp)
            .is_ok()
            .matches(|resp| resp.status() == StatusCode::from_u16(status).unwrap());
        Ok(())
    }

    #[test]
    fn no_layer_without_retries() {
        assert_that!(RetryPolicy::layer(&HttpServiceConfig::default())).is_none();
        assert_that!(RetryPolicy::layer(&HttpServiceConfig::builder().retries(0).build()))
            .is_none();
        assert_that!(RetryPolicy::layer(&HttpServiceConfig::builder().retries(2).build()))
            .is_some();
    }
}
