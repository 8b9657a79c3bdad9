//! Adds caller-supplied headers to every outgoing request

use std::{fmt, sync::Arc};

use http::HeaderMap;
use tower::{Layer, Service};

/// Produces the headers for one request. Evaluated on every call, so
/// short-lived credentials can be refreshed between requests.
pub type HeaderProvider = Arc<dyn Fn() -> HeaderMap + Send + Sync>;

/// Where the extra headers of a request come from
#[derive(Clone)]
pub enum HeaderSource {
    /// The same headers on every request
    Static(HeaderMap),
    /// Headers computed per request
    Dynamic(HeaderProvider),
    /// Static headers, overridden by the provider's headers of the same name
    Layered(HeaderMap, HeaderProvider),
}

impl HeaderSource {
    /// Resolves the headers for the next request
    pub fn headers(&self) -> HeaderMap {
        match self {
            HeaderSource::Static(headers) => headers.clone(),
            HeaderSource::Dynamic(provider) => provider(),
            HeaderSource::Layered(headers, provider) => {
                let mut headers = headers.clone();
                for (name, value) in provider().iter() {
                    headers.insert(name.clone(), value.clone());
                }
                headers
            }
        }
    }

    /// Combines static headers with an optional provider
    pub fn new(headers: HeaderMap, provider: Option<HeaderProvider>) -> HeaderSource {
        match provider {
            Some(provider) if headers.is_empty() => HeaderSource::Dynamic(provider),
            Some(provider) => HeaderSource::Layered(headers, provider),
            None => HeaderSource::Static(headers),
        }
    }
}

impl fmt::Debug for HeaderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderSource::Static(headers) => f.debug_tuple("Static").field(headers).finish(),
            HeaderSource::Dynamic(_) => f.write_str("Dynamic(..)"),
            HeaderSource::Layered(headers, _) => {
                f.debug_tuple("Layered").field(headers).finish_non_exhaustive()
            }
        }
    }
}

impl From<HeaderMap> for HeaderSource {
    fn from(headers: HeaderMap) -> Self {
        HeaderSource::Static(headers)
    }
}

/// [`Layer`] that wraps a service with [`ExtendHeaders`]
pub struct ExtendHeadersLayer {
    source: HeaderSource,
}

impl ExtendHeadersLayer {
    /// Constructs a new [`ExtendHeadersLayer`]
    pub fn new(source: impl Into<HeaderSource>) -> ExtendHeadersLayer {
        ExtendHeadersLayer {
            source: source.into(),
        }
    }
}

impl<S: Clone> Layer<S> for ExtendHeadersLayer {
    type Service = ExtendHeaders<S>;
    fn layer(&self, inner: S) -> Self::Service {
        ExtendHeaders {
            source: self.source.clone(),
            inner,
        }
    }
}

/// Middleware that merges the resolved headers into each request,
/// replacing headers of the same name
#[derive(Clone, Debug)]
pub struct ExtendHeaders<S: Clone> {
    source: HeaderSource,
    inner: S,
}

impl<Req, S> Service<http::Request<Req>> for ExtendHeaders<S>
where
    S: Service<http::Request<Req>> + Clone,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<Req>) -> Self::Future {
        let headers = self.source.headers();
        for (name, value) in headers.iter() {
            req.headers_mut().insert(name.clone(), value.clone());
        }
        self.inner.call(req)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use http::{HeaderMap, HeaderValue};
    use speculoos::prelude::*;

    use super::HeaderSource;

    fn static_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("static"));
        headers.insert("x-client", HeaderValue::from_static("adminql"));
        headers
    }

    #[test]
    fn provider_runs_for_every_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let source = HeaderSource::new(
            HeaderMap::new(),
            Some(Arc::new(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let mut headers = HeaderMap::new();
                headers.insert("x-api-key", HeaderValue::from(n));
                headers
            })),
        );

        assert_that!(source.headers().get("x-api-key"))
            .is_some()
            .is_equal_to(&HeaderValue::from(0));
        assert_that!(source.headers().get("x-api-key"))
            .is_some()
            .is_equal_to(&HeaderValue::from(1));
        assert_that!(calls.load(Ordering::SeqCst)).is_equal_to(2);
    }

    #[test]
    fn provider_overrides_static_headers() {
        let source = HeaderSource::new(
            static_headers(),
            Some(Arc::new(|| {
                let mut headers = HeaderMap::new();
                headers.insert("x-api-key", HeaderValue::from_static("fresh"));
                headers
            })),
        );

        let headers = source.headers();
        assert_that!(headers.get("x-api-key"))
            .is_some()
            .is_equal_to(&HeaderValue::from_static("fresh"));
        assert_that!(headers.get("x-client"))
            .is_some()
            .is_equal_to(&HeaderValue::from_static("adminql"));
    }
}
