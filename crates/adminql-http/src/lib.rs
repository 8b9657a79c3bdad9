#![warn(missing_docs)]

//! [`tower`] services for the HTTP leg of a GraphQL request

use std::{fmt::Debug, time::Duration};

/// Install ring as the default rustls crypto provider. This runs automatically
/// as a global constructor in every binary that links adminql-http (directly or
/// transitively).
#[ctor::ctor]
fn install_ring_crypto_provider() {
    // .ok() because the provider may already be installed, and that's the only
    // case that causes this to error
    rustls::crypto::ring::default_provider()
        .install_default()
        .ok();
}

use buildstructor::Builder;
use bytes::Bytes;
use derive_getters::Getters;
pub use http_body_util::Full;
use tower::{timeout::error::Elapsed, util::BoxCloneService};

mod error;
pub mod extend_headers;
mod reqwest;
pub mod retry;

pub use error::HttpServiceError;
pub use reqwest::ReqwestService;

/// Ease-of-use synonym for the request type this crate operates on
pub type HttpRequest = http::Request<Full<Bytes>>;
/// Ease-of-use synonym for the response type this crate operates on
pub type HttpResponse<T = Bytes> = http::Response<T>;
/// Ease-of-use synonym for the [`tower::Service`] type this crate provides
pub type HttpService = BoxCloneService<HttpRequest, HttpResponse, HttpServiceError>;

/// The timeout applied when [`HttpServiceConfig`] does not name one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// Connection options for an [`HttpService`].
/// This is intended to be agnostic to the underlying implementation
#[derive(Clone, Debug, Builder, Default, Getters)]
pub struct HttpServiceConfig {
    accept_invalid_certificates: Option<bool>,
    timeout: Option<Duration>,
    retries: Option<usize>,
}

impl From<Box<dyn std::error::Error + Send + Sync>> for HttpServiceError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        match err.downcast::<Elapsed>() {
            Ok(err) => HttpServiceError::TimedOut(err),
            Err(err) => match err.downcast::<HttpServiceError>() {
                Ok(err) => *err,
                Err(err) => HttpServiceError::Unexpected(err),
            },
        }
    }
}
