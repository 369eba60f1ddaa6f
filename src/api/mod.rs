//! HTTP fetching: endpoint descriptors, transport, retries and cancellation.

mod client;
mod endpoint;
mod error;
mod registry;
mod transport;

pub use client::{base_backoff, FetchClient, MAX_BACKOFF};
pub use endpoint::{
  Endpoint, EndpointError, HttpMethod, CATEGORIES_URL, DEFAULT_RETRY_COUNT, DEFAULT_TIMEOUT,
  LISTINGS_URL,
};
pub use error::FetchError;
pub use registry::{ActiveRequest, RequestId, RequestRegistry};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};

#[cfg(test)]
pub(crate) use transport::tests as mock;
