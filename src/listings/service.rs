//! Service seam between the repository and the fetch client.

use async_trait::async_trait;
use std::sync::Arc;

use super::types::{Category, Listing};
use crate::api::{Endpoint, FetchClient, FetchError};

/// Source of the two remote collections.
#[async_trait]
pub trait ListingService: Send + Sync {
  async fn fetch_categories(&self) -> Result<Vec<Category>, FetchError>;

  async fn fetch_listings(&self) -> Result<Vec<Listing>, FetchError>;

  /// Cancel whatever the service has in flight.
  fn cancel_all(&self);
}

/// Listing service backed by a [`FetchClient`].
///
/// Results go through the client's cache, so a second fetch of the same
/// endpoint is served without a network round trip.
#[derive(Clone)]
pub struct HttpListingService {
  client: Arc<FetchClient>,
  categories: Endpoint,
  listings: Endpoint,
}

impl HttpListingService {
  /// Create a service over the conventional endpoints.
  pub fn new(client: Arc<FetchClient>) -> Self {
    Self::with_endpoints(client, Endpoint::categories(), Endpoint::listings())
  }

  pub fn with_endpoints(
    client: Arc<FetchClient>,
    categories: Endpoint,
    listings: Endpoint,
  ) -> Self {
    Self {
      client,
      categories,
      listings,
    }
  }

  pub fn client(&self) -> &Arc<FetchClient> {
    &self.client
  }

  pub fn categories_endpoint(&self) -> &Endpoint {
    &self.categories
  }

  pub fn listings_endpoint(&self) -> &Endpoint {
    &self.listings
  }
}

#[async_trait]
impl ListingService for HttpListingService {
  async fn fetch_categories(&self) -> Result<Vec<Category>, FetchError> {
    self.client.fetch(&self.categories).await
  }

  async fn fetch_listings(&self) -> Result<Vec<Listing>, FetchError> {
    self.client.fetch(&self.listings).await
  }

  fn cancel_all(&self) {
    self.client.cancel_all();
  }
}
