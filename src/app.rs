//! Composition of the acquisition layer and the command handlers of the
//! `classifieds` binary.

use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{FetchClient, ReqwestTransport};
use crate::cache::TieredCache;
use crate::config::Config;
use crate::listings::{
  compare_listings, matches_category, Category, HttpListingService, Listing, ListingService,
  Repository, SortOption,
};
use crate::query::{LoadState, Query};

pub struct App {
  service: Arc<HttpListingService>,
  repository: Arc<Repository>,
}

impl App {
  pub fn new(config: &Config) -> Result<Self> {
    let transport =
      ReqwestTransport::new().map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;
    let cache = TieredCache::open_or_memory(&config.cache);
    let client = FetchClient::new(Arc::new(transport), Arc::new(cache));

    let service = HttpListingService::with_endpoints(
      Arc::new(client),
      config.endpoints.categories_endpoint()?,
      config.endpoints.listings_endpoint()?,
    );

    Ok(Self::from_service(service))
  }

  pub fn from_service(service: HttpListingService) -> Self {
    let service = Arc::new(service);
    let repository = Arc::new(Repository::new(service.clone()));
    Self {
      service,
      repository,
    }
  }

  /// Cancel every in-flight fetch.
  pub fn cancel_all(&self) {
    self.repository.cancel_all();
  }

  /// Print every category, preceded by the "all" pseudo-category.
  pub async fn categories(&self, refresh: bool, out: &mut impl Write) -> Result<()> {
    if refresh {
      self.invalidate();
    }

    let categories = self.repository.get_categories(refresh).await?;
    for category in std::iter::once(Category::all()).chain(categories) {
      writeln!(out, "{:>4}  {}", category.id, category.name)?;
    }

    Ok(())
  }

  /// Print listings with their category names, filtered and sorted.
  pub async fn listings(
    &self,
    category_id: Option<i64>,
    sort: SortOption,
    refresh: bool,
    out: &mut impl Write,
  ) -> Result<()> {
    if refresh {
      self.invalidate();
    }

    let repository = self.repository.clone();
    let mut query = Query::new(move || {
      let repository = repository.clone();
      async move { repository.get_listings_with_category_name(refresh).await }
    });

    query.fetch();
    query.settle().await;
    query.refine(|rows| {
      rows.retain(|(listing, _)| matches_category(listing, category_id));
      rows.sort_by(|(a, _), (b, _)| compare_listings(sort, a, b));
    });

    match query.state() {
      LoadState::Loaded(rows) => {
        for (listing, category) in rows {
          writeln!(out, "{}", format_listing(listing, category))?;
        }
        info!(count = rows.len(), %sort, "Listed classifieds");
        Ok(())
      }
      LoadState::Failed(e) => Err(eyre!("Failed to load listings: {}", e)),
      LoadState::Idle | LoadState::Loading => Err(eyre!("Listings query did not complete")),
    }
  }

  /// Fetch both endpoints from the network and report what came back.
  ///
  /// Returns `true` when both succeeded.
  pub async fn check(&self, out: &mut impl Write) -> Result<bool> {
    self.invalidate();

    let (categories, listings) = tokio::join!(
      self.service.fetch_categories(),
      self.service.fetch_listings()
    );

    let mut healthy = true;

    writeln!(out, "Categories: {}", self.service.categories_endpoint().url())?;
    match categories {
      Ok(categories) => {
        writeln!(out, "  OK, {} categories", categories.len())?;
        if let Some(first) = categories.first() {
          writeln!(out, "  first: {}", first.name)?;
        }
      }
      Err(e) => {
        healthy = false;
        writeln!(out, "  FAILED: {}", e)?;
      }
    }

    writeln!(out, "Listings: {}", self.service.listings_endpoint().url())?;
    match listings {
      Ok(listings) => {
        writeln!(out, "  OK, {} listings", listings.len())?;
        if let Some(first) = listings.first() {
          writeln!(out, "  first: {}", first.title)?;
        }
      }
      Err(e) => {
        healthy = false;
        writeln!(out, "  FAILED: {}", e)?;
      }
    }

    Ok(healthy)
  }

  /// Empty both cache tiers and the repository snapshots.
  pub fn clear_cache(&self) -> Result<()> {
    self.repository.clear_snapshot();
    self
      .service
      .client()
      .cache()
      .clear()
      .map_err(|e| eyre!("Failed to clear cache: {}", e))
  }

  /// Evict the cached responses of both endpoints.
  fn invalidate(&self) {
    let cache = self.service.client().cache();
    for endpoint in [
      self.service.categories_endpoint(),
      self.service.listings_endpoint(),
    ] {
      if let Err(e) = cache.remove(&endpoint.cache_key()) {
        warn!(url = %endpoint.url(), error = %e, "Failed to evict cached response");
      }
    }
  }
}

fn format_listing(listing: &Listing, category: &str) -> String {
  let urgent = if listing.is_urgent { "[URGENT] " } else { "" };
  format!(
    "{}{} | {} | {} | {}",
    urgent,
    listing.title,
    listing.formatted_price(),
    category,
    listing.formatted_date()
  )
}
