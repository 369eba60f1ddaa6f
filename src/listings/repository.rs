//! Repository holding in-memory snapshots of the fetched collections.

use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::service::ListingService;
use super::types::{Category, Listing, SortOption};
use crate::api::FetchError;

/// Category name used when a listing references an unknown category id.
pub const UNKNOWN_CATEGORY: &str = "Unknown Category";

#[derive(Default)]
struct Snapshot {
  categories: Option<Arc<Vec<Category>>>,
  listings: Option<Arc<Vec<Listing>>>,
}

/// Caches the most recently fetched collections and serves filtered and
/// sorted views over them.
///
/// Snapshots are replaced wholesale on a successful fetch and left untouched
/// on failure. An empty snapshot counts as missing.
pub struct Repository {
  service: Arc<dyn ListingService>,
  snapshot: RwLock<Snapshot>,
}

impl Repository {
  pub fn new(service: Arc<dyn ListingService>) -> Self {
    Self {
      service,
      snapshot: RwLock::new(Snapshot::default()),
    }
  }

  pub async fn get_categories(&self, force_refresh: bool) -> Result<Vec<Category>, FetchError> {
    if !force_refresh {
      let cached = non_empty(&self.snapshot.read().categories);
      if let Some(categories) = cached {
        return Ok(categories.as_ref().clone());
      }
    }

    let categories = self.service.fetch_categories().await?;
    debug!(count = categories.len(), "Replacing categories snapshot");
    self.snapshot.write().categories = Some(Arc::new(categories.clone()));

    Ok(categories)
  }

  pub async fn get_listings(&self, force_refresh: bool) -> Result<Vec<Listing>, FetchError> {
    if !force_refresh {
      let cached = non_empty(&self.snapshot.read().listings);
      if let Some(listings) = cached {
        return Ok(listings.as_ref().clone());
      }
    }

    let listings = self.service.fetch_listings().await?;
    debug!(count = listings.len(), "Replacing listings snapshot");
    self.snapshot.write().listings = Some(Arc::new(listings.clone()));

    Ok(listings)
  }

  /// Listings paired with their category name, fetching both collections
  /// concurrently.
  pub async fn get_listings_with_category_name(
    &self,
    force_refresh: bool,
  ) -> Result<Vec<(Listing, String)>, FetchError> {
    let (listings, categories) = tokio::try_join!(
      self.get_listings(force_refresh),
      self.get_categories(force_refresh)
    )?;

    let names: HashMap<i64, &str> = categories
      .iter()
      .map(|category| (category.id, category.name.as_str()))
      .collect();

    Ok(
      listings
        .into_iter()
        .map(|listing| {
          let name = names
            .get(&listing.category_id)
            .copied()
            .unwrap_or(UNKNOWN_CATEGORY)
            .to_string();
          (listing, name)
        })
        .collect(),
    )
  }

  /// Listings in `category_id`; `None` or [`Category::ALL_ID`] means all.
  pub async fn get_listings_filtered(
    &self,
    category_id: Option<i64>,
    force_refresh: bool,
  ) -> Result<Vec<Listing>, FetchError> {
    let listings = self.get_listings(force_refresh).await?;
    Ok(filter_by_category(listings, category_id))
  }

  pub async fn get_listings_sorted(
    &self,
    sort: SortOption,
    force_refresh: bool,
  ) -> Result<Vec<Listing>, FetchError> {
    let mut listings = self.get_listings(force_refresh).await?;
    sort_listings(&mut listings, sort);
    Ok(listings)
  }

  /// Cancel in-flight fetches of the underlying service.
  pub fn cancel_all(&self) {
    self.service.cancel_all();
  }

  /// Drop both snapshots so the next read fetches again.
  pub fn clear_snapshot(&self) {
    *self.snapshot.write() = Snapshot::default();
  }
}

fn non_empty<T>(snapshot: &Option<Arc<Vec<T>>>) -> Option<Arc<Vec<T>>> {
  snapshot.as_ref().filter(|items| !items.is_empty()).cloned()
}

/// Whether `listing` belongs to `category_id`; `None` and
/// [`Category::ALL_ID`] match everything.
pub fn matches_category(listing: &Listing, category_id: Option<i64>) -> bool {
  match category_id {
    None | Some(Category::ALL_ID) => true,
    Some(id) => listing.category_id == id,
  }
}

/// Keep listings in `category_id`, preserving order.
pub fn filter_by_category(listings: Vec<Listing>, category_id: Option<i64>) -> Vec<Listing> {
  listings
    .into_iter()
    .filter(|listing| matches_category(listing, category_id))
    .collect()
}

/// Ordering of two listings under `sort`.
pub fn compare_listings(sort: SortOption, a: &Listing, b: &Listing) -> Ordering {
  match sort {
    SortOption::DateAscending => a.creation_date.cmp(&b.creation_date),
    SortOption::DateDescending => b.creation_date.cmp(&a.creation_date),
    SortOption::PriceAscending => a.price.total_cmp(&b.price),
    SortOption::PriceDescending => b.price.total_cmp(&a.price),
    SortOption::UrgentFirst => b
      .is_urgent
      .cmp(&a.is_urgent)
      .then_with(|| b.creation_date.cmp(&a.creation_date)),
  }
}

/// Stable sort of `listings` by `sort`.
pub fn sort_listings(listings: &mut [Listing], sort: SortOption) {
  listings.sort_by(|a, b| compare_listings(sort, a, b));
}

/// Urgent listings first, newest first within each group.
pub fn sort_by_date_and_urgency(listings: &mut [Listing]) {
  sort_listings(listings, SortOption::UrgentFirst);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::listings::types::ImageUrls;
  use async_trait::async_trait;
  use chrono::{DateTime, FixedOffset};
  use parking_lot::Mutex;
  use std::sync::atomic::{AtomicU32, Ordering};

  fn date(day: u32) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(&format!("2023-01-{:02}T10:00:00+00:00", day)).unwrap()
  }

  fn listing(id: i64, category_id: i64, price: f64, day: u32, is_urgent: bool) -> Listing {
    Listing {
      id,
      category_id,
      title: format!("Listing {}", id),
      description: String::new(),
      price,
      creation_date: date(day),
      is_urgent,
      siret: None,
      images_url: ImageUrls::default(),
    }
  }

  fn sample_listings() -> Vec<Listing> {
    vec![
      listing(1, 1, 10000.0, 5, true),
      listing(2, 2, 50.0, 10, false),
      listing(3, 3, 200.0, 7, false),
      listing(4, 1, 15000.0, 15, false),
    ]
  }

  fn sample_categories() -> Vec<Category> {
    vec![
      Category::new(1, "Vehicles"),
      Category::new(2, "Fashion"),
      Category::new(3, "Home"),
    ]
  }

  fn ids(listings: &[Listing]) -> Vec<i64> {
    listings.iter().map(|l| l.id).collect()
  }

  /// Mock service with swappable results and call counters.
  struct MockService {
    categories: Mutex<Result<Vec<Category>, ()>>,
    listings: Mutex<Result<Vec<Listing>, ()>>,
    category_calls: AtomicU32,
    listing_calls: AtomicU32,
  }

  impl MockService {
    fn new(categories: Vec<Category>, listings: Vec<Listing>) -> Arc<Self> {
      Arc::new(Self {
        categories: Mutex::new(Ok(categories)),
        listings: Mutex::new(Ok(listings)),
        category_calls: AtomicU32::new(0),
        listing_calls: AtomicU32::new(0),
      })
    }

    fn fail_listings(&self) {
      *self.listings.lock() = Err(());
    }
  }

  #[async_trait]
  impl ListingService for MockService {
    async fn fetch_categories(&self) -> Result<Vec<Category>, FetchError> {
      self.category_calls.fetch_add(1, Ordering::SeqCst);
      self
        .categories
        .lock()
        .clone()
        .map_err(|_| FetchError::ServerError(500))
    }

    async fn fetch_listings(&self) -> Result<Vec<Listing>, FetchError> {
      self.listing_calls.fetch_add(1, Ordering::SeqCst);
      self
        .listings
        .lock()
        .clone()
        .map_err(|_| FetchError::NoData)
    }

    fn cancel_all(&self) {}
  }

  fn repository(service: &Arc<MockService>) -> Repository {
    Repository::new(service.clone())
  }

  #[tokio::test]
  async fn test_snapshot_served_until_forced() {
    let service = MockService::new(sample_categories(), sample_listings());
    let repo = repository(&service);

    let first = repo.get_categories(false).await.unwrap();
    let second = repo.get_categories(false).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(service.category_calls.load(Ordering::SeqCst), 1);

    repo.get_categories(true).await.unwrap();
    assert_eq!(service.category_calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_empty_snapshot_is_refetched() {
    let service = MockService::new(Vec::new(), Vec::new());
    let repo = repository(&service);

    repo.get_listings(false).await.unwrap();
    repo.get_listings(false).await.unwrap();
    assert_eq!(service.listing_calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_failed_refresh_keeps_old_snapshot() {
    let service = MockService::new(sample_categories(), sample_listings());
    let repo = repository(&service);

    repo.get_listings(false).await.unwrap();
    service.fail_listings();

    let result = repo.get_listings(true).await;
    assert!(matches!(result, Err(FetchError::NoData)));

    let listings = repo.get_listings(false).await.unwrap();
    assert_eq!(ids(&listings), vec![1, 2, 3, 4]);
  }

  #[tokio::test]
  async fn test_error_passes_through() {
    let service = MockService::new(sample_categories(), sample_listings());
    service.fail_listings();
    let repo = repository(&service);

    let result = repo.get_listings_with_category_name(false).await;
    assert!(matches!(result, Err(FetchError::NoData)));
  }

  /// Service whose two fetches only complete once both are in flight.
  struct RendezvousService {
    barrier: tokio::sync::Barrier,
  }

  #[async_trait]
  impl ListingService for RendezvousService {
    async fn fetch_categories(&self) -> Result<Vec<Category>, FetchError> {
      self.barrier.wait().await;
      Ok(sample_categories())
    }

    async fn fetch_listings(&self) -> Result<Vec<Listing>, FetchError> {
      self.barrier.wait().await;
      Ok(sample_listings())
    }

    fn cancel_all(&self) {}
  }

  #[tokio::test]
  async fn test_join_fetches_both_collections_concurrently() {
    let repo = Repository::new(Arc::new(RendezvousService {
      barrier: tokio::sync::Barrier::new(2),
    }));

    let joined = tokio::time::timeout(
      std::time::Duration::from_secs(5),
      repo.get_listings_with_category_name(false),
    )
    .await
    .expect("fetches ran one after the other")
    .unwrap();

    assert_eq!(joined.len(), 4);
  }

  #[tokio::test]
  async fn test_listings_with_category_name() {
    let mut listings = sample_listings();
    listings.push(listing(5, 99, 1.0, 1, false));
    let service = MockService::new(sample_categories(), listings);
    let repo = repository(&service);

    let joined = repo.get_listings_with_category_name(false).await.unwrap();
    let names: Vec<(i64, &str)> = joined
      .iter()
      .map(|(listing, name)| (listing.id, name.as_str()))
      .collect();

    assert_eq!(
      names,
      vec![
        (1, "Vehicles"),
        (2, "Fashion"),
        (3, "Home"),
        (4, "Vehicles"),
        (5, "Unknown Category"),
      ]
    );
    assert_eq!(service.category_calls.load(Ordering::SeqCst), 1);
    assert_eq!(service.listing_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_filtered_listings() {
    let service = MockService::new(sample_categories(), sample_listings());
    let repo = repository(&service);

    let all = repo.get_listings_filtered(None, false).await.unwrap();
    assert_eq!(ids(&all), vec![1, 2, 3, 4]);

    let all = repo
      .get_listings_filtered(Some(Category::ALL_ID), false)
      .await
      .unwrap();
    assert_eq!(ids(&all), vec![1, 2, 3, 4]);

    let vehicles = repo.get_listings_filtered(Some(1), false).await.unwrap();
    assert_eq!(ids(&vehicles), vec![1, 4]);

    let none = repo.get_listings_filtered(Some(42), false).await.unwrap();
    assert!(none.is_empty());

    // Filtering works on the snapshot
    assert_eq!(service.listing_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_sorted_listings() {
    let service = MockService::new(sample_categories(), sample_listings());
    let repo = repository(&service);

    async fn sorted(repo: &Repository, sort: SortOption) -> Vec<i64> {
      ids(&repo.get_listings_sorted(sort, false).await.unwrap())
    }

    assert_eq!(sorted(&repo, SortOption::DateAscending).await, vec![1, 3, 2, 4]);
    assert_eq!(sorted(&repo, SortOption::DateDescending).await, vec![4, 2, 3, 1]);
    assert_eq!(sorted(&repo, SortOption::PriceAscending).await, vec![2, 3, 1, 4]);
    assert_eq!(sorted(&repo, SortOption::PriceDescending).await, vec![4, 1, 3, 2]);
    assert_eq!(sorted(&repo, SortOption::UrgentFirst).await, vec![1, 4, 2, 3]);
  }

  #[test]
  fn test_sort_by_date_and_urgency() {
    let mut listings = vec![
      listing(1, 1, 0.0, 3, true),
      listing(2, 1, 0.0, 10, false),
      listing(3, 1, 0.0, 1, true),
      listing(4, 1, 0.0, 7, false),
    ];

    sort_by_date_and_urgency(&mut listings);
    assert_eq!(ids(&listings), vec![1, 3, 2, 4]);
  }

  #[test]
  fn test_filter_preserves_order() {
    let listings = vec![
      listing(1, 2, 0.0, 1, false),
      listing(2, 1, 0.0, 2, false),
      listing(3, 2, 0.0, 3, false),
    ];

    assert_eq!(ids(&filter_by_category(listings, Some(2))), vec![1, 3]);
  }

  #[tokio::test]
  async fn test_clear_snapshot_forces_fetch() {
    let service = MockService::new(sample_categories(), sample_listings());
    let repo = repository(&service);

    repo.get_listings(false).await.unwrap();
    repo.clear_snapshot();
    repo.get_listings(false).await.unwrap();
    assert_eq!(service.listing_calls.load(Ordering::SeqCst), 2);
  }
}
