//! Classified listings: records, the service seam and the repository.

mod repository;
mod service;
mod types;

pub use repository::{
  compare_listings, filter_by_category, matches_category, sort_by_date_and_urgency, sort_listings,
  Repository, UNKNOWN_CATEGORY,
};
pub use service::{HttpListingService, ListingService};
pub use types::{Category, ImageUrls, Listing, SortOption, DATE_FORMAT};
