//! Records decoded from the categories and listings collections.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use url::Url;

/// Date format of `creation_date`, e.g. `2019-11-05T15:56:59+0000`.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Listing category
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
  pub id: i64,
  pub name: String,
}

impl Category {
  /// Id of the pseudo-category that stands for "no filter".
  pub const ALL_ID: i64 = -1;

  pub fn new(id: i64, name: impl Into<String>) -> Self {
    Self {
      id,
      name: name.into(),
    }
  }

  /// The "All Categories" pseudo-category.
  pub fn all() -> Self {
    Self::new(Self::ALL_ID, "All Categories")
  }
}

/// A classified ad.
///
/// Equality and hashing only consider `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
  pub id: i64,
  pub category_id: i64,
  pub title: String,
  pub description: String,
  pub price: f64,
  #[serde(with = "listing_date")]
  pub creation_date: DateTime<FixedOffset>,
  pub is_urgent: bool,
  #[serde(default)]
  pub siret: Option<String>,
  pub images_url: ImageUrls,
}

impl Listing {
  /// Price in euros, without decimals when the price is whole.
  pub fn formatted_price(&self) -> String {
    if self.price.fract() == 0.0 {
      format!("{:.0} €", self.price)
    } else {
      format!("{:.2} €", self.price)
    }
  }

  /// Creation date in medium style, e.g. `Nov 5, 2019`.
  pub fn formatted_date(&self) -> String {
    self.creation_date.format("%b %-d, %Y").to_string()
  }
}

impl PartialEq for Listing {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for Listing {}

impl Hash for Listing {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

/// Image links of a listing. Missing or malformed URLs become `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageUrls {
  #[serde(default, deserialize_with = "lenient_url")]
  pub small: Option<Url>,
  #[serde(default, deserialize_with = "lenient_url")]
  pub thumb: Option<Url>,
}

fn lenient_url<'de, D>(deserializer: D) -> Result<Option<Url>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<serde_json::Value>::deserialize(deserializer)?;
  Ok(
    value
      .as_ref()
      .and_then(|v| v.as_str())
      .and_then(|s| Url::parse(s).ok()),
  )
}

mod listing_date {
  use super::DATE_FORMAT;
  use chrono::{DateTime, FixedOffset};
  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S>(date: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(&date.format(DATE_FORMAT).to_string())
  }

  pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
  where
    D: Deserializer<'de>,
  {
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_str(&raw, DATE_FORMAT).map_err(|e| {
      serde::de::Error::custom(format!("invalid creation_date '{}': {}", raw, e))
    })
  }
}

/// Orderings offered over the listings collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOption {
  DateAscending,
  DateDescending,
  PriceAscending,
  PriceDescending,
  /// Urgent first, newest first within each group.
  #[default]
  UrgentFirst,
}

impl SortOption {
  pub const ALL: [SortOption; 5] = [
    SortOption::DateAscending,
    SortOption::DateDescending,
    SortOption::PriceAscending,
    SortOption::PriceDescending,
    SortOption::UrgentFirst,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      SortOption::DateAscending => "date-asc",
      SortOption::DateDescending => "date-desc",
      SortOption::PriceAscending => "price-asc",
      SortOption::PriceDescending => "price-desc",
      SortOption::UrgentFirst => "urgent",
    }
  }
}

impl fmt::Display for SortOption {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SortOption {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim().to_lowercase();
    SortOption::ALL
      .into_iter()
      .find(|option| option.as_str() == s)
      .ok_or_else(|| {
        let names: Vec<_> = SortOption::ALL.iter().map(|o| o.as_str()).collect();
        format!("unknown sort '{}', expected one of: {}", s, names.join(", "))
      })
  }
}
