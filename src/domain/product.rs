use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source-assigned listing identifier (the cart button's `data-id`).
///
/// This is the only identity key for a product; detail URLs may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(pub i64);

impl ExternalId {
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mintage as rendered by the shop: usually a number, sometimes free text
/// ("до 10 000", "не обмежений").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Circulation {
    Count(u64),
    Text(String),
}

impl Circulation {
    /// Interpret a raw parameter value. Whitespace (including NBSP thousands
    /// separators) is ignored when deciding whether the value is numeric.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
        match compact.parse::<u64>() {
            Ok(count) => Some(Self::Count(count)),
            Err(_) => Some(Self::Text(trimmed.to_string())),
        }
    }

    /// Storage representation (TEXT column)
    pub fn to_storage(&self) -> String {
        match self {
            Self::Count(count) => count.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

impl fmt::Display for Circulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(count) => write!(f, "{count}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// A validated, currently purchasable catalog listing as extracted from one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductListing {
    #[serde(rename = "externalId")]
    pub external_id: ExternalId,
    pub name: String,
    /// Price in whole currency units (UAH)
    pub price: u64,
    #[serde(rename = "detailUrl")]
    pub detail_url: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    pub material: Option<String>,
    pub circulation: Option<Circulation>,
    #[serde(rename = "yearOfProduction")]
    pub year_of_production: Option<i32>,
}

/// Persistent product state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(flatten)]
    pub listing: ProductListing,
    #[serde(rename = "soldOut")]
    pub sold_out: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "availableFrom")]
    pub available_from: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Record for a listing observed for the first time: available, with all
    /// lifecycle timestamps set to `now`.
    pub fn first_seen(listing: ProductListing, now: DateTime<Utc>) -> Self {
        Self {
            listing,
            sold_out: false,
            created_at: now,
            available_from: now,
            updated_at: now,
        }
    }

    pub const fn external_id(&self) -> ExternalId {
        self.listing.external_id
    }
}

/// Row identifier assigned by the store
pub type StorageKey = i64;

/// Projection of a stored product used by reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProduct {
    pub storage_key: StorageKey,
    pub external_id: ExternalId,
    pub name: String,
    pub price: u64,
    pub detail_url: String,
    pub sold_out: bool,
    pub available_from: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial field set for store updates; `None` leaves a column untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductUpdate {
    pub available_from: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub price: Option<u64>,
    pub sold_out: Option<bool>,
}

impl ProductUpdate {
    pub fn heartbeat(now: DateTime<Utc>) -> Self {
        Self {
            updated_at: Some(now),
            ..Self::default()
        }
    }

    pub fn returned(now: DateTime<Utc>) -> Self {
        Self {
            available_from: Some(now),
            updated_at: Some(now),
            sold_out: Some(false),
            ..Self::default()
        }
    }

    pub fn sold_out() -> Self {
        Self {
            sold_out: Some(true),
            ..Self::default()
        }
    }

    pub fn price(price: u64) -> Self {
        Self {
            price: Some(price),
            ..Self::default()
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.available_from.is_none()
            && self.updated_at.is_none()
            && self.price.is_none()
            && self.sold_out.is_none()
    }
}

/// Conjunctive row filter for bulk updates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub external_ids: Option<Vec<ExternalId>>,
    pub sold_out: Option<bool>,
    pub updated_before: Option<DateTime<Utc>>,
}

impl ProductFilter {
    pub fn by_ids(ids: impl Into<Vec<ExternalId>>) -> Self {
        Self {
            external_ids: Some(ids.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_sold_out(mut self, sold_out: bool) -> Self {
        self.sold_out = Some(sold_out);
        self
    }
}

/// Lifecycle state of a tracked item relative to one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductState {
    New,
    Available,
    SoldOut,
}

impl ProductState {
    pub const fn of(stored: Option<&StoredProduct>) -> Self {
        match stored {
            None => Self::New,
            Some(product) if product.sold_out => Self::SoldOut,
            Some(_) => Self::Available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("5000", Some(Circulation::Count(5000)))]
    #[case("10 000", Some(Circulation::Count(10_000)))]
    #[case("10\u{a0}000", Some(Circulation::Count(10_000)))]
    #[case(" до 3000 ", Some(Circulation::Text("до 3000".to_string())))]
    #[case("   ", None)]
    fn circulation_parsing(#[case] raw: &str, #[case] expected: Option<Circulation>) {
        assert_eq!(Circulation::parse(raw), expected);
    }

    #[test]
    fn first_seen_sets_all_timestamps() {
        let now = Utc::now();
        let listing = ProductListing {
            external_id: ExternalId(42),
            name: "Coin".to_string(),
            price: 1250,
            detail_url: "https://coins.bank.gov.ua/coin/p42.html".to_string(),
            image_url: "https://coins.bank.gov.ua/img/42.jpg".to_string(),
            material: None,
            circulation: None,
            year_of_production: Some(2023),
        };
        let record = ProductRecord::first_seen(listing, now);
        assert!(!record.sold_out);
        assert_eq!(record.created_at, now);
        assert_eq!(record.available_from, now);
        assert_eq!(record.updated_at, now);
        assert_eq!(record.external_id(), ExternalId(42));
    }

    #[test]
    fn state_from_stored_projection() {
        let now = Utc::now();
        let stored = StoredProduct {
            storage_key: 1,
            external_id: ExternalId(1),
            name: "x".to_string(),
            price: 1,
            detail_url: "u".to_string(),
            sold_out: true,
            available_from: now,
            updated_at: now,
        };
        assert_eq!(ProductState::of(None), ProductState::New);
        assert_eq!(ProductState::of(Some(&stored)), ProductState::SoldOut);
        let available = StoredProduct { sold_out: false, ..stored };
        assert_eq!(ProductState::of(Some(&available)), ProductState::Available);
    }

    #[test]
    fn update_presets() {
        assert!(ProductUpdate::default().is_empty());
        assert_eq!(ProductUpdate::sold_out().sold_out, Some(true));
        let now = Utc::now();
        let returned = ProductUpdate::returned(now);
        assert_eq!(returned.sold_out, Some(false));
        assert_eq!(returned.available_from, Some(now));
        assert_eq!(returned.updated_at, Some(now));
    }
}
