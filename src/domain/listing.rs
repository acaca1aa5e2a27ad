use super::ids::{ListingId, UserId};
use super::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bookable property with a nightly price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    pub description: String,
    pub price_per_night: Money,
    pub location: String,
    /// Comma-separated free text.
    pub amenities: String,
    /// The owning host. Only the host may modify or delete the listing.
    pub host: UserId,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when a host creates a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewListing {
    #[serde(default)]
    pub id: Option<ListingId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price_per_night: Money,
    pub location: String,
    #[serde(default)]
    pub amenities: String,
    #[serde(default = "available_by_default")]
    pub is_available: bool,
}

fn available_by_default() -> bool {
    true
}

/// Partial listing update: absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_per_night: Option<Money>,
    pub location: Option<String>,
    pub amenities: Option<String>,
    pub is_available: Option<bool>,
}

impl Listing {
    pub fn new(host: UserId, fields: NewListing, now: DateTime<Utc>) -> Self {
        Self {
            id: fields.id.unwrap_or_default(),
            title: fields.title,
            description: fields.description,
            price_per_night: fields.price_per_night,
            location: fields.location,
            amenities: fields.amenities,
            host,
            is_available: fields.is_available,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: ListingUpdate, now: DateTime<Utc>) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(price) = update.price_per_night {
            self.price_per_night = price;
        }
        if let Some(location) = update.location {
            self.location = location;
        }
        if let Some(amenities) = update.amenities {
            self.amenities = amenities;
        }
        if let Some(is_available) = update.is_available {
            self.is_available = is_available;
        }
        self.updated_at = now;
    }
}

/// Listing as presented to readers, with its review aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingSummary {
    #[serde(flatten)]
    pub listing: Listing,
    /// Mean rating, 0 when the listing has no reviews.
    pub average_rating: f64,
    pub review_count: usize,
}

impl ListingSummary {
    pub fn new(listing: Listing, ratings: &[u8]) -> Self {
        let review_count = ratings.len();
        let average_rating = if review_count == 0 {
            0.0
        } else {
            ratings.iter().map(|r| f64::from(*r)).sum::<f64>() / review_count as f64
        };
        Self {
            listing,
            average_rating,
            review_count,
        }
    }
}
