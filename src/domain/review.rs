use super::ids::{ListingId, ReviewId, UserId};
use crate::error::BookingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub listing: ListingId,
    pub reviewer: UserId,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReview {
    #[serde(default)]
    pub id: Option<ReviewId>,
    pub listing: ListingId,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewUpdate {
    pub rating: Option<u8>,
    pub comment: Option<String>,
}

fn check_rating(rating: u8) -> Result<u8, BookingError> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(rating)
    } else {
        Err(BookingError::Validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}, got {rating}"
        )))
    }
}

impl Review {
    /// Builds a review; uniqueness per (listing, reviewer) is the store's concern.
    pub fn new(reviewer: UserId, fields: NewReview, now: DateTime<Utc>) -> Result<Self, BookingError> {
        Ok(Self {
            id: fields.id.unwrap_or_default(),
            listing: fields.listing,
            reviewer,
            rating: check_rating(fields.rating)?,
            comment: fields.comment,
            created_at: now,
        })
    }

    pub fn revised(&self, update: ReviewUpdate) -> Result<Self, BookingError> {
        let rating = match update.rating {
            Some(rating) => check_rating(rating)?,
            None => self.rating,
        };
        Ok(Self {
            rating,
            comment: update.comment.unwrap_or_else(|| self.comment.clone()),
            ..self.clone()
        })
    }
}
