use super::repository::{Recency, Tx};
use crate::domain::authorization::{Action, Actor, Resource, authorize};
use crate::domain::ids::ReviewId;
use crate::domain::listing::Listing;
use crate::domain::ports::StoreRef;
use crate::domain::review::{NewReview, Review, ReviewUpdate};
use crate::error::{BookingError, Result};
use chrono::Utc;

#[derive(Clone)]
pub struct ReviewService {
    store: StoreRef,
}

impl ReviewService {
    pub fn new(store: StoreRef) -> Self {
        Self { store }
    }

    /// One review per (listing, reviewer); a second one is a `Conflict`.
    pub async fn create_review(&self, actor: &Actor, fields: NewReview) -> Result<Review> {
        authorize(actor, Resource::Nothing, Action::CreateReview).into_result()?;
        let reviewer = actor.require_user()?;

        let mut tx = Tx::begin(self.store.as_ref()).await?;
        tx.get::<Listing>(fields.listing).await?;
        if tx.review_by(fields.listing, reviewer).await?.is_some() {
            return Err(BookingError::Conflict(
                "You have already reviewed this listing.".to_string(),
            ));
        }
        if let Some(id) = fields.id
            && tx.find::<Review>(id).await?.is_some()
        {
            return Err(BookingError::Conflict(format!("review {id} already exists")));
        }

        let review = Review::new(reviewer, fields, Utc::now())?;
        tx.save(&review)?;
        tx.commit().await?;
        tracing::info!(review_id = %review.id, listing_id = %review.listing, rating = review.rating, "review created");
        Ok(review)
    }

    pub async fn list_reviews(&self) -> Result<Vec<Review>> {
        let tx = Tx::begin(self.store.as_ref()).await?;
        tx.select::<Review>(Recency::NewestFirst, |_| true).await
    }

    pub async fn get_review(&self, id: ReviewId) -> Result<Review> {
        let tx = Tx::begin(self.store.as_ref()).await?;
        tx.get::<Review>(id).await
    }

    pub async fn update_review(
        &self,
        actor: &Actor,
        id: ReviewId,
        update: ReviewUpdate,
    ) -> Result<Review> {
        let mut tx = Tx::begin(self.store.as_ref()).await?;
        let review = tx.get::<Review>(id).await?;
        authorize(actor, Resource::Review(&review), Action::UpdateReview).into_result()?;
        let review = review.revised(update)?;
        tx.save(&review)?;
        tx.commit().await?;
        Ok(review)
    }

    pub async fn delete_review(&self, actor: &Actor, id: ReviewId) -> Result<()> {
        let mut tx = Tx::begin(self.store.as_ref()).await?;
        let review = tx.get::<Review>(id).await?;
        authorize(actor, Resource::Review(&review), Action::DeleteReview).into_result()?;
        tx.remove::<Review>(id);
        tx.commit().await
    }
}
