use super::repository::{Recency, Tx};
use crate::domain::authorization::{Action, Actor, Resource, authorize};
use crate::domain::ids::ListingId;
use crate::domain::listing::{Listing, ListingSummary, ListingUpdate, NewListing};
use crate::domain::review::Review;
use crate::domain::ports::StoreRef;
use crate::error::{BookingError, Result};
use chrono::Utc;

/// Listings and their read-side sub-actions. Reads are open to everyone;
/// writes belong to the host.
#[derive(Clone)]
pub struct ListingService {
    store: StoreRef,
}

async fn summarize(tx: &Tx, listing: Listing) -> Result<ListingSummary> {
    let ratings: Vec<u8> = tx
        .reviews_for_listing(listing.id, Recency::NewestFirst)
        .await?
        .iter()
        .map(|review| review.rating)
        .collect();
    Ok(ListingSummary::new(listing, &ratings))
}

async fn summarize_all(tx: &Tx, listings: Vec<Listing>) -> Result<Vec<ListingSummary>> {
    let mut summaries = Vec::with_capacity(listings.len());
    for listing in listings {
        summaries.push(summarize(tx, listing).await?);
    }
    Ok(summaries)
}

impl ListingService {
    pub fn new(store: StoreRef) -> Self {
        Self { store }
    }

    /// The actor becomes the listing's host.
    pub async fn create_listing(&self, actor: &Actor, fields: NewListing) -> Result<Listing> {
        authorize(actor, Resource::Nothing, Action::CreateListing).into_result()?;
        let host = actor.require_user()?;

        let mut tx = Tx::begin(self.store.as_ref()).await?;
        if let Some(id) = fields.id
            && tx.find::<Listing>(id).await?.is_some()
        {
            return Err(BookingError::Conflict(format!("listing {id} already exists")));
        }
        let listing = Listing::new(host, fields, Utc::now());
        tx.save(&listing)?;
        tx.commit().await?;
        tracing::info!(listing_id = %listing.id, host = %host, "listing created");
        Ok(listing)
    }

    pub async fn list_listings(&self) -> Result<Vec<ListingSummary>> {
        let tx = Tx::begin(self.store.as_ref()).await?;
        let listings = tx.select::<Listing>(Recency::NewestFirst, |_| true).await?;
        summarize_all(&tx, listings).await
    }

    pub async fn get_listing(&self, id: ListingId) -> Result<ListingSummary> {
        let tx = Tx::begin(self.store.as_ref()).await?;
        let listing = tx.get::<Listing>(id).await?;
        summarize(&tx, listing).await
    }

    pub async fn update_listing(
        &self,
        actor: &Actor,
        id: ListingId,
        update: ListingUpdate,
    ) -> Result<Listing> {
        let mut tx = Tx::begin(self.store.as_ref()).await?;
        let mut listing = tx.get::<Listing>(id).await?;
        authorize(actor, Resource::Listing(&listing), Action::UpdateListing).into_result()?;
        listing.apply(update, Utc::now());
        tx.save(&listing)?;
        tx.commit().await?;
        Ok(listing)
    }

    /// Deletes the listing with its reviews, bookings and their payments.
    pub async fn delete_listing(&self, actor: &Actor, id: ListingId) -> Result<()> {
        let mut tx = Tx::begin(self.store.as_ref()).await?;
        let listing = tx.get::<Listing>(id).await?;
        authorize(actor, Resource::Listing(&listing), Action::DeleteListing).into_result()?;

        let bookings = tx.bookings_for_listing(id, Recency::OldestFirst).await?;
        for booking in &bookings {
            tx.remove_booking_cascade(booking.id).await?;
        }
        let reviews = tx.reviews_for_listing(id, Recency::OldestFirst).await?;
        for review in &reviews {
            tx.remove::<Review>(review.id);
        }
        tx.remove::<Listing>(id);
        tx.commit().await?;
        tracing::info!(
            listing_id = %id,
            bookings = bookings.len(),
            reviews = reviews.len(),
            "listing deleted"
        );
        Ok(())
    }

    /// Reviews of one listing, newest first.
    pub async fn listing_reviews(&self, id: ListingId) -> Result<Vec<Review>> {
        let tx = Tx::begin(self.store.as_ref()).await?;
        tx.get::<Listing>(id).await?;
        tx.reviews_for_listing(id, Recency::NewestFirst).await
    }

    pub async fn my_listings(&self, actor: &Actor) -> Result<Vec<ListingSummary>> {
        let host = actor
            .user()
            .ok_or_else(|| BookingError::Permission("Authentication required.".to_string()))?;
        let tx = Tx::begin(self.store.as_ref()).await?;
        let listings = tx
            .select::<Listing>(Recency::NewestFirst, |l| l.host == host)
            .await?;
        summarize_all(&tx, listings).await
    }

    pub async fn available_listings(&self) -> Result<Vec<ListingSummary>> {
        let tx = Tx::begin(self.store.as_ref()).await?;
        let listings = tx
            .select::<Listing>(Recency::NewestFirst, |l| l.is_available)
            .await?;
        summarize_all(&tx, listings).await
    }
}
