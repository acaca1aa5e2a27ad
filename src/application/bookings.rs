use super::repository::{Recency, Tx};
use crate::domain::authorization::{Action, Actor, Resource, authorize};
use crate::domain::booking::{Booking, BookingStatus, BookingUpdate};
use crate::domain::ids::BookingId;
use crate::domain::listing::Listing;
use crate::domain::ports::StoreRef;
use crate::error::{BookingError, Result};

/// Read, reschedule and delete. Creation goes through
/// [`BookingEngine::book`](super::engine::BookingEngine::book) and status
/// changes through the lifecycle.
#[derive(Clone)]
pub struct BookingService {
    store: StoreRef,
}

impl BookingService {
    pub fn new(store: StoreRef) -> Self {
        Self { store }
    }

    /// Bookings the actor made or received as host, newest first.
    pub async fn list_bookings(&self, actor: &Actor) -> Result<Vec<Booking>> {
        let user = actor.require_user()?;
        let tx = Tx::begin(self.store.as_ref()).await?;
        let hosted: Vec<_> = tx
            .select::<Listing>(Recency::NewestFirst, |l| l.host == user)
            .await?
            .into_iter()
            .map(|l| l.id)
            .collect();
        tx.select::<Booking>(Recency::NewestFirst, |b| {
            b.guest == user || hosted.contains(&b.listing)
        })
        .await
    }

    /// Only the actor's own reservations.
    pub async fn my_bookings(&self, actor: &Actor) -> Result<Vec<Booking>> {
        let guest = actor.require_user()?;
        let tx = Tx::begin(self.store.as_ref()).await?;
        tx.select::<Booking>(Recency::NewestFirst, |b| b.guest == guest)
            .await
    }

    pub async fn get_booking(&self, actor: &Actor, id: BookingId) -> Result<Booking> {
        let tx = Tx::begin(self.store.as_ref()).await?;
        let (booking, listing) = tx.booking_with_listing(id).await?;
        authorize(
            actor,
            Resource::Booking {
                booking: &booking,
                listing: &listing,
            },
            Action::ViewBooking,
        )
        .into_result()?;
        Ok(booking)
    }

    /// Moves the dates of a pending booking; the total is recomputed unless
    /// overridden. Existing payment attempts keep their amount.
    pub async fn update_booking(
        &self,
        actor: &Actor,
        id: BookingId,
        update: BookingUpdate,
    ) -> Result<Booking> {
        let mut tx = Tx::begin(self.store.as_ref()).await?;
        let (booking, listing) = tx.booking_with_listing(id).await?;
        authorize(
            actor,
            Resource::Booking {
                booking: &booking,
                listing: &listing,
            },
            Action::UpdateBooking,
        )
        .into_result()?;
        if booking.status != BookingStatus::Pending {
            return Err(BookingError::Conflict(format!(
                "only pending bookings can be changed; booking {id} is {}",
                booking.status
            )));
        }

        let booking = booking.rescheduled(&listing, update)?;
        tx.save(&booking)?;
        tx.commit().await?;
        tracing::info!(booking_id = %id, total = %booking.total_price, "booking rescheduled");
        Ok(booking)
    }

    /// Deletes the booking together with its payments.
    pub async fn delete_booking(&self, actor: &Actor, id: BookingId) -> Result<()> {
        let mut tx = Tx::begin(self.store.as_ref()).await?;
        let (booking, listing) = tx.booking_with_listing(id).await?;
        authorize(
            actor,
            Resource::Booking {
                booking: &booking,
                listing: &listing,
            },
            Action::DeleteBooking,
        )
        .into_result()?;
        tx.remove_booking_cascade(id).await?;
        tx.commit().await?;
        tracing::info!(booking_id = %id, "booking deleted");
        Ok(())
    }
}
