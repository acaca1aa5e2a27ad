//! Booking state machine.
//!
//! Every transition authorizes the actor first, then asks
//! [`BookingStatus::after`] whether the move is legal. A rejected transition
//! writes nothing.

use super::repository::Tx;
use crate::domain::authorization::{Action, Actor, Resource, authorize};
use crate::domain::booking::{Booking, BookingAction, BookingStatus, NewBooking};
use crate::domain::ids::BookingId;
use crate::domain::listing::Listing;
use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::ports::StoreRef;
use crate::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A booking status change that was applied (or, for settle on an already
/// confirmed booking, accepted without change).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub booking: Booking,
    pub from: BookingStatus,
    pub to: BookingStatus,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Clone)]
pub struct BookingLifecycle {
    store: StoreRef,
}

fn action_for(action: BookingAction) -> Action {
    match action {
        BookingAction::Confirm => Action::ConfirmBooking,
        BookingAction::Cancel => Action::CancelBooking,
        BookingAction::Complete => Action::CompleteBooking,
        BookingAction::Settle => Action::SettleBooking,
    }
}

impl BookingLifecycle {
    pub fn new(store: StoreRef) -> Self {
        Self { store }
    }

    /// Host confirmation of a pending booking.
    pub async fn confirm(&self, actor: &Actor, id: BookingId) -> Result<Booking> {
        self.run(actor, id, BookingAction::Confirm).await
    }

    /// Cancellation by the guest or the host.
    pub async fn cancel(&self, actor: &Actor, id: BookingId) -> Result<Booking> {
        self.run(actor, id, BookingAction::Cancel).await
    }

    /// End of stay, reported by the host or the stay-completion process.
    pub async fn complete(&self, actor: &Actor, id: BookingId) -> Result<Booking> {
        self.run(actor, id, BookingAction::Complete).await
    }

    async fn run(&self, actor: &Actor, id: BookingId, action: BookingAction) -> Result<Booking> {
        let mut tx = Tx::begin(self.store.as_ref()).await?;
        let transition = transition_in(&mut tx, actor, id, action).await?;
        tx.commit().await?;
        Ok(transition.booking)
    }
}

/// Stages a new `pending` booking of `request.listing` for the actor.
pub async fn open_in(
    tx: &mut Tx,
    actor: &Actor,
    request: NewBooking,
    now: DateTime<Utc>,
) -> Result<Booking> {
    authorize(actor, Resource::Nothing, Action::CreateBooking).into_result()?;
    let guest = actor.require_user()?;
    if let Some(id) = request.id
        && tx.find::<Booking>(id).await?.is_some()
    {
        return Err(BookingError::Conflict(format!("booking {id} already exists")));
    }

    let listing = tx.get::<Listing>(request.listing).await?;
    let booking = Booking::new(&listing, guest, request, now)?;
    tx.save(&booking)?;
    tracing::info!(booking_id = %booking.id, listing_id = %listing.id, total = %booking.total_price, "booking opened");
    Ok(booking)
}

/// Applies `action` to the booking inside `tx`.
pub async fn transition_in(
    tx: &mut Tx,
    actor: &Actor,
    id: BookingId,
    action: BookingAction,
) -> Result<Transition> {
    let (booking, listing) = tx.booking_with_listing(id).await?;
    authorize(
        actor,
        Resource::Booking {
            booking: &booking,
            listing: &listing,
        },
        action_for(action),
    )
    .into_result()?;

    let from = booking.status;
    let to = from.after(action)?;
    let booking = Booking {
        status: to,
        ..booking
    };
    if from != to {
        tx.save(&booking)?;
        tracing::info!(booking_id = %id, %from, %to, %action, "booking transitioned");
    }
    Ok(Transition { booking, from, to })
}

/// Payment-triggered confirmation of `booking`, staged in the caller's `tx`.
///
/// Only the system may settle, and only with a completed payment that
/// belongs to this booking.
pub async fn settle_in(tx: &mut Tx, booking: BookingId, payment: &Payment) -> Result<Transition> {
    if payment.booking != booking {
        return Err(BookingError::Validation(format!(
            "payment {} does not belong to booking {booking}",
            payment.id
        )));
    }
    if payment.status != PaymentStatus::Completed {
        return Err(BookingError::Conflict(format!(
            "payment {} is {}; only a completed payment can settle a booking",
            payment.id, payment.status
        )));
    }
    transition_in(tx, &Actor::System, booking, BookingAction::Settle).await
}
