//! Command vocabulary of the batch runner and its dispatch onto the engine.

use crate::application::engine::BookingEngine;
use crate::application::reconciliation::Payer;
use crate::domain::authorization::Actor;
use crate::domain::booking::{BookingUpdate, NewBooking};
use crate::domain::ids::{BookingId, ListingId, PaymentId, ReviewId};
use crate::domain::listing::{ListingUpdate, NewListing};
use crate::domain::payment::PaymentUpdate;
use crate::domain::review::{NewReview, ReviewUpdate};
use crate::error::{BookingError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One line of a command script, e.g.
/// `{"op": "confirm_booking", "actor": {"user": "..."}, "id": "..."}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    CreateListing {
        actor: Actor,
        listing: NewListing,
    },
    ListListings,
    GetListing {
        id: ListingId,
    },
    UpdateListing {
        actor: Actor,
        id: ListingId,
        changes: ListingUpdate,
    },
    DeleteListing {
        actor: Actor,
        id: ListingId,
    },
    ListingReviews {
        id: ListingId,
    },
    MyListings {
        actor: Actor,
    },
    AvailableListings,

    /// Books a listing, creates its payment and initiates it.
    CreateBooking {
        actor: Actor,
        payer: Payer,
        booking: NewBooking,
        #[serde(default)]
        payment_id: Option<PaymentId>,
    },
    ListBookings {
        actor: Actor,
    },
    MyBookings {
        actor: Actor,
    },
    GetBooking {
        actor: Actor,
        id: BookingId,
    },
    UpdateBooking {
        actor: Actor,
        id: BookingId,
        changes: BookingUpdate,
    },
    DeleteBooking {
        actor: Actor,
        id: BookingId,
    },
    ConfirmBooking {
        actor: Actor,
        id: BookingId,
    },
    CancelBooking {
        actor: Actor,
        id: BookingId,
    },
    CompleteBooking {
        actor: Actor,
        id: BookingId,
    },

    CreateReview {
        actor: Actor,
        review: NewReview,
    },
    ListReviews,
    GetReview {
        id: ReviewId,
    },
    UpdateReview {
        actor: Actor,
        id: ReviewId,
        changes: ReviewUpdate,
    },
    DeleteReview {
        actor: Actor,
        id: ReviewId,
    },

    CreatePayment {
        actor: Actor,
        booking: BookingId,
        #[serde(default)]
        id: Option<PaymentId>,
    },
    InitiatePayment {
        actor: Actor,
        id: PaymentId,
        payer: Payer,
    },
    VerifyPayment {
        reference: String,
    },
    /// Direct status write, as issued by the settlement process.
    UpdatePaymentStatus {
        actor: Actor,
        id: PaymentId,
        update: PaymentUpdate,
    },
    /// Gateway callback or client poll.
    Reconcile {
        tx_ref: String,
    },
    ListPayments {
        actor: Actor,
    },
    GetPayment {
        actor: Actor,
        id: PaymentId,
    },
    CancelPayment {
        actor: Actor,
        id: PaymentId,
    },
    DeletePayment {
        actor: Actor,
        id: PaymentId,
    },
}

impl Command {
    /// The `op` tag this command was read from.
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateListing { .. } => "create_listing",
            Command::ListListings => "list_listings",
            Command::GetListing { .. } => "get_listing",
            Command::UpdateListing { .. } => "update_listing",
            Command::DeleteListing { .. } => "delete_listing",
            Command::ListingReviews { .. } => "listing_reviews",
            Command::MyListings { .. } => "my_listings",
            Command::AvailableListings => "available_listings",
            Command::CreateBooking { .. } => "create_booking",
            Command::ListBookings { .. } => "list_bookings",
            Command::MyBookings { .. } => "my_bookings",
            Command::GetBooking { .. } => "get_booking",
            Command::UpdateBooking { .. } => "update_booking",
            Command::DeleteBooking { .. } => "delete_booking",
            Command::ConfirmBooking { .. } => "confirm_booking",
            Command::CancelBooking { .. } => "cancel_booking",
            Command::CompleteBooking { .. } => "complete_booking",
            Command::CreateReview { .. } => "create_review",
            Command::ListReviews => "list_reviews",
            Command::GetReview { .. } => "get_review",
            Command::UpdateReview { .. } => "update_review",
            Command::DeleteReview { .. } => "delete_review",
            Command::CreatePayment { .. } => "create_payment",
            Command::InitiatePayment { .. } => "initiate_payment",
            Command::VerifyPayment { .. } => "verify_payment",
            Command::UpdatePaymentStatus { .. } => "update_payment_status",
            Command::Reconcile { .. } => "reconcile",
            Command::ListPayments { .. } => "list_payments",
            Command::GetPayment { .. } => "get_payment",
            Command::CancelPayment { .. } => "cancel_payment",
            Command::DeletePayment { .. } => "delete_payment",
        }
    }
}

fn encode<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| BookingError::Serialization(e.to_string()))
}

fn deleted(id: impl ToString) -> Result<Value> {
    Ok(json!({ "deleted": id.to_string() }))
}

/// Runs `command` against the engine and returns its JSON result.
pub async fn execute(engine: &BookingEngine, command: Command) -> Result<Value> {
    match command {
        Command::CreateListing { actor, listing } => {
            encode(engine.listings().create_listing(&actor, listing).await?)
        }
        Command::ListListings => encode(engine.listings().list_listings().await?),
        Command::GetListing { id } => encode(engine.listings().get_listing(id).await?),
        Command::UpdateListing { actor, id, changes } => {
            encode(engine.listings().update_listing(&actor, id, changes).await?)
        }
        Command::DeleteListing { actor, id } => {
            engine.listings().delete_listing(&actor, id).await?;
            deleted(id)
        }
        Command::ListingReviews { id } => encode(engine.listings().listing_reviews(id).await?),
        Command::MyListings { actor } => encode(engine.listings().my_listings(&actor).await?),
        Command::AvailableListings => encode(engine.listings().available_listings().await?),

        Command::CreateBooking {
            actor,
            payer,
            booking,
            payment_id,
        } => encode(engine.book(&actor, &payer, booking, payment_id).await?),
        Command::ListBookings { actor } => encode(engine.bookings().list_bookings(&actor).await?),
        Command::MyBookings { actor } => encode(engine.bookings().my_bookings(&actor).await?),
        Command::GetBooking { actor, id } => encode(engine.bookings().get_booking(&actor, id).await?),
        Command::UpdateBooking { actor, id, changes } => {
            encode(engine.bookings().update_booking(&actor, id, changes).await?)
        }
        Command::DeleteBooking { actor, id } => {
            engine.bookings().delete_booking(&actor, id).await?;
            deleted(id)
        }
        Command::ConfirmBooking { actor, id } => encode(engine.lifecycle().confirm(&actor, id).await?),
        Command::CancelBooking { actor, id } => encode(engine.lifecycle().cancel(&actor, id).await?),
        Command::CompleteBooking { actor, id } => {
            encode(engine.lifecycle().complete(&actor, id).await?)
        }

        Command::CreateReview { actor, review } => {
            encode(engine.reviews().create_review(&actor, review).await?)
        }
        Command::ListReviews => encode(engine.reviews().list_reviews().await?),
        Command::GetReview { id } => encode(engine.reviews().get_review(id).await?),
        Command::UpdateReview { actor, id, changes } => {
            encode(engine.reviews().update_review(&actor, id, changes).await?)
        }
        Command::DeleteReview { actor, id } => {
            engine.reviews().delete_review(&actor, id).await?;
            deleted(id)
        }

        Command::CreatePayment { actor, booking, id } => {
            encode(engine.payments().create_payment(&actor, booking, id).await?)
        }
        Command::InitiatePayment { actor, id, payer } => {
            encode(engine.payments().initiate_payment(&actor, id, &payer).await?)
        }
        Command::VerifyPayment { reference } => encode(engine.payments().verify_payment(&reference).await),
        Command::UpdatePaymentStatus { actor, id, update } => {
            encode(engine.payments().update_payment_status(&actor, id, update).await?)
        }
        Command::Reconcile { tx_ref } => encode(engine.payments().reconcile(&tx_ref).await?),
        Command::ListPayments { actor } => encode(engine.payments().list_payments(&actor).await?),
        Command::GetPayment { actor, id } => encode(engine.payments().get_payment(&actor, id).await?),
        Command::CancelPayment { actor, id } => {
            encode(engine.payments().cancel_payment(&actor, id).await?)
        }
        Command::DeletePayment { actor, id } => {
            engine.payments().delete_payment(&actor, id).await?;
            deleted(id)
        }
    }
}
