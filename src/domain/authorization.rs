//! Capability checks run at the start of every use case.
//!
//! `authorize(actor, resource, action)` derives the roles the actor holds on
//! the resource and looks the action up in a fixed table of allowed roles.

use super::booking::Booking;
use super::ids::UserId;
use super::listing::Listing;
use super::review::Review;
use crate::error::BookingError;
use serde::{Deserialize, Serialize};

/// Who is performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    /// An authenticated user.
    User(UserId),
    /// The backend itself, e.g. payment settlement.
    System,
}

impl Actor {
    pub fn user(&self) -> Option<UserId> {
        match self {
            Actor::User(id) => Some(*id),
            Actor::System => None,
        }
    }

    /// The user id, or `Permission` for the system actor.
    pub fn require_user(&self) -> Result<UserId, BookingError> {
        self.user().ok_or_else(|| {
            BookingError::Permission("this operation requires an authenticated user".to_string())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    Authenticated,
    Host,
    Guest,
    Author,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateListing,
    UpdateListing,
    DeleteListing,
    CreateBooking,
    ViewBooking,
    UpdateBooking,
    DeleteBooking,
    ConfirmBooking,
    CancelBooking,
    CompleteBooking,
    SettleBooking,
    CreateReview,
    UpdateReview,
    DeleteReview,
    ViewPayment,
    CreatePayment,
    InitiatePayment,
    CancelPayment,
    DeletePayment,
    UpdatePaymentStatus,
}

impl Action {
    fn allowed(&self) -> &'static [Role] {
        use Role::*;

        match self {
            Action::CreateListing | Action::CreateBooking | Action::CreateReview => &[Authenticated],
            Action::UpdateListing | Action::DeleteListing => &[Host],
            Action::ViewBooking | Action::DeleteBooking | Action::CancelBooking => &[Guest, Host],
            Action::ViewPayment | Action::DeletePayment => &[Guest, Host],
            Action::UpdateBooking => &[Guest],
            Action::ConfirmBooking => &[Host],
            Action::CompleteBooking => &[Host, System],
            Action::SettleBooking | Action::UpdatePaymentStatus => &[System],
            Action::UpdateReview | Action::DeleteReview => &[Author],
            Action::CreatePayment | Action::InitiatePayment | Action::CancelPayment => &[Guest],
        }
    }

    fn denial(&self) -> &'static str {
        match self {
            Action::CreateListing | Action::CreateBooking | Action::CreateReview => {
                "Authentication required."
            }
            Action::UpdateListing => "You can only update your own listings.",
            Action::DeleteListing => "You can only delete your own listings.",
            Action::ViewBooking => "You can only view your own bookings or bookings for your listings.",
            Action::UpdateBooking => "Only the guest can change a booking.",
            Action::DeleteBooking => {
                "You can only delete your own bookings or bookings for your listings."
            }
            Action::ConfirmBooking => "Only the listing host can confirm bookings.",
            Action::CancelBooking => {
                "You can only cancel your own bookings or bookings for your listings."
            }
            Action::CompleteBooking => "Only the listing host can complete bookings.",
            Action::SettleBooking => "Only payment settlement can confirm a booking this way.",
            Action::UpdateReview => "You can only update your own reviews.",
            Action::DeleteReview => "You can only delete your own reviews.",
            Action::ViewPayment => "You can only view payments for your bookings or listings.",
            Action::CreatePayment | Action::InitiatePayment | Action::CancelPayment => {
                "Only the guest can pay for a booking."
            }
            Action::DeletePayment => {
                "You can only delete payments for your bookings or listings."
            }
            Action::UpdatePaymentStatus => "Payment status is managed by reconciliation only.",
        }
    }
}

/// What the action is performed on.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    /// Creation requests, which have no owner yet.
    Nothing,
    Listing(&'a Listing),
    /// A booking, or a payment of that booking.
    Booking {
        booking: &'a Booking,
        listing: &'a Listing,
    },
    Review(&'a Review),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(&'static str),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), BookingError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(BookingError::Permission(reason.to_string())),
        }
    }
}

fn roles(actor: &Actor, resource: &Resource<'_>) -> Vec<Role> {
    let user = match actor {
        Actor::System => return vec![Role::System],
        Actor::User(user) => *user,
    };

    let mut roles = vec![Role::Authenticated];
    match resource {
        Resource::Nothing => {}
        Resource::Listing(listing) => {
            if listing.host == user {
                roles.push(Role::Host);
            }
        }
        Resource::Booking { booking, listing } => {
            if listing.host == user {
                roles.push(Role::Host);
            }
            if booking.guest == user {
                roles.push(Role::Guest);
            }
        }
        Resource::Review(review) => {
            if review.reviewer == user {
                roles.push(Role::Author);
            }
        }
    }
    roles
}

pub fn authorize(actor: &Actor, resource: Resource<'_>, action: Action) -> Decision {
    let held = roles(actor, &resource);
    if action.allowed().iter().any(|role| held.contains(role)) {
        Decision::Allow
    } else {
        Decision::Deny(action.denial())
    }
}
