use super::ids::{BookingId, ListingId, UserId};
use super::listing::Listing;
use super::money::Money;
use crate::error::BookingError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    /// The status reached by applying `action`, or `InvalidTransition`.
    ///
    /// `Settle` on an already confirmed booking is accepted and leaves it
    /// confirmed: the host may confirm before the payment clears.
    pub fn after(self, action: BookingAction) -> Result<BookingStatus, BookingError> {
        use BookingAction::*;
        use BookingStatus::*;

        match (self, action) {
            (Pending, Confirm) | (Pending, Settle) | (Confirmed, Settle) => Ok(Confirmed),
            (Pending, Cancel) | (Confirmed, Cancel) => Ok(Cancelled),
            (Confirmed, Complete) => Ok(Completed),
            (from, action) => Err(BookingError::InvalidTransition { from, action }),
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requests that move a booking through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingAction {
    /// Explicit confirmation by the host.
    Confirm,
    Cancel,
    /// End of stay, reported by the stay-completion process.
    Complete,
    /// Confirmation triggered by a completed payment.
    Settle,
}

impl fmt::Display for BookingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            BookingAction::Confirm => "confirm",
            BookingAction::Cancel => "cancel",
            BookingAction::Complete => "complete",
            BookingAction::Settle => "settle",
        };
        f.write_str(verb)
    }
}

/// A guest's reservation of a listing for a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub listing: ListingId,
    pub guest: UserId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub total_price: Money,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields accepted when a guest books a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBooking {
    #[serde(default)]
    pub id: Option<BookingId>,
    pub listing: ListingId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    /// Overrides the computed nightly total when present.
    #[serde(default)]
    pub total_price: Option<Money>,
}

/// Date or price change on a pending booking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingUpdate {
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub total_price: Option<Money>,
}

/// Number of nights in `[check_in, check_out)`, rejecting empty or inverted stays.
pub fn nights(check_in: NaiveDate, check_out: NaiveDate) -> Result<u32, BookingError> {
    if check_out <= check_in {
        return Err(BookingError::Validation(
            "Check-out date must be after check-in date.".to_string(),
        ));
    }
    let days = (check_out - check_in).num_days();
    u32::try_from(days)
        .map_err(|_| BookingError::Validation(format!("stay of {days} nights is too long")))
}

impl Booking {
    /// Creates a pending booking of `listing` for `guest`.
    ///
    /// The total is `price_per_night * nights` unless `request.total_price`
    /// overrides it.
    pub fn new(
        listing: &Listing,
        guest: UserId,
        request: NewBooking,
        now: DateTime<Utc>,
    ) -> Result<Self, BookingError> {
        let nights = nights(request.check_in, request.check_out)?;
        let total_price = match request.total_price {
            Some(price) => price,
            None => listing.price_per_night.times(nights)?,
        };

        Ok(Self {
            id: request.id.unwrap_or_default(),
            listing: listing.id,
            guest,
            check_in: request.check_in,
            check_out: request.check_out,
            total_price,
            status: BookingStatus::Pending,
            created_at: now,
        })
    }

    /// Returns the booking with new dates and a recomputed total.
    pub fn rescheduled(&self, listing: &Listing, update: BookingUpdate) -> Result<Self, BookingError> {
        let check_in = update.check_in.unwrap_or(self.check_in);
        let check_out = update.check_out.unwrap_or(self.check_out);
        let nights = nights(check_in, check_out)?;
        let total_price = match update.total_price {
            Some(price) => price,
            None if update.check_in.is_some() || update.check_out.is_some() => {
                listing.price_per_night.times(nights)?
            }
            None => self.total_price,
        };

        Ok(Self {
            check_in,
            check_out,
            total_price,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::listing::NewListing;
    use chrono::Days;
    use rust_decimal_macros::dec;

    fn listing() -> Listing {
        Listing::new(
            UserId::new(),
            NewListing {
                id: None,
                title: "Test Beach House".to_string(),
                description: String::new(),
                price_per_night: Money::new(dec!(1000.00)).unwrap(),
                location: "Addis Ababa".to_string(),
                amenities: String::new(),
                is_available: true,
            },
            Utc::now(),
        )
    }

    fn request(listing: &Listing, from: u64, to: u64) -> NewBooking {
        let today = Utc::now().date_naive();
        NewBooking {
            id: None,
            listing: listing.id,
            check_in: today + Days::new(from),
            check_out: today + Days::new(to),
            total_price: None,
        }
    }

    #[test]
    fn test_total_price_is_nightly_price_times_nights() {
        let listing = listing();
        let booking = Booking::new(&listing, UserId::new(), request(&listing, 1, 5), Utc::now()).unwrap();
        assert_eq!(booking.total_price.value(), dec!(4000.00));
        assert_eq!(booking.total_price.to_string(), "4000.00");
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[test]
    fn test_explicit_total_overrides_computation() {
        let listing = listing();
        let mut req = request(&listing, 1, 5);
        req.total_price = Some(Money::new(dec!(3500)).unwrap());
        let booking = Booking::new(&listing, UserId::new(), req, Utc::now()).unwrap();
        assert_eq!(booking.total_price.value(), dec!(3500.00));
    }

    #[test]
    fn test_checkout_must_follow_checkin() {
        let listing = listing();
        for (from, to) in [(5, 5), (5, 1)] {
            let result = Booking::new(&listing, UserId::new(), request(&listing, from, to), Utc::now());
            assert!(matches!(result, Err(BookingError::Validation(_))));
        }
    }

    #[test]
    fn test_reschedule_recomputes_total() {
        let listing = listing();
        let booking = Booking::new(&listing, UserId::new(), request(&listing, 1, 5), Utc::now()).unwrap();
        let moved = booking
            .rescheduled(
                &listing,
                BookingUpdate {
                    check_out: Some(booking.check_in + Days::new(2)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(moved.total_price.value(), dec!(2000.00));
        assert_eq!(moved.id, booking.id);

        let invalid = booking.rescheduled(
            &listing,
            BookingUpdate {
                check_out: Some(booking.check_in),
                ..Default::default()
            },
        );
        assert!(matches!(invalid, Err(BookingError::Validation(_))));
    }

    #[test]
    fn test_transition_table() {
        use BookingAction::*;
        use BookingStatus::*;

        assert_eq!(Pending.after(Confirm).unwrap(), Confirmed);
        assert_eq!(Pending.after(Settle).unwrap(), Confirmed);
        assert_eq!(Confirmed.after(Settle).unwrap(), Confirmed);
        assert_eq!(Pending.after(Cancel).unwrap(), Cancelled);
        assert_eq!(Confirmed.after(Cancel).unwrap(), Cancelled);
        assert_eq!(Confirmed.after(Complete).unwrap(), Completed);

        assert!(Confirmed.after(Confirm).is_err());
        assert!(Pending.after(Complete).is_err());
    }

    #[test]
    fn test_final_statuses_reject_every_action() {
        for status in [BookingStatus::Cancelled, BookingStatus::Completed] {
            assert!(status.is_final());
            for action in [
                BookingAction::Confirm,
                BookingAction::Cancel,
                BookingAction::Complete,
                BookingAction::Settle,
            ] {
                assert!(matches!(
                    status.after(action),
                    Err(BookingError::InvalidTransition { from, .. }) if from == status
                ));
            }
        }
    }
}
