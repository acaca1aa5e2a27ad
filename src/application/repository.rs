use crate::domain::booking::Booking;
use crate::domain::ids::{BookingId, ListingId, PaymentId, ReviewId, UserId};
use crate::domain::listing::Listing;
use crate::domain::payment::Payment;
use crate::domain::ports::{Store, Table, UnitOfWork};
use crate::domain::review::Review;
use crate::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A persisted entity.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const TABLE: Table;
    const NAME: &'static str;
    type Id: Copy + std::fmt::Display + Send + Sync;

    fn id(&self) -> Self::Id;
    fn key_of(id: &Self::Id) -> Vec<u8>;
    fn created_at(&self) -> DateTime<Utc>;
}

macro_rules! record {
    ($ty:ty, $id:ty, $table:expr, $name:literal) => {
        impl Record for $ty {
            const TABLE: Table = $table;
            const NAME: &'static str = $name;
            type Id = $id;

            fn id(&self) -> Self::Id {
                self.id
            }

            fn key_of(id: &Self::Id) -> Vec<u8> {
                id.key()
            }

            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }
        }
    };
}

record!(Listing, ListingId, Table::Listings, "Listing");
record!(Booking, BookingId, Table::Bookings, "Booking");
record!(Review, ReviewId, Table::Reviews, "Review");
record!(Payment, PaymentId, Table::Payments, "Payment");

/// Ordering of query results by creation time. Always explicit at the call
/// site; "the first payment" means nothing without it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recency {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl Recency {
    pub fn sort<R: Record>(&self, records: &mut [R]) {
        records.sort_by_key(|r| r.created_at());
        if *self == Recency::NewestFirst {
            records.reverse();
        }
    }
}

/// Typed queries and writes over one unit of work.
pub struct Tx {
    uow: Box<dyn UnitOfWork>,
}

impl Tx {
    pub async fn begin(store: &dyn Store) -> Result<Self> {
        Ok(Self {
            uow: store.begin().await?,
        })
    }

    pub async fn commit(self) -> Result<()> {
        self.uow.commit().await
    }

    pub async fn find<R: Record>(&self, id: R::Id) -> Result<Option<R>> {
        match self.uow.get(R::TABLE, &R::key_of(&id)).await? {
            Some(bytes) => Ok(Some(decode::<R>(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Like `find`, but a missing record is `NotFound`.
    pub async fn get<R: Record>(&self, id: R::Id) -> Result<R> {
        self.find::<R>(id)
            .await?
            .ok_or_else(|| BookingError::not_found(R::NAME, id))
    }

    pub fn save<R: Record>(&mut self, record: &R) -> Result<()> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| BookingError::Storage(format!("cannot encode {}: {e}", R::NAME)))?;
        self.uow.put(R::TABLE, R::key_of(&record.id()), bytes);
        Ok(())
    }

    pub fn remove<R: Record>(&mut self, id: R::Id) {
        self.uow.delete(R::TABLE, R::key_of(&id));
    }

    /// Every record of `R` matching `keep`, in `order`.
    pub async fn select<R: Record>(
        &self,
        order: Recency,
        keep: impl Fn(&R) -> bool + Send,
    ) -> Result<Vec<R>> {
        let rows = self.uow.scan(R::TABLE).await?;
        let mut records = Vec::with_capacity(rows.len());
        for bytes in rows {
            let record = decode::<R>(&bytes)?;
            if keep(&record) {
                records.push(record);
            }
        }
        order.sort(&mut records);
        Ok(records)
    }

    pub async fn bookings_for_listing(&self, listing: ListingId, order: Recency) -> Result<Vec<Booking>> {
        self.select(order, |b: &Booking| b.listing == listing).await
    }

    pub async fn reviews_for_listing(&self, listing: ListingId, order: Recency) -> Result<Vec<Review>> {
        self.select(order, |r: &Review| r.listing == listing).await
    }

    pub async fn review_by(&self, listing: ListingId, reviewer: UserId) -> Result<Option<Review>> {
        let mut found = self
            .select(Recency::NewestFirst, |r: &Review| {
                r.listing == listing && r.reviewer == reviewer
            })
            .await?;
        Ok(found.pop())
    }

    pub async fn payments_for_booking(&self, booking: BookingId, order: Recency) -> Result<Vec<Payment>> {
        self.select(order, |p: &Payment| p.booking == booking).await
    }

    pub async fn payment_with_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>> {
        let mut found = self
            .select(Recency::NewestFirst, |p: &Payment| {
                p.transaction_id.as_deref() == Some(transaction_id)
            })
            .await?;
        Ok(found.pop())
    }

    pub async fn payment_with_gateway_reference(&self, reference: &str) -> Result<Option<Payment>> {
        let mut found = self
            .select(Recency::NewestFirst, |p: &Payment| {
                p.gateway_reference.as_deref() == Some(reference)
            })
            .await?;
        Ok(found.pop())
    }

    /// The booking's payment attempt at the head of `order`.
    pub async fn first_payment(&self, booking: BookingId, order: Recency) -> Result<Option<Payment>> {
        Ok(self
            .payments_for_booking(booking, order)
            .await?
            .into_iter()
            .next())
    }

    /// Loads a booking together with the listing it belongs to.
    pub async fn booking_with_listing(&self, id: BookingId) -> Result<(Booking, Listing)> {
        let booking = self.get::<Booking>(id).await?;
        let listing = self.get::<Listing>(booking.listing).await?;
        Ok((booking, listing))
    }

    /// Removes a booking and the payments it owns.
    pub async fn remove_booking_cascade(&mut self, id: BookingId) -> Result<()> {
        for payment in self.payments_for_booking(id, Recency::OldestFirst).await? {
            self.remove::<Payment>(payment.id);
        }
        self.remove::<Booking>(id);
        Ok(())
    }
}

fn decode<R: Record>(bytes: &[u8]) -> Result<R> {
    serde_json::from_slice(bytes)
        .map_err(|e| BookingError::Storage(format!("cannot decode {}: {e}", R::NAME)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::listing::NewListing;
    use crate::domain::money::Money;
    use crate::infrastructure::in_memory::InMemoryStore;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn listing_at(created_at: DateTime<Utc>) -> Listing {
        Listing::new(
            UserId::new(),
            NewListing {
                id: None,
                title: "Loft".to_string(),
                description: String::new(),
                price_per_night: Money::new(dec!(75)).unwrap(),
                location: "Hawassa".to_string(),
                amenities: String::new(),
                is_available: true,
            },
            created_at,
        )
    }

    #[tokio::test]
    async fn test_round_trip_and_not_found() {
        let store = InMemoryStore::new();
        let listing = listing_at(Utc::now());

        let mut tx = Tx::begin(&store).await.unwrap();
        tx.save(&listing).unwrap();
        tx.commit().await.unwrap();

        let tx = Tx::begin(&store).await.unwrap();
        assert_eq!(tx.get::<Listing>(listing.id).await.unwrap(), listing);
        let missing = tx.get::<Listing>(ListingId::new()).await;
        assert!(matches!(
            missing,
            Err(BookingError::NotFound { entity: "Listing", .. })
        ));
    }

    #[tokio::test]
    async fn test_select_orders_by_recency() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let old = listing_at(now - Duration::days(2));
        let mid = listing_at(now - Duration::days(1));
        let new = listing_at(now);

        let mut tx = Tx::begin(&store).await.unwrap();
        for listing in [&mid, &new, &old] {
            tx.save(listing).unwrap();
        }

        let newest: Vec<_> = tx
            .select::<Listing>(Recency::NewestFirst, |_| true)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(newest, vec![new.id, mid.id, old.id]);

        let oldest = tx
            .select::<Listing>(Recency::OldestFirst, |_| true)
            .await
            .unwrap();
        assert_eq!(oldest[0].id, old.id);
    }
}
