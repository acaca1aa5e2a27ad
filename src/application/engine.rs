use super::bookings::BookingService;
use super::lifecycle::{self, BookingLifecycle};
use super::listings::ListingService;
use super::reconciliation::{self, Initiation, Payer, PaymentReconciler};
use super::repository::Tx;
use super::reviews::ReviewService;
use crate::domain::authorization::Actor;
use crate::domain::booking::{Booking, NewBooking};
use crate::domain::ids::PaymentId;
use crate::domain::payment::Payment;
use crate::domain::ports::{GatewayRef, StoreRef};
use crate::error::Result;
use chrono::Utc;
use serde::Serialize;

/// What a guest gets back from [`BookingEngine::book`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingReceipt {
    pub booking: Booking,
    pub payment: Payment,
    pub initiation: Initiation,
}

/// The main entry point of the booking backend.
///
/// `BookingEngine` wires every service to one store and one payment
/// gateway, and owns the checkout flow that spans the lifecycle and the
/// reconciliation service.
#[derive(Clone)]
pub struct BookingEngine {
    store: StoreRef,
    lifecycle: BookingLifecycle,
    payments: PaymentReconciler,
    listings: ListingService,
    reviews: ReviewService,
    bookings: BookingService,
}

impl BookingEngine {
    /// Creates a new `BookingEngine`.
    ///
    /// # Arguments
    ///
    /// * `store` - Transactional storage shared by every service.
    /// * `gateway` - The remote payment gateway.
    /// * `callback_url` - Where the gateway reports payment outcomes.
    pub fn new(store: StoreRef, gateway: GatewayRef, callback_url: impl Into<String>) -> Self {
        Self {
            lifecycle: BookingLifecycle::new(store.clone()),
            payments: PaymentReconciler::new(store.clone(), gateway, callback_url),
            listings: ListingService::new(store.clone()),
            reviews: ReviewService::new(store.clone()),
            bookings: BookingService::new(store.clone()),
            store,
        }
    }

    pub fn lifecycle(&self) -> &BookingLifecycle {
        &self.lifecycle
    }

    pub fn payments(&self) -> &PaymentReconciler {
        &self.payments
    }

    pub fn listings(&self) -> &ListingService {
        &self.listings
    }

    pub fn reviews(&self) -> &ReviewService {
        &self.reviews
    }

    pub fn bookings(&self) -> &BookingService {
        &self.bookings
    }

    /// Books a listing and starts paying for it.
    ///
    /// The pending booking and its pending payment are committed together.
    /// The gateway is asked afterwards; its failure is reported in the
    /// receipt and leaves both records in place so the guest can retry.
    pub async fn book(
        &self,
        actor: &Actor,
        payer: &Payer,
        request: NewBooking,
        payment_id: Option<PaymentId>,
    ) -> Result<BookingReceipt> {
        let (booking, payment) = {
            let now = Utc::now();
            let mut tx = Tx::begin(self.store.as_ref()).await?;
            let booking = lifecycle::open_in(&mut tx, actor, request, now).await?;
            let payment = reconciliation::create_in(&mut tx, actor, booking.id, payment_id, now).await?;
            tx.commit().await?;
            (booking, payment)
        };

        let initiation = self.payments.initiate_payment(actor, payment.id, payer).await?;
        let payment = match initiation {
            Initiation::Started { .. } => {
                let tx = Tx::begin(self.store.as_ref()).await?;
                tx.get::<Payment>(payment.id).await?
            }
            Initiation::Failed { .. } => payment,
        };

        Ok(BookingReceipt {
            booking,
            payment,
            initiation,
        })
    }
}
