//! Payment reconciliation.
//!
//! Creates payment attempts, hands them to the gateway, and folds the
//! gateway's verdict back into local state. `update_payment_status` is the
//! only way a payment changes; on completion it settles the owning booking
//! in the same unit of work, so both writes land together or not at all.
//!
//! Gateway calls never run while a unit of work is open.

use super::lifecycle::{self, Transition};
use super::repository::{Recency, Tx};
use crate::domain::authorization::{Action, Actor, Resource, authorize};
use crate::domain::booking::Booking;
use crate::domain::gateway::{Checkout, GatewayVerification, InitiateRequest};
use crate::domain::ids::{BookingId, PaymentId};
use crate::domain::listing::Listing;
use crate::domain::payment::{Payment, PaymentStatus, PaymentUpdate, UpdateEffect};
use crate::domain::ports::{GatewayRef, StoreRef};
use crate::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contact details of the paying guest, as known to the identity layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
}

impl Payer {
    /// The first name, or the username when no first name is on file.
    pub fn given_name(&self) -> &str {
        if self.first_name.trim().is_empty() {
            &self.username
        } else {
            &self.first_name
        }
    }
}

/// Outcome of handing a payment to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Initiation {
    Started {
        checkout_url: String,
        reference: String,
    },
    Failed {
        reason: String,
    },
}

impl Initiation {
    pub fn is_started(&self) -> bool {
        matches!(self, Initiation::Started { .. })
    }

    pub fn into_result(self) -> Result<Checkout> {
        match self {
            Initiation::Started {
                checkout_url,
                reference,
            } => Ok(Checkout {
                checkout_url,
                reference,
            }),
            Initiation::Failed { reason } => Err(BookingError::Gateway(reason)),
        }
    }
}

/// The gateway's verdict on a transaction, mapped onto local statuses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Verification {
    Verified {
        status: PaymentStatus,
        details: GatewayVerification,
    },
    Unavailable {
        reason: String,
    },
}

/// Result of [`PaymentReconciler::update_payment_status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentChange {
    pub payment: Payment,
    /// `false` when the update repeated a terminal verdict and wrote nothing.
    pub applied: bool,
    /// The settlement of the owning booking, on completion.
    pub booking: Option<Transition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The payment completed now and the booking is confirmed.
    Settled { payment: Payment, booking: Booking },
    /// Another callback settled the payment first.
    AlreadySettled { payment: Payment },
    Failed { payment: Payment },
    Cancelled { payment: Payment },
    StillPending { payment: Payment },
    /// The gateway could not be asked; try again later.
    Unavailable { reason: String },
}

#[derive(Clone)]
pub struct PaymentReconciler {
    store: StoreRef,
    gateway: GatewayRef,
    callback_url: String,
}

impl PaymentReconciler {
    pub fn new(store: StoreRef, gateway: GatewayRef, callback_url: impl Into<String>) -> Self {
        Self {
            store,
            gateway,
            callback_url: callback_url.into(),
        }
    }

    /// Creates a `pending` payment for the booking's full total.
    pub async fn create_payment(
        &self,
        actor: &Actor,
        booking: BookingId,
        id: Option<PaymentId>,
    ) -> Result<Payment> {
        let mut tx = Tx::begin(self.store.as_ref()).await?;
        let payment = create_in(&mut tx, actor, booking, id, Utc::now()).await?;
        tx.commit().await?;
        Ok(payment)
    }

    /// Starts a remote transaction for a pending payment.
    ///
    /// Gateway failures come back as [`Initiation::Failed`]; the payment stays
    /// `pending` either way. On success the gateway reference is recorded.
    pub async fn initiate_payment(
        &self,
        actor: &Actor,
        payment: PaymentId,
        payer: &Payer,
    ) -> Result<Initiation> {
        let request = {
            let tx = Tx::begin(self.store.as_ref()).await?;
            let payment = tx.get::<Payment>(payment).await?;
            let (booking, listing) = tx.booking_with_listing(payment.booking).await?;
            authorize(
                actor,
                Resource::Booking {
                    booking: &booking,
                    listing: &listing,
                },
                Action::InitiatePayment,
            )
            .into_result()?;
            if payment.status != PaymentStatus::Pending {
                return Err(BookingError::Conflict(format!(
                    "payment {} is {}; only pending payments can be initiated",
                    payment.id, payment.status
                )));
            }
            self.initiate_request(&payment, &booking, &listing, payer)
        };

        match self.gateway.initiate(&request).await {
            Ok(checkout) => {
                let update = PaymentUpdate::to(PaymentStatus::Pending).gateway_reference(&checkout.reference);
                if let Err(err) = self.update_payment_status(&Actor::System, payment, update).await {
                    tracing::warn!(payment_id = %payment, error = %err, "could not record gateway reference");
                }
                Ok(Initiation::Started {
                    checkout_url: checkout.checkout_url,
                    reference: checkout.reference,
                })
            }
            Err(err) => {
                tracing::error!(payment_id = %payment, reason = %err.reason, "payment initiation failed");
                Ok(Initiation::Failed { reason: err.reason })
            }
        }
    }

    fn initiate_request(
        &self,
        payment: &Payment,
        booking: &Booking,
        listing: &Listing,
        payer: &Payer,
    ) -> InitiateRequest {
        InitiateRequest {
            amount: payment.amount,
            currency: payment.currency.clone(),
            email: payer.email.clone(),
            first_name: payer.given_name().to_string(),
            last_name: payer.last_name.clone(),
            tx_ref: payment.id.to_string(),
            callback_url: self.callback_url.clone(),
            title: format!("Travel Booking - {}", listing.title),
            description: format!("Booking from {} to {}", booking.check_in, booking.check_out),
        }
    }

    /// Asks the gateway for the status of `reference`.
    pub async fn verify_payment(&self, reference: &str) -> Verification {
        match self.gateway.verify(reference).await {
            Ok(details) => Verification::Verified {
                status: PaymentStatus::from(&details.remote_status),
                details,
            },
            Err(err) => {
                tracing::error!(%reference, reason = %err.reason, "payment verification failed");
                Verification::Unavailable { reason: err.reason }
            }
        }
    }

    /// Applies `update` to the payment and, on completion, settles the
    /// booking. One unit of work; only the system actor may call it.
    pub async fn update_payment_status(
        &self,
        actor: &Actor,
        payment: PaymentId,
        update: PaymentUpdate,
    ) -> Result<PaymentChange> {
        let mut tx = Tx::begin(self.store.as_ref()).await?;
        let current = tx.get::<Payment>(payment).await?;
        check(&tx, actor, &current, Action::UpdatePaymentStatus).await?;
        let change = update_in(&mut tx, payment, &update, Utc::now()).await?;
        if change.applied {
            tx.commit().await?;
        }
        Ok(change)
    }

    /// Callback and poll handler for `tx_ref`.
    ///
    /// A payment already in a terminal state is reported as is, without
    /// asking the gateway again.
    pub async fn reconcile(&self, tx_ref: &str) -> Result<ReconcileOutcome> {
        let payment = {
            let tx = Tx::begin(self.store.as_ref()).await?;
            find_by_reference(&tx, tx_ref).await?
        };
        if let Some(outcome) = settled_outcome(&payment) {
            return Ok(outcome);
        }

        let reference = payment
            .gateway_reference
            .clone()
            .unwrap_or_else(|| payment.id.to_string());
        let (status, details) = match self.verify_payment(&reference).await {
            Verification::Verified { status, details } => (status, details),
            Verification::Unavailable { reason } => {
                return Ok(ReconcileOutcome::Unavailable { reason });
            }
        };
        if status == PaymentStatus::Pending {
            return Ok(ReconcileOutcome::StillPending { payment });
        }

        let update = verdict_update(&payment, status, &details);
        match self.update_payment_status(&Actor::System, payment.id, update).await {
            Ok(change) => Ok(outcome_of(change)),
            Err(BookingError::Conflict(reason)) => {
                let tx = Tx::begin(self.store.as_ref()).await?;
                let current = tx.get::<Payment>(payment.id).await?;
                if current.status == PaymentStatus::Completed {
                    tracing::info!(payment_id = %current.id, "duplicate settlement ignored");
                    Ok(ReconcileOutcome::AlreadySettled { payment: current })
                } else {
                    Err(BookingError::Conflict(reason))
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Payments on bookings the actor is guest or host of, newest first.
    pub async fn list_payments(&self, actor: &Actor) -> Result<Vec<Payment>> {
        let user = actor.require_user()?;
        let tx = Tx::begin(self.store.as_ref()).await?;
        let mut visible = Vec::new();
        for booking in tx.select::<Booking>(Recency::NewestFirst, |_| true).await? {
            let host = tx.get::<Listing>(booking.listing).await?.host;
            if booking.guest == user || host == user {
                visible.extend(tx.payments_for_booking(booking.id, Recency::NewestFirst).await?);
            }
        }
        Recency::NewestFirst.sort(&mut visible);
        Ok(visible)
    }

    pub async fn get_payment(&self, actor: &Actor, id: PaymentId) -> Result<Payment> {
        let tx = Tx::begin(self.store.as_ref()).await?;
        let payment = tx.get::<Payment>(id).await?;
        check(&tx, actor, &payment, Action::ViewPayment).await?;
        Ok(payment)
    }

    /// Guest abandons a pending payment attempt.
    pub async fn cancel_payment(&self, actor: &Actor, id: PaymentId) -> Result<Payment> {
        let mut tx = Tx::begin(self.store.as_ref()).await?;
        let payment = tx.get::<Payment>(id).await?;
        check(&tx, actor, &payment, Action::CancelPayment).await?;
        let change = update_in(
            &mut tx,
            id,
            &PaymentUpdate::to(PaymentStatus::Cancelled),
            Utc::now(),
        )
        .await?;
        if change.applied {
            tx.commit().await?;
        }
        Ok(change.payment)
    }

    /// Removes a payment record. Completed payments are kept.
    pub async fn delete_payment(&self, actor: &Actor, id: PaymentId) -> Result<()> {
        let mut tx = Tx::begin(self.store.as_ref()).await?;
        let payment = tx.get::<Payment>(id).await?;
        check(&tx, actor, &payment, Action::DeletePayment).await?;
        if payment.status == PaymentStatus::Completed {
            return Err(BookingError::Conflict(format!(
                "payment {id} is completed and cannot be deleted"
            )));
        }
        tx.remove::<Payment>(id);
        tx.commit().await?;
        tracing::info!(payment_id = %id, "payment deleted");
        Ok(())
    }
}

async fn check(tx: &Tx, actor: &Actor, payment: &Payment, action: Action) -> Result<()> {
    let (booking, listing) = tx.booking_with_listing(payment.booking).await?;
    authorize(
        actor,
        Resource::Booking {
            booking: &booking,
            listing: &listing,
        },
        action,
    )
    .into_result()
}

/// Stages a `pending` payment for `booking` in `tx`.
pub async fn create_in(
    tx: &mut Tx,
    actor: &Actor,
    booking: BookingId,
    id: Option<PaymentId>,
    now: DateTime<Utc>,
) -> Result<Payment> {
    let (booking, listing) = tx.booking_with_listing(booking).await?;
    authorize(
        actor,
        Resource::Booking {
            booking: &booking,
            listing: &listing,
        },
        Action::CreatePayment,
    )
    .into_result()?;

    let attempts = tx.payments_for_booking(booking.id, Recency::NewestFirst).await?;
    if attempts.iter().any(|p| p.status == PaymentStatus::Completed) {
        return Err(BookingError::Conflict(format!(
            "booking {} already has a completed payment",
            booking.id
        )));
    }
    if let Some(id) = id
        && tx.find::<Payment>(id).await?.is_some()
    {
        return Err(BookingError::Conflict(format!("payment {id} already exists")));
    }

    let payment = Payment::for_booking(&booking, id, now);
    tx.save(&payment)?;
    tracing::info!(
        payment_id = %payment.id,
        booking_id = %booking.id,
        amount = %payment.amount,
        currency = %payment.currency,
        attempt = attempts.len() + 1,
        "payment created"
    );
    Ok(payment)
}

/// Applies `update` inside `tx`: uniqueness of gateway identifiers, one
/// completed payment per booking, and settlement of the booking.
pub async fn update_in(
    tx: &mut Tx,
    id: PaymentId,
    update: &PaymentUpdate,
    now: DateTime<Utc>,
) -> Result<PaymentChange> {
    let current = tx.get::<Payment>(id).await?;
    let next = match current.apply(update, now)? {
        UpdateEffect::Applied(next) => next,
        UpdateEffect::Unchanged => {
            return Ok(PaymentChange {
                payment: current,
                applied: false,
                booking: None,
            });
        }
    };

    if let Some(transaction_id) = &next.transaction_id
        && let Some(other) = tx.payment_with_transaction_id(transaction_id).await?
        && other.id != id
    {
        return Err(BookingError::Conflict(format!(
            "transaction id {transaction_id} is already used by payment {}",
            other.id
        )));
    }
    if let Some(reference) = &next.gateway_reference
        && let Some(other) = tx.payment_with_gateway_reference(reference).await?
        && other.id != id
    {
        return Err(BookingError::Conflict(format!(
            "gateway reference {reference} is already used by payment {}",
            other.id
        )));
    }

    let mut settlement = None;
    if next.status == PaymentStatus::Completed {
        let siblings = tx.payments_for_booking(next.booking, Recency::NewestFirst).await?;
        if let Some(other) = siblings
            .iter()
            .find(|p| p.id != id && p.status == PaymentStatus::Completed)
        {
            return Err(BookingError::Conflict(format!(
                "booking {} is already paid by payment {}",
                next.booking, other.id
            )));
        }
        tx.save(&next)?;
        settlement = Some(lifecycle::settle_in(tx, next.booking, &next).await?);
    } else {
        tx.save(&next)?;
    }

    tracing::info!(payment_id = %id, from = %current.status, to = %next.status, "payment status updated");
    Ok(PaymentChange {
        payment: next,
        applied: true,
        booking: settlement,
    })
}

/// Resolves a callback reference: our payment id, or a recorded gateway
/// reference or transaction id.
async fn find_by_reference(tx: &Tx, reference: &str) -> Result<Payment> {
    if let Ok(id) = reference.trim().parse::<PaymentId>()
        && let Some(payment) = tx.find::<Payment>(id).await?
    {
        return Ok(payment);
    }
    if let Some(payment) = tx.payment_with_gateway_reference(reference).await? {
        return Ok(payment);
    }
    tx.payment_with_transaction_id(reference)
        .await?
        .ok_or_else(|| BookingError::not_found("Payment", reference))
}

fn settled_outcome(payment: &Payment) -> Option<ReconcileOutcome> {
    let payment = payment.clone();
    match payment.status {
        PaymentStatus::Pending => None,
        PaymentStatus::Completed => Some(ReconcileOutcome::AlreadySettled { payment }),
        PaymentStatus::Failed => Some(ReconcileOutcome::Failed { payment }),
        PaymentStatus::Cancelled => Some(ReconcileOutcome::Cancelled { payment }),
    }
}

/// Turns a definite gateway verdict into the update to record.
///
/// A reported success for a different amount or currency than the payment
/// asked for is recorded as a failure.
fn verdict_update(payment: &Payment, status: PaymentStatus, details: &GatewayVerification) -> PaymentUpdate {
    let mut update = PaymentUpdate::to(status);
    if let Some(reference) = &details.reference {
        update = update.transaction_id(reference);
    }
    if let Some(tx_ref) = &details.tx_ref {
        update = update.gateway_reference(tx_ref);
    }
    if let Some(method) = &details.method {
        update = update.payment_method(method);
    }

    if status == PaymentStatus::Completed {
        let amount_differs = details
            .amount
            .is_some_and(|amount| amount != payment.amount.value());
        let currency_differs = details
            .currency
            .as_deref()
            .is_some_and(|currency| !currency.eq_ignore_ascii_case(payment.currency.code()));
        if amount_differs || currency_differs {
            let reported = format!(
                "{} {}",
                details.amount.map(|a| a.to_string()).unwrap_or_default(),
                details.currency.as_deref().unwrap_or_default()
            );
            tracing::warn!(
                payment_id = %payment.id,
                expected = %format!("{} {}", payment.amount, payment.currency),
                reported = %reported.trim(),
                "gateway success does not match the payment"
            );
            update.status = PaymentStatus::Failed;
            update.error_message = Some(format!(
                "Gateway reported {} but {} {} was expected",
                reported.trim(),
                payment.amount,
                payment.currency
            ));
        }
    } else if status == PaymentStatus::Failed {
        update = update.error_message("Payment failed at the gateway");
    }
    update
}

fn outcome_of(change: PaymentChange) -> ReconcileOutcome {
    let payment = change.payment;
    match (payment.status, change.booking) {
        (PaymentStatus::Completed, Some(transition)) => ReconcileOutcome::Settled {
            payment,
            booking: transition.booking,
        },
        (PaymentStatus::Completed, None) => ReconcileOutcome::AlreadySettled { payment },
        (PaymentStatus::Failed, _) => ReconcileOutcome::Failed { payment },
        (PaymentStatus::Cancelled, _) => ReconcileOutcome::Cancelled { payment },
        (PaymentStatus::Pending, _) => ReconcileOutcome::StillPending { payment },
    }
}
