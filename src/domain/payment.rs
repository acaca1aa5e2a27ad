use super::booking::Booking;
use super::ids::{BookingId, PaymentId};
use super::money::{Currency, Money};
use crate::error::BookingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction status as reported by the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Success,
    Failed,
    Pending,
    /// Anything else the gateway may report; treated as still pending.
    Other(String),
}

impl RemoteStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" => RemoteStatus::Success,
            "failed" => RemoteStatus::Failed,
            "pending" => RemoteStatus::Pending,
            other => RemoteStatus::Other(other.to_string()),
        }
    }
}

impl From<&RemoteStatus> for PaymentStatus {
    fn from(remote: &RemoteStatus) -> Self {
        match remote {
            RemoteStatus::Success => PaymentStatus::Completed,
            RemoteStatus::Failed => PaymentStatus::Failed,
            RemoteStatus::Pending | RemoteStatus::Other(_) => PaymentStatus::Pending,
        }
    }
}

/// A monetary settlement attempt tied to one booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub booking: BookingId,
    pub amount: Money,
    pub currency: Currency,
    pub status: PaymentStatus,
    /// Gateway-side transaction identifier. Unique across payments.
    pub transaction_id: Option<String>,
    /// Gateway checkout reference. Unique across payments.
    pub gateway_reference: Option<String>,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// The single shape of every payment mutation.
///
/// Optional fields are additive: `Some` sets the field, `None` leaves the
/// stored value untouched. Nothing here can clear a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub gateway_reference: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl PaymentUpdate {
    pub fn to(status: PaymentStatus) -> Self {
        Self {
            status,
            transaction_id: None,
            gateway_reference: None,
            payment_method: None,
            error_message: None,
        }
    }

    pub fn transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    pub fn gateway_reference(mut self, reference: impl Into<String>) -> Self {
        self.gateway_reference = Some(reference.into());
        self
    }

    pub fn payment_method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = Some(method.into());
        self
    }

    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Result of applying a [`PaymentUpdate`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateEffect {
    /// The next state of the payment, to be persisted.
    Applied(Payment),
    /// A repeated terminal verdict; nothing to write.
    Unchanged,
}

impl Payment {
    /// A pending payment for the booking's full total.
    pub fn for_booking(booking: &Booking, id: Option<PaymentId>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.unwrap_or_default(),
            booking: booking.id,
            amount: booking.total_price,
            currency: Currency::default(),
            status: PaymentStatus::Pending,
            transaction_id: None,
            gateway_reference: None,
            payment_method: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            error_message: None,
        }
    }

    /// Computes the payment after `update` without touching `self`.
    ///
    /// Only a pending payment can change status. Completing twice is a
    /// conflict; repeating a failed or cancelled verdict is a no-op.
    pub fn apply(&self, update: &PaymentUpdate, now: DateTime<Utc>) -> Result<UpdateEffect, BookingError> {
        match (self.status, update.status) {
            (PaymentStatus::Completed, PaymentStatus::Completed) => {
                return Err(BookingError::Conflict(format!(
                    "payment {} is already completed",
                    self.id
                )));
            }
            (current, next) if current.is_terminal() && current == next => {
                return Ok(UpdateEffect::Unchanged);
            }
            (current, next) if current.is_terminal() => {
                return Err(BookingError::Conflict(format!(
                    "payment {} is already {current}; cannot mark it {next}",
                    self.id
                )));
            }
            _ => {}
        }

        let mut next = self.clone();
        next.status = update.status;
        if let Some(id) = &update.transaction_id {
            next.transaction_id = Some(id.clone());
        }
        if let Some(reference) = &update.gateway_reference {
            next.gateway_reference = Some(reference.clone());
        }
        if let Some(method) = &update.payment_method {
            next.payment_method = Some(method.clone());
        }
        if let Some(message) = &update.error_message {
            next.error_message = Some(message.clone());
        }
        if update.status == PaymentStatus::Completed {
            next.completed_at = Some(now);
        }
        next.updated_at = now;
        Ok(UpdateEffect::Applied(next))
    }
}
