use super::money::{Currency, Money};
use super::payment::RemoteStatus;
use crate::error::BookingError;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Everything the gateway needs to open a hosted checkout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitiateRequest {
    pub amount: Money,
    pub currency: Currency,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Our correlation id: the payment id.
    pub tx_ref: String,
    pub callback_url: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checkout {
    pub checkout_url: String,
    pub reference: String,
}

/// The gateway's view of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayVerification {
    pub remote_status: RemoteStatus,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    /// Gateway-side transaction reference.
    pub reference: Option<String>,
    pub tx_ref: Option<String>,
    pub charge: Option<Decimal>,
    pub method: Option<String>,
    pub received_amount: Option<Decimal>,
}

/// A failed gateway call. Expected in normal operation, so it is carried as
/// data up to the caller instead of aborting the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct GatewayError {
    pub reason: String,
}

impl GatewayError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<GatewayError> for BookingError {
    fn from(err: GatewayError) -> Self {
        BookingError::Gateway(err.reason)
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
