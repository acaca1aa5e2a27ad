//! Chapa payment gateway client.
//!
//! Wraps `transaction/initialize` and `transaction/verify/{reference}`.
//! Every failure, whether transport, timeout, HTTP status or an unsuccessful
//! body, comes back as a [`GatewayError`] carrying a readable reason.
//! Requests are never retried here.

use crate::config::{GatewayConfig, SECRET_KEY_VAR};
use crate::domain::gateway::{
    Checkout, GatewayError, GatewayResult, GatewayVerification, InitiateRequest,
};
use crate::domain::payment::RemoteStatus;
use crate::domain::ports::PaymentGateway;
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;

#[derive(Clone)]
pub struct ChapaClient {
    http: Client,
    base: Url,
    config: GatewayConfig,
}

#[derive(Serialize)]
struct Customization<'a> {
    title: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct InitializePayload<'a> {
    amount: String,
    currency: &'a str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    phone_number: &'a str,
    tx_ref: &'a str,
    callback_url: &'a str,
    return_url: &'a str,
    customization: Customization<'a>,
}

/// `{"status": "success" | "failed", "message": ..., "data": ...}`
#[derive(Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default = "Option::default")]
    data: Option<T>,
}

#[derive(Deserialize)]
struct InitializeData {
    checkout_url: String,
    #[serde(default)]
    tx_ref: Option<String>,
}

#[derive(Deserialize)]
struct VerifyData {
    status: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    amount: Option<Decimal>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    tx_ref: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    charge: Option<Decimal>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    received_amount: Option<Decimal>,
}

/// The gateway reports amounts as JSON numbers or strings, sometimes null.
fn lenient_decimal<'de, D>(deserializer: D) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let text = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a decimal amount, got {other}"
            )));
        }
    };
    Decimal::from_str(text.trim())
        .or_else(|_| Decimal::from_scientific(text.trim()))
        .map(Some)
        .map_err(serde::de::Error::custom)
}

fn describe(message: Option<Value>, fallback: &str) -> String {
    match message {
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(Value::Null) | None => fallback.to_string(),
        Some(other) => other.to_string(),
    }
}

impl ChapaClient {
    /// Fails with `Configuration` if the secret key is blank or the HTTP
    /// client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        if config.secret_key.trim().is_empty() {
            return Err(BookingError::Configuration(format!(
                "{SECRET_KEY_VAR} environment variable is not set"
            )));
        }
        let base = Url::parse(&config.base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                BookingError::Configuration(format!("invalid gateway URL {:?}", config.base_url))
            })?;
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BookingError::Configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { http, base, config })
    }

    /// Fails with `Configuration` when `CHAPA_SECRET_KEY` is missing.
    pub fn from_env() -> Result<Self> {
        Self::new(GatewayConfig::from_env()?)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Appends each segment to the base URL, percent-encoding it.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn transport_error(&self, context: &str, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::new(format!(
                "{context} timed out after {:?}",
                self.config.timeout
            ))
        } else {
            GatewayError::new(format!("{context} failed: {err}"))
        }
    }

    /// Decodes a 2xx envelope whose `status` is `success`.
    async fn read_envelope<T: DeserializeOwned>(
        &self,
        context: &str,
        fallback: &str,
        response: Response,
    ) -> GatewayResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(context, e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Envelope<Value>>(&body)
                .ok()
                .and_then(|envelope| envelope.message)
                .map(|message| describe(Some(message), ""))
                .filter(|message| !message.is_empty())
                .unwrap_or(body);
            return Err(GatewayError::new(format!(
                "{context} rejected with HTTP {}: {message}",
                status.as_u16()
            )));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| GatewayError::new(format!("{context} returned an unreadable body: {e}")))?;
        if envelope.status != "success" {
            return Err(GatewayError::new(describe(envelope.message, fallback)));
        }
        envelope
            .data
            .ok_or_else(|| GatewayError::new(format!("{context} response has no data")))
    }
}

#[async_trait]
impl PaymentGateway for ChapaClient {
    async fn initiate(&self, request: &InitiateRequest) -> GatewayResult<Checkout> {
        let payload = InitializePayload {
            amount: request.amount.to_string(),
            currency: request.currency.code(),
            email: &request.email,
            first_name: &request.first_name,
            last_name: &request.last_name,
            phone_number: "",
            tx_ref: &request.tx_ref,
            callback_url: &request.callback_url,
            return_url: &request.callback_url,
            customization: Customization {
                title: &request.title,
                description: &request.description,
            },
        };

        let response = self
            .http
            .post(self.url(&["transaction", "initialize"]))
            .bearer_auth(&self.config.secret_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.transport_error("payment initiation", e))?;

        let data: InitializeData = self.read_envelope("payment initiation", "Unknown error", response).await?;
        tracing::info!(tx_ref = %request.tx_ref, "payment initiated with gateway");
        Ok(Checkout {
            checkout_url: data.checkout_url,
            reference: data.tx_ref.unwrap_or_else(|| request.tx_ref.clone()),
        })
    }

    async fn verify(&self, reference: &str) -> GatewayResult<GatewayVerification> {
        let response = self
            .http
            .get(self.url(&["transaction", "verify", reference]))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(|e| self.transport_error("payment verification", e))?;

        let data: VerifyData = self.read_envelope("payment verification", "Verification failed", response).await?;
        tracing::info!(%reference, remote_status = %data.status, "payment verified with gateway");
        Ok(GatewayVerification {
            remote_status: RemoteStatus::parse(&data.status),
            amount: data.amount,
            currency: data.currency,
            reference: data.reference,
            tx_ref: data.tx_ref,
            charge: data.charge,
            method: data.method,
            received_amount: data.received_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_data_accepts_numbers_and_strings() {
        let body = r#"{
            "status": "success",
            "message": "Payment details",
            "data": {
                "status": "success",
                "amount": 4000,
                "currency": "ETB",
                "reference": "APfxl0Cz8Q",
                "tx_ref": "tx-1",
                "charge": "140.00",
                "method": "telebirr",
                "received_amount": null
            }
        }"#;
        let envelope: Envelope<VerifyData> = serde_json::from_str(body).unwrap();
        let data = envelope.data.unwrap();
        assert_eq!(data.amount, Some(Decimal::from(4000)));
        assert_eq!(data.charge, Some(Decimal::new(14000, 2)));
        assert_eq!(data.received_amount, None);
        assert_eq!(data.method.as_deref(), Some("telebirr"));
    }

    fn config(secret_key: &str, base_url: &str) -> GatewayConfig {
        GatewayConfig {
            secret_key: secret_key.to_string(),
            base_url: base_url.to_string(),
            callback_url: "http://localhost:8000/api/payments/verify/".to_string(),
            timeout: std::time::Duration::from_secs(1),
        }
    }

    #[test]
    fn test_blank_secret_is_rejected() {
        for secret in ["", "   "] {
            let result = ChapaClient::new(config(secret, "https://api.chapa.co/v1"));
            assert!(matches!(result, Err(BookingError::Configuration(ref msg)) if msg.contains(SECRET_KEY_VAR)));
        }
    }

    #[test]
    fn test_unusable_base_url_is_rejected() {
        let result = ChapaClient::new(config("key", "not a url"));
        assert!(matches!(result, Err(BookingError::Configuration(_))));
    }

    #[test]
    fn test_reference_is_a_single_path_segment() {
        let client = ChapaClient::new(config("key", "https://api.chapa.co/v1")).unwrap();
        let url = client.url(&["transaction", "verify", "../initialize?x=1"]);
        assert_eq!(url.path(), "/v1/transaction/verify/..%2Finitialize%3Fx=1");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_describe_message_shapes() {
        assert_eq!(describe(Some(Value::String("Invalid currency".into())), "x"), "Invalid currency");
        assert_eq!(describe(None, "Unknown error"), "Unknown error");
        let nested = serde_json::json!({"email": ["The email field is required."]});
        assert!(describe(Some(nested), "x").contains("email"));
    }
}
