#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Days, Utc};
use rust_decimal::Decimal;
use staybook::application::engine::{BookingEngine, BookingReceipt};
use staybook::application::reconciliation::Payer;
use staybook::domain::authorization::Actor;
use staybook::domain::booking::NewBooking;
use staybook::domain::gateway::{
    Checkout, GatewayError, GatewayResult, GatewayVerification, InitiateRequest,
};
use staybook::domain::ids::UserId;
use staybook::domain::listing::{Listing, NewListing};
use staybook::domain::money::Money;
use staybook::domain::payment::RemoteStatus;
use staybook::domain::ports::{GatewayRef, PaymentGateway, StoreRef};
use staybook::infrastructure::in_memory::InMemoryStore;
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

pub const CALLBACK_URL: &str = "http://localhost:8000/api/payments/verify/";

/// A gateway that answers from queues filled by the test.
///
/// With nothing queued, `initiate` succeeds with a checkout for the request's
/// `tx_ref` and `verify` fails.
#[derive(Default)]
pub struct ScriptedGateway {
    initiations: Mutex<VecDeque<GatewayResult<Checkout>>>,
    verifications: Mutex<VecDeque<GatewayResult<GatewayVerification>>>,
    initiated: Mutex<Vec<InitiateRequest>>,
    verified: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn push_initiation(&self, outcome: GatewayResult<Checkout>) {
        self.initiations.lock().unwrap().push_back(outcome);
    }

    pub fn push_verification(&self, outcome: GatewayResult<GatewayVerification>) {
        self.verifications.lock().unwrap().push_back(outcome);
    }

    pub fn initiated(&self) -> Vec<InitiateRequest> {
        self.initiated.lock().unwrap().clone()
    }

    pub fn verified(&self) -> Vec<String> {
        self.verified.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initiate(&self, request: &InitiateRequest) -> GatewayResult<Checkout> {
        self.initiated.lock().unwrap().push(request.clone());
        self.initiations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(Checkout {
                    checkout_url: format!("https://checkout.chapa.co/checkout/payment/{}", request.tx_ref),
                    reference: request.tx_ref.clone(),
                })
            })
    }

    async fn verify(&self, reference: &str) -> GatewayResult<GatewayVerification> {
        self.verified.lock().unwrap().push(reference.to_string());
        self.verifications
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::new("no verification scripted")))
    }
}

pub fn verification(status: &str, amount: &str, currency: &str, reference: &str) -> GatewayVerification {
    GatewayVerification {
        remote_status: RemoteStatus::parse(status),
        amount: Some(Decimal::from_str(amount).unwrap()),
        currency: Some(currency.to_string()),
        reference: Some(reference.to_string()),
        tx_ref: None,
        charge: Some(Decimal::from_str("140.00").unwrap()),
        method: Some("telebirr".to_string()),
        received_amount: Some(Decimal::from_str(amount).unwrap()),
    }
}

pub struct World {
    pub engine: BookingEngine,
    pub store: StoreRef,
    pub gateway: Arc<ScriptedGateway>,
    pub host: Actor,
    pub guest: Actor,
    pub stranger: Actor,
    pub listing: Listing,
}

pub fn payer() -> Payer {
    Payer {
        email: "guest@example.com".to_string(),
        first_name: "Abebe".to_string(),
        last_name: "Kebede".to_string(),
        username: "abebe".to_string(),
    }
}

pub fn new_listing(title: &str, price: &str) -> NewListing {
    NewListing {
        id: None,
        title: title.to_string(),
        description: "Beautiful beach property".to_string(),
        price_per_night: Money::from_str(price).unwrap(),
        location: "Addis Ababa".to_string(),
        amenities: "WiFi, Pool, Kitchen".to_string(),
        is_available: true,
    }
}

/// A host with one listing at 1000.00 a night, a guest and a stranger.
pub async fn world() -> World {
    let store: StoreRef = Arc::new(InMemoryStore::new());
    let gateway = Arc::new(ScriptedGateway::default());
    let gateway_ref: GatewayRef = gateway.clone();
    let engine = BookingEngine::new(store.clone(), gateway_ref, CALLBACK_URL);

    let host = Actor::User(UserId::new());
    let listing = engine
        .listings()
        .create_listing(&host, new_listing("Test Beach House", "1000.00"))
        .await
        .unwrap();

    World {
        engine,
        store,
        gateway,
        host,
        guest: Actor::User(UserId::new()),
        stranger: Actor::User(UserId::new()),
        listing,
    }
}

/// Stay of `nights` nights starting tomorrow.
pub fn stay(world: &World, nights: u64) -> NewBooking {
    let today = Utc::now().date_naive();
    NewBooking {
        id: None,
        listing: world.listing.id,
        check_in: today + Days::new(1),
        check_out: today + Days::new(1 + nights),
        total_price: None,
    }
}

/// The guest books four nights; initiation uses whatever the gateway has queued.
pub async fn book(world: &World) -> BookingReceipt {
    world
        .engine
        .book(&world.guest, &payer(), stay(world, 4), None)
        .await
        .unwrap()
}
