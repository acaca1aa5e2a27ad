use super::gateway::{Checkout, GatewayResult, GatewayVerification, InitiateRequest};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Persisted tables. Backends store JSON-encoded records keyed by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Listings,
    Bookings,
    Reviews,
    Payments,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::Listings,
        Table::Bookings,
        Table::Reviews,
        Table::Payments,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Listings => "listings",
            Table::Bookings => "bookings",
            Table::Reviews => "reviews",
            Table::Payments => "payments",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A transactional key-value store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a unit of work. Units of work are serialized: the next `begin`
    /// waits until the current one is committed or dropped.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

/// Reads see the unit's own staged writes. Nothing is visible to other
/// units until `commit`, which applies every staged write at once.
/// Dropping a unit without committing discards its writes.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>>;
    /// All values of `table`, in key order.
    async fn scan(&self, table: Table) -> Result<Vec<Vec<u8>>>;
    fn put(&mut self, table: Table, key: Vec<u8>, value: Vec<u8>);
    fn delete(&mut self, table: Table, key: Vec<u8>);
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Outbound adapter to the remote payment gateway. Implementations must not
/// retry on their own.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(&self, request: &InitiateRequest) -> GatewayResult<Checkout>;
    async fn verify(&self, reference: &str) -> GatewayResult<GatewayVerification>;
}

pub type StoreRef = Arc<dyn Store>;
pub type GatewayRef = Arc<dyn PaymentGateway>;
