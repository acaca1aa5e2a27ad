//! Adapters behind the domain ports: storage backends and the gateway client.

pub mod chapa;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
mod staging;
