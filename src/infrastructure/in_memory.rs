use super::staging::StagedWrites;
use crate::domain::ports::{Store, Table, UnitOfWork};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Tables = HashMap<Table, BTreeMap<Vec<u8>, Vec<u8>>>;

/// A thread-safe in-memory store.
///
/// Uses `Arc<Mutex<..>>` so clones share the same tables. A unit of work
/// holds the mutex for its whole lifetime, which serializes them.
/// Ideal for testing or when persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tables = self.tables.clone().lock_owned().await;
        Ok(Box::new(InMemoryUnitOfWork {
            tables,
            staged: StagedWrites::default(),
        }))
    }
}

pub struct InMemoryUnitOfWork {
    tables: OwnedMutexGuard<Tables>,
    staged: StagedWrites,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(staged) = self.staged.lookup(table, key) {
            return Ok(staged.cloned());
        }
        Ok(self
            .tables
            .get(&table)
            .and_then(|rows| rows.get(key))
            .cloned())
    }

    async fn scan(&self, table: Table) -> Result<Vec<Vec<u8>>> {
        let base = self.tables.get(&table).cloned().unwrap_or_default();
        Ok(self.staged.overlay(table, base))
    }

    fn put(&mut self, table: Table, key: Vec<u8>, value: Vec<u8>) {
        self.staged.put(table, key, value);
    }

    fn delete(&mut self, table: Table, key: Vec<u8>) {
        self.staged.delete(table, key);
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryUnitOfWork { mut tables, staged } = *self;
        for (table, key, value) in staged.into_writes() {
            let rows = tables.entry(table).or_default();
            match value {
                Some(value) => {
                    rows.insert(key, value);
                }
                None => {
                    rows.remove(&key);
                }
            }
        }
        Ok(())
    }
}
