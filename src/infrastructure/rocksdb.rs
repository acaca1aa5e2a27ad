use super::staging::StagedWrites;
use crate::domain::ports::{Store, Table, UnitOfWork};
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A persistent store implementation using RocksDB.
///
/// Each table lives in its own Column Family. Units of work buffer their
/// writes and commit them as one atomic `WriteBatch`; a process-wide write
/// lock serializes units of work.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    writer: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that a column family exists for every table.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = Table::ALL
            .iter()
            .map(|table| ColumnFamilyDescriptor::new(table.name(), Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            writer: Arc::new(Mutex::new(())),
        })
    }
}

fn family(db: &DB, table: Table) -> Result<&ColumnFamily> {
    db.cf_handle(table.name())
        .ok_or_else(|| BookingError::Storage(format!("{table} column family not found")))
}

#[async_trait]
impl Store for RocksDbStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = self.writer.clone().lock_owned().await;
        Ok(Box::new(RocksDbUnitOfWork {
            db: self.db.clone(),
            _guard: guard,
            staged: StagedWrites::default(),
        }))
    }
}

pub struct RocksDbUnitOfWork {
    db: Arc<DB>,
    _guard: OwnedMutexGuard<()>,
    staged: StagedWrites,
}

#[async_trait]
impl UnitOfWork for RocksDbUnitOfWork {
    async fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(staged) = self.staged.lookup(table, key) {
            return Ok(staged.cloned());
        }
        let cf = family(&self.db, table)?;
        Ok(self.db.get_cf(cf, key)?)
    }

    async fn scan(&self, table: Table) -> Result<Vec<Vec<u8>>> {
        let cf = family(&self.db, table)?;
        let mut base = BTreeMap::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            base.insert(key.into_vec(), value.into_vec());
        }
        Ok(self.staged.overlay(table, base))
    }

    fn put(&mut self, table: Table, key: Vec<u8>, value: Vec<u8>) {
        self.staged.put(table, key, value);
    }

    fn delete(&mut self, table: Table, key: Vec<u8>) {
        self.staged.delete(table, key);
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let RocksDbUnitOfWork { db, _guard, staged } = *self;
        let mut batch = WriteBatch::default();
        for (table, key, value) in staged.into_writes() {
            let cf = family(&db, table)?;
            match value {
                Some(value) => batch.put_cf(cf, key, value),
                None => batch.delete_cf(cf, key),
            }
        }
        db.write(batch)?;
        Ok(())
    }
}
