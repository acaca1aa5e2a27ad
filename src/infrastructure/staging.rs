use crate::domain::ports::Table;
use std::collections::BTreeMap;

/// Writes buffered by a unit of work until commit. `None` marks a delete.
#[derive(Debug, Default)]
pub(crate) struct StagedWrites {
    writes: BTreeMap<(Table, Vec<u8>), Option<Vec<u8>>>,
}

impl StagedWrites {
    pub(crate) fn put(&mut self, table: Table, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert((table, key), Some(value));
    }

    pub(crate) fn delete(&mut self, table: Table, key: Vec<u8>) {
        self.writes.insert((table, key), None);
    }

    /// `Some(None)` when the key was deleted in this unit, `None` when the
    /// unit never touched it.
    pub(crate) fn lookup(&self, table: Table, key: &[u8]) -> Option<Option<&Vec<u8>>> {
        self.writes
            .get(&(table, key.to_vec()))
            .map(|value| value.as_ref())
    }

    /// Layers the staged writes of `table` over committed `base` rows.
    pub(crate) fn overlay(&self, table: Table, mut base: BTreeMap<Vec<u8>, Vec<u8>>) -> Vec<Vec<u8>> {
        for ((staged_table, key), value) in &self.writes {
            if *staged_table != table {
                continue;
            }
            match value {
                Some(value) => {
                    base.insert(key.clone(), value.clone());
                }
                None => {
                    base.remove(key);
                }
            }
        }
        base.into_values().collect()
    }

    pub(crate) fn into_writes(self) -> impl Iterator<Item = (Table, Vec<u8>, Option<Vec<u8>>)> {
        self.writes
            .into_iter()
            .map(|((table, key), value)| (table, key, value))
    }
}
