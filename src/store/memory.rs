//! In-memory row storage.

use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::batch::Op;
use super::{Row, RowKind, Store, StoreError, WriteBatch};

/// A stored row together with its version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Entry {
    pub(crate) version: u64,
    pub(crate) row: Value,
}

/// All tables plus the per-kind key sequences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Tables {
    #[serde(default)]
    pub(crate) tables: BTreeMap<RowKind, BTreeMap<String, Entry>>,
    #[serde(default)]
    pub(crate) sequences: BTreeMap<RowKind, u64>,
}

impl Tables {
    /// Checks every op against the current state, then applies all of them.
    pub(crate) fn apply(&mut self, ops: Vec<Op>) -> Result<(), StoreError> {
        let mut touched = HashSet::with_capacity(ops.len());
        for op in &ops {
            let kind = op.kind();
            let key = op.key();
            let first_touch = touched.insert((kind, key.to_owned()));
            let current = self.tables.get(&kind).and_then(|t| t.get(key));

            match op {
                Op::Create { .. } => {
                    if !first_touch || current.is_some() {
                        return Err(StoreError::AlreadyExists {
                            kind,
                            key: key.to_owned(),
                        });
                    }
                }
                Op::Update { expected, .. } => {
                    let Some(entry) = current else {
                        return Err(StoreError::NotFound {
                            kind,
                            key: key.to_owned(),
                        });
                    };
                    if !first_touch || entry.version != *expected {
                        return Err(StoreError::Conflict {
                            kind,
                            key: key.to_owned(),
                            expected: *expected,
                        });
                    }
                }
            }
        }

        for op in ops {
            match op {
                Op::Create { kind, key, value } => {
                    self.tables
                        .entry(kind)
                        .or_default()
                        .insert(key, Entry { version: 1, row: value });
                }
                Op::Update {
                    kind,
                    key,
                    expected,
                    value,
                } => {
                    self.tables.entry(kind).or_default().insert(
                        key,
                        Entry {
                            version: expected + 1,
                            row: value,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    fn get<R: Row>(&self, key: &str) -> Result<R, StoreError> {
        let entry = self
            .tables
            .get(&R::KIND)
            .and_then(|t| t.get(key))
            .ok_or_else(|| StoreError::NotFound {
                kind: R::KIND,
                key: key.to_owned(),
            })?;
        decode(key, entry)
    }

    fn query<R, P>(&self, predicate: P) -> Result<Vec<R>, StoreError>
    where
        R: Row,
        P: Fn(&R) -> bool,
    {
        let Some(table) = self.tables.get(&R::KIND) else {
            return Ok(Vec::new());
        };

        let mut rows = Vec::new();
        for (key, entry) in table {
            let row: R = decode(key, entry)?;
            if predicate(&row) {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    fn next_id(&mut self, kind: RowKind) -> u64 {
        let seq = self.sequences.entry(kind).or_insert(0);
        *seq += 1;
        *seq
    }
}

fn decode<R: Row>(key: &str, entry: &Entry) -> Result<R, StoreError> {
    let mut row: R =
        serde_json::from_value(entry.row.clone()).map_err(|source| StoreError::Deserialize {
            kind: R::KIND,
            key: key.to_owned(),
            source,
        })?;
    row.set_version(entry.version);
    Ok(row)
}

/// Thread-safe in-memory [`Store`].
///
/// Rows are kept as JSON values keyed by table and primary key, so reads
/// always hand out independent copies. All state is lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_tables(tables: Tables) -> Self {
        Self {
            inner: RwLock::new(tables),
        }
    }

    /// Returns the number of rows of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the lock was poisoned.
    pub fn count(&self, kind: RowKind) -> Result<usize, StoreError> {
        Ok(self.read()?.tables.get(&kind).map_or(0, BTreeMap::len))
    }

    pub(crate) fn snapshot(&self) -> Result<Tables, StoreError> {
        Ok(self.read()?.clone())
    }

    /// Replaces all rows with those of `staged`.
    ///
    /// Sequences are left alone so keys handed out in the meantime are not
    /// reused.
    pub(crate) fn replace_rows(&self, staged: Tables) -> Result<(), StoreError> {
        self.write()?.tables = staged.tables;
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

impl Store for MemoryStore {
    async fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.write()?.apply(batch.into_ops())
    }

    async fn get<R: Row>(&self, key: &str) -> Result<R, StoreError> {
        self.read()?.get(key)
    }

    async fn query<R, P>(&self, predicate: P) -> Result<Vec<R>, StoreError>
    where
        R: Row,
        P: Fn(&R) -> bool + Send,
    {
        self.read()?.query(predicate)
    }

    fn next_id(&self, kind: RowKind) -> Result<u64, StoreError> {
        Ok(self.write()?.next_id(kind))
    }
}
