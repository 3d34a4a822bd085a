//! Staged multi-row writes.

use serde_json::Value;

use super::{Row, RowKind, StoreError};

/// A single staged write.
#[derive(Debug, Clone)]
pub(crate) enum Op {
    /// Insert a row that must not exist yet.
    Create {
        kind: RowKind,
        key: String,
        value: Value,
    },
    /// Replace a row that must still be at `expected`.
    Update {
        kind: RowKind,
        key: String,
        expected: u64,
        value: Value,
    },
}

impl Op {
    pub(crate) const fn kind(&self) -> RowKind {
        match self {
            Self::Create { kind, .. } | Self::Update { kind, .. } => *kind,
        }
    }

    pub(crate) fn key(&self) -> &str {
        match self {
            Self::Create { key, .. } | Self::Update { key, .. } => key,
        }
    }
}

/// A group of row writes applied all-or-nothing by [`Store::apply`].
///
/// Staging a row also assigns the version it will have once the batch is
/// applied, so callers can keep using the row they passed in.
///
/// # Example
///
/// ```ignore
/// let mut batch = WriteBatch::new();
/// batch.create(&mut transaction)?;
/// batch.create(&mut idempotency_key)?;
/// store.apply(batch).await?;
/// ```
///
/// [`Store::apply`]: super::Store::apply
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<Op>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Stages an insert. The row's version becomes `1`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialize`] if the row cannot be encoded.
    pub fn create<R: Row>(&mut self, row: &mut R) -> Result<(), StoreError> {
        let value = encode(row)?;
        self.ops.push(Op::Create {
            kind: R::KIND,
            key: row.key(),
            value,
        });
        row.set_version(1);
        Ok(())
    }

    /// Stages an optimistic update. The row's version is bumped by one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialize`] if the row cannot be encoded.
    pub fn update<R: Row>(&mut self, row: &mut R) -> Result<(), StoreError> {
        let value = encode(row)?;
        let expected = row.version();
        self.ops.push(Op::Update {
            kind: R::KIND,
            key: row.key(),
            expected,
            value,
        });
        row.set_version(expected + 1);
        Ok(())
    }

    /// Returns the number of staged writes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if nothing has been staged.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn into_ops(self) -> Vec<Op> {
        self.ops
    }
}

fn encode<R: Row>(row: &R) -> Result<Value, StoreError> {
    serde_json::to_value(row).map_err(|source| StoreError::Serialize {
        kind: R::KIND,
        source,
    })
}
