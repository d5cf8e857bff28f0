//! Tessera Storage - Durable key-value backends for governance state.
//!
//! The governance engine keeps its working set in memory and writes every
//! committed change through a [`KeyValueStore`]. Records are grouped into
//! [`Column`]s that mirror the logical layout:
//!
//! | column         | key                      | value                    |
//! |----------------|--------------------------|--------------------------|
//! | `proposals`    | proposal id              | proposal + options       |
//! | `ballots`      | (voter id, proposal id)  | the active ballot        |
//! | `stake_ledger` | voter id                 | balance, locks, metadata |
//! | `delegations`  | delegator id             | delegate + fraction      |
//! | `meta`         | name                     | counters                 |

pub mod error;
pub mod json;
pub mod memory;

pub use error::StorageError;
pub use json::JsonFileStore;
pub use memory::MemoryStore;

/// Logical record groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    Proposals,
    Ballots,
    StakeLedger,
    Delegations,
    Meta,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::Proposals => "proposals",
            Column::Ballots => "ballots",
            Column::StakeLedger => "stake_ledger",
            Column::Delegations => "delegations",
            Column::Meta => "meta",
        }
    }

    pub fn all() -> [Column; 5] {
        [
            Column::Proposals,
            Column::Ballots,
            Column::StakeLedger,
            Column::Delegations,
            Column::Meta,
        ]
    }
}

/// A single mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put {
        column: Column,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        column: Column,
        key: Vec<u8>,
    },
}

/// Group of mutations applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, column: Column, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(WriteOp::Put {
            column,
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn delete(&mut self, column: Column, key: impl Into<Vec<u8>>) {
        self.ops.push(WriteOp::Delete {
            column,
            key: key.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Durable key-value backend.
///
/// Implementations must apply a [`WriteBatch`] atomically: either every
/// operation becomes visible or none does.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    fn write(&self, batch: WriteBatch) -> Result<(), StorageError>;

    /// All entries of a column, ordered by key.
    fn scan(&self, column: Column) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let mut batch = WriteBatch::new();
        batch.put(column, key, value);
        self.write(batch)
    }

    fn delete(&self, column: Column, key: &[u8]) -> Result<(), StorageError> {
        let mut batch = WriteBatch::new();
        batch.delete(column, key);
        self.write(batch)
    }
}
