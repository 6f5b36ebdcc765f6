// ============================================================================
// Persistence Boundary
// ============================================================================
//
// Async repository traits the services depend on, plus an in-memory
// implementation used by tests and the demo binary. A SQL-backed
// implementation would live next to MemoryStore and implement the same
// traits.
//
// ============================================================================

pub mod memory;
pub mod repository;

pub use memory::MemoryStore;
pub use repository::{
    AddressBookRepository, CatalogRepository, OrderRepository, ReportSource, UserRepository,
};

use crate::domain::ErrorKind;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Concurrency conflict on order {id}: expected version {expected}, but current is {actual}")]
    VersionConflict { id: i64, expected: u64, actual: u64 },

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::VersionConflict { .. } => ErrorKind::BusinessRuleViolation,
            StoreError::Duplicate(_) | StoreError::Backend(_) => ErrorKind::Internal,
        }
    }
}
