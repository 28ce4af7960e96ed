pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod store;

pub use error::{Result, StorageError};
pub use memory::{MemoryDatabase, MemoryLedger};
pub use postgres::{Database, PgLedger};
pub use store::LedgerStore;
