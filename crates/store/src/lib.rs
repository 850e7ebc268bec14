//! Storage layer for the storefront backend.
//!
//! Every multi-row operation runs inside a [`UnitOfWork`]: one database
//! transaction that implements all repository traits and is either
//! committed or dropped. Dropping without committing rolls back.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use error::{EntityKind, Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use repository::{
    CartRepository, InventoryLedger, OrderRepository, PageRequest, PaymentRepository,
    ProductCatalog, Store, UnitOfWork,
};
