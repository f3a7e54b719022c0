pub mod models;
pub mod repo;

mod memory;
pub use memory::MemoryStore;

#[cfg(feature = "postgres")]
mod pg;

pub use models::*;
pub use repo::{CareStore, StoreError, StoreResult};
