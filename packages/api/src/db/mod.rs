//! # Database module: PostgreSQL pool, migrations and the `CareStore` over them
//!
//! ## Design
//!
//! The pool is a **lazy, process-wide singleton** backed by a [`tokio::sync::OnceCell`].
//! The first call to [`get_pool`] opens a pool sized by `database.connections` and
//! caches it for all subsequent callers. [`migrate`] applies the embedded schema.
//!
//! [`PgStore`] implements [`store::CareStore`] with runtime-checked `sqlx` queries, so
//! the crate builds without a live database.
//!
//! ## Re-exports
//!
//! - [`get_pool`]: returns `&'static PgPool`, initialising it on first use.
//! - [`migrate`]: runs `sqlx::migrate!` against a pool.
//! - [`PgStore`]: the production store.

mod pg_store;
mod pool;

pub use pg_store::PgStore;
pub use pool::{get_pool, migrate};
