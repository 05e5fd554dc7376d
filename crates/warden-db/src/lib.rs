//! Warden DB - Credential store
//!
//! The [`AccountRepository`] contract with a SQLx/Postgres implementation and
//! an in-memory implementation for tests and database-less deployments.
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_db::{create_pool, AccountRepository, PgAccountRepository};
//!
//! let pool = create_pool("postgres://localhost/warden").await?;
//! let accounts = PgAccountRepository::new(pool);
//! accounts.migrate().await?;
//!
//! let account = accounts.find_by_email("alice@example.com").await?;
//! ```

pub mod error;
pub mod memory;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;

pub use error::{DbError, DbResult};
pub use memory::MemoryAccountRepository;
pub use models::*;
pub use pg::PgAccountRepository;
pub use pool::{create_pool, create_pool_with_options, DbPool, PoolOptions};
pub use repo::*;
