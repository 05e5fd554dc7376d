//! PostgreSQL repository implementations

mod account;

pub use account::PgAccountRepository;
