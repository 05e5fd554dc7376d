//! HTTP handlers

mod auth;
mod health;
mod user;

pub use auth::{login, logout, refresh, register};
pub use health::{health, ready};
pub use user::{list_users, me};
