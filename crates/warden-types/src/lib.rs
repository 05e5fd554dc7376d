//! Warden Types - Shared domain types
//!
//! This crate contains domain types used across Warden services:
//! - Account identity and the public account projection
//! - Token pairs and cache-resident session state
//! - Request/response payloads exchanged with the auth core
//! - The failure taxonomy shared by the core and the gateway

pub mod account;
pub mod api;
pub mod error;
pub mod session;
pub mod token;

pub use account::*;
pub use api::*;
pub use error::*;
pub use session::*;
pub use token::*;
