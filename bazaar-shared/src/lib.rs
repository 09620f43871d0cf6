//! # Bazaar Shared Library
//!
//! Credential and session core of the Bazaar marketplace, shared by the API
//! server and any other process that needs to authenticate principals.
//!
//! ## Module Organization
//!
//! - `auth`: Password hashing, tokens, activation, credential service,
//!   middleware and role checks
//! - `models`: Principals (users and shops), profiles, roles, addresses
//! - `session`: Session cache trait with Redis and in-memory adapters
//! - `store`: Principal store trait with PostgreSQL and in-memory adapters
//! - `db`: PostgreSQL pool and migrations
//! - `notify`: Outbound notification contract
//! - `assets`: Binary asset storage contract
//! - `error`: Error taxonomy

pub mod assets;
pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod session;
pub mod store;

/// Current version of the Bazaar shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
