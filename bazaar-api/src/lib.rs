//! # Bazaar API Server Library
//!
//! HTTP surface of the Bazaar credential and session core: registration,
//! activation, login, refresh, logout and profile management for the user
//! and shop portals.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Session resolution, admin gate and security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
