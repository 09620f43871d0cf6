/// Middleware for the API server
///
/// - `auth`: Session resolution and the admin gate
/// - `security`: Security response headers

pub mod auth;
pub mod security;
