//! HTTP API layer for companion.
//!
//! - **Endpoints**: accounts, forum, notifications, surveys, articles, admin and access checks
//! - **Extractors**: bearer-token identity
//! - **Middleware**: token resolution
//! - **Streaming**: Server-Sent Events over the change feed
//!
//! Built on Axum 0.8.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod sse;

pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};
