//! HTTP surface: landing page API, health probes and static assets.

pub mod handlers;
pub mod routes;

pub use routes::create_router;
