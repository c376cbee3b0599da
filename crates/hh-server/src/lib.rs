//! HTTP server for hackhub.
//!
//! Exposes the coordinator, submission service, asset manager and query
//! façade as a JSON REST API under `/v1`. Callers authenticate with a bearer
//! token that the external identity service resolves.
//!
//! Uploads are raw request bodies: `PUT /v1/assets/{kind}/{id}/{slot}?filename=...`.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use auth::{bearer_token, Authenticated, HttpIdentityService};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use router::{build_router, AppState};
pub use server::HackhubServer;
