//! Root of the `solace-core` library.
//!
//! Hosts the three account/entitlement endpoints of the Solace edge:
//!
//! - [`handlers::proxy`]: entitlement-gated completion proxy
//! - [`handlers::eraser`]: account deletion across rows, storage and auth
//! - [`handlers::merger`]: anonymous-to-permanent account merge
//!
//! External systems sit behind the traits in [`backend`], [`billing`] and
//! [`upstream`]; [`gateway::Gateway`] applies the shared request convention
//! (method gate, CORS, configuration check, bearer auth) before dispatching.

pub mod backend;
pub mod billing;
pub mod config;
pub mod entitlement;
mod error;
pub mod gateway;
pub mod handlers;
pub mod identity;
pub mod services;
pub mod upstream;

pub use config::{Config, ConfigError, ConfigLoader, Setting};
pub use error::HandlerError;
pub use gateway::{ApiRequest, ApiResponse, Endpoint, Gateway};
pub use services::Services;

/// User-Agent sent on every outbound request.
pub const USER_AGENT: &str = concat!("solace-edge/", env!("CARGO_PKG_VERSION"));
