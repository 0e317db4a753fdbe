//! The three endpoint handlers.
//!
//! Handlers run after the gateway has checked method, configuration and
//! bearer auth, and receive the resolved caller. Each one issues its
//! external calls strictly in sequence and stops at the first failure.
//! Earlier steps are not rolled back; every step is idempotent, so a client
//! retry converges.

pub mod eraser;
pub mod merger;
pub mod proxy;

use crate::config::Config;
use crate::services::Services;

/// Borrowed view of what a handler may use.
#[derive(Clone, Copy)]
pub struct HandlerContext<'a> {
    pub config: &'a Config,
    pub services: &'a Services,
}
