//! Identity resolution and cross-context session completion service

pub mod auth;
pub mod config;
mod constants;
mod error;
pub mod handshake;
pub mod observability;
pub mod server;
pub mod session;

pub use auth::{
    AuthStrategy, AuthenticationOutcome, IdentityResolver, Principal, UnauthenticatedReason,
};
pub use config::Config;
pub use error::{Error, Result};
pub use handshake::{CompletionDriver, CompletionParams, CompletionPlan, HandshakeMessage};
pub use server::{AppState, build_router, run_server};
pub use session::{SessionContext, SessionIdentity, SessionOrigin, SessionRecord};
