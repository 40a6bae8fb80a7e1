//! Cross-context completion channel
//!
//! The detached-window OAuth handshake: a finite-state protocol that
//! delivers a success or error result from a completion context back
//! to its opener over a best-effort message channel, and terminates
//! the completion context deterministically.
//!
//! The channel gives no delivery acknowledgment, so the protocol leans
//! on two redundancies: success is broadcast three times on a fixed
//! schedule, and the token is persisted to a recoverable store before
//! the first broadcast so the opener can pick it up even if every
//! message is lost. The receiver is idempotent, which makes the
//! duplicate deliveries harmless.

mod completion;
mod message;
mod receiver;

pub use completion::{
    CompletionDriver, CompletionPlan, HandshakeSession, HandshakeState, Navigator, OpenerPort,
    run_error_broadcast, run_success_broadcasts,
};
pub use message::{CompletionParams, HandshakeMessage};
pub use receiver::OpenerReceiver;
