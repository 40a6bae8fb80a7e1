//! Session identity module
//!
//! Canonical session identifier resolution, independent of
//! authentication state. Downstream handlers consult this only when no
//! authenticated principal exists.

mod identity;
mod store;

pub use identity::{SessionContext, SessionIdentity, SessionOrigin, SessionRecord};
pub use store::{ClientStore, InMemoryStore};
