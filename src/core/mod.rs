//! Conversation core
//!
//! The session state machine, the simulated reply generator and the registry
//! that owns live sessions.

mod registry;
mod reply;
mod session;

pub use registry::{SessionRegistry, SharedSession};
pub use session::{ErrorView, SessionSnapshot};
