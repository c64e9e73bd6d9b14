//! The embeddable stub server.
//!
//! # Module Structure
//!
//! - `core` - `DecoyServer`: lifecycle, registration and verification
//! - `handler` - Per-request dispatch: match, journal, respond or 404
//! - `shutdown` - Validated shutdown timeouts and connection draining

mod core;
mod handler;
mod shutdown;

#[cfg(test)]
mod tests;

pub use self::core::DecoyServer;
pub use handler::{handle_request, ServerState};
pub use shutdown::ShutdownTimeouts;
