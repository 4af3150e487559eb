//! rootless_session — wires C3 identity, C5 X3DH, and C6 Double Ratchet
//! into per-conversation sessions, plus the sealed (no-session) one-shot
//! path. The only crate here that owns mutable conversation state; the
//! crypto and wire layers it sits on are both stateless.

pub mod error;
pub mod manager;

pub use error::SessionError;
pub use manager::{Conversation, InitiateOutcome, SendOptions, SessionManager};
