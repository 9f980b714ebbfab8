//! Collaborator contracts for the chat platform's voice layer, plus an
//! in-memory loopback implementation of each.

pub mod connection;
pub mod loopback;
pub mod source;

pub use connection::*;
pub use source::*;
