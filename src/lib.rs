//! Per-guild voice session lifecycle for a chat bot: activity tracking,
//! command serialization and idle disconnects.

pub mod commands;
pub mod common;
pub mod configs;
pub mod session;
pub mod soundboard;
pub mod terminal;
pub mod voice;
