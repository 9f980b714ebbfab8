pub mod context;
pub mod controller;
pub mod dispatch;
pub mod streaks;

pub use context::CommandContext;
pub use controller::{CommandResult, STREAM_FAILURE_NOTICE, VoiceController, VoiceServices};
pub use dispatch::{CommandRouter, UNKNOWN_COMMAND};
pub use streaks::{ErrorStreaks, scold};
