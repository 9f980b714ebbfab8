pub mod base;
pub mod bot;
pub mod logging;
pub mod voice;

pub use base::*;
pub use bot::*;
pub use logging::*;
pub use voice::*;
