pub mod input;
pub mod session_log;

pub use input::*;
pub use session_log::*;
