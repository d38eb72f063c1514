pub mod config;
pub mod log;
pub mod records;
pub mod stage;

pub use config::*;
pub use log::*;
pub use records::*;
pub use stage::*;
