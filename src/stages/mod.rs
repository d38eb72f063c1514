pub mod context;
pub mod executor;
pub mod language;

pub use context::*;
pub use executor::*;
pub use language::*;
