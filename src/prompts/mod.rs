pub mod composer;
pub mod store;
pub mod summaries;
pub mod template;

pub use composer::*;
pub use store::*;
pub use template::*;
