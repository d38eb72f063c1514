pub mod console;
pub mod decision;
pub mod machine;

pub use console::*;
pub use decision::*;
pub use machine::*;
