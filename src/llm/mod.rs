pub mod client;
pub mod relaxed;
pub mod repair;

pub use client::*;
pub use relaxed::*;
pub use repair::*;
