//! Request handlers.

pub mod data;
pub mod health;

pub use data::*;
pub use health::*;
