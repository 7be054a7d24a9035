pub mod commands;
pub mod error;
pub mod math;
pub mod operations;
pub mod scene;

pub use error::{MirrorError, Result};
