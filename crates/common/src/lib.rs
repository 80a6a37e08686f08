//! Types shared by every assistant crate.

pub mod error;
pub mod text;
pub mod time;

pub use error::{AssistantError, Result};
