//! Core module containing fundamental types and helpers

pub mod hash;
pub mod types;

// Re-export commonly used items
pub use types::*;
