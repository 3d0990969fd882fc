//! Shared skincare routines: products, skin profile and comments.

pub mod comments;
pub mod types;

pub use comments::normalize_comments;
pub use types::*;
