//! Text generation: the generator seam and hosted provider client.

pub mod client;
pub mod types;

pub use client::LlmClient;
pub use types::*;
