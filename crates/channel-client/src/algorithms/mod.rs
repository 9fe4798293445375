//! Pure algorithms over proposal responses.

pub mod consistency;

pub use consistency::{accepts, evaluate};
