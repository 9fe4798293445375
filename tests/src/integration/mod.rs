//! Cross-crate integration flows.

#[cfg(test)]
mod fixtures;
pub mod channels;
pub mod flows;
pub mod lifecycle;
