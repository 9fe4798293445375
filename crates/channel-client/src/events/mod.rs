//! Passive block observers.

pub mod observer;

pub use observer::{BlockLogger, BlockObserver, ObserverList};
