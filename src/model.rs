//! Bouncie REST and webhook payloads.

pub mod event;
pub mod vehicle;

pub use event::*;
pub use vehicle::*;
