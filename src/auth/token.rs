//! Token records persisted per config entry and the secret wrapper they rely on.

pub mod record;
pub mod secret;
