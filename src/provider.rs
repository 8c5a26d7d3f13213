//! Provider-facing descriptors (data) and strategies (behavior).
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`) covering the authorize and
//! token endpoints, supported grants, client authentication, and the vendor quirks flows must
//! honor. `strategy` defines [`ProviderStrategy`], an HTTP-client-agnostic hook used by flows to
//! augment outgoing token requests and map failures into the bridge error taxonomy.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
