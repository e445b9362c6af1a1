//! stackreg — cross-stack parameter registry and composition root.
//!
//! Units publish well-known identifiers at apply time and resolve them at
//! plan time. The composition root runs units in order, builds their compute
//! descriptors and hands the result to the provisioning engine as a manifest.

pub mod cli;
pub mod core;
pub mod fronts;
pub mod registry;
pub mod tripwire;
