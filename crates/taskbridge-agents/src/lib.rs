//! Capability contract and agent registry.
//!
//! - [`Capability`]: The interface every agent implements.
//! - [`AgentRegistry`]: Name to capability mapping with availability flags.

pub mod capability;
pub mod registry;

pub use capability::Capability;
pub use registry::{AgentEntry, AgentListing, AgentRegistry};
