//! Error types shared across the Berth crates.

mod artifact;
mod configuration;
mod deployment;
mod descriptor;
mod load;

pub use artifact::*;
pub use configuration::*;
pub use deployment::*;
pub use descriptor::*;
pub use load::*;

/// Boxed error used where a root cause of arbitrary type must be carried.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
