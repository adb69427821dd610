//! Sealed-secret transform for overlay builds.
//!
//! Replaces plaintext `Secret` resources in a resource collection with
//! `SealedSecret` resources encrypted for a cluster's sealing certificate.

pub mod cert;
pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod resources;
pub mod sealer;
pub mod secrets;
pub mod transform;

pub use config::SealerConfig;
pub use errors::{Result, SealError};
pub use resources::{ResMap, Resource, ResourceCollection};
pub use transform::Transformer;
