//! Plaintext secret handling: finding them in the collection and shaping
//! them for the sealing backends.

pub mod extract;
pub mod normalize;

pub use extract::{extract_and_remove, restore};
pub use normalize::{prepare_for_sealing, secret_data};

/// Kind of the resources this transform seals.
pub const SECRET_KIND: &str = "Secret";
