pub mod ephemeral;
pub mod secure_rng;

// Re-export
pub use ephemeral::{EphemeralKeystream, KeyId};
pub use secure_rng::{get_secure_rng, SecureRNG};
