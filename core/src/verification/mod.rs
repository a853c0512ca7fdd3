pub mod probe;

pub use probe::{sample_matches, VerificationProbe};
