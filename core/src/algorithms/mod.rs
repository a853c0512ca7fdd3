pub mod crypto_erase;
pub mod dod;
pub mod pattern;


// Re-export the pass definitions and generator
pub use crypto_erase::CryptoEraseWipe;
pub use dod::DoDWipe;
pub use pattern::{PassPattern, PatternGenerator};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Content of one overwrite pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PassSpec {
    /// Every byte 0x00
    Zero,
    /// Every byte 0xFF
    One,
    /// CSPRNG output
    Random,
    /// ChaCha20 ciphertext of zeros under a key minted for this invocation only
    CryptoZero,
}

impl PassSpec {
    /// The byte every position must hold, for constant patterns
    pub fn constant_byte(&self) -> Option<u8> {
        match self {
            PassSpec::Zero => Some(0x00),
            PassSpec::One => Some(0xFF),
            PassSpec::Random | PassSpec::CryptoZero => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PassSpec::Zero => "zeros (0x00)",
            PassSpec::One => "ones (0xFF)",
            PassSpec::Random => "random",
            PassSpec::CryptoZero => "encrypted zeros",
        }
    }
}

impl fmt::Display for PassSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
