use super::PassSpec;
use crate::crypto::ephemeral::{EphemeralKeystream, KeyId};
use crate::crypto::secure_rng::{get_secure_rng, SecureRNG};
use anyhow::Result;

/// Produces the bytes written by one pass.
///
/// `fill` returns a complete buffer for a single write. Executors that write
/// a chunk in several blocks use `stream` instead so that one `CryptoZero`
/// pass over a chunk is one invocation with one key.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternGenerator;

impl PatternGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Buffer of exactly `length` bytes for `spec`
    pub fn fill(&self, spec: PassSpec, length: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length];
        self.stream(spec)?.fill_next(&mut buf)?;
        Ok(buf)
    }

    /// Start one pass invocation. For `CryptoZero` this mints the key.
    pub fn stream(&self, spec: PassSpec) -> Result<PassPattern> {
        let state = match spec {
            PassSpec::Zero | PassSpec::One => {
                // constant_byte is Some for both constant specs
                PatternState::Constant(spec.constant_byte().unwrap_or_default())
            }
            PassSpec::Random => PatternState::Random(get_secure_rng()),
            PassSpec::CryptoZero => {
                let keystream = EphemeralKeystream::generate()?;
                tracing::trace!(key_id = %keystream.key_id(), "minted ephemeral key");
                PatternState::Crypto(Box::new(keystream))
            }
        };

        Ok(PassPattern { state })
    }
}

enum PatternState {
    Constant(u8),
    Random(&'static SecureRNG),
    Crypto(Box<EphemeralKeystream>),
}

/// One in-progress pass. Dropping it destroys any key material.
pub struct PassPattern {
    state: PatternState,
}

impl PassPattern {
    /// Fill `buf` with the next bytes of this pass
    pub fn fill_next(&mut self, buf: &mut [u8]) -> Result<()> {
        match &mut self.state {
            PatternState::Constant(byte) => buf.fill(*byte),
            PatternState::Random(rng) => rng.fill_bytes(buf)?,
            PatternState::Crypto(keystream) => keystream.encrypt_zeros(buf)?,
        }
        Ok(())
    }

    /// Key identifier of a crypto pass, for log correlation
    pub fn key_id(&self) -> Option<KeyId> {
        match &self.state {
            PatternState::Crypto(keystream) => Some(keystream.key_id()),
            _ => None,
        }
    }
}
