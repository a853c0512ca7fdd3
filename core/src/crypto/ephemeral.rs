// Single-use key material for the crypto-erase pass
//
// Each EphemeralKeystream owns one random 256-bit key and a random 96-bit
// nonce. The key bytes live in a Zeroizing buffer only long enough to build
// the cipher; the cipher state itself is zeroized on drop. Nothing here is
// Clone, Serialize or Debug-printable beyond the opaque KeyId.

use super::secure_rng::get_secure_rng;
use anyhow::Result;
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::{ChaCha20, Key, Nonce};
use std::fmt;
use uuid::Uuid;
use zeroize::Zeroizing;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

/// ChaCha20 has a 32-bit block counter over 64-byte blocks. Re-key well
/// before the counter could wrap.
pub const KEYSTREAM_LIMIT: u64 = 64 * 1024 * 1024 * 1024;

/// Opaque identifier for log correlation; not derived from the key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId(Uuid);

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self.0.simple())
    }
}

/// Counter-mode keystream under a freshly generated key
pub struct EphemeralKeystream {
    cipher: ChaCha20,
    key_id: KeyId,
    produced: u64,
    limit: u64,
    rekeys: u32,
}

impl EphemeralKeystream {
    /// Generate a new key and nonce and build the cipher
    pub fn generate() -> Result<Self> {
        Self::with_limit(KEYSTREAM_LIMIT)
    }

    /// Like `generate`, re-keying once `limit` bytes have been produced
    pub(crate) fn with_limit(limit: u64) -> Result<Self> {
        let (cipher, key_id) = Self::fresh_cipher()?;
        Ok(Self {
            cipher,
            key_id,
            produced: 0,
            limit,
            rekeys: 0,
        })
    }

    fn fresh_cipher() -> Result<(ChaCha20, KeyId)> {
        let rng = get_secure_rng();
        let key = Zeroizing::new(rng.random_array::<KEY_LEN>()?);
        let nonce: [u8; NONCE_LEN] = rng.random_array()?;

        let cipher = ChaCha20::new(Key::from_slice(key.as_ref()), Nonce::from_slice(&nonce));
        Ok((cipher, KeyId(Uuid::new_v4())))
    }

    /// Encrypt `buf` in place (XOR with the keystream)
    pub fn apply(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.produced + buf.len() as u64 > self.limit {
            let (cipher, key_id) = Self::fresh_cipher()?;
            self.cipher = cipher;
            self.key_id = key_id;
            self.produced = 0;
            self.rekeys += 1;
            tracing::debug!(key_id = %self.key_id, "keystream limit reached, re-keyed");
        }

        self.cipher.apply_keystream(buf);
        self.produced += buf.len() as u64;
        Ok(())
    }

    /// Overwrite `buf` with the ciphertext of an all-zero plaintext
    pub fn encrypt_zeros(&mut self, buf: &mut [u8]) -> Result<()> {
        buf.fill(0);
        self.apply(buf)
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn bytes_produced(&self) -> u64 {
        self.produced
    }

    pub fn rekeys(&self) -> u32 {
        self.rekeys
    }
}

impl fmt::Debug for EphemeralKeystream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKeystream")
            .field("key_id", &self.key_id)
            .field("produced", &self.produced)
            .finish_non_exhaustive()
    }
}
