// Cryptographic erasure - two passes per chunk
//
// Pass 1 clears the chunk with zeros. Pass 2 writes the ChaCha20 encryption
// of an all-zero plaintext under a key that exists only for the duration of
// that pass over that chunk. The key is never stored, so the ciphertext is
// indistinguishable from random data and cannot be reversed.

use super::PassSpec;

pub struct CryptoEraseWipe;

impl CryptoEraseWipe {
    pub const PASS_COUNT: usize = 2;

    /// Key length of the ephemeral cipher key, in bits
    pub const KEY_BITS: usize = crate::crypto::ephemeral::KEY_LEN * 8;

    pub fn passes() -> Vec<PassSpec> {
        vec![PassSpec::Zero, PassSpec::CryptoZero]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_erase_pass_order() {
        let passes = CryptoEraseWipe::passes();
        assert_eq!(passes.len(), CryptoEraseWipe::PASS_COUNT);
        assert_eq!(passes, vec![PassSpec::Zero, PassSpec::CryptoZero]);
    }

    #[test]
    fn test_key_is_256_bits() {
        assert_eq!(CryptoEraseWipe::KEY_BITS, 256);
    }
}
