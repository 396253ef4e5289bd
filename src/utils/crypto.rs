//! Block-cipher framing for relay payloads.
//!
//! AES-256 applied to each 16 byte block independently, with a fresh random
//! IV block in front of every payload. The key is the SHA-256 digest of a
//! shared passphrase, derived once per [`BlockCrypto`].
//!
//! ## Payload Layout
//! ```text
//! E(IV) || E(block 1) || ... || E(block n)
//! plaintext blocks = IV(16) || "IRREMOTE" || body || padding
//! ```
//! The IV block is encrypted like every other block and blocks are not
//! chained, matching the device firmware. Padding is PKCS#7 style: every padding
//! byte holds the padding length (1..=16), so a full block is appended when
//! the plaintext is aligned.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes256;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{ProtocolError, Result};

/// Cipher block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Marker prepended to every plaintext; a wrong key will not reproduce it
pub const MAGIC: &[u8] = b"IRREMOTE";

/// Derive the 256-bit key from an arbitrary length passphrase
pub fn derive_key(passphrase: &str) -> Zeroizing<[u8; 32]> {
    let digest = Sha256::digest(passphrase.as_bytes());
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&digest);
    key
}

/// Generate a random IV
pub fn generate_iv() -> [u8; BLOCK_SIZE] {
    let mut iv = [0u8; BLOCK_SIZE];
    rand::rng().fill_bytes(&mut iv);
    iv
}

#[derive(Clone)]
pub struct BlockCrypto {
    cipher: Aes256,
}

impl std::fmt::Debug for BlockCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCrypto").finish_non_exhaustive()
    }
}

impl BlockCrypto {
    /// Create a cipher keyed from a passphrase
    pub fn new(passphrase: &str) -> Self {
        let key = derive_key(passphrase);
        Self::from_key(&key)
    }

    pub fn from_key(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256::new(GenericArray::from_slice(key)),
        }
    }

    /// Frame and encrypt `body`
    pub fn seal(&self, body: &[u8]) -> Vec<u8> {
        self.seal_with_iv(&generate_iv(), body)
    }

    fn seal_with_iv(&self, iv: &[u8; BLOCK_SIZE], body: &[u8]) -> Vec<u8> {
        let content_len = MAGIC.len() + body.len();
        let padding = BLOCK_SIZE - content_len % BLOCK_SIZE;

        let mut payload = Vec::with_capacity(BLOCK_SIZE + content_len + padding);
        payload.extend_from_slice(iv);
        payload.extend_from_slice(MAGIC);
        payload.extend_from_slice(body);
        payload.resize(payload.len() + padding, padding as u8);

        for block in payload.chunks_exact_mut(BLOCK_SIZE) {
            self.cipher.encrypt_block(GenericArray::from_mut_slice(block));
        }
        payload
    }

    /// Decrypt a payload produced by [`BlockCrypto::seal`] and return the body
    pub fn open(&self, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() < 2 * BLOCK_SIZE || payload.len() % BLOCK_SIZE != 0 {
            return Err(ProtocolError::InvalidLength(payload.len()));
        }

        let mut plaintext = payload.to_vec();
        for block in plaintext.chunks_exact_mut(BLOCK_SIZE) {
            self.cipher.decrypt_block(GenericArray::from_mut_slice(block));
        }

        let padding = plaintext[plaintext.len() - 1];
        if padding == 0 || padding as usize > BLOCK_SIZE {
            return Err(ProtocolError::InvalidPadding(padding));
        }
        plaintext.truncate(plaintext.len() - padding as usize);

        // IV block
        let framed = &plaintext[BLOCK_SIZE..];
        if !framed.starts_with(MAGIC) {
            return Err(ProtocolError::InvalidMagic);
        }

        Ok(framed[MAGIC.len()..].to_vec())
    }
}
