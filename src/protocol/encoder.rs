//! Payload encoders.
//!
//! An [`Encoder`] turns a message into the opaque bytes carried by a datagram
//! and back. [`AesEncoder`] is the production scheme; [`PlainEncoder`] sends
//! bare JSON and exists for development against unencrypted firmware.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::config::{EncoderConfig, EncoderKind};
use crate::error::Result;
use crate::utils::crypto::BlockCrypto;

/// Message framing contract shared by every encoder.
///
/// `encrypt` only fails if `serde_json` rejects the message: a map with
/// non-string keys, or a `Serialize` impl that reports an error. The relay's
/// own [`Command`](crate::core::message::Command) and
/// [`Status`](crate::core::message::Status) are plain structs of integers
/// and integer vectors, so encrypting them always succeeds; the `Result`
/// exists for caller-defined message types.
pub trait Encoder: Send + Sync + 'static {
    fn encrypt<M: Serialize>(&self, message: &M) -> Result<Vec<u8>>;

    fn decrypt<M: DeserializeOwned>(&self, payload: &[u8]) -> Result<M>;
}

/// Block-wise AES-256 over JSON, keyed from a shared passphrase
#[derive(Debug, Clone)]
pub struct AesEncoder {
    crypto: BlockCrypto,
}

impl AesEncoder {
    pub fn new(shared_secret: &str) -> Self {
        Self {
            crypto: BlockCrypto::new(shared_secret),
        }
    }
}

impl Encoder for AesEncoder {
    fn encrypt<M: Serialize>(&self, message: &M) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(message)?;
        Ok(self.crypto.seal(&json))
    }

    fn decrypt<M: DeserializeOwned>(&self, payload: &[u8]) -> Result<M> {
        let json = self.crypto.open(payload)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

/// Unencrypted JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainEncoder;

impl Encoder for PlainEncoder {
    fn encrypt<M: Serialize>(&self, message: &M) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(message)?;
        trace!(payload = %String::from_utf8_lossy(&json), "Encoded plain payload");
        Ok(json)
    }

    fn decrypt<M: DeserializeOwned>(&self, payload: &[u8]) -> Result<M> {
        let message = serde_json::from_slice(payload)?;
        trace!(payload = %String::from_utf8_lossy(payload), "Decoded plain payload");
        Ok(message)
    }
}

/// Encoder selected at runtime from [`EncoderConfig`]
#[derive(Debug, Clone)]
pub enum ConfiguredEncoder {
    Aes(AesEncoder),
    Plain(PlainEncoder),
}

impl ConfiguredEncoder {
    pub fn from_config(config: &EncoderConfig) -> Self {
        match config.kind {
            EncoderKind::Aes => Self::Aes(AesEncoder::new(&config.shared_secret)),
            EncoderKind::Plain => Self::Plain(PlainEncoder),
        }
    }
}

impl Encoder for ConfiguredEncoder {
    fn encrypt<M: Serialize>(&self, message: &M) -> Result<Vec<u8>> {
        match self {
            Self::Aes(encoder) => encoder.encrypt(message),
            Self::Plain(encoder) => encoder.encrypt(message),
        }
    }

    fn decrypt<M: DeserializeOwned>(&self, payload: &[u8]) -> Result<M> {
        match self {
            Self::Aes(encoder) => encoder.decrypt(payload),
            Self::Plain(encoder) => encoder.decrypt(payload),
        }
    }
}
