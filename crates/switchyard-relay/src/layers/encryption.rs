//! `aes-gcm-encryption`: AES-256-GCM with a shared password.
//!
//! Frames on the wire are base64 of `nonce || ciphertext`. The key is the
//! SHA-256 digest of the password, so every bot on the relay must be
//! configured with the same one.

use std::sync::Arc;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use linkme::distributed_slice;
use sha2::{Digest, Sha256};
use switchyard_core::{ClassSpec, Component, ParamType, ParameterSpec};

use crate::component::{RELAY_LAYERS, StackLayer};
use crate::error::{RelayError, RelayResult};

const NONCE_SIZE: usize = 12;

pub struct AesGcmEncryption {
    cipher: Aes256Gcm,
}

impl AesGcmEncryption {
    pub fn new(password: &str) -> RelayResult<Self> {
        let key = Sha256::digest(password.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| RelayError::codec(format!("invalid key: {e:?}")))?;
        Ok(Self { cipher })
    }
}

#[async_trait]
impl StackLayer for AesGcmEncryption {
    fn encode(&self, frame: Vec<u8>) -> RelayResult<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, frame.as_slice())
            .map_err(|e| RelayError::codec(format!("encryption failed: {e:?}")))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed).into_bytes())
    }

    fn decode(&self, frame: Vec<u8>) -> RelayResult<Option<Vec<u8>>> {
        let sealed = STANDARD
            .decode(frame.trim_ascii())
            .map_err(RelayError::codec)?;
        if sealed.len() < NONCE_SIZE {
            return Err(RelayError::codec("encrypted frame is too short"));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| RelayError::codec("unable to decrypt frame, check the password"))?;
        Ok(Some(plaintext))
    }
}

#[distributed_slice(RELAY_LAYERS)]
fn aes_gcm_encryption() -> Component<dyn StackLayer> {
    Component::new(
        ClassSpec::new("aes-gcm-encryption")
            .describe("Encrypt everything sent over the relay with AES-256-GCM")
            .param(
                ParameterSpec::required("password", ParamType::Secret)
                    .describe("The password shared by all bots on this relay"),
            ),
        |args, _| {
            let password = args.require_str("password")?;
            Ok(Arc::new(AesGcmEncryption::new(password)?) as Arc<dyn StackLayer>)
        },
    )
}
