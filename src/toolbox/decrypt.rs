//! AES-256-GCM text decryption.

use super::{Command, CmdError, Feature, FeatureResult, TRIGGER_DECRYPT};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Decrypts `hex(nonce || ciphertext)` with a key configured out of band.
/// The input carries secret material, so the command processor hides it
/// from logs for this trigger.
#[derive(Default)]
pub struct TextDecrypt {
    /// 32 bytes, hex encoded.
    pub key_hex: String,
}

impl TextDecrypt {
    fn key_bytes(&self) -> Result<[u8; KEY_LEN], CmdError> {
        let bytes = hex::decode(self.key_hex.trim())
            .map_err(|err| CmdError::FeatureFailure(format!("decryption key is not hex: {err}")))?;
        bytes.try_into().map_err(|_| {
            CmdError::FeatureFailure(format!("decryption key must be {KEY_LEN} bytes"))
        })
    }
}

#[async_trait::async_trait]
impl Feature for TextDecrypt {
    fn trigger(&self) -> &'static str {
        TRIGGER_DECRYPT
    }

    fn self_test(&self) -> Result<(), CmdError> {
        self.key_bytes().map(|_| ())
    }

    async fn execute(&self, cmd: &Command) -> FeatureResult {
        let key = match self.key_bytes() {
            Ok(key) => key,
            Err(err) => return FeatureResult::err(err),
        };
        let sealed = match hex::decode(cmd.trimmed()) {
            Ok(bytes) => bytes,
            Err(err) => {
                return FeatureResult::err(CmdError::FeatureFailure(format!(
                    "input is not hex: {err}"
                )));
            }
        };
        if sealed.len() <= NONCE_LEN {
            return FeatureResult::err(CmdError::FeatureFailure(
                "input is too short to contain a nonce".to_string(),
            ));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        match cipher.decrypt(Nonce::from_slice(nonce), ciphertext) {
            Ok(plain) => FeatureResult::ok(String::from_utf8_lossy(&plain).into_owned()),
            Err(_) => FeatureResult::err(CmdError::FeatureFailure(
                "decryption failed, wrong key or corrupted input".to_string(),
            )),
        }
    }
}
