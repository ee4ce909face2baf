//! Transaction signer loaded from NEAR CLI credential files.

use std::fmt;
use std::path::{Path, PathBuf};

use ed25519_dalek::{Signer, SigningKey};
use serde::Deserialize;

use crate::error::KeyError;
use crate::types::{decode_secret_key, encode_public_key};

/// On-disk layout written by `near login` / `near-cli-rs`.
#[derive(Deserialize)]
struct CredentialsFile {
    account_id: Option<String>,
    private_key: Option<String>,
    secret_key: Option<String>,
}

/// Path of the credentials file for `account_id` on `network_id`.
pub fn credentials_path(credentials_dir: &Path, network_id: &str, account_id: &str) -> PathBuf {
    credentials_dir
        .join(network_id)
        .join(format!("{}.json", account_id))
}

/// An account id together with the full-access key that signs for it.
#[derive(Clone)]
pub struct InMemorySigner {
    account_id: String,
    signing_key: SigningKey,
}

impl InMemorySigner {
    pub fn new(account_id: impl Into<String>, signing_key: SigningKey) -> Self {
        Self {
            account_id: account_id.into(),
            signing_key,
        }
    }

    /// Load a signer from a credentials JSON file.
    ///
    /// When the file names an account, it must match `account_id`.
    pub fn from_credentials_file(account_id: &str, path: &Path) -> Result<Self, KeyError> {
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|source| KeyError::CredentialsIo {
            path: display.clone(),
            source,
        })?;

        let file: CredentialsFile =
            serde_json::from_str(&contents).map_err(|e| KeyError::InvalidCredentials {
                path: display.clone(),
                reason: e.to_string(),
            })?;

        if let Some(file_account) = &file.account_id {
            if file_account != account_id {
                return Err(KeyError::InvalidCredentials {
                    path: display,
                    reason: format!("file is for {}, expected {}", file_account, account_id),
                });
            }
        }

        let encoded = file
            .private_key
            .or(file.secret_key)
            .ok_or_else(|| KeyError::InvalidCredentials {
                path: display,
                reason: "missing private_key".to_string(),
            })?;

        Ok(Self::new(account_id, decode_secret_key(&encoded)?))
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Public key in `ed25519:<base58>` form.
    pub fn public_key(&self) -> String {
        encode_public_key(&self.signing_key.verifying_key())
    }

    /// Raw 32-byte public key.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign a message, returning the 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for InMemorySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySigner")
            .field("account_id", &self.account_id)
            .field("public_key", &self.public_key())
            .finish()
    }
}
