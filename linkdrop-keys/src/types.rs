//! Linkdrop keypair type and NEAR key string encodings.

use crate::error::KeyError;
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

/// Curve prefix used by NEAR for ed25519 keys.
pub const ED25519_PREFIX: &str = "ed25519:";

/// A single-use access keypair handed out through one redemption link.
///
/// Both halves are kept in their encoded string form: the public key is
/// passed to the drop contract, the secret key is embedded verbatim in the
/// link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkdropKeypair {
    /// `ed25519:<base58 of 32 public bytes>`.
    pub public_key: String,
    /// `ed25519:<base58 of 64 bytes: seed || public>`.
    pub secret_key: String,
}

impl LinkdropKeypair {
    pub(crate) fn from_signing_key(signing_key: &SigningKey) -> Self {
        Self {
            public_key: encode_public_key(&signing_key.verifying_key()),
            secret_key: encode_secret_key(signing_key),
        }
    }
}

/// Encode a public key as `ed25519:<base58>`.
pub fn encode_public_key(key: &VerifyingKey) -> String {
    format!("{}{}", ED25519_PREFIX, bs58::encode(key.as_bytes()).into_string())
}

/// Encode a signing key the way NEAR key files store it (seed followed by
/// the public key, 64 bytes total).
pub fn encode_secret_key(key: &SigningKey) -> String {
    format!(
        "{}{}",
        ED25519_PREFIX,
        bs58::encode(key.to_keypair_bytes()).into_string()
    )
}

/// Decode an `ed25519:<base58>` public key.
pub fn decode_public_key(encoded: &str) -> Result<VerifyingKey, KeyError> {
    let bytes = decode_key_data(encoded)?;
    let arr: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| KeyError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
    VerifyingKey::from_bytes(&arr).map_err(|e| KeyError::InvalidEncoding(e.to_string()))
}

/// Decode an `ed25519:<base58>` secret key.
///
/// Accepts the 64-byte `seed || public` form as well as a bare 32-byte seed.
/// For the 64-byte form the embedded public key must match the seed.
pub fn decode_secret_key(encoded: &str) -> Result<SigningKey, KeyError> {
    let bytes = decode_key_data(encoded)?;
    match bytes.len() {
        32 => {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&bytes);
            Ok(SigningKey::from_bytes(&seed))
        }
        64 => {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&bytes[..32]);
            let signing_key = SigningKey::from_bytes(&seed);
            if signing_key.verifying_key().as_bytes()[..] != bytes[32..] {
                return Err(KeyError::PublicKeyMismatch);
            }
            Ok(signing_key)
        }
        actual => Err(KeyError::InvalidLength {
            expected: 64,
            actual,
        }),
    }
}

/// Strip the curve prefix and base58-decode the payload.
///
/// Keys without a prefix are treated as ed25519, as NEAR tooling does.
fn decode_key_data(encoded: &str) -> Result<Vec<u8>, KeyError> {
    let data = match encoded.split_once(':') {
        Some(("ed25519", data)) => data,
        Some((curve, _)) => return Err(KeyError::UnsupportedKeyType(curve.to_string())),
        None => encoded,
    };
    bs58::decode(data)
        .into_vec()
        .map_err(|e| KeyError::InvalidEncoding(e.to_string()))
}
