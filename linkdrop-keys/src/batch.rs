//! Key batch generation.

use crate::types::LinkdropKeypair;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

/// Generate `count` independent keypairs from the OS random source.
///
/// The returned order is the generation order; callers rely on it to pair
/// each public key with its redemption link.
pub fn generate_key_batch(count: usize) -> Vec<LinkdropKeypair> {
    (0..count)
        .map(|_| {
            let signing_key = SigningKey::generate(&mut OsRng);
            LinkdropKeypair::from_signing_key(&signing_key)
        })
        .collect()
}
