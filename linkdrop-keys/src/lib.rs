//! Linkdrop Keys
//!
//! Ed25519 key material in the string encodings NEAR tooling expects.
//!
//! # Overview
//!
//! A linkdrop hands out one freshly generated access key per redemption
//! link. This crate provides:
//!
//! - Batch generation of independent keypairs ([`generate_key_batch`])
//! - The `ed25519:<base58>` public/secret key encodings
//! - [`InMemorySigner`], loaded from a NEAR CLI credentials file, used to
//!   sign transactions for the funding account
//!
//! # Example
//!
//! ```rust
//! use linkdrop_keys::generate_key_batch;
//!
//! let batch = generate_key_batch(3);
//! assert_eq!(batch.len(), 3);
//! assert!(batch[0].public_key.starts_with("ed25519:"));
//! ```

mod batch;
mod error;
mod signer;
mod types;

pub use batch::generate_key_batch;
pub use error::KeyError;
pub use signer::{credentials_path, InMemorySigner};
pub use types::{
    decode_public_key, decode_secret_key, encode_public_key, encode_secret_key, LinkdropKeypair,
    ED25519_PREFIX,
};
