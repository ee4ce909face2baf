//! Borsh wire format for NEAR transactions carrying function calls.
//!
//! Only the subset needed to sign a single `FunctionCall` action is modelled.
//! Enum tags follow the protocol's variant order: `PublicKey::ED25519 = 0`,
//! `Signature::ED25519 = 0`, `Action::FunctionCall = 2`.

use std::io::{self, Write};

use borsh::BorshSerialize;
use linkdrop_keys::InMemorySigner;
use sha2::{Digest, Sha256};

const ED25519_KEY_TYPE: u8 = 0;
const FUNCTION_CALL_ACTION: u8 = 2;

/// An ed25519 public key as it appears inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl BorshSerialize for Ed25519PublicKey {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        ED25519_KEY_TYPE.serialize(writer)?;
        writer.write_all(&self.0)
    }
}

/// An ed25519 signature as it appears inside a signed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

impl BorshSerialize for Ed25519Signature {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        ED25519_KEY_TYPE.serialize(writer)?;
        writer.write_all(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
pub struct FunctionCallAction {
    pub method_name: String,
    /// JSON-encoded arguments.
    pub args: Vec<u8>,
    pub gas: u64,
    pub deposit: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    FunctionCall(FunctionCallAction),
}

impl BorshSerialize for Action {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Action::FunctionCall(action) => {
                FUNCTION_CALL_ACTION.serialize(writer)?;
                action.serialize(writer)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
pub struct Transaction {
    pub signer_id: String,
    pub public_key: Ed25519PublicKey,
    pub nonce: u64,
    pub receiver_id: String,
    pub block_hash: [u8; 32],
    pub actions: Vec<Action>,
}

impl Transaction {
    /// SHA-256 of the borsh encoding; this is what gets signed and is the
    /// transaction hash reported by the network.
    pub fn hash(&self) -> io::Result<[u8; 32]> {
        let bytes = borsh::to_vec(self)?;
        Ok(Sha256::digest(&bytes).into())
    }

    pub fn sign(self, signer: &InMemorySigner) -> io::Result<SignedTransaction> {
        let hash = self.hash()?;
        let signature = Ed25519Signature(signer.sign(&hash));
        Ok(SignedTransaction {
            transaction: self,
            signature,
            hash,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: Ed25519Signature,
    hash: [u8; 32],
}

impl SignedTransaction {
    /// Base58 transaction hash, matching what explorers display.
    pub fn hash_base58(&self) -> String {
        bs58::encode(self.hash).into_string()
    }
}

impl BorshSerialize for SignedTransaction {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.transaction.serialize(writer)?;
        self.signature.serialize(writer)
    }
}
