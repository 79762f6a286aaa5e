//! Key loading and transaction signing.
//!
//! The transaction hash is `keccak256(network_id || msgpack(transaction))`,
//! signed with secp256k1. A transaction whose source account differs from the
//! trading account carries a second signature from the trading key.

use std::path::PathBuf;

use alloy::primitives::{keccak256, Address, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as AlloySigner;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::client::{SignedTransaction, Transaction};

/// Where a private key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Hex key in an environment variable (development).
    EnvVar { var_name: String },
    /// Hex key in a file (production, keep it 0600).
    File { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Failed to decode hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Signing failed: {0}")]
    SigningFailed(#[from] alloy::signers::Error),

    #[error("Transaction serialization failed: {0}")]
    SerializationFailed(String),
}

fn parse_hex_key(hex_str: &str) -> Result<Zeroizing<Vec<u8>>, KeyError> {
    let trimmed = hex_str.trim().trim_start_matches("0x");
    Ok(Zeroizing::new(hex::decode(trimmed)?))
}

/// Load one key. The raw bytes are wiped as soon as the signer is built.
pub fn load_key(source: &KeySource) -> Result<PrivateKeySigner, KeyError> {
    let secret = match source {
        KeySource::EnvVar { var_name } => {
            let text = Zeroizing::new(
                std::env::var(var_name).map_err(|_| KeyError::EnvVarNotFound(var_name.clone()))?,
            );
            parse_hex_key(&text)?
        }
        KeySource::File { path } => {
            let text = Zeroizing::new(std::fs::read_to_string(path)?);
            parse_hex_key(&text)?
        }
    };
    PrivateKeySigner::from_slice(&secret).map_err(|e| KeyError::InvalidKey(e.to_string()))
}

/// Hash that gets signed for `tx` on `network_id`.
pub fn transaction_hash(tx: &Transaction, network_id: &str) -> Result<B256, SignerError> {
    let mut data = Vec::with_capacity(network_id.len() + 256);
    data.extend_from_slice(network_id.as_bytes());
    let body = rmp_serde::to_vec_named(tx)
        .map_err(|e| SignerError::SerializationFailed(e.to_string()))?;
    data.extend_from_slice(&body);
    Ok(keccak256(&data))
}

/// Account id derived from a signer.
pub fn account_id(signer: &PrivateKeySigner) -> String {
    format!("{:#x}", signer.address())
}

/// Signs transactions with the source key and, when set, the trading key.
#[derive(Clone)]
pub struct TxSigner {
    source: PrivateKeySigner,
    trading: Option<PrivateKeySigner>,
    network_id: String,
}

impl TxSigner {
    pub fn single(source: PrivateKeySigner, network_id: impl Into<String>) -> Self {
        Self {
            source,
            trading: None,
            network_id: network_id.into(),
        }
    }

    pub fn pair(
        source: PrivateKeySigner,
        trading: PrivateKeySigner,
        network_id: impl Into<String>,
    ) -> Self {
        Self {
            source,
            trading: Some(trading),
            network_id: network_id.into(),
        }
    }

    /// Load keys. Without a trading key the source key trades for itself.
    pub fn load(
        source: &KeySource,
        trading: Option<&KeySource>,
        network_id: impl Into<String>,
    ) -> Result<Self, KeyError> {
        let source = load_key(source)?;
        let trading = trading.map(load_key).transpose()?;
        Ok(Self {
            source,
            trading,
            network_id: network_id.into(),
        })
    }

    pub fn source_address(&self) -> Address {
        self.source.address()
    }

    pub fn source_account(&self) -> String {
        account_id(&self.source)
    }

    pub fn trading_account(&self) -> String {
        account_id(self.trading.as_ref().unwrap_or(&self.source))
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    pub async fn sign(&self, tx: Transaction) -> Result<SignedTransaction, SignerError> {
        let hash = transaction_hash(&tx, &self.network_id)?;

        // never log signatures
        let mut signatures = vec![hex::encode(self.source.sign_hash(&hash).await?.as_bytes())];
        if let Some(trading) = &self.trading {
            signatures.push(hex::encode(trading.sign_hash(&hash).await?.as_bytes()));
        }

        Ok(SignedTransaction {
            transaction: tx,
            hash: hex::encode(hash),
            signatures,
        })
    }
}

impl std::fmt::Debug for TxSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxSigner")
            .field("source", &self.source.address())
            .field("trading", &self.trading.as_ref().map(|s| s.address()))
            .field("network_id", &self.network_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reef_core::{Asset, ManageOffer, Number};

    // Well-known test keys (DO NOT use in production)
    const KEY_A: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const KEY_B: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn signer(key: &str) -> PrivateKeySigner {
        let bytes = hex::decode(key.trim_start_matches("0x")).unwrap();
        PrivateKeySigner::from_slice(&bytes).unwrap()
    }

    fn tx(sequence: i64) -> Transaction {
        Transaction {
            source_account: "GME".to_string(),
            sequence,
            fee: "0.00002".parse().unwrap(),
            operations: vec![ManageOffer {
                offer_id: 0,
                selling: Asset::Native,
                buying: Asset::credit("USD", "GISSUER"),
                price: "0.2".parse::<Number>().unwrap(),
                amount: "10".parse::<Number>().unwrap(),
                source_account: None,
            }],
        }
    }

    #[test]
    fn test_hash_depends_on_network_and_sequence() {
        let a = transaction_hash(&tx(1), "test").unwrap();
        assert_eq!(a, transaction_hash(&tx(1), "test").unwrap());
        assert_ne!(a, transaction_hash(&tx(2), "test").unwrap());
        assert_ne!(a, transaction_hash(&tx(1), "public").unwrap());
    }

    #[tokio::test]
    async fn test_single_signature() {
        let s = TxSigner::single(signer(KEY_A), "test");
        let signed = s.sign(tx(1)).await.unwrap();
        assert_eq!(signed.signatures.len(), 1);
        assert_eq!(signed.signatures[0].len(), 130);
        assert_eq!(signed.hash.len(), 64);
        assert_eq!(s.source_account(), s.trading_account());
    }

    #[tokio::test]
    async fn test_pair_signs_twice() {
        let s = TxSigner::pair(signer(KEY_A), signer(KEY_B), "test");
        let signed = s.sign(tx(1)).await.unwrap();
        assert_eq!(signed.signatures.len(), 2);
        assert_ne!(signed.signatures[0], signed.signatures[1]);
        assert_ne!(s.source_account(), s.trading_account());
    }

    #[test]
    fn test_load_key_from_env() {
        std::env::set_var("REEF_TEST_SIGNER_KEY", KEY_A);
        let source = KeySource::EnvVar {
            var_name: "REEF_TEST_SIGNER_KEY".to_string(),
        };
        let loaded = load_key(&source).unwrap();
        assert_eq!(loaded.address(), signer(KEY_A).address());

        let missing = KeySource::EnvVar {
            var_name: "REEF_TEST_SIGNER_KEY_MISSING".to_string(),
        };
        assert!(matches!(load_key(&missing), Err(KeyError::EnvVarNotFound(_))));
    }
}
