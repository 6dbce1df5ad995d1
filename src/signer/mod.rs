//! Composable signing.
//!
//! A [`Signer`] is a key pair optionally wrapped in relay and proxy layers. Every
//! layer reports the innermost key's address and signs messages with it; only
//! transactions are rewritten, outermost layer first, before the key signs the
//! final result:
//!
//! ```no_run
//! use did_jwt_core::signer::{KeyPairSigner, Signer, UnsignedTransaction};
//! use ethers_core::types::Address;
//!
//! # fn main() -> Result<(), did_jwt_core::Error> {
//! let device = KeyPairSigner::from_hex("4646464646464646464646464646464646464646464646464646464646464646")?;
//! let signer = Signer::from(device)
//!     .relayed(Address::repeat_byte(0x33), Address::zero())
//!     .proxied(Address::repeat_byte(0x11), Address::repeat_byte(0x22));
//!
//! let _raw = signer.sign_raw_tx(UnsignedTransaction {
//!     to: Some(Address::repeat_byte(0x44)),
//!     ..Default::default()
//! })?;
//! # Ok(())
//! # }
//! ```

mod key;
mod proxy;
mod relay;
mod transaction;

pub use key::{KeyPairSigner, RecoverableSignature};
pub use proxy::ProxySigner;
pub use relay::{resolve_meta_nonce, RelaySigner};
pub use transaction::{decode_signed_transaction, UnsignedTransaction};

use ethers_core::types::Address;
use ethers_core::utils::keccak256;
use k256::ecdsa::VerifyingKey;
use tracing::instrument;

use crate::error::Error;

/// Ethereum address of a secp256k1 public key
pub fn public_key_to_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

#[derive(Debug, Clone)]
pub enum Signer {
    Plain(KeyPairSigner),
    Relay(RelaySigner),
    Proxy(ProxySigner),
}

impl From<KeyPairSigner> for Signer {
    fn from(key: KeyPairSigner) -> Self {
        Signer::Plain(key)
    }
}

impl Signer {
    /// Wraps `self` in a gas relay layer
    pub fn relayed(self, relay_address: Address, whitelist_owner: Address) -> Self {
        Signer::Relay(RelaySigner::new(self, relay_address, whitelist_owner))
    }

    /// Wraps `self` in an identity proxy layer
    pub fn proxied(self, proxy_address: Address, identity_manager: Address) -> Self {
        Signer::Proxy(ProxySigner::new(self, proxy_address, identity_manager))
    }

    /// The key pair at the bottom of the chain
    pub fn key(&self) -> &KeyPairSigner {
        match self {
            Signer::Plain(key) => key,
            Signer::Relay(relay) => relay.inner.key(),
            Signer::Proxy(proxy) => proxy.inner.key(),
        }
    }

    pub fn address(&self) -> Address {
        self.key().address()
    }

    /// Signs `keccak256(message)` with the innermost key
    pub fn sign_message(&self, message: &[u8]) -> Result<RecoverableSignature, Error> {
        self.key().sign_message(message)
    }

    /// Signs `sha256(data)` with the innermost key
    pub fn sign_jwt(&self, data: &[u8]) -> Result<RecoverableSignature, Error> {
        self.key().sign_jwt(data)
    }

    /// Applies each layer's rewrite, outermost first
    pub fn rewrite_transaction(&self, tx: UnsignedTransaction) -> Result<UnsignedTransaction, Error> {
        match self {
            Signer::Plain(_) => Ok(tx),
            Signer::Relay(relay) => relay.inner.rewrite_transaction(relay.wrap(tx)?),
            Signer::Proxy(proxy) => proxy.inner.rewrite_transaction(proxy.wrap(tx)?),
        }
    }

    /// Rewrites `tx` through the chain and signs the result with the innermost
    /// key; returns the RLP encoded signed transaction
    #[instrument(skip_all, fields(signer = ?self.address()))]
    pub fn sign_raw_tx(&self, tx: UnsignedTransaction) -> Result<Vec<u8>, Error> {
        let tx = self.rewrite_transaction(tx)?;
        self.key().sign_transaction(&tx)
    }
}
