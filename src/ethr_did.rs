//! Write side of `did:ethr`: owner, delegate and attribute changes on the
//! ERC-1056 registry, signed with a [`Signer`] chain.

use std::sync::Arc;

use ethers_core::types::{Address, H256, U256};
use tracing::{debug, instrument};

use crate::abi;
use crate::config::DEFAULT_REGISTRY_GAS_LIMIT;
use crate::error::Error;
use crate::methods::ethr::{SIG_AUTH, VERI_KEY};
use crate::signer::{Signer, UnsignedTransaction};
use crate::transport::JsonRpc;
use crate::types::KeyType;

/// Delegate registration parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegateOptions {
    pub delegate_type: KeyType,
    /// Validity in seconds
    pub expires_in: u64,
}

impl Default for DelegateOptions {
    fn default() -> Self {
        Self {
            delegate_type: KeyType::Secp256k1VerificationKey2018,
            expires_in: 86_400,
        }
    }
}

/// Name a delegate type is registered under. The two secp256k1 types use
/// their short aliases since their full names do not fit a `bytes32`.
fn registry_delegate_type(delegate_type: &KeyType) -> &str {
    match delegate_type {
        KeyType::Secp256k1VerificationKey2018 => VERI_KEY,
        KeyType::Secp256k1SignatureAuthentication2018 => SIG_AUTH,
        other => other.as_str(),
    }
}

/// Registry controller of one identity
pub struct EthrDid {
    identity: Address,
    rpc: Arc<dyn JsonRpc>,
    registry: Address,
    signer: Signer,
    chain_id: Option<u64>,
}

impl EthrDid {
    pub fn new(identity: Address, rpc: Arc<dyn JsonRpc>, registry: Address, signer: Signer) -> Self {
        Self {
            identity,
            rpc,
            registry,
            signer,
            chain_id: None,
        }
    }

    /// Signs registry transactions with EIP-155 replay protection for `chain_id`
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn did(&self) -> String {
        format!("did:ethr:{:?}", self.identity)
    }

    pub async fn lookup_owner(&self) -> Result<Address, Error> {
        let result = self
            .rpc
            .eth_call(self.registry, &abi::identity_owner(self.identity))
            .await?;
        Ok(abi::decode_address(&result)?)
    }

    pub async fn change_owner(&self, new_owner: Address) -> Result<H256, Error> {
        let owner = self.lookup_owner().await?;
        self.sign_and_send(owner, abi::change_owner(self.identity, new_owner))
            .await
    }

    pub async fn add_delegate(&self, delegate: Address, options: DelegateOptions) -> Result<H256, Error> {
        let call = abi::add_delegate(
            self.identity,
            registry_delegate_type(&options.delegate_type),
            delegate,
            options.expires_in,
        )?;
        let owner = self.lookup_owner().await?;
        self.sign_and_send(owner, call).await
    }

    pub async fn revoke_delegate(&self, delegate: Address, delegate_type: KeyType) -> Result<H256, Error> {
        let call = abi::revoke_delegate(self.identity, registry_delegate_type(&delegate_type), delegate)?;
        let owner = self.lookup_owner().await?;
        self.sign_and_send(owner, call).await
    }

    /// Fails with [`Error::InvalidArgument`] when `key` is longer than 32 bytes
    pub async fn set_attribute(&self, key: &str, value: &[u8], expires_in: u64) -> Result<H256, Error> {
        let call = abi::set_attribute(self.identity, key, value, expires_in)?;
        let owner = self.lookup_owner().await?;
        self.sign_and_send(owner, call).await
    }

    #[instrument(skip(self, data), fields(identity = ?self.identity))]
    async fn sign_and_send(&self, owner: Address, data: Vec<u8>) -> Result<H256, Error> {
        let (nonce, gas_price) = tokio::try_join!(
            self.rpc.get_transaction_count(owner),
            self.rpc.get_gas_price()
        )?;

        let tx = UnsignedTransaction {
            nonce,
            gas_price: Some(gas_price),
            gas_limit: Some(U256::from(DEFAULT_REGISTRY_GAS_LIMIT)),
            to: Some(self.registry),
            value: U256::zero(),
            data,
            chain_id: self.chain_id,
        };
        let raw = self.signer.sign_raw_tx(tx)?;

        let hash = self.rpc.send_raw_transaction(&raw).await?;
        debug!(?hash, "registry transaction sent");
        Ok(hash)
    }
}
