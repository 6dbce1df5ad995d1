//! Identity proxy layer: routes a transaction through the identity manager's
//! `forwardTo` so it executes from the proxy contract.

use ethers_core::types::{Address, U256};
use tracing::debug;

use super::transaction::UnsignedTransaction;
use super::Signer;
use crate::abi;
use crate::error::{Error, SigningError};

#[derive(Debug, Clone)]
pub struct ProxySigner {
    pub(super) inner: Box<Signer>,
    proxy_address: Address,
    identity_manager: Address,
}

impl ProxySigner {
    pub fn new(inner: Signer, proxy_address: Address, identity_manager: Address) -> Self {
        Self {
            inner: Box::new(inner),
            proxy_address,
            identity_manager,
        }
    }

    pub fn proxy_address(&self) -> Address {
        self.proxy_address
    }

    pub fn identity_manager(&self) -> Address {
        self.identity_manager
    }

    pub fn inner(&self) -> &Signer {
        &self.inner
    }

    /// Rewrites `tx` into `forwardTo(device, proxy, to, value, data)` sent to the
    /// identity manager with zero value
    pub(super) fn wrap(&self, tx: UnsignedTransaction) -> Result<UnsignedTransaction, Error> {
        let destination = tx.to.ok_or(SigningError::MissingDestination)?;
        let device = self.inner.address();

        let data = abi::forward_to(device, self.proxy_address, destination, tx.value, &tx.data);
        debug!(proxy = ?self.proxy_address, ?destination, "forwarding through identity manager");

        Ok(UnsignedTransaction {
            to: Some(self.identity_manager),
            value: U256::zero(),
            data,
            ..tx
        })
    }
}
