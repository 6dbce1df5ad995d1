//! Gas relay layer: turns a transaction into a signed `relayMetaTx` call so a
//! relay service can pay for it.

use ethers_core::types::{Address, U256};
use tracing::debug;

use super::transaction::UnsignedTransaction;
use super::Signer;
use crate::abi;
use crate::config::{EthNetwork, DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE};
use crate::error::{Error, SigningError};
use crate::transport::JsonRpc;

#[derive(Debug, Clone)]
pub struct RelaySigner {
    pub(super) inner: Box<Signer>,
    relay_address: Address,
    whitelist_owner: Address,
}

impl RelaySigner {
    pub fn new(inner: Signer, relay_address: Address, whitelist_owner: Address) -> Self {
        Self {
            inner: Box::new(inner),
            relay_address,
            whitelist_owner,
        }
    }

    /// Uses the relay contract configured for `network`, without whitelist
    pub fn for_network(inner: Signer, network: &EthNetwork) -> Result<Self, Error> {
        let relay_address = network.tx_relay_address.ok_or_else(|| {
            Error::InvalidArgument(format!("no tx relay configured for {}", network.name))
        })?;
        Ok(Self::new(inner, relay_address, Address::zero()))
    }

    pub fn relay_address(&self) -> Address {
        self.relay_address
    }

    pub fn whitelist_owner(&self) -> Address {
        self.whitelist_owner
    }

    pub fn inner(&self) -> &Signer {
        &self.inner
    }

    /// `0x19 0x00 || relay || whitelist owner || nonce || destination || data`
    pub fn meta_preimage(&self, destination: Address, meta_nonce: U256, data: &[u8]) -> Vec<u8> {
        let mut nonce = [0u8; 32];
        meta_nonce.to_big_endian(&mut nonce);

        let mut preimage = Vec::with_capacity(2 + 20 + 20 + 32 + 20 + data.len());
        preimage.extend_from_slice(&[0x19, 0x00]);
        preimage.extend_from_slice(self.relay_address.as_bytes());
        preimage.extend_from_slice(self.whitelist_owner.as_bytes());
        preimage.extend_from_slice(&nonce);
        preimage.extend_from_slice(destination.as_bytes());
        preimage.extend_from_slice(data);
        preimage
    }

    /// Wraps `tx` into a zero-value call to the relay contract. The meta nonce is
    /// taken from `tx.nonce`.
    pub(super) fn wrap(&self, tx: UnsignedTransaction) -> Result<UnsignedTransaction, Error> {
        let destination = tx.to.ok_or(SigningError::MissingDestination)?;

        let preimage = self.meta_preimage(destination, tx.nonce, &tx.data);
        let signature = self.inner.sign_message(&preimage)?;
        let data = abi::relay_meta_tx(
            signature.v,
            signature.r,
            signature.s,
            destination,
            &tx.data,
            self.whitelist_owner,
        );
        debug!(relay = ?self.relay_address, ?destination, nonce = %tx.nonce, "wrapped meta transaction");

        Ok(UnsignedTransaction {
            nonce: tx.nonce,
            gas_price: tx.gas_price.or(Some(U256::from(DEFAULT_GAS_PRICE))),
            gas_limit: tx.gas_limit.or(Some(U256::from(DEFAULT_GAS_LIMIT))),
            to: Some(self.relay_address),
            value: U256::zero(),
            data,
            chain_id: tx.chain_id,
        })
    }
}

/// Current meta transaction nonce of `signer` at the relay contract
pub async fn resolve_meta_nonce(
    rpc: &dyn JsonRpc,
    relay_address: Address,
    signer: Address,
) -> Result<U256, Error> {
    let result = rpc.eth_call(relay_address, &abi::get_nonce(signer)).await?;
    Ok(abi::decode_uint(&result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Networks;
    use crate::signer::KeyPairSigner;
    use crate::testing::FakeRpc;
    use ethers_core::abi::Token;
    use ethers_core::utils::keccak256;

    fn device() -> Signer {
        Signer::Plain(
            KeyPairSigner::from_hex(
                "4646464646464646464646464646464646464646464646464646464646464646",
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_meta_preimage_layout() {
        let relay = RelaySigner::new(device(), Address::repeat_byte(0xaa), Address::repeat_byte(0xbb));
        let preimage = relay.meta_preimage(Address::repeat_byte(0xcc), U256::from(258), &[0xde, 0xad]);

        assert_eq!(&preimage[..2], &[0x19, 0x00]);
        assert_eq!(&preimage[2..22], Address::repeat_byte(0xaa).as_bytes());
        assert_eq!(&preimage[22..42], Address::repeat_byte(0xbb).as_bytes());
        assert_eq!(&preimage[42..72], &[0u8; 30]);
        assert_eq!(&preimage[72..74], &[0x01, 0x02]);
        assert_eq!(&preimage[74..94], Address::repeat_byte(0xcc).as_bytes());
        assert_eq!(&preimage[94..], &[0xde, 0xad]);
    }

    #[test]
    fn test_wrap_signs_meta_transaction() {
        let relay = RelaySigner::new(device(), Address::repeat_byte(0xaa), Address::zero());
        let tx = UnsignedTransaction {
            nonce: U256::from(2),
            to: Some(Address::repeat_byte(0xcc)),
            value: U256::from(5),
            data: vec![0x01],
            chain_id: Some(4),
            ..Default::default()
        };

        let wrapped = relay.wrap(tx).unwrap();

        assert_eq!(wrapped.to, Some(Address::repeat_byte(0xaa)));
        assert_eq!(wrapped.value, U256::zero());
        assert_eq!(wrapped.nonce, U256::from(2));
        assert_eq!(wrapped.gas_limit, Some(U256::from(DEFAULT_GAS_LIMIT)));

        let tokens = abi::decode_call(abi::RELAY_META_TX, &abi::relay_meta_tx_types(), &wrapped.data).unwrap();
        assert_eq!(tokens[3], Token::Address(Address::repeat_byte(0xcc)));
        assert_eq!(tokens[4], Token::Bytes(vec![0x01]));
        assert_eq!(tokens[5], Token::Address(Address::zero()));

        let signature = crate::signer::RecoverableSignature {
            v: tokens[0].clone().into_uint().unwrap().as_u32() as u8,
            r: tokens[1].clone().into_fixed_bytes().unwrap().try_into().unwrap(),
            s: tokens[2].clone().into_fixed_bytes().unwrap().try_into().unwrap(),
        };
        let preimage = relay.meta_preimage(Address::repeat_byte(0xcc), U256::from(2), &[0x01]);
        assert_eq!(
            signature.recover_address(&keccak256(preimage)).unwrap(),
            device().address()
        );
    }

    #[test]
    fn test_relay_requires_destination() {
        let relay = RelaySigner::new(device(), Address::repeat_byte(0xaa), Address::zero());
        let err = relay.wrap(UnsignedTransaction::default()).unwrap_err();
        assert!(matches!(err, Error::Signing(SigningError::MissingDestination)));
    }

    #[test]
    fn test_for_network() {
        let networks = Networks::default();
        let relay = RelaySigner::for_network(device(), networks.rinkeby().unwrap()).unwrap();
        assert_eq!(relay.relay_address(), networks.rinkeby().unwrap().tx_relay_address.unwrap());

        let mut local = networks.rinkeby().unwrap().clone();
        local.tx_relay_address = None;
        assert!(matches!(
            RelaySigner::for_network(device(), &local),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_meta_nonce() {
        let rpc = FakeRpc::default();
        let relay = Address::repeat_byte(0xaa);
        let signer = device().address();
        rpc.on_call(relay, abi::get_nonce(signer), ethers_core::abi::encode(&[Token::Uint(U256::from(7))]));

        assert_eq!(resolve_meta_nonce(&rpc, relay, signer).await.unwrap(), U256::from(7));
    }
}
