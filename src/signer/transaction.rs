//! Legacy Ethereum transactions as seen by the signer chain.

use ethers_core::types::{Address, TransactionRequest, U256};
use ethers_core::utils::rlp::{DecoderError, Rlp};

use super::key::RecoverableSignature;
use crate::error::{Error, SigningError};

/// A transaction before signing; relay and proxy layers only touch `to`,
/// `value` and `data`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub nonce: U256,
    pub gas_price: Option<U256>,
    pub gas_limit: Option<U256>,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    /// EIP-155 chain id
    pub chain_id: Option<u64>,
}

impl UnsignedTransaction {
    pub fn to_request(&self) -> TransactionRequest {
        let mut request = TransactionRequest::new()
            .nonce(self.nonce)
            .value(self.value)
            .data(self.data.clone());
        if let Some(to) = self.to {
            request = request.to(to);
        }
        if let Some(gas_price) = self.gas_price {
            request = request.gas_price(gas_price);
        }
        if let Some(gas_limit) = self.gas_limit {
            request = request.gas(gas_limit);
        }
        if let Some(chain_id) = self.chain_id {
            request = request.chain_id(chain_id);
        }
        request
    }
}

/// Decodes a signed legacy transaction and recovers its sender
pub fn decode_signed_transaction(raw: &[u8]) -> Result<(UnsignedTransaction, Address), Error> {
    let (tx, signature) = decode_legacy(raw)
        .map_err(|e| SigningError::Ecdsa(format!("malformed transaction: {e}")))?;
    let sighash = tx.to_request().sighash();
    let from = signature.recover_address(sighash.as_bytes())?;
    Ok((tx, from))
}

fn decode_legacy(raw: &[u8]) -> Result<(UnsignedTransaction, RecoverableSignature), DecoderError> {
    let rlp = Rlp::new(raw);
    if rlp.item_count()? != 9 {
        return Err(DecoderError::RlpIncorrectListLen);
    }

    let to_item = rlp.at(3)?;
    let to = if to_item.is_empty() {
        None
    } else {
        Some(to_item.as_val::<Address>()?)
    };
    let v: u64 = rlp.val_at(6)?;
    let r: U256 = rlp.val_at(7)?;
    let s: U256 = rlp.val_at(8)?;

    let chain_id = (v >= 35).then(|| (v - 35) / 2);
    let tx = UnsignedTransaction {
        nonce: rlp.val_at(0)?,
        gas_price: Some(rlp.val_at(1)?),
        gas_limit: Some(rlp.val_at(2)?),
        to,
        value: rlp.val_at(4)?,
        data: rlp.val_at(5)?,
        chain_id,
    };

    let mut signature = RecoverableSignature {
        r: [0u8; 32],
        s: [0u8; 32],
        v: match chain_id {
            Some(chain_id) => (v - 35 - chain_id * 2) as u8,
            None => v.saturating_sub(27) as u8,
        },
    };
    r.to_big_endian(&mut signature.r);
    s.to_big_endian(&mut signature.s);

    Ok((tx, signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::KeyPairSigner;

    #[test]
    fn test_decode_recovers_sender_and_fields() {
        let signer = KeyPairSigner::from_hex(
            "4646464646464646464646464646464646464646464646464646464646464646",
        )
        .unwrap();
        let tx = UnsignedTransaction {
            nonce: U256::from(3),
            gas_price: Some(U256::from(1_000_000_000u64)),
            gas_limit: Some(U256::from(70_000)),
            to: Some(Address::repeat_byte(0x22)),
            value: U256::zero(),
            data: vec![0xab, 0xcd],
            chain_id: Some(4),
        };

        let raw = signer.sign_transaction(&tx).unwrap();
        let (decoded, from) = decode_signed_transaction(&raw).unwrap();

        assert_eq!(decoded, tx);
        assert_eq!(from, signer.address());
    }

    #[test]
    fn test_contract_creation_without_chain_id() {
        let signer = KeyPairSigner::from_hex(
            "4646464646464646464646464646464646464646464646464646464646464646",
        )
        .unwrap();
        let tx = UnsignedTransaction {
            gas_price: Some(U256::one()),
            gas_limit: Some(U256::from(100_000)),
            data: vec![0x60, 0x80],
            ..Default::default()
        };

        let (decoded, from) = decode_signed_transaction(&signer.sign_transaction(&tx).unwrap()).unwrap();
        assert_eq!(decoded.to, None);
        assert_eq!(decoded.chain_id, None);
        assert_eq!(from, signer.address());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(decode_signed_transaction(&[0xc0]).is_err());
        assert!(decode_signed_transaction(b"not rlp").is_err());
    }
}
