//! secp256k1 key pair signer and recoverable signatures.

use ethers_core::types::{Address, Signature, U256};
use ethers_core::utils::keccak256;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::public_key_to_address;
use super::transaction::UnsignedTransaction;
use crate::error::{Error, SigningError};

/// An ECDSA signature carrying its recovery id.
///
/// `v` is kept in the Ethereum convention (27/28) for messages and JWTs, and
/// holds the EIP-155 value for transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl RecoverableSignature {
    /// Recovery id (0 or 1) regardless of the `v` convention
    pub fn recovery_id(&self) -> u8 {
        if self.v >= 27 {
            (self.v - 27) % 2
        } else {
            self.v % 2
        }
    }

    /// `r || s || recovery id`, the JOSE layout of `ES256K-R`
    pub fn to_jose_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.recovery_id();
        out
    }

    /// Reads 65 bytes `r || s || v`; `v` may be 0/1 or 27/28
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SigningError> {
        if bytes.len() != 65 {
            return Err(SigningError::Ecdsa(format!(
                "expected 65 signature bytes, got {}",
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, v: bytes[64] })
    }

    pub(crate) fn ecdsa(&self) -> Result<EcdsaSignature, SigningError> {
        EcdsaSignature::from_scalars(self.r, self.s).map_err(|e| SigningError::Ecdsa(e.to_string()))
    }

    /// Public key that produced this signature over `prehash`
    pub fn recover_key(&self, prehash: &[u8]) -> Result<VerifyingKey, SigningError> {
        let recovery_id = RecoveryId::from_byte(self.recovery_id())
            .ok_or_else(|| SigningError::Ecdsa("invalid recovery id".into()))?;
        VerifyingKey::recover_from_prehash(prehash, &self.ecdsa()?, recovery_id)
            .map_err(|e| SigningError::Ecdsa(e.to_string()))
    }

    /// Address that produced this signature over `prehash`
    pub fn recover_address(&self, prehash: &[u8]) -> Result<Address, SigningError> {
        Ok(public_key_to_address(&self.recover_key(prehash)?))
    }
}

/// Signs with a private key held in memory
#[derive(Clone)]
pub struct KeyPairSigner {
    signing_key: SigningKey,
    address: Address,
}

impl std::fmt::Debug for KeyPairSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPairSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl KeyPairSigner {
    /// Builds a signer from a 32 byte private key
    pub fn from_private_key(bytes: &[u8]) -> Result<Self, Error> {
        let signing_key =
            SigningKey::from_slice(bytes).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let address = public_key_to_address(signing_key.verifying_key());
        Ok(Self {
            signing_key,
            address,
        })
    }

    /// Builds a signer from a hex private key, with or without `0x`
    pub fn from_hex(private_key: &str) -> Result<Self, Error> {
        let bytes = hex::decode(private_key.trim_start_matches("0x"))
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Self::from_private_key(&bytes)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn public_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Uncompressed SEC1 public key, hex without `0x`
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key().to_encoded_point(false).as_bytes())
    }

    /// Signs a 32 byte digest; `v` is 27 or 28
    pub fn sign_prehash(&self, prehash: &[u8; 32]) -> Result<RecoverableSignature, Error> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(prehash)
            .map_err(|e| SigningError::Ecdsa(e.to_string()))?;

        let (r_bytes, s_bytes) = signature.split_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&r_bytes);
        s.copy_from_slice(&s_bytes);
        Ok(RecoverableSignature {
            r,
            s,
            v: 27 + recovery_id.to_byte(),
        })
    }

    /// Signs `keccak256(message)`
    pub fn sign_message(&self, message: &[u8]) -> Result<RecoverableSignature, Error> {
        self.sign_prehash(&keccak256(message))
    }

    /// Signs `sha256(data)`, the JOSE `ES256K` digest
    pub fn sign_jwt(&self, data: &[u8]) -> Result<RecoverableSignature, Error> {
        let digest: [u8; 32] = Sha256::digest(data).into();
        self.sign_prehash(&digest)
    }

    /// Signs and RLP encodes a legacy transaction, EIP-155 protected when it
    /// carries a chain id
    pub fn sign_transaction(&self, tx: &UnsignedTransaction) -> Result<Vec<u8>, Error> {
        let request = tx.to_request();
        let sighash = request.sighash();
        let signature = self.sign_prehash(sighash.as_fixed_bytes())?;

        let recovery_id = u64::from(signature.recovery_id());
        let v = match tx.chain_id {
            Some(chain_id) => chain_id
                .checked_mul(2)
                .and_then(|v| v.checked_add(35 + recovery_id))
                .ok_or_else(|| SigningError::Ecdsa(format!("chain id {chain_id} is too large")))?,
            None => recovery_id + 27,
        };
        debug!(from = ?self.address, to = ?tx.to, nonce = %tx.nonce, v, "signed transaction");

        let signed = request.rlp_signed(&Signature {
            r: U256::from_big_endian(&signature.r),
            s: U256::from_big_endian(&signature.s),
            v,
        });
        Ok(signed.to_vec())
    }
}
