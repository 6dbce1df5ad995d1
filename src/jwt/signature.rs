//! JOSE encoding of secp256k1 signatures and key matching.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::VerifyingKey;

use super::model::Algorithm;
use crate::error::VerificationError;
use crate::signer::RecoverableSignature;
use crate::types::PublicKeyEntry;

pub(crate) fn base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn from_base64url(segment: &str) -> Result<Vec<u8>, VerificationError> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| VerificationError::MalformedSegment(e.to_string()))
}

/// Raw signature segment for `algorithm`
pub fn encode(signature: &RecoverableSignature, algorithm: Algorithm) -> String {
    let bytes = signature.to_jose_bytes();
    base64url(&bytes[..algorithm.signature_len()])
}

/// Parses raw signature bytes.
///
/// `ES256K` carries no recovery id; the returned signature holds recovery id 0
/// and callers try both.
pub fn decode(bytes: &[u8], algorithm: Algorithm) -> Result<RecoverableSignature, VerificationError> {
    let parsed = match (algorithm, bytes.len()) {
        (Algorithm::Es256kR, 65) => RecoverableSignature::from_bytes(bytes),
        (Algorithm::Es256k, 64 | 65) => {
            let mut padded = [0u8; 65];
            padded[..64].copy_from_slice(&bytes[..64]);
            RecoverableSignature::from_bytes(&padded)
        }
        (_, len) => {
            return Err(VerificationError::InvalidSignature(format!(
                "{algorithm} signature must be {} bytes, got {len}",
                algorithm.signature_len()
            )))
        }
    };
    parsed.map_err(|e| VerificationError::InvalidSignature(e.to_string()))
}

/// Whether `key` produced `signature` over `digest`.
///
/// `publicKeyHex` keys are verified directly; `ethereumAddress` keys are
/// matched by recovering with both recovery ids.
pub fn verifies_with(key: &PublicKeyEntry, digest: &[u8], signature: &RecoverableSignature) -> bool {
    if let Some(bytes) = key.public_key_hex_bytes() {
        let (Ok(verifying_key), Ok(ecdsa)) =
            (VerifyingKey::from_sec1_bytes(&bytes), signature.ecdsa())
        else {
            return false;
        };
        return verifying_key.verify_prehash(digest, &ecdsa).is_ok();
    }

    let Some(address) = key.ethereum_address() else {
        return false;
    };
    [0u8, 1].into_iter().any(|recovery_id| {
        let candidate = RecoverableSignature {
            v: recovery_id,
            ..*signature
        };
        candidate.recover_address(digest).ok() == Some(address)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::KeyPairSigner;
    use crate::types::KeyMaterial;
    use sha2::{Digest, Sha256};

    fn key() -> KeyPairSigner {
        KeyPairSigner::from_hex("4646464646464646464646464646464646464646464646464646464646464646")
            .unwrap()
    }

    fn entry(material: KeyMaterial) -> PublicKeyEntry {
        PublicKeyEntry {
            id: "did:ethr:0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f#owner".into(),
            key_type: crate::types::KeyType::Secp256k1VerificationKey2018,
            owner: "did:ethr:0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f".into(),
            material,
        }
    }

    #[test]
    fn test_segment_lengths() {
        let signature = key().sign_jwt(b"header.payload").unwrap();

        let recoverable = from_base64url(&encode(&signature, Algorithm::Es256kR)).unwrap();
        assert_eq!(recoverable.len(), 65);
        assert!(recoverable[64] <= 1);

        let plain = from_base64url(&encode(&signature, Algorithm::Es256k)).unwrap();
        assert_eq!(plain, recoverable[..64]);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert!(matches!(
            decode(&[1u8; 64], Algorithm::Es256kR),
            Err(VerificationError::InvalidSignature(_))
        ));
        assert!(matches!(
            decode(&[1u8; 10], Algorithm::Es256k),
            Err(VerificationError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_verifies_with_hex_and_address_keys() {
        let signer = key();
        let signature = signer.sign_jwt(b"header.payload").unwrap();
        let digest = Sha256::digest(b"header.payload");
        let plain = decode(&signature.to_jose_bytes()[..64], Algorithm::Es256k).unwrap();

        let by_hex = entry(KeyMaterial::PublicKeyHex(signer.public_key_hex()));
        let by_address = entry(KeyMaterial::EthereumAddress(format!("{:?}", signer.address())));
        let stranger = entry(KeyMaterial::EthereumAddress(
            "0x3c7d65d6daf5df62378874d35fa3626100af9d85".into(),
        ));

        assert!(verifies_with(&by_hex, &digest, &plain));
        assert!(verifies_with(&by_address, &digest, &plain));
        assert!(!verifies_with(&stranger, &digest, &plain));

        let other_digest = Sha256::digest(b"header.tampered");
        assert!(!verifies_with(&by_hex, &other_digest, &plain));
    }
}
