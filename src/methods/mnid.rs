//! Multi Network IDentifier codec.
//!
//! An MNID is `base58(version || network id bytes || address || checksum)` where
//! the checksum is the first four bytes of the SHA3-256 of everything before it.

use base58::{FromBase58, ToBase58};
use ethers_core::types::Address;
use sha3::{Digest, Sha3_256};

use crate::config::normalize_network_id;
use crate::error::Error;

const VERSION: u8 = 0x01;
const CHECKSUM_LEN: usize = 4;
const ADDRESS_LEN: usize = 20;

/// A decoded MNID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Normalized hex network id, ex: "0x4"
    pub network: String,
    pub address: Address,
}

impl Account {
    pub fn new(network: &str, address: Address) -> Self {
        Self {
            network: normalize_network_id(network),
            address,
        }
    }

    pub fn to_mnid(&self) -> String {
        encode(&self.network, self.address)
    }
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let hash = Sha3_256::digest(payload);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&hash[..CHECKSUM_LEN]);
    out
}

fn network_bytes(network: &str) -> Vec<u8> {
    let digits = normalize_network_id(network)
        .trim_start_matches("0x")
        .to_string();
    let padded = if digits.len() % 2 == 1 {
        format!("0{digits}")
    } else {
        digits
    };
    // normalize_network_id only yields hex digits
    hex::decode(padded).unwrap_or_default()
}

/// Encodes `address` on `network` (hex network id)
pub fn encode(network: &str, address: Address) -> String {
    let mut payload = vec![VERSION];
    payload.extend_from_slice(&network_bytes(network));
    payload.extend_from_slice(address.as_bytes());
    let check = checksum(&payload);
    payload.extend_from_slice(&check);
    payload.to_base58()
}

/// Decodes and validates an MNID
pub fn decode(mnid: &str) -> Result<Account, Error> {
    let bytes = mnid
        .from_base58()
        .map_err(|e| Error::Parse(format!("`{mnid}` is not base58: {e:?}")))?;

    if bytes.len() < 2 + ADDRESS_LEN + CHECKSUM_LEN || bytes[0] != VERSION {
        return Err(Error::Parse(format!("`{mnid}` is not an MNID")));
    }

    let (payload, check) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    if checksum(payload) != check {
        return Err(Error::Parse(format!("`{mnid}` has a bad checksum")));
    }

    let (network, address) = payload[1..].split_at(payload.len() - 1 - ADDRESS_LEN);
    Ok(Account {
        network: normalize_network_id(&hex::encode(network)),
        address: Address::from_slice(address),
    })
}

pub fn is_mnid(value: &str) -> bool {
    decode(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(hex: &str) -> Address {
        hex.parse().unwrap()
    }

    #[test]
    fn test_encode_known_mnids() {
        let account = address("0x00521965e7bd230323c423d96c657db5b79d099f");
        assert_eq!(encode("0x1", account), "2nQtiQG6Cgm1GYTBaaKAgr76uY7iSexUkqX");
        assert_eq!(encode("0x04", account), "2ocuXMaz4pJPtzkbqeaAeJUvGRdVGm2MJth");
        assert_eq!(
            encode("0x94365e3a", account),
            "5A8bRWU3F7j3REx3vkJWxdjQPp4tqmxFPmab1Tr"
        );
    }

    #[test]
    fn test_decode_known_mnid() {
        let decoded = decode("2ozs2ntCXceKkAQKX4c9xp2zPS8pvkJhVqC").unwrap();
        assert_eq!(decoded.network, "0x4");
        assert_eq!(
            decoded.address,
            address("0xf12c30cd32b4a027710c150ae742f50db0749213")
        );
        assert_eq!(decoded.to_mnid(), "2ozs2ntCXceKkAQKX4c9xp2zPS8pvkJhVqC");
    }

    #[test]
    fn test_is_mnid() {
        assert!(is_mnid("2nQtiQG6Cgm1GYTBaaKAgr76uY7iSexUkqX"));
        assert!(is_mnid("5A8bRWU3F7j3REx3vkJWxdjQPp4tqmxFPmab1Tr"));

        for value in [
            "QmXuNqXmrkxs4WhTDC2GCnXEep4LUD87bu97LQMn1rkxmQ",
            "1GbVUSW5WJmRCpaCJ4hanUny77oDaWW4to",
            "0x00521965e7bd230323c423d96c657db5b79d099f",
            "2nQtiQG6Cgm1GYTBaaKAgr76uY7iSexUkqY",
            "",
        ] {
            assert!(!is_mnid(value), "{value}");
        }
    }
}
