//! Contract call encodings and registry event decoding.
//!
//! Covers the ERC-1056 registry (`identityOwner`, `changed`, mutations and its
//! three change events), the legacy `uport` registry `get`, the meta transaction
//! relay (`relayMetaTx`, `getNonce`) and the identity manager `forwardTo`.

use ethers_core::abi::{self, ParamType, Token};
use ethers_core::types::{Address, Log, H256, U256};
use ethers_core::utils::{id, keccak256};

use crate::error::{Error, TransportError};

pub const DID_OWNER_CHANGED: &str = "DIDOwnerChanged(address,address,uint256)";
pub const DID_DELEGATE_CHANGED: &str = "DIDDelegateChanged(address,bytes32,address,uint256,uint256)";
pub const DID_ATTRIBUTE_CHANGED: &str = "DIDAttributeChanged(address,bytes32,bytes,uint256,uint256)";

/// Selector followed by the ABI encoded arguments
pub fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut data = id(signature).to_vec();
    data.extend_from_slice(&abi::encode(tokens));
    data
}

/// Decodes call return data or call arguments (without selector)
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, TransportError> {
    abi::decode(types, data).map_err(|e| TransportError::Abi(e.to_string()))
}

/// Decodes arguments of a call to `signature`, checking the selector
pub fn decode_call(
    signature: &str,
    types: &[ParamType],
    data: &[u8],
) -> Result<Vec<Token>, TransportError> {
    match data.split_first_chunk::<4>() {
        Some((selector, args)) if *selector == id(signature) => decode(types, args),
        _ => Err(TransportError::Abi(format!("not a call to {signature}"))),
    }
}

/// Right pads a string into a `bytes32`. Strings longer than 32 bytes are
/// rejected.
pub fn string_to_bytes32(value: &str) -> Result<[u8; 32], Error> {
    let bytes = value.as_bytes();
    if bytes.len() > 32 {
        return Err(Error::InvalidArgument(format!(
            "`{value}` is {} bytes, a bytes32 holds 32",
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(out)
}

fn bytes32_token(value: &str) -> Result<Token, Error> {
    Ok(Token::FixedBytes(string_to_bytes32(value)?.to_vec()))
}

/// Reads a right padded `bytes32` string
pub fn bytes32_to_string(value: &[u8]) -> String {
    let end = value.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&value[..end]).into_owned()
}

/// An address left padded into a topic
pub fn address_topic(address: Address) -> H256 {
    H256::from(address)
}

pub fn identity_owner(identity: Address) -> Vec<u8> {
    encode_call("identityOwner(address)", &[Token::Address(identity)])
}

pub fn changed(identity: Address) -> Vec<u8> {
    encode_call("changed(address)", &[Token::Address(identity)])
}

pub fn change_owner(identity: Address, new_owner: Address) -> Vec<u8> {
    encode_call(
        "changeOwner(address,address)",
        &[Token::Address(identity), Token::Address(new_owner)],
    )
}

pub const ADD_DELEGATE: &str = "addDelegate(address,bytes32,address,uint256)";

pub fn add_delegate(
    identity: Address,
    delegate_type: &str,
    delegate: Address,
    validity: u64,
) -> Result<Vec<u8>, Error> {
    Ok(encode_call(
        ADD_DELEGATE,
        &[
            Token::Address(identity),
            bytes32_token(delegate_type)?,
            Token::Address(delegate),
            Token::Uint(U256::from(validity)),
        ],
    ))
}

pub fn add_delegate_types() -> Vec<ParamType> {
    vec![
        ParamType::Address,
        ParamType::FixedBytes(32),
        ParamType::Address,
        ParamType::Uint(256),
    ]
}

pub fn revoke_delegate(identity: Address, delegate_type: &str, delegate: Address) -> Result<Vec<u8>, Error> {
    Ok(encode_call(
        "revokeDelegate(address,bytes32,address)",
        &[
            Token::Address(identity),
            bytes32_token(delegate_type)?,
            Token::Address(delegate),
        ],
    ))
}

pub fn set_attribute(identity: Address, name: &str, value: &[u8], validity: u64) -> Result<Vec<u8>, Error> {
    Ok(encode_call(
        "setAttribute(address,bytes32,bytes,uint256)",
        &[
            Token::Address(identity),
            bytes32_token(name)?,
            Token::Bytes(value.to_vec()),
            Token::Uint(U256::from(validity)),
        ],
    ))
}

/// Legacy registry lookup `get(bytes32,address,address)`
pub fn registry_get(label: &str, issuer: Address, subject: Address) -> Result<Vec<u8>, Error> {
    Ok(encode_call(
        "get(bytes32,address,address)",
        &[
            bytes32_token(label)?,
            Token::Address(issuer),
            Token::Address(subject),
        ],
    ))
}

pub fn get_nonce(signer: Address) -> Vec<u8> {
    encode_call("getNonce(address)", &[Token::Address(signer)])
}

pub const RELAY_META_TX: &str = "relayMetaTx(uint8,bytes32,bytes32,address,bytes,address)";

pub fn relay_meta_tx(
    v: u8,
    r: [u8; 32],
    s: [u8; 32],
    destination: Address,
    data: &[u8],
    whitelist_owner: Address,
) -> Vec<u8> {
    encode_call(
        RELAY_META_TX,
        &[
            Token::Uint(U256::from(v)),
            Token::FixedBytes(r.to_vec()),
            Token::FixedBytes(s.to_vec()),
            Token::Address(destination),
            Token::Bytes(data.to_vec()),
            Token::Address(whitelist_owner),
        ],
    )
}

pub fn relay_meta_tx_types() -> Vec<ParamType> {
    vec![
        ParamType::Uint(8),
        ParamType::FixedBytes(32),
        ParamType::FixedBytes(32),
        ParamType::Address,
        ParamType::Bytes,
        ParamType::Address,
    ]
}

pub const FORWARD_TO: &str = "forwardTo(address,address,address,uint256,bytes)";

pub fn forward_to(
    sender: Address,
    identity: Address,
    destination: Address,
    value: U256,
    data: &[u8],
) -> Vec<u8> {
    encode_call(
        FORWARD_TO,
        &[
            Token::Address(sender),
            Token::Address(identity),
            Token::Address(destination),
            Token::Uint(value),
            Token::Bytes(data.to_vec()),
        ],
    )
}

pub fn forward_to_types() -> Vec<ParamType> {
    vec![
        ParamType::Address,
        ParamType::Address,
        ParamType::Address,
        ParamType::Uint(256),
        ParamType::Bytes,
    ]
}

pub fn decode_address(data: &[u8]) -> Result<Address, TransportError> {
    decode(&[ParamType::Address], data)?
        .pop()
        .and_then(Token::into_address)
        .ok_or_else(|| TransportError::Abi("expected an address".into()))
}

pub fn decode_uint(data: &[u8]) -> Result<U256, TransportError> {
    decode(&[ParamType::Uint(256)], data)?
        .pop()
        .and_then(Token::into_uint)
        .ok_or_else(|| TransportError::Abi("expected a uint256".into()))
}

pub fn decode_bytes32(data: &[u8]) -> Result<[u8; 32], TransportError> {
    let bytes = decode(&[ParamType::FixedBytes(32)], data)?
        .pop()
        .and_then(Token::into_fixed_bytes)
        .ok_or_else(|| TransportError::Abi("expected a bytes32".into()))?;
    bytes
        .try_into()
        .map_err(|_| TransportError::Abi("bytes32 of wrong length".into()))
}

/// One ERC-1056 change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    OwnerChanged {
        owner: Address,
        previous_change: U256,
    },
    DelegateChanged {
        delegate_type: String,
        delegate: Address,
        valid_to: U256,
        previous_change: U256,
    },
    AttributeChanged {
        name: String,
        value: Vec<u8>,
        valid_to: U256,
        previous_change: U256,
    },
}

impl RegistryEvent {
    /// Block of the change preceding this one, zero for the first change
    pub fn previous_change(&self) -> U256 {
        match self {
            RegistryEvent::OwnerChanged { previous_change, .. }
            | RegistryEvent::DelegateChanged { previous_change, .. }
            | RegistryEvent::AttributeChanged { previous_change, .. } => *previous_change,
        }
    }

    /// Decodes a registry log; logs of other events yield `Ok(None)`
    pub fn from_log(log: &Log) -> Result<Option<Self>, TransportError> {
        let Some(topic) = log.topics.first() else {
            return Ok(None);
        };
        let data = log.data.as_ref();

        if *topic == H256::from(keccak256(DID_OWNER_CHANGED)) {
            let mut tokens = decode(&[ParamType::Address, ParamType::Uint(256)], data)?.into_iter();
            return Ok(Some(RegistryEvent::OwnerChanged {
                owner: next_address(&mut tokens)?,
                previous_change: next_uint(&mut tokens)?,
            }));
        }

        if *topic == H256::from(keccak256(DID_DELEGATE_CHANGED)) {
            let types = [
                ParamType::FixedBytes(32),
                ParamType::Address,
                ParamType::Uint(256),
                ParamType::Uint(256),
            ];
            let mut tokens = decode(&types, data)?.into_iter();
            return Ok(Some(RegistryEvent::DelegateChanged {
                delegate_type: bytes32_to_string(&next_fixed_bytes(&mut tokens)?),
                delegate: next_address(&mut tokens)?,
                valid_to: next_uint(&mut tokens)?,
                previous_change: next_uint(&mut tokens)?,
            }));
        }

        if *topic == H256::from(keccak256(DID_ATTRIBUTE_CHANGED)) {
            let types = [
                ParamType::FixedBytes(32),
                ParamType::Bytes,
                ParamType::Uint(256),
                ParamType::Uint(256),
            ];
            let mut tokens = decode(&types, data)?.into_iter();
            return Ok(Some(RegistryEvent::AttributeChanged {
                name: bytes32_to_string(&next_fixed_bytes(&mut tokens)?),
                value: next_bytes(&mut tokens)?,
                valid_to: next_uint(&mut tokens)?,
                previous_change: next_uint(&mut tokens)?,
            }));
        }

        Ok(None)
    }

    /// Encodes the event as the registry would log it for `identity`
    pub fn to_log(&self, registry: Address, identity: Address, block: u64) -> Result<Log, Error> {
        let (signature, data) = match self {
            RegistryEvent::OwnerChanged {
                owner,
                previous_change,
            } => (
                DID_OWNER_CHANGED,
                abi::encode(&[Token::Address(*owner), Token::Uint(*previous_change)]),
            ),
            RegistryEvent::DelegateChanged {
                delegate_type,
                delegate,
                valid_to,
                previous_change,
            } => (
                DID_DELEGATE_CHANGED,
                abi::encode(&[
                    bytes32_token(delegate_type)?,
                    Token::Address(*delegate),
                    Token::Uint(*valid_to),
                    Token::Uint(*previous_change),
                ]),
            ),
            RegistryEvent::AttributeChanged {
                name,
                value,
                valid_to,
                previous_change,
            } => (
                DID_ATTRIBUTE_CHANGED,
                abi::encode(&[
                    bytes32_token(name)?,
                    Token::Bytes(value.clone()),
                    Token::Uint(*valid_to),
                    Token::Uint(*previous_change),
                ]),
            ),
        };

        Ok(Log {
            address: registry,
            topics: vec![H256::from(keccak256(signature)), address_topic(identity)],
            data: data.into(),
            block_number: Some(block.into()),
            ..Default::default()
        })
    }
}

fn next_address(tokens: &mut impl Iterator<Item = Token>) -> Result<Address, TransportError> {
    tokens
        .next()
        .and_then(Token::into_address)
        .ok_or_else(|| TransportError::Abi("expected an address".into()))
}

fn next_uint(tokens: &mut impl Iterator<Item = Token>) -> Result<U256, TransportError> {
    tokens
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| TransportError::Abi("expected a uint".into()))
}

fn next_fixed_bytes(tokens: &mut impl Iterator<Item = Token>) -> Result<Vec<u8>, TransportError> {
    tokens
        .next()
        .and_then(Token::into_fixed_bytes)
        .ok_or_else(|| TransportError::Abi("expected fixed bytes".into()))
}

fn next_bytes(tokens: &mut impl Iterator<Item = Token>) -> Result<Vec<u8>, TransportError> {
    tokens
        .next()
        .and_then(Token::into_bytes)
        .ok_or_else(|| TransportError::Abi("expected bytes".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors() {
        assert_eq!(hex::encode(&identity_owner(Address::zero())[..4]), "8733d4e8");
        assert_eq!(hex::encode(&changed(Address::zero())[..4]), "f96d0f9f");
        assert_eq!(identity_owner(Address::zero()).len(), 4 + 32);
    }

    #[test]
    fn test_bytes32_strings() {
        let label = string_to_bytes32("uPortProfileIPFS1220").unwrap();
        assert_eq!(&label[..20], b"uPortProfileIPFS1220");
        assert!(label[20..].iter().all(|b| *b == 0));
        assert_eq!(bytes32_to_string(&label), "uPortProfileIPFS1220");
        assert_eq!(bytes32_to_string(&[0u8; 32]), "");

        let full = "x".repeat(32);
        assert_eq!(bytes32_to_string(&string_to_bytes32(&full).unwrap()), full);
    }

    #[test]
    fn test_oversized_bytes32_is_rejected() {
        let name = "Secp256k1SignatureAuthentication2018";
        assert!(matches!(string_to_bytes32(name), Err(Error::InvalidArgument(_))));
        assert!(add_delegate(Address::zero(), name, Address::zero(), 1).is_err());
        assert!(set_attribute(Address::zero(), &format!("did/svc/{}", "A".repeat(30)), b"", 1).is_err());
    }

    #[test]
    fn test_address_topic_is_left_padded() {
        let address: Address = "0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f".parse().unwrap();
        let topic = address_topic(address);
        assert!(topic.as_bytes()[..12].iter().all(|b| *b == 0));
        assert_eq!(&topic.as_bytes()[12..], address.as_bytes());
    }

    #[test]
    fn test_registry_event_log_decoding() {
        let registry = Address::repeat_byte(0xaa);
        let identity = Address::repeat_byte(0x01);
        let events = [
            RegistryEvent::OwnerChanged {
                owner: Address::repeat_byte(0x02),
                previous_change: U256::zero(),
            },
            RegistryEvent::DelegateChanged {
                delegate_type: "veriKey".into(),
                delegate: Address::repeat_byte(0x03),
                valid_to: U256::from(2_000_000_000u64),
                previous_change: U256::from(10),
            },
            RegistryEvent::AttributeChanged {
                name: "did/svc/HubService".into(),
                value: b"https://hub.example.com".to_vec(),
                valid_to: U256::MAX,
                previous_change: U256::from(11),
            },
        ];

        for event in events {
            let log = event.to_log(registry, identity, 12).unwrap();
            assert_eq!(RegistryEvent::from_log(&log).unwrap(), Some(event));
        }
    }

    #[test]
    fn test_unrelated_log_is_skipped() {
        let log = Log {
            topics: vec![H256::repeat_byte(0x42)],
            ..Default::default()
        };
        assert_eq!(RegistryEvent::from_log(&log).unwrap(), None);
        assert_eq!(RegistryEvent::from_log(&Log::default()).unwrap(), None);
    }

    #[test]
    fn test_decode_call_checks_selector() {
        let data = forward_to(
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            Address::repeat_byte(3),
            U256::from(7),
            &[0xca, 0xfe],
        );
        let tokens = decode_call(FORWARD_TO, &forward_to_types(), &data).unwrap();
        assert_eq!(tokens[2], Token::Address(Address::repeat_byte(3)));
        assert_eq!(tokens[4], Token::Bytes(vec![0xca, 0xfe]));

        assert!(decode_call(RELAY_META_TX, &relay_meta_tx_types(), &data).is_err());
    }
}
