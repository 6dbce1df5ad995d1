//! `did:ethr` resolver backed by the ERC-1056 registry.
//!
//! The document is rebuilt on every call: the current owner comes from
//! `identityOwner`, then the registry change log is replayed starting at
//! `changed(identity)` and following each event's `previousChange` pointer back to
//! the first change. Events are applied oldest first, so later delegate and
//! attribute changes override or revoke earlier ones.

use std::collections::{BTreeMap, BinaryHeap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use base58::ToBase58;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ethers_core::types::{Address, U256};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::abi::{self, RegistryEvent};
use crate::config::{EthNetwork, DEFAULT_ETHR_DID_REGISTRY};
use crate::error::Error;
use crate::resolver::DidResolver;
use crate::time::{SystemTimeProvider, TimeProvider};
use crate::transport::{HttpClient, HttpJsonRpc, JsonRpc, LogFilter};
use crate::types::{
    AuthenticationEntry, DidDocument, KeyMaterial, KeyType, PublicKeyEntry, ServiceEntry,
};

pub const VERI_KEY: &str = "veriKey";
pub const SIG_AUTH: &str = "sigAuth";

/// Normalizes `0x<address>` or `did:ethr:0x<address>[suffix]` to
/// `did:ethr:0x<lowercase address>`; anything else yields an empty string.
pub fn normalize_did(did: &str) -> String {
    let specific = match did.strip_prefix("did:") {
        Some(rest) if rest.starts_with("0x") => rest,
        Some(rest) => match rest.split_once(':') {
            Some(("ethr", specific)) => specific,
            _ => return String::new(),
        },
        None => did,
    };

    let Some(digits) = specific.strip_prefix("0x") else {
        return String::new();
    };
    let bytes = digits.as_bytes();
    if bytes.len() < 40
        || !bytes[..40].iter().all(u8::is_ascii_hexdigit)
        || bytes.get(40).is_some_and(u8::is_ascii_hexdigit)
    {
        return String::new();
    }

    format!("did:ethr:0x{}", digits[..40].to_lowercase())
}

fn identity_of(normalized_did: &str) -> Result<Address, Error> {
    normalized_did
        .trim_start_matches("did:ethr:0x")
        .parse()
        .map_err(|_| Error::Parse(format!("`{normalized_did}` has no address")))
}

fn block_of(value: U256) -> Option<u64> {
    (value <= U256::from(u64::MAX)).then(|| value.low_u64())
}

pub struct EthrResolver {
    rpc: Arc<dyn JsonRpc>,
    registry: Address,
    clock: Arc<dyn TimeProvider>,
}

impl EthrResolver {
    pub fn new(rpc: Arc<dyn JsonRpc>, registry: Address) -> Self {
        Self {
            rpc,
            registry,
            clock: Arc::new(SystemTimeProvider),
        }
    }

    /// Talks to `network`'s node through `http`, using its configured registry
    pub fn for_network(network: &EthNetwork, http: Arc<dyn HttpClient>) -> Result<Self, Error> {
        let registry = match network.ethr_did_registry {
            Some(registry) => registry,
            None => DEFAULT_ETHR_DID_REGISTRY
                .parse()
                .map_err(|_| Error::InvalidArgument("bad default registry".into()))?,
        };
        Ok(Self::new(
            Arc::new(HttpJsonRpc::new(network.rpc_url.clone(), http)),
            registry,
        ))
    }

    /// Clock used to drop expired delegates and attributes
    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> Address {
        self.registry
    }

    pub async fn identity_owner(&self, identity: Address) -> Result<Address, Error> {
        let result = self
            .rpc
            .eth_call(self.registry, &abi::identity_owner(identity))
            .await?;
        Ok(abi::decode_address(&result)?)
    }

    /// Block of the latest change, zero when the identity never changed
    pub async fn last_changed(&self, identity: Address) -> Result<U256, Error> {
        let result = self
            .rpc
            .eth_call(self.registry, &abi::changed(identity))
            .await?;
        Ok(abi::decode_uint(&result)?)
    }

    /// All registry events of `identity`, oldest first
    #[instrument(skip(self))]
    pub async fn history(&self, identity: Address) -> Result<Vec<RegistryEvent>, Error> {
        let mut pending = BinaryHeap::new();
        let mut visited = HashSet::new();
        let mut by_block: BTreeMap<u64, Vec<RegistryEvent>> = BTreeMap::new();

        if let Some(block) = block_of(self.last_changed(identity).await?) {
            pending.push(block);
        }

        while let Some(block) = pending.pop() {
            if block == 0 || !visited.insert(block) {
                continue;
            }

            let filter = LogFilter {
                address: self.registry,
                topics: vec![None, Some(abi::address_topic(identity))],
                from_block: block,
                to_block: block,
            };
            let logs = self.rpc.get_logs(&filter).await?;
            debug!(block, logs = logs.len(), "replaying registry changes");

            for log in &logs {
                match RegistryEvent::from_log(log) {
                    Ok(Some(event)) => {
                        if let Some(previous) = block_of(event.previous_change()) {
                            pending.push(previous);
                        }
                        by_block.entry(block).or_default().push(event);
                    }
                    Ok(None) => {}
                    Err(e) => warn!(block, error = %e, "skipping undecodable registry log"),
                }
            }
        }

        Ok(by_block.into_values().flatten().collect())
    }

    /// Assembles the document of `did` from its owner and change history
    pub fn wrap_document(&self, did: &str, owner: Address, history: &[RegistryEvent]) -> DidDocument {
        let now = U256::from(self.clock.now());
        let owner_key = format!("{did}#owner");

        let mut public_keys = Entries::default();
        let mut authentication = Entries::default();
        let mut services = Entries::default();

        public_keys.insert(
            "owner".into(),
            PublicKeyEntry {
                id: owner_key.clone(),
                key_type: KeyType::Secp256k1VerificationKey2018,
                owner: did.to_string(),
                material: KeyMaterial::EthereumAddress(format!("{owner:?}")),
            },
        );
        authentication.insert(
            "owner".into(),
            AuthenticationEntry {
                key_type: KeyType::Secp256k1SignatureAuthentication2018,
                public_key: owner_key,
            },
        );

        let mut delegate_count = 0;
        for event in history {
            match event {
                RegistryEvent::OwnerChanged { .. } => {}

                RegistryEvent::DelegateChanged {
                    delegate_type,
                    delegate,
                    valid_to,
                    ..
                } => {
                    let key = format!("DIDDelegateChanged-{delegate_type}-{delegate:?}");
                    if *valid_to < now {
                        public_keys.remove(&key);
                        authentication.remove(&key);
                        continue;
                    }

                    let signs = match delegate_type.as_str() {
                        VERI_KEY | "Secp256k1VerificationKey2018" => false,
                        SIG_AUTH | "Secp256k1SignatureAuthentication2018" => true,
                        other => {
                            debug!(delegate_type = other, "ignoring unknown delegate type");
                            continue;
                        }
                    };

                    delegate_count += 1;
                    let id = format!("{did}#delegate-{delegate_count}");
                    public_keys.insert(
                        key.clone(),
                        PublicKeyEntry {
                            id: id.clone(),
                            key_type: KeyType::Secp256k1VerificationKey2018,
                            owner: did.to_string(),
                            material: KeyMaterial::EthereumAddress(format!("{delegate:?}")),
                        },
                    );
                    if signs {
                        authentication.insert(
                            key,
                            AuthenticationEntry {
                                key_type: KeyType::Secp256k1SignatureAuthentication2018,
                                public_key: id,
                            },
                        );
                    }
                }

                RegistryEvent::AttributeChanged {
                    name,
                    value,
                    valid_to,
                    ..
                } => {
                    let key = format!("DIDAttributeChanged-{name}-{}", hex::encode(value));
                    if *valid_to < now {
                        public_keys.remove(&key);
                        services.remove(&key);
                        continue;
                    }

                    let Some(attribute) = Attribute::parse(name) else {
                        debug!(name, "ignoring attribute outside the did/ namespace");
                        continue;
                    };

                    match attribute.section {
                        "pub" => {
                            delegate_count += 1;
                            public_keys.insert(
                                key,
                                PublicKeyEntry {
                                    id: format!("{did}#delegate-{delegate_count}"),
                                    key_type: attribute.key_type(),
                                    owner: did.to_string(),
                                    material: attribute.material(value),
                                },
                            );
                        }
                        "svc" => {
                            services.insert(
                                key,
                                ServiceEntry {
                                    id: None,
                                    service_type: attribute.algorithm.to_string(),
                                    service_endpoint: Value::String(
                                        String::from_utf8_lossy(value).into_owned(),
                                    ),
                                },
                            );
                        }
                        _ => {}
                    }
                }
            }
        }

        let mut doc = DidDocument::new(did);
        doc.public_key = public_keys.into_values();
        doc.authentication = authentication.into_values();
        doc.service = services.into_values();
        doc
    }
}

/// Insertion ordered entries keyed by the change that produced them
struct Entries<T>(Vec<(String, T)>);

impl<T> Default for Entries<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> Entries<T> {
    fn insert(&mut self, key: String, value: T) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    fn remove(&mut self, key: &str) {
        self.0.retain(|(k, _)| k != key);
    }

    fn into_values(self) -> Vec<T> {
        self.0.into_iter().map(|(_, v)| v).collect()
    }
}

/// `did/(pub|auth|svc)/<algorithm>[/<type>][/<encoding>]`
#[derive(Debug, PartialEq, Eq)]
struct Attribute<'a> {
    section: &'a str,
    algorithm: &'a str,
    purpose: Option<&'a str>,
    encoding: Option<&'a str>,
}

impl<'a> Attribute<'a> {
    fn parse(name: &'a str) -> Option<Self> {
        let parts: Vec<&str> = name.split('/').collect();
        if parts.len() < 3 || parts.len() > 5 || parts[0] != "did" {
            return None;
        }
        let word = |s: &&str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !parts[1..].iter().all(word) {
            return None;
        }
        if !matches!(parts[1], "pub" | "auth" | "svc") {
            return None;
        }

        Some(Self {
            section: parts[1],
            algorithm: parts[2],
            purpose: parts.get(3).copied(),
            encoding: parts.get(4).copied(),
        })
    }

    fn key_type(&self) -> KeyType {
        let purpose = match self.purpose.unwrap_or(VERI_KEY) {
            VERI_KEY => "VerificationKey2018",
            SIG_AUTH => "SignatureAuthentication2018",
            other => other,
        };
        KeyType::from(format!("{}{purpose}", self.algorithm))
    }

    fn material(&self, value: &[u8]) -> KeyMaterial {
        match self.encoding {
            None | Some("hex") => KeyMaterial::PublicKeyHex(hex::encode(value)),
            Some("base64") => KeyMaterial::PublicKeyBase64(STANDARD.encode(value)),
            Some("base58") => KeyMaterial::PublicKeyBase58(value.to_base58()),
            Some(_) => KeyMaterial::Value(hex::encode(value)),
        }
    }
}

#[async_trait]
impl DidResolver for EthrResolver {
    fn method(&self) -> &str {
        "ethr"
    }

    fn can_resolve(&self, did: &str) -> bool {
        !normalize_did(did).is_empty()
    }

    #[instrument(skip(self))]
    async fn resolve(&self, did: &str) -> Result<DidDocument, Error> {
        let normalized = normalize_did(did);
        if normalized.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "`{did}` cannot be resolved by the ethr resolver"
            )));
        }
        let identity = identity_of(&normalized)?;

        let owner = self.identity_owner(identity).await?;
        let history = self.history(identity).await?;
        debug!(?owner, events = history.len(), "assembling ethr document");

        Ok(self.wrap_document(&normalized, owner, &history))
    }
}
