//! Legacy `did:uport` resolver.
//!
//! The subject's MNID names a network and an address. The network's uport
//! registry maps `(uPortProfileIPFS1220, issuer, subject)` to the sha2-256 digest
//! of a profile stored on IPFS; the profile is fetched through a gateway and
//! converted into a DID document that keeps the profile alongside.

use std::sync::Arc;

use async_trait::async_trait;
use base58::ToBase58;
use multihash::Multihash;
use tracing::{debug, instrument};

use super::mnid::{self, Account};
use crate::abi;
use crate::config::{Networks, DEFAULT_IPFS_GATEWAY};
use crate::did::parse_did;
use crate::error::{Error, TransportError};
use crate::resolver::DidResolver;
use crate::transport::{HttpClient, HttpJsonRpc, JsonRpc, ReqwestHttpClient};
use crate::types::{
    AuthenticationEntry, DidDocument, KeyMaterial, KeyType, LegacyProfile, MethodExtras,
    PublicKeyEntry,
};

/// Registry label of the IPFS profile pointer
pub const PROFILE_LABEL: &str = "uPortProfileIPFS1220";

const SHA2_256: u64 = 0x12;

pub struct UportResolver {
    networks: Networks,
    http: Arc<dyn HttpClient>,
    rpc: Option<Arc<dyn JsonRpc>>,
    ipfs_gateway: String,
}

impl UportResolver {
    pub fn new(networks: Networks, http: Arc<dyn HttpClient>) -> Self {
        Self {
            networks,
            http,
            rpc: None,
            ipfs_gateway: DEFAULT_IPFS_GATEWAY.to_string(),
        }
    }

    /// Sends every registry call to `rpc` instead of the network's endpoint
    pub fn with_rpc(mut self, rpc: Arc<dyn JsonRpc>) -> Self {
        self.rpc = Some(rpc);
        self
    }

    pub fn with_ipfs_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.ipfs_gateway = gateway.into().trim_end_matches('/').to_string();
        self
    }

    fn rpc_for(&self, rpc_url: &str) -> Arc<dyn JsonRpc> {
        match &self.rpc {
            Some(rpc) => rpc.clone(),
            None => Arc::new(HttpJsonRpc::new(rpc_url, self.http.clone())),
        }
    }

    /// IPFS hash of the profile registered for `subject`, `None` when nothing is
    /// registered
    pub async fn ipfs_hash(&self, subject: &Account) -> Result<Option<String>, Error> {
        let network = self.networks.get(&subject.network)?;
        let registry = network.uport_registry.ok_or_else(|| {
            Error::InvalidArgument(format!("no uport registry on network {}", network.name))
        })?;

        let call = abi::registry_get(PROFILE_LABEL, subject.address, subject.address)?;
        let result = self.rpc_for(&network.rpc_url).eth_call(registry, &call).await?;
        if result.iter().all(|b| *b == 0) {
            return Ok(None);
        }

        let digest = abi::decode_bytes32(&result)?;
        let multihash = Multihash::<64>::wrap(SHA2_256, &digest)
            .map_err(|e| TransportError::Abi(e.to_string()))?;
        Ok(Some(multihash.to_bytes().to_base58()))
    }

    /// Fetches the legacy profile of `mnid`
    pub async fn profile(&self, mnid: &str) -> Result<LegacyProfile, Error> {
        let subject = mnid::decode(mnid)?;
        let hash = self
            .ipfs_hash(&subject)
            .await?
            .ok_or_else(|| Error::BlankDocument(format!("no profile registered for `{mnid}`")))?;

        let url = format!("{}/ipfs/{hash}", self.ipfs_gateway);
        debug!(%url, "fetching legacy profile");
        let body = self.http.get(&url).await?;
        if body.trim().is_empty() {
            return Err(Error::BlankDocument(format!("empty profile for `{mnid}`")));
        }

        serde_json::from_str(&body).map_err(|e| Error::Resolution(TransportError::Json(e)))
    }
}

/// Splits `did:uport:<mnid>[suffix]` or a bare `<mnid>[suffix]` into the MNID
fn mnid_of(did: &str) -> &str {
    let rest = did.strip_prefix("did:uport:").unwrap_or(did);
    let end = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    &rest[..end]
}

/// Converts a legacy profile into a DID document for `did:uport:<mnid>`
pub fn convert_profile(mnid: &str, profile: LegacyProfile) -> DidDocument {
    let did = format!("did:uport:{mnid}");
    let mut doc = DidDocument::new(did.clone());

    if let Some(public_key) = &profile.public_key {
        let key_id = format!("{did}#keys-1");
        doc.public_key.push(PublicKeyEntry {
            id: key_id.clone(),
            key_type: KeyType::Secp256k1VerificationKey2018,
            owner: did.clone(),
            material: KeyMaterial::PublicKeyHex(public_key.trim_start_matches("0x").to_string()),
        });
        doc.authentication.push(AuthenticationEntry {
            key_type: KeyType::Secp256k1SignatureAuthentication2018,
            public_key: key_id,
        });
    }

    if let Some(enc_key) = &profile.public_enc_key {
        doc.public_key.push(PublicKeyEntry {
            id: format!("{did}#keys-2"),
            key_type: KeyType::Curve25519EncryptionPublicKey,
            owner: did.clone(),
            material: KeyMaterial::PublicKeyBase64(enc_key.clone()),
        });
    }

    doc.extras = MethodExtras::Legacy {
        uport_profile: LegacyProfile {
            context: None,
            public_key: None,
            public_enc_key: None,
            ..profile
        },
    };
    doc
}

#[async_trait]
impl DidResolver for UportResolver {
    fn method(&self) -> &str {
        "uport"
    }

    fn can_resolve(&self, did: &str) -> bool {
        let (method, _) = parse_did(did);
        if method == "uport" {
            mnid::is_mnid(mnid_of(did))
        } else {
            mnid::is_mnid(did)
        }
    }

    #[instrument(skip(self))]
    async fn resolve(&self, did: &str) -> Result<DidDocument, Error> {
        if !self.can_resolve(did) {
            return Err(Error::InvalidArgument(format!(
                "`{did}` cannot be resolved by the uport resolver"
            )));
        }
        let mnid = mnid_of(did);
        let profile = self.profile(mnid).await?;
        Ok(convert_profile(mnid, profile))
    }
}

impl Default for UportResolver {
    fn default() -> Self {
        Self::new(Networks::default(), Arc::new(ReqwestHttpClient::new()))
    }
}
