//! DID document model shared by every resolver.
//!
//! A [`DidDocument`] is the common projection (`@context`, `id`, `publicKey`,
//! `authentication`, `service`). Method specific data rides along in
//! [`MethodExtras`], which today only carries the legacy `uport` profile.

use ethers_core::types::Address;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::signer::public_key_to_address;

/// Default JSON-LD context of DID documents
pub const DID_CONTEXT: &str = "https://w3id.org/did/v1";

/// A DID Document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DidDocument {
    /// The context of the DID Document
    #[serde(rename = "@context", default = "default_context")]
    pub context: String,

    /// The DID itself
    #[serde(default)]
    pub id: String,

    /// Keys controlled by the subject
    #[serde(rename = "publicKey", default)]
    pub public_key: Vec<PublicKeyEntry>,

    /// References to keys allowed to authenticate as the subject
    #[serde(default)]
    pub authentication: Vec<AuthenticationEntry>,

    /// Services associated with this DID
    #[serde(default)]
    pub service: Vec<ServiceEntry>,

    /// Data only some DID methods produce
    #[serde(flatten)]
    pub extras: MethodExtras,
}

fn default_context() -> String {
    DID_CONTEXT.to_string()
}

impl DidDocument {
    /// Creates a document with no keys and no services
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            context: default_context(),
            id: id.into(),
            public_key: Vec::new(),
            authentication: Vec::new(),
            service: Vec::new(),
            extras: MethodExtras::default(),
        }
    }

    /// The "no information" sentinel
    pub fn blank() -> Self {
        Self::new("")
    }

    /// True for the sentinel: no id and nothing listed.
    pub fn is_blank(&self) -> bool {
        self.id.is_empty()
            && self.public_key.is_empty()
            && self.authentication.is_empty()
            && self.service.is_empty()
    }

    /// The DID method of the document id
    pub fn method(&self) -> String {
        crate::did::parse_did(&self.id).0
    }

    /// Looks up a public key entry by id.
    ///
    /// Authentication entries sometimes reference a key by fragment only, so a
    /// `#fragment` reference also matches `<did>#fragment`.
    pub fn find_key(&self, reference: &str) -> Option<&PublicKeyEntry> {
        self.public_key.iter().find(|entry| {
            entry.id == reference
                || (reference.starts_with('#') && entry.id.ends_with(reference))
        })
    }

    /// secp256k1 keys that may sign on behalf of the subject.
    ///
    /// Keys referenced from `authentication` are held to the same type check,
    /// so a reference never admits a key of another curve or an unknown type.
    pub fn signing_keys(&self) -> Vec<&PublicKeyEntry> {
        self.public_key
            .iter()
            .filter(|entry| entry.key_type.is_secp256k1())
            .collect()
    }

    /// The legacy profile attached by the `uport` resolver
    pub fn legacy_profile(&self) -> Option<&LegacyProfile> {
        match &self.extras {
            MethodExtras::Legacy { uport_profile } => Some(uport_profile),
            MethodExtras::Standard {} => None,
        }
    }
}

/// Method specific document data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MethodExtras {
    /// `uport` documents keep the profile they were converted from
    Legacy {
        #[serde(rename = "uportProfile")]
        uport_profile: LegacyProfile,
    },
    Standard {},
}

impl Default for MethodExtras {
    fn default() -> Self {
        MethodExtras::Standard {}
    }
}

/// A public key listed in a DID Document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicKeyEntry {
    pub id: String,

    #[serde(rename = "type")]
    pub key_type: KeyType,

    pub owner: String,

    /// Exactly one encoding of the key material
    #[serde(flatten)]
    pub material: KeyMaterial,
}

impl PublicKeyEntry {
    /// The Ethereum address this key signs as, if the material pins one down.
    ///
    /// `ethereumAddress` is parsed directly, `publicKeyHex` is treated as a SEC1
    /// encoded secp256k1 point.
    pub fn ethereum_address(&self) -> Option<Address> {
        match &self.material {
            KeyMaterial::EthereumAddress(address) => address
                .trim_start_matches("0x")
                .parse::<Address>()
                .ok(),
            KeyMaterial::PublicKeyHex(key) => self
                .public_key_bytes(key)
                .and_then(|bytes| k256::ecdsa::VerifyingKey::from_sec1_bytes(&bytes).ok())
                .map(|key| public_key_to_address(&key)),
            _ => None,
        }
    }

    /// SEC1 bytes of a hex encoded key
    pub fn public_key_hex_bytes(&self) -> Option<Vec<u8>> {
        match &self.material {
            KeyMaterial::PublicKeyHex(key) => self.public_key_bytes(key),
            _ => None,
        }
    }

    fn public_key_bytes(&self, key: &str) -> Option<Vec<u8>> {
        let key = key.trim_start_matches("0x");
        let bytes = hex::decode(key).ok()?;
        // raw 64 byte keys miss the uncompressed point tag
        if bytes.len() == 64 {
            let mut tagged = Vec::with_capacity(65);
            tagged.push(0x04);
            tagged.extend_from_slice(&bytes);
            return Some(tagged);
        }
        Some(bytes)
    }
}

/// Key material encodings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyMaterial {
    #[serde(rename = "ethereumAddress")]
    EthereumAddress(String),
    #[serde(rename = "publicKeyHex")]
    PublicKeyHex(String),
    #[serde(rename = "publicKeyBase64")]
    PublicKeyBase64(String),
    #[serde(rename = "publicKeyBase58")]
    PublicKeyBase58(String),
    #[serde(rename = "value")]
    Value(String),
}

/// Known public key types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum KeyType {
    Secp256k1VerificationKey2018,
    Secp256k1SignatureAuthentication2018,
    Ed25519VerificationKey2018,
    RsaVerificationKey2018,
    Curve25519EncryptionPublicKey,
    /// Treated as [`KeyType::Secp256k1VerificationKey2018`]
    Secp256k1SignatureVerificationKey2018,
    /// Treated as [`KeyType::Secp256k1VerificationKey2018`]
    EcdsaPublicKeySecp256k1,
    Other(String),
}

impl KeyType {
    pub fn as_str(&self) -> &str {
        match self {
            KeyType::Secp256k1VerificationKey2018 => "Secp256k1VerificationKey2018",
            KeyType::Secp256k1SignatureAuthentication2018 => {
                "Secp256k1SignatureAuthentication2018"
            }
            KeyType::Ed25519VerificationKey2018 => "Ed25519VerificationKey2018",
            KeyType::RsaVerificationKey2018 => "RsaVerificationKey2018",
            KeyType::Curve25519EncryptionPublicKey => "Curve25519EncryptionPublicKey",
            KeyType::Secp256k1SignatureVerificationKey2018 => {
                "Secp256k1SignatureVerificationKey2018"
            }
            KeyType::EcdsaPublicKeySecp256k1 => "EcdsaPublicKeySecp256k1",
            KeyType::Other(name) => name,
        }
    }

    /// Key types that can sign JWTs
    pub fn is_secp256k1(&self) -> bool {
        matches!(
            self,
            KeyType::Secp256k1VerificationKey2018
                | KeyType::Secp256k1SignatureAuthentication2018
                | KeyType::Secp256k1SignatureVerificationKey2018
                | KeyType::EcdsaPublicKeySecp256k1
        )
    }
}

impl From<String> for KeyType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "Secp256k1VerificationKey2018" => KeyType::Secp256k1VerificationKey2018,
            "Secp256k1SignatureAuthentication2018" => {
                KeyType::Secp256k1SignatureAuthentication2018
            }
            "Ed25519VerificationKey2018" => KeyType::Ed25519VerificationKey2018,
            "RsaVerificationKey2018" => KeyType::RsaVerificationKey2018,
            "Curve25519EncryptionPublicKey" => KeyType::Curve25519EncryptionPublicKey,
            "Secp256k1SignatureVerificationKey2018" => {
                KeyType::Secp256k1SignatureVerificationKey2018
            }
            "EcdsaPublicKeySecp256k1" => KeyType::EcdsaPublicKeySecp256k1,
            _ => KeyType::Other(name),
        }
    }
}

impl From<KeyType> for String {
    fn from(key_type: KeyType) -> Self {
        key_type.as_str().to_string()
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference to a key allowed to authenticate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationEntry {
    #[serde(rename = "type")]
    pub key_type: KeyType,

    /// Id of a [`PublicKeyEntry`]
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

/// A service endpoint in a DID Document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,

    #[serde(rename = "type")]
    pub service_type: String,

    /// The endpoint URL or object
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: Value,
}

/// The profile document stored behind legacy `uport` registry entries.
///
/// Fields this model does not name are kept verbatim in `other`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyProfile {
    #[serde(rename = "@context", skip_serializing_if = "Option::is_none", default)]
    pub context: Option<String>,

    /// ex: "Person", "Organization"
    #[serde(rename = "@type", skip_serializing_if = "Option::is_none", default)]
    pub profile_type: Option<String>,

    /// Hex encoded secp256k1 signing key
    #[serde(rename = "publicKey", skip_serializing_if = "Option::is_none", default)]
    pub public_key: Option<String>,

    /// Base64 encoded Curve25519 encryption key
    #[serde(rename = "publicEncKey", skip_serializing_if = "Option::is_none", default)]
    pub public_enc_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image: Option<ProfilePicture>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Profile picture of a legacy profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePicture {
    #[serde(rename = "@type", skip_serializing_if = "Option::is_none", default)]
    pub image_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,

    #[serde(rename = "contentUrl", skip_serializing_if = "Option::is_none", default)]
    pub content_url: Option<String>,
}
