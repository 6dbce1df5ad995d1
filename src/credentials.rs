//! Signed uPort style messages: plain claims, selective disclosure requests and
//! verifications, issued by one DID with one [`Signer`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::DEFAULT_JWT_VALIDITY_SECONDS;
use crate::error::Error;
use crate::jwt::{Algorithm, JwtPayload, JwtTools};
use crate::methods::mnid;
use crate::signer::Signer;
use crate::time::{SystemTimeProvider, TimeProvider};

/// Validity of selective disclosure requests and verifications
pub const DEFAULT_REQUEST_VALIDITY_SECONDS: u64 = 600;

/// Known values of the `type` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JwtType {
    ShareReq,
    ShareResp,
    VerReq,
    Eip712Req,
    #[serde(rename = "ethtx")]
    EthTx,
    PersonalSignReq,
}

/// Ethereum account a selective disclosure request asks for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestAccountType {
    /// The user's choice
    #[default]
    General,
    Segregated,
    Keypair,
    Devicekey,
    None,
}

/// Parameters of a `shareReq` message
#[derive(Debug, Clone, PartialEq)]
pub struct SelectiveDisclosureRequest {
    /// Attributes requested, ex: `["name", "country"]`
    pub requested: Vec<String>,
    /// Where the response is posted; encoded as `callback`
    pub callback_url: String,
    /// Attributes requested as signed claims
    pub verified: Option<Vec<String>>,
    /// Encoded as `net`
    pub network_id: Option<String>,
    /// Encoded as `act`
    pub account_type: Option<RequestAccountType>,
    /// Signed claims about the issuer
    pub vc: Option<Vec<String>>,
    pub expires_in: u64,
    /// Additional claims; named parameters win on collision
    pub extras: Map<String, Value>,
}

impl SelectiveDisclosureRequest {
    pub fn new(requested: Vec<String>, callback_url: impl Into<String>) -> Self {
        Self {
            requested,
            callback_url: callback_url.into(),
            verified: None,
            network_id: None,
            account_type: Some(RequestAccountType::General),
            vc: None,
            expires_in: DEFAULT_REQUEST_VALIDITY_SECONDS,
            extras: Map::new(),
        }
    }

    fn to_claims(&self) -> Map<String, Value> {
        let mut claims = self.extras.clone();
        claims.insert("callback".into(), json!(self.callback_url));
        claims.insert("requested".into(), json!(self.requested));
        if let Some(verified) = &self.verified {
            claims.insert("verified".into(), json!(verified));
        }
        if let Some(vc) = &self.vc {
            claims.insert("vc".into(), json!(vc));
        }
        if let Some(net) = &self.network_id {
            claims.insert("net".into(), json!(net));
        }
        if let Some(act) = self.account_type {
            claims.insert("act".into(), json!(act));
        }
        claims.insert("type".into(), json!(JwtType::ShareReq));
        claims
    }
}

/// Maps bare identifiers to DIDs: Ethereum addresses become `did:ethr`, MNIDs
/// become `did:uport`. Anything else, DIDs included, is returned unchanged.
pub fn normalize_known_did(potential_did: &str) -> String {
    if let Some(rest) = potential_did.strip_prefix("did:") {
        if rest.contains(':') {
            return potential_did.to_string();
        }
    }

    let mut digits = potential_did;
    while let Some(rest) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        digits = rest;
    }
    if let Some(address) = digits.get(..40) {
        if address.chars().all(|c| c.is_ascii_hexdigit()) {
            return format!("did:ethr:0x{address}");
        }
    }

    if mnid::is_mnid(potential_did) {
        return format!("did:uport:{potential_did}");
    }
    potential_did.to_string()
}

pub struct Credentials {
    did: String,
    signer: Signer,
    clock: Arc<dyn TimeProvider>,
}

impl Credentials {
    pub fn new(did: impl Into<String>, signer: Signer) -> Self {
        Self {
            did: did.into(),
            signer,
            clock: Arc::new(SystemTimeProvider),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    /// The normalized issuer DID
    pub fn did(&self) -> String {
        normalize_known_did(&self.did)
    }

    /// Signs `payload` as this issuer. `did:uport` issuers sign `ES256K`,
    /// everyone else `ES256K-R`. An `exp` already present in the payload is kept.
    pub fn sign_jwt(&self, payload: JwtPayload, expires_in: Option<u64>) -> Result<String, Error> {
        let issuer = self.did();
        let algorithm = if issuer.starts_with("did:uport:") {
            Algorithm::Es256k
        } else {
            Algorithm::Es256kR
        };
        JwtTools::new(self.clock.clone()).create_with_algorithm(
            payload,
            &issuer,
            &self.signer,
            Some(expires_in.unwrap_or(DEFAULT_JWT_VALIDITY_SECONDS)),
            algorithm,
        )
    }

    /// Creates a signed `shareReq` message
    pub fn create_disclosure_request(&self, params: &SelectiveDisclosureRequest) -> Result<String, Error> {
        let payload = JwtPayload::from_claims(params.to_claims())
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;
        self.sign_jwt(payload, Some(params.expires_in))
    }

    /// Creates a signed verification of `claim` about `sub`
    pub fn create_verification(
        &self,
        sub: &str,
        claim: Value,
        callback: Option<&str>,
        vc: Vec<String>,
        expires_in: Option<u64>,
    ) -> Result<String, Error> {
        let payload = JwtPayload::new()
            .with_subject(sub)
            .with_claim("claim", claim)
            .with_claim("vc", vc)
            .with_claim("callback", callback.unwrap_or_default());
        self.sign_jwt(
            payload,
            Some(expires_in.unwrap_or(DEFAULT_REQUEST_VALIDITY_SECONDS)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt;
    use crate::signer::KeyPairSigner;
    use crate::time::FixedTimeProvider;

    fn credentials(did: &str) -> Credentials {
        let signer = KeyPairSigner::from_hex(
            "4646464646464646464646464646464646464646464646464646464646464646",
        )
        .unwrap();
        Credentials::new(did, Signer::from(signer))
            .with_clock(Arc::new(FixedTimeProvider::new(12_345_678)))
    }

    #[test]
    fn test_normalize_known_did() {
        for (input, expected) in [
            ("did:example:something something", "did:example:something something"),
            (
                "did:ethr:0xf3beac30c498d9e26865f34fcaa57dbb935b0d74#keys-1",
                "did:ethr:0xf3beac30c498d9e26865f34fcaa57dbb935b0d74#keys-1",
            ),
            (
                "did:uport:2nQtiQG6Cgm1GYTBaaKAgr76uY7iSexUkqX#owner",
                "did:uport:2nQtiQG6Cgm1GYTBaaKAgr76uY7iSexUkqX#owner",
            ),
            (
                "0xf3beac30c498d9e26865f34fcaa57dbb935b0d74",
                "did:ethr:0xf3beac30c498d9e26865f34fcaa57dbb935b0d74",
            ),
            (
                "0XF3BEAC30c498d9e26865f34fcaa57dbb935b0d74",
                "did:ethr:0xF3BEAC30c498d9e26865f34fcaa57dbb935b0d74",
            ),
            (
                "f3beac30c498d9e26865f34fcaa57dbb935b0d74",
                "did:ethr:0xf3beac30c498d9e26865f34fcaa57dbb935b0d74",
            ),
            (
                "2nQtiQG6Cgm1GYTBaaKAgr76uY7iSexUkqX",
                "did:uport:2nQtiQG6Cgm1GYTBaaKAgr76uY7iSexUkqX",
            ),
            (
                "5A8bRWU3F7j3REx3vkJWxdjQPp4tqmxFPmab1Tr",
                "did:uport:5A8bRWU3F7j3REx3vkJWxdjQPp4tqmxFPmab1Tr",
            ),
            ("0x1234", "0x1234"),
            ("2nQtiQG6Cgm1GYTBaaK", "2nQtiQG6Cgm1GYTBaaK"),
        ] {
            assert_eq!(normalize_known_did(input), expected, "{input}");
        }
    }

    #[test]
    fn test_algorithm_follows_issuer_method() {
        let uport = credentials("did:uport:2nQtiQG6Cgm1GYTBaaKAgr76uY7iSexUkqX")
            .sign_jwt(JwtPayload::new(), None)
            .unwrap();
        assert_eq!(jwt::decode(&uport).unwrap().header.alg, "ES256K");

        let ethr = credentials("0xf3beac30c498d9e26865f34fcaa57dbb935b0d74")
            .sign_jwt(JwtPayload::new(), None)
            .unwrap();
        let decoded = jwt::decode(&ethr).unwrap();
        assert_eq!(decoded.header.alg, "ES256K-R");
        assert_eq!(
            decoded.payload.iss.as_deref(),
            Some("did:ethr:0xf3beac30c498d9e26865f34fcaa57dbb935b0d74")
        );
        assert_eq!(decoded.payload.exp, Some(12_345_678 + 300));
    }

    #[test]
    fn test_disclosure_request_payload() {
        let mut params = SelectiveDisclosureRequest::new(
            vec!["name".into(), "country".into()],
            "myapp://get-back-to-me-with-response.url",
        );
        params.network_id = Some("0x4".into());
        params.extras.insert("type".into(), json!("overwritten"));
        params.extras.insert("hello".into(), json!("world"));

        let token = credentials("did:ethr:0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f")
            .create_disclosure_request(&params)
            .unwrap();
        let payload = jwt::decode(&token).unwrap().payload;

        assert_eq!(payload.claim("type"), Some(&json!("shareReq")));
        assert_eq!(payload.claim("requested"), Some(&json!(["name", "country"])));
        assert_eq!(
            payload.claim("callback"),
            Some(&json!("myapp://get-back-to-me-with-response.url"))
        );
        assert_eq!(payload.claim("net"), Some(&json!("0x4")));
        assert_eq!(payload.claim("act"), Some(&json!("general")));
        assert_eq!(payload.claim("hello"), Some(&json!("world")));
        assert_eq!(payload.claim("verified"), None);
        assert_eq!(payload.exp, Some(12_345_678 + 600));
    }

    #[test]
    fn test_verification_payload() {
        let token = credentials("did:uport:2nQtiQG6Cgm1GYTBaaKAgr76uY7iSexUkqX")
            .create_verification(
                "did:ethr:0xf3beac30c498d9e26865f34fcaa57dbb935b0d74",
                json!({"name": "John Doe", "age": "35"}),
                None,
                vec![],
                None,
            )
            .unwrap();
        let decoded = jwt::decode(&token).unwrap();

        assert_eq!(decoded.header.alg, "ES256K");
        assert_eq!(
            decoded.payload.sub.as_deref(),
            Some("did:ethr:0xf3beac30c498d9e26865f34fcaa57dbb935b0d74")
        );
        assert_eq!(decoded.payload.claim("vc"), Some(&json!([])));
        assert_eq!(decoded.payload.claim("callback"), Some(&json!("")));
        assert_eq!(decoded.payload.exp, Some(12_345_678 + 600));
    }
}
