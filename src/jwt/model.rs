//! JWT header and payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::VerificationError;

/// Signing algorithms understood by [`JwtTools`](super::JwtTools)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Plain secp256k1 ECDSA, 64 byte `r || s` signatures
    Es256k,
    /// Recoverable secp256k1 ECDSA, 65 byte `r || s || recovery id` signatures
    Es256kR,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Es256k => "ES256K",
            Algorithm::Es256kR => "ES256K-R",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, VerificationError> {
        match name {
            "ES256K" => Ok(Algorithm::Es256k),
            "ES256K-R" => Ok(Algorithm::Es256kR),
            other => Err(VerificationError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// Length of the raw signature segment
    pub fn signature_len(&self) -> usize {
        match self {
            Algorithm::Es256k => 64,
            Algorithm::Es256kR => 65,
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JOSE header. Field order is part of the wire format: `{"typ":"JWT","alg":...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtHeader {
    #[serde(default = "default_typ")]
    pub typ: String,
    pub alg: String,
}

fn default_typ() -> String {
    "JWT".to_string()
}

impl JwtHeader {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            typ: default_typ(),
            alg: algorithm.as_str().to_string(),
        }
    }

    pub fn algorithm(&self) -> Result<Algorithm, VerificationError> {
        Algorithm::from_name(&self.alg)
    }
}

/// Registered claims plus any number of application claims
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwtPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// Issued at, seconds since epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,

    /// Expiry, seconds since epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,

    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

impl JwtPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload from a free form claim map; registered claim names are lifted
    /// into their typed fields.
    pub fn from_claims(claims: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(claims))
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    pub fn with_subject(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    pub fn with_audience(mut self, aud: impl Into<String>) -> Self {
        self.aud = Some(aud.into());
        self
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_wire_format() {
        let header = serde_json::to_string(&JwtHeader::new(Algorithm::Es256kR)).unwrap();
        assert_eq!(header, r#"{"typ":"JWT","alg":"ES256K-R"}"#);

        let header = serde_json::to_string(&JwtHeader::new(Algorithm::Es256k)).unwrap();
        assert_eq!(header, r#"{"typ":"JWT","alg":"ES256K"}"#);
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!(Algorithm::from_name("ES256K").unwrap(), Algorithm::Es256k);
        assert_eq!(Algorithm::from_name("ES256K-R").unwrap(), Algorithm::Es256kR);
        assert_eq!(
            Algorithm::from_name("HS256"),
            Err(VerificationError::UnsupportedAlgorithm("HS256".into()))
        );
    }

    #[test]
    fn test_payload_keeps_application_claims() {
        let payload: JwtPayload = serde_json::from_value(json!({
            "iss": "did:ethr:0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f",
            "iat": 1_535_102_500u64,
            "claim": {"name": "Carol Crypteau"},
            "type": "shareReq"
        }))
        .unwrap();

        assert_eq!(payload.iat, Some(1_535_102_500));
        assert_eq!(payload.exp, None);
        assert_eq!(payload.claim("type"), Some(&json!("shareReq")));
        assert_eq!(payload.claim("claim"), Some(&json!({"name": "Carol Crypteau"})));

        let compact = serde_json::to_value(&payload).unwrap();
        assert!(compact.get("exp").is_none());
        assert_eq!(compact["type"], "shareReq");
    }

    #[test]
    fn test_from_claims_lifts_registered_names() {
        let mut claims = Map::new();
        claims.insert("iss".into(), json!("did:uport:2nQtiQG6Cgm1GYTBaaKAgr76uY7iSexUkqX"));
        claims.insert("exp".into(), json!(1234));
        claims.insert("requested".into(), json!(["name"]));

        let payload = JwtPayload::from_claims(claims).unwrap();
        assert_eq!(
            payload.iss.as_deref(),
            Some("did:uport:2nQtiQG6Cgm1GYTBaaKAgr76uY7iSexUkqX")
        );
        assert_eq!(payload.exp, Some(1234));
        assert_eq!(payload.claims.len(), 1);
    }
}
