//! Creation and verification of `ES256K` / `ES256K-R` JWTs.
//!
//! Tokens are verified against the keys listed in the issuer's DID document,
//! obtained through a [`ResolverRegistry`]. Time checks use an injectable
//! [`TimeProvider`] so expiry can be tested deterministically.

mod model;
pub mod signature;

pub use model::{Algorithm, JwtHeader, JwtPayload};

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::config::JWT_CLOCK_SKEW_SECONDS;
use crate::error::{Error, VerificationError};
use crate::resolver::ResolverRegistry;
use crate::signer::Signer;
use crate::time::{SystemTimeProvider, TimeProvider};

/// A token split into its decoded parts
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedJwt {
    pub header: JwtHeader,
    pub payload: JwtPayload,
    pub signature: Vec<u8>,
    /// `header.payload` exactly as it appeared in the token
    pub signing_input: String,
}

/// Decodes `token` without verifying it.
///
/// A token that does not have exactly three segments is a [`Error::Parse`];
/// undecodable segments are reported as [`VerificationError::MalformedSegment`].
pub fn decode(token: &str) -> Result<DecodedJwt, Error> {
    let parts: Vec<&str> = token.split('.').collect();
    let [header, payload, sig] = parts.as_slice() else {
        return Err(Error::Parse(format!(
            "a JWT has 3 segments, found {}",
            parts.len()
        )));
    };
    if header.is_empty() || payload.is_empty() {
        return Err(VerificationError::MalformedSegment("empty header or payload".into()).into());
    }

    let decoded = DecodedJwt {
        header: json_segment(header)?,
        payload: json_segment(payload)?,
        signature: signature::from_base64url(sig)?,
        signing_input: format!("{header}.{payload}"),
    };
    Ok(decoded)
}

fn json_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, VerificationError> {
    let bytes = signature::from_base64url(segment)?;
    serde_json::from_slice(&bytes).map_err(|e| VerificationError::MalformedSegment(e.to_string()))
}

/// Resolution failures that stem from the `iss` value itself
fn issuer_failure(issuer: &str, error: Error) -> Error {
    match error {
        Error::Parse(reason)
        | Error::UnsupportedMethod(reason)
        | Error::BlankDocument(reason)
        | Error::InvalidArgument(reason) => VerificationError::IssuerUnresolvable {
            issuer: issuer.to_string(),
            reason,
        }
        .into(),
        other => other,
    }
}

pub struct JwtTools {
    clock: Arc<dyn TimeProvider>,
}

impl Default for JwtTools {
    fn default() -> Self {
        Self::new(Arc::new(SystemTimeProvider))
    }
}

impl JwtTools {
    pub fn new(clock: Arc<dyn TimeProvider>) -> Self {
        Self { clock }
    }

    /// Signs `payload` as an `ES256K-R` token issued by `issuer`.
    ///
    /// `iss` defaults to `issuer` and `iat` is set to now. `exp` becomes
    /// `iat + validity`, except that an `exp` already present in the payload is
    /// kept as is. A `validity` that overflows the timestamp is an
    /// [`Error::InvalidArgument`].
    pub fn create(
        &self,
        payload: JwtPayload,
        issuer: &str,
        signer: &Signer,
        validity: Option<u64>,
    ) -> Result<String, Error> {
        self.create_with_algorithm(payload, issuer, signer, validity, Algorithm::Es256kR)
    }

    pub fn create_with_algorithm(
        &self,
        mut payload: JwtPayload,
        issuer: &str,
        signer: &Signer,
        validity: Option<u64>,
        algorithm: Algorithm,
    ) -> Result<String, Error> {
        let iat = self.clock.now();
        payload.iss.get_or_insert_with(|| issuer.to_string());
        payload.iat = Some(iat);
        if let (None, Some(validity)) = (payload.exp, validity) {
            let exp = iat.checked_add(validity).ok_or_else(|| {
                Error::InvalidArgument(format!("validity of {validity}s overflows the expiry"))
            })?;
            payload.exp = Some(exp);
        }

        let header = serde_json::to_vec(&JwtHeader::new(algorithm))
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;
        let body = serde_json::to_vec(&payload).map_err(|e| Error::InvalidArgument(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            signature::base64url(&header),
            signature::base64url(&body)
        );
        let sig = signer.sign_jwt(signing_input.as_bytes())?;

        Ok(format!(
            "{signing_input}.{}",
            signature::encode(&sig, algorithm)
        ))
    }

    /// Verifies `token` and returns its payload.
    ///
    /// The issuer is resolved through `registry` and one of its secp256k1 keys
    /// must have produced the signature. An issuer no resolver understands is
    /// reported as [`VerificationError::IssuerUnresolvable`]; transport failures
    /// keep their [`Error::Resolution`] cause. When `audience` is given the
    /// token's `aud` must equal it.
    #[instrument(skip(self, token, registry))]
    pub async fn verify(
        &self,
        token: &str,
        registry: &ResolverRegistry,
        audience: Option<&str>,
    ) -> Result<JwtPayload, Error> {
        let DecodedJwt {
            header,
            payload,
            signature: raw_signature,
            signing_input,
        } = decode(token)?;

        let algorithm = header.algorithm()?;
        let sig = signature::decode(&raw_signature, algorithm)?;
        let issuer = payload.iss.as_deref().ok_or(VerificationError::MissingIssuer)?;

        let document = registry
            .resolve(issuer)
            .await
            .map_err(|e| issuer_failure(issuer, e))?;
        let keys = document.signing_keys();
        let digest = Sha256::digest(signing_input.as_bytes());

        let matched = match algorithm {
            Algorithm::Es256kR => {
                let signer = sig
                    .recover_address(&digest)
                    .map_err(|e| VerificationError::InvalidSignature(e.to_string()))?;
                keys.iter().any(|key| key.ethereum_address() == Some(signer))
            }
            Algorithm::Es256k => keys
                .iter()
                .any(|key| signature::verifies_with(key, &digest, &sig)),
        };
        if !matched {
            return Err(VerificationError::NoMatchingKey.into());
        }

        self.check_claims(&payload, audience)?;
        debug!(%issuer, "JWT verified");
        Ok(payload)
    }

    fn check_claims(&self, payload: &JwtPayload, audience: Option<&str>) -> Result<(), VerificationError> {
        let now = self.clock.now();

        if let Some(exp) = payload.exp {
            if now >= exp {
                return Err(VerificationError::Expired { exp, now });
            }
        }
        if let Some(iat) = payload.iat {
            if iat > now + JWT_CLOCK_SKEW_SECONDS {
                return Err(VerificationError::NotYetValid { iat, now });
            }
        }
        if let Some(expected) = audience {
            if payload.aud.as_deref() != Some(expected) {
                return Err(VerificationError::AudienceMismatch {
                    expected: expected.to_string(),
                    found: payload.aud.clone(),
                });
            }
        }
        Ok(())
    }
}
