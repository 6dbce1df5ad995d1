//! Failure kinds of the resolver registry, the JWT engine and the signer chain.
//!
//! `resolve`, `verify` and `sign_raw_tx` each report a single [`Error`]. Node and
//! HTTP failures are wrapped in [`TransportError`] so the cause survives, and a
//! token whose signature or claims do not hold is a [`VerificationError`].

use thiserror::Error;
use url::ParseError;

/// Top level failure of a registry, JWT or signer call
#[derive(Error, Debug)]
pub enum Error {
    /// A DID or a JWT could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// No resolver is registered for the DID method
    #[error("Unsupported DID method `{0}`")]
    UnsupportedMethod(String),

    /// The transport failed while resolving a DID
    #[error("DID resolution failed: {0}")]
    Resolution(#[from] TransportError),

    /// Resolution succeeded transport-wise but produced no usable document
    #[error("Blank DID document: {0}")]
    BlankDocument(String),

    /// The input does not belong to the component it was handed to
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A JWT failed verification
    #[error("Verification failed: {0}")]
    Verification(#[from] VerificationError),

    /// The key operation failed
    #[error("Signing failed: {0}")]
    Signing(#[from] SigningError),
}

/// Failures of the HTTP / JSON-RPC collaborators
#[derive(Error, Debug)]
pub enum TransportError {
    /// reqwest failed before a status was received
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP {status} when fetching {url}")]
    Status { status: u16, url: String },

    /// The JSON-RPC node answered with an error object
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The JSON-RPC node answered with neither result nor error
    #[error("JSON-RPC response for `{0}` has no result")]
    MissingResult(String),

    /// The node or document URL does not parse
    #[error("Invalid URL: {0}")]
    Url(#[from] ParseError),

    /// A response body is not the expected JSON
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A contract call returned data that does not decode
    #[error("ABI decoding error: {0}")]
    Abi(String),

    /// The caller cancelled the pending call
    #[error("Request cancelled")]
    Cancelled,
}

/// Reasons a JWT is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// The header names an algorithm other than ES256K / ES256K-R
    #[error("Unsupported algorithm `{0}`")]
    UnsupportedAlgorithm(String),

    /// The payload or signature segment does not decode
    #[error("Malformed segment: {0}")]
    MalformedSegment(String),

    /// The signature bytes are unusable
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// The payload carries no `iss`
    #[error("Missing issuer")]
    MissingIssuer,

    /// `iss` names no DID any registered resolver can turn into a document
    #[error("issuer `{issuer}` cannot be resolved: {reason}")]
    IssuerUnresolvable { issuer: String, reason: String },

    /// No authorized key of the issuer produced the signature
    #[error("no matching key")]
    NoMatchingKey,

    /// `exp` has passed
    #[error("expired at {exp} (now {now})")]
    Expired { exp: u64, now: u64 },

    /// `iat` lies in the future beyond the allowed skew
    #[error("not yet valid: issued at {iat} (now {now})")]
    NotYetValid { iat: u64, now: u64 },

    /// `aud` differs from the requested audience
    #[error("audience mismatch: expected {expected}, found {found:?}")]
    AudienceMismatch {
        expected: String,
        found: Option<String>,
    },
}

/// Failures of the signer chain
#[derive(Error, Debug)]
pub enum SigningError {
    /// The private key bytes are not a valid secp256k1 scalar
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    /// A relay or proxy layer was handed a transaction without destination
    #[error("Transaction has no destination")]
    MissingDestination,

    /// The ECDSA operation itself failed
    #[error("ECDSA error: {0}")]
    Ecdsa(String),
}
