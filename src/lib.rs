//! DID resolution, DID-bound JWTs and composable Ethereum signers.
//!
//! This library resolves `did:ethr`, `did:https` and `did:uport` identifiers
//! through an explicit [`ResolverRegistry`], creates and verifies `ES256K` /
//! `ES256K-R` JWTs against the keys of the resolved documents, and signs messages
//! and transactions with a [`Signer`] that may be routed through relay and proxy
//! contracts.

pub mod abi;
pub mod config;
pub mod credentials;
pub mod did;
mod error;
pub mod ethr_did;
pub mod jwt;
pub mod methods;
pub mod resolver;
pub mod signer;
pub mod time;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

use std::sync::Arc;

pub use credentials::{normalize_known_did, Credentials};
pub use did::{parse_did, DidUrl};
pub use error::{Error, SigningError, TransportError, VerificationError};
pub use ethr_did::EthrDid;
pub use jwt::{JwtPayload, JwtTools};
pub use methods::{EthrResolver, HttpsResolver, UportResolver};
pub use resolver::{DidResolver, ResolverRegistry};
pub use signer::{KeyPairSigner, Signer};
pub use types::DidDocument;

use config::Networks;
use transport::{HttpClient, ReqwestHttpClient};

/// A registry with the `ethr` (mainnet), `uport` and `https` resolvers
///
/// # Example
/// ```no_run
/// use did_jwt_core::{default_registry, JwtTools};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let registry = default_registry()?;
///     let document = registry
///         .resolve("did:ethr:0xb9c5714089478a327f09197987f16f9e5d936e8a")
///         .await?;
///     println!("Resolved DID Document: {:?}", document);
///
///     # let token = "";
///     let payload = JwtTools::default().verify(token, &registry, None).await?;
///     println!("Issued by {:?}", payload.iss);
///     Ok(())
/// }
/// ```
pub fn default_registry() -> Result<ResolverRegistry, Error> {
    let networks = Networks::default();
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());

    let ethr = EthrResolver::for_network(networks.mainnet()?, http.clone())?;
    let registry = ResolverRegistry::new()
        .with_resolver(Arc::new(ethr))
        .with_resolver(Arc::new(UportResolver::new(networks, http.clone())))
        .with_resolver(Arc::new(HttpsResolver::new(http)));
    Ok(registry)
}
