//! Core DID resolution functionality.
//!
//! [`ResolverRegistry`] dispatches a DID to the [`DidResolver`] registered for its
//! method. DIDs without a method prefix (bare addresses, MNIDs) go to the first
//! resolver, in registration order, that claims them.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::did::parse_did;
use crate::error::{Error, TransportError};
use crate::types::DidDocument;

/// A method specific resolver
#[async_trait]
pub trait DidResolver: Send + Sync {
    /// The DID method this resolver answers for, ex: "ethr"
    fn method(&self) -> &str;

    /// Whether `did` has a shape this resolver understands. Performs no I/O.
    fn can_resolve(&self, did: &str) -> bool;

    /// Fetches and assembles the document of `did`
    async fn resolve(&self, did: &str) -> Result<DidDocument, Error>;
}

/// Method → resolver dispatch table
#[derive(Default)]
pub struct ResolverRegistry {
    resolvers: RwLock<Vec<Arc<dyn DidResolver>>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `resolver` under its method. A resolver for an already
    /// registered method replaces it in place; a blank method is ignored.
    pub fn register_resolver(&self, resolver: Arc<dyn DidResolver>) {
        let method = resolver.method().to_string();
        if method.trim().is_empty() {
            return;
        }

        let mut resolvers = self.resolvers.write();
        match resolvers.iter_mut().find(|r| r.method() == method) {
            Some(slot) => *slot = resolver,
            None => resolvers.push(resolver),
        }
        debug!(method, "registered DID resolver");
    }

    /// Builder style [`ResolverRegistry::register_resolver`]
    pub fn with_resolver(self, resolver: Arc<dyn DidResolver>) -> Self {
        self.register_resolver(resolver);
        self
    }

    /// Methods in registration order
    pub fn methods(&self) -> Vec<String> {
        self.resolvers
            .read()
            .iter()
            .map(|r| r.method().to_string())
            .collect()
    }

    pub fn can_resolve(&self, did: &str) -> bool {
        self.resolvers.read().iter().any(|r| r.can_resolve(did))
    }

    fn select(&self, did: &str) -> Result<Arc<dyn DidResolver>, Error> {
        let (method, _) = parse_did(did);
        let resolvers = self.resolvers.read();

        if !method.is_empty() {
            return resolvers
                .iter()
                .find(|r| r.method() == method)
                .cloned()
                .ok_or(Error::UnsupportedMethod(method));
        }

        resolvers
            .iter()
            .find(|r| r.can_resolve(did))
            .cloned()
            .ok_or_else(|| Error::Parse(format!("no resolver understands `{did}`")))
    }

    /// Resolves `did` with the matching resolver. Its result, including a blank
    /// document, is returned unchanged.
    #[instrument(skip(self))]
    pub async fn resolve(&self, did: &str) -> Result<DidDocument, Error> {
        let resolver = self.select(did)?;
        debug!(method = resolver.method(), "dispatching resolution");
        resolver.resolve(did).await
    }

    /// Like [`ResolverRegistry::resolve`], abandoning the pending call once
    /// `cancel` fires
    pub async fn resolve_with_cancellation(
        &self,
        did: &str,
        cancel: &CancellationToken,
    ) -> Result<DidDocument, Error> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(did, "resolution cancelled");
                Err(Error::Resolution(TransportError::Cancelled))
            }
            result = self.resolve(did) => result,
        }
    }
}
