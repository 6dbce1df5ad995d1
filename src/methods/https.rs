//! `did:https` resolver: documents published at a well-known HTTPS location.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::did::{parse_did, DidUrl};
use crate::error::{Error, TransportError};
use crate::resolver::DidResolver;
use crate::transport::{HttpClient, ReqwestHttpClient};
use crate::types::DidDocument;

pub struct HttpsResolver {
    http: Arc<dyn HttpClient>,
}

impl HttpsResolver {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }
}

impl Default for HttpsResolver {
    fn default() -> Self {
        Self::new(Arc::new(ReqwestHttpClient::new()))
    }
}

#[async_trait]
impl DidResolver for HttpsResolver {
    fn method(&self) -> &str {
        "https"
    }

    fn can_resolve(&self, did: &str) -> bool {
        parse_did(did).0 == "https"
    }

    #[instrument(skip(self))]
    async fn resolve(&self, did: &str) -> Result<DidDocument, Error> {
        if !self.can_resolve(did) {
            return Err(Error::InvalidArgument(format!(
                "`{did}` cannot be resolved by the https resolver"
            )));
        }

        let url = DidUrl::parse(did)?.to_document_url()?;
        debug!(%url, "fetching DID document");

        let body = self.http.get(url.as_str()).await?;
        if body.trim().is_empty() {
            return Err(Error::BlankDocument(format!("no document found for `{did}`")));
        }

        serde_json::from_str(&body).map_err(|e| Error::Resolution(TransportError::Json(e)))
    }
}
