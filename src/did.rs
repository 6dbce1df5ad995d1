//! `did:<method>:<id>` splitting, DID URL parts and the `did:https` document
//! location.

use crate::error::Error;
use url::Url;

/// Splits a DID into `(method, identifier)`.
///
/// Anything that does not look like `did:<method>:<identifier>` yields a pair of
/// empty strings. The identifier keeps any path, query or fragment suffix.
pub fn parse_did(did: &str) -> (String, String) {
    let Some(rest) = did.strip_prefix("did:") else {
        return (String::new(), String::new());
    };
    match rest.split_once(':') {
        Some((method, identifier)) if !identifier.is_empty() => {
            (method.to_string(), identifier.to_string())
        }
        _ => (String::new(), String::new()),
    }
}

/// A parsed DID URL: `did:<method>:<id>[/path][?query][#fragment]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DidUrl {
    pub method: String,
    pub id: String,
    pub path: Option<String>,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl DidUrl {
    /// Parses and validates a DID URL
    pub fn parse(did: &str) -> Result<Self, Error> {
        let (method, specific) = parse_did(did);
        if method.is_empty() {
            return Err(Error::Parse(format!("`{did}` is not a DID")));
        }

        let (rest, fragment) = match specific.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (specific.as_str(), None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query.to_string())),
            None => (rest, None),
        };
        let (id, path) = match rest.split_once('/') {
            Some((id, path)) => (id, Some(path.to_string())),
            None => (rest, None),
        };

        if id.is_empty() {
            return Err(Error::Parse(format!("`{did}` has an empty identifier")));
        }

        Ok(Self {
            method,
            id: id.to_string(),
            path: path.filter(|p| !p.is_empty()),
            query,
            fragment,
        })
    }

    /// The bare DID without path, query or fragment
    pub fn did(&self) -> String {
        format!("did:{}:{}", self.method, self.id)
    }

    /// Location of the DID document for web-hosted methods.
    ///
    /// Without a path this is `https://<id>/.well-known/did.json`, with a path it is
    /// `https://<id>/<path>/did.json`.
    pub fn to_document_url(&self) -> Result<Url, Error> {
        let mut url = format!("https://{}", self.id);
        match &self.path {
            Some(path) => url.push_str(&format!("/{}", path.trim_end_matches('/'))),
            None => url.push_str("/.well-known"),
        }
        url.push_str("/did.json");

        Url::parse(&url).map_err(|e| Error::Resolution(e.into()))
    }
}

impl std::fmt::Display for DidUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "did:{}:{}", self.method, self.id)?;
        if let Some(path) = &self.path {
            write!(f, "/{path}")?;
        }
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}
