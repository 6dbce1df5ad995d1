//! HTTP and JSON-RPC collaborators.
//!
//! Resolvers only talk to the network through [`HttpClient`] and [`JsonRpc`], so
//! tests swap in in-memory fakes. The shipped implementations are a thin wrapper
//! over `reqwest` and a JSON-RPC 2.0 client layered on any [`HttpClient`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ethers_core::types::{Address, Bytes, Log, TransactionReceipt, H256, U256};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::TransportError;

/// Plain HTTP access
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// GETs `url` and returns the body
    async fn get(&self, url: &str) -> Result<String, TransportError>;

    /// POSTs a JSON `body`, optionally with a bearer token, and returns the body
    async fn post(
        &self,
        url: &str,
        body: &str,
        auth_token: Option<&str>,
    ) -> Result<String, TransportError>;
}

/// [`HttpClient`] backed by `reqwest`
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<String, TransportError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }

    async fn post(
        &self,
        url: &str,
        body: &str,
        auth_token: Option<&str>,
    ) -> Result<String, TransportError> {
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string());
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

/// An `eth_getLogs` query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    /// Positional topic filters; `None` matches anything
    pub topics: Vec<Option<H256>>,
    pub from_block: u64,
    pub to_block: u64,
}

impl LogFilter {
    fn to_params(&self) -> Value {
        json!({
            "address": self.address,
            "topics": self.topics,
            "fromBlock": format!("0x{:x}", self.from_block),
            "toBlock": format!("0x{:x}", self.to_block),
        })
    }
}

/// The Ethereum node calls the core needs
#[async_trait]
pub trait JsonRpc: Send + Sync {
    /// `eth_call` against the latest block
    async fn eth_call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, TransportError>;

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, TransportError>;

    /// Pending transaction count of `address`
    async fn get_transaction_count(&self, address: Address) -> Result<U256, TransportError>;

    async fn get_gas_price(&self) -> Result<U256, TransportError>;

    /// Broadcasts a signed transaction and returns its hash
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256, TransportError>;

    /// `None` while the transaction is not mined
    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, TransportError>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC 2.0 client over an [`HttpClient`]
pub struct HttpJsonRpc {
    rpc_url: String,
    http: Arc<dyn HttpClient>,
    next_id: AtomicU64,
}

impl HttpJsonRpc {
    pub fn new(rpc_url: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            http,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Sends one request; a `null` result is returned as [`Value::Null`]
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, url = %self.rpc_url, "json-rpc request");

        let raw = self
            .http
            .post(&self.rpc_url, &body.to_string(), None)
            .await?;
        let response: RpcResponse = serde_json::from_str(&raw)?;

        if let Some(error) = response.error {
            return Err(TransportError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result)
    }

    async fn request_required<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, TransportError> {
        let result = self.request(method, params).await?;
        if result.is_null() {
            return Err(TransportError::MissingResult(method.to_string()));
        }
        Ok(serde_json::from_value(result)?)
    }
}

#[async_trait]
impl JsonRpc for HttpJsonRpc {
    async fn eth_call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, TransportError> {
        let params = json!([
            { "to": to, "data": format!("0x{}", hex::encode(data)) },
            "latest"
        ]);
        let result: Bytes = self.request_required("eth_call", params).await?;
        Ok(result.to_vec())
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, TransportError> {
        self.request_required("eth_getLogs", json!([filter.to_params()]))
            .await
    }

    async fn get_transaction_count(&self, address: Address) -> Result<U256, TransportError> {
        self.request_required("eth_getTransactionCount", json!([address, "pending"]))
            .await
    }

    async fn get_gas_price(&self) -> Result<U256, TransportError> {
        self.request_required("eth_gasPrice", json!([])).await
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256, TransportError> {
        let params = json!([format!("0x{}", hex::encode(raw))]);
        self.request_required("eth_sendRawTransaction", params)
            .await
    }

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, TransportError> {
        let result = self
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;
        Ok(serde_json::from_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Answers every POST with the next canned body and records the requests
    #[derive(Default)]
    struct CannedHttp {
        responses: Mutex<Vec<String>>,
        requests: Mutex<Vec<Value>>,
    }

    impl CannedHttp {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().rev().map(|s| s.to_string()).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpClient for CannedHttp {
        async fn get(&self, url: &str) -> Result<String, TransportError> {
            Err(TransportError::Status {
                status: 404,
                url: url.to_string(),
            })
        }

        async fn post(
            &self,
            _url: &str,
            body: &str,
            _auth_token: Option<&str>,
        ) -> Result<String, TransportError> {
            self.requests.lock().push(serde_json::from_str(body)?);
            self.responses
                .lock()
                .pop()
                .ok_or_else(|| TransportError::MissingResult("no canned response".into()))
        }
    }

    #[tokio::test]
    async fn test_eth_call_encodes_request_and_decodes_result() {
        let http = Arc::new(CannedHttp::new(&[
            r#"{"jsonrpc":"2.0","id":1,"result":"0x00ff"}"#,
        ]));
        let rpc = HttpJsonRpc::new("http://node", http.clone());
        let to: Address = "0xdca7ef03e98e0dc2b855be647c39abe984fcf21b".parse().unwrap();

        let result = rpc.eth_call(to, &[0xde, 0xad]).await.unwrap();

        assert_eq!(result, vec![0x00, 0xff]);
        let request = &http.requests.lock()[0];
        assert_eq!(request["method"], "eth_call");
        assert_eq!(request["params"][0]["data"], "0xdead");
        assert_eq!(
            request["params"][0]["to"],
            "0xdca7ef03e98e0dc2b855be647c39abe984fcf21b"
        );
        assert_eq!(request["params"][1], "latest");
    }

    #[tokio::test]
    async fn test_rpc_error_object_is_surfaced() {
        let http = Arc::new(CannedHttp::new(&[
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"nonce too low"}}"#,
        ]));
        let rpc = HttpJsonRpc::new("http://node", http);

        let err = rpc.send_raw_transaction(&[0x01]).await.unwrap_err();
        assert!(matches!(err, TransportError::Rpc { code: -32000, .. }));
    }

    #[tokio::test]
    async fn test_quantities_and_missing_receipt() {
        let http = Arc::new(CannedHttp::new(&[
            r#"{"jsonrpc":"2.0","id":1,"result":"0x4a817c800"}"#,
            r#"{"jsonrpc":"2.0","id":2,"result":null}"#,
            r#"{"jsonrpc":"2.0","id":3,"result":null}"#,
        ]));
        let rpc = HttpJsonRpc::new("http://node", http);

        assert_eq!(rpc.get_gas_price().await.unwrap(), U256::from(20_000_000_000u64));
        assert_eq!(rpc.get_transaction_receipt(H256::zero()).await.unwrap(), None);
        assert!(matches!(
            rpc.get_transaction_count(Address::zero()).await,
            Err(TransportError::MissingResult(_))
        ));
    }

    #[tokio::test]
    async fn test_log_filter_params() {
        let http = Arc::new(CannedHttp::new(&[r#"{"jsonrpc":"2.0","id":1,"result":[]}"#]));
        let rpc = HttpJsonRpc::new("http://node", http.clone());
        let filter = LogFilter {
            address: Address::zero(),
            topics: vec![None, Some(H256::repeat_byte(0x11))],
            from_block: 255,
            to_block: 255,
        };

        assert!(rpc.get_logs(&filter).await.unwrap().is_empty());
        let params = &http.requests.lock()[0]["params"][0];
        assert_eq!(params["fromBlock"], "0xff");
        assert_eq!(params["toBlock"], "0xff");
        assert!(params["topics"][0].is_null());
    }
}
