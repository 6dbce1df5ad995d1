//! In-memory collaborators shared by the unit tests.

use std::collections::HashMap;

use async_trait::async_trait;
use ethers_core::types::{Address, Log, TransactionReceipt, H256, U256};
use ethers_core::utils::keccak256;
use parking_lot::Mutex;

use crate::error::TransportError;
use crate::transport::{HttpClient, JsonRpc, LogFilter};

/// Serves fixed bodies per URL
#[derive(Default)]
pub struct FakeHttp {
    pages: Mutex<HashMap<String, String>>,
    pub requested: Mutex<Vec<String>>,
}

impl FakeHttp {
    pub fn with_page(self, url: &str, body: &str) -> Self {
        self.pages.lock().insert(url.to_string(), body.to_string());
        self
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn get(&self, url: &str) -> Result<String, TransportError> {
        self.requested.lock().push(url.to_string());
        self.pages
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Status {
                status: 404,
                url: url.to_string(),
            })
    }

    async fn post(
        &self,
        url: &str,
        _body: &str,
        _auth_token: Option<&str>,
    ) -> Result<String, TransportError> {
        self.get(url).await
    }
}

/// Answers `eth_call` by exact calldata, `eth_getLogs` by block, and records
/// broadcast transactions
#[derive(Default)]
pub struct FakeRpc {
    calls: Mutex<HashMap<(Address, Vec<u8>), Vec<u8>>>,
    logs: Mutex<HashMap<u64, Vec<Log>>>,
    pub nonce: Mutex<U256>,
    pub gas_price: Mutex<U256>,
    pub sent: Mutex<Vec<Vec<u8>>>,
    pub log_queries: Mutex<Vec<LogFilter>>,
    pub fail_calls: Mutex<bool>,
}

impl FakeRpc {
    pub fn on_call(&self, to: Address, data: Vec<u8>, result: Vec<u8>) {
        self.calls.lock().insert((to, data), result);
    }

    pub fn add_log(&self, block: u64, log: Log) {
        self.logs.lock().entry(block).or_default().push(log);
    }
}

#[async_trait]
impl JsonRpc for FakeRpc {
    async fn eth_call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, TransportError> {
        if *self.fail_calls.lock() {
            return Err(TransportError::Rpc {
                code: -32603,
                message: "node unavailable".into(),
            });
        }
        Ok(self
            .calls
            .lock()
            .get(&(to, data.to_vec()))
            .cloned()
            .unwrap_or_else(|| vec![0u8; 32]))
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, TransportError> {
        self.log_queries.lock().push(filter.clone());
        let logs = self.logs.lock();
        Ok((filter.from_block..=filter.to_block)
            .flat_map(|block| logs.get(&block).cloned().unwrap_or_default())
            .filter(|log| {
                filter.topics.iter().enumerate().all(|(i, topic)| match topic {
                    Some(topic) => log.topics.get(i) == Some(topic),
                    None => true,
                })
            })
            .collect())
    }

    async fn get_transaction_count(&self, _address: Address) -> Result<U256, TransportError> {
        Ok(*self.nonce.lock())
    }

    async fn get_gas_price(&self) -> Result<U256, TransportError> {
        Ok(*self.gas_price.lock())
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256, TransportError> {
        self.sent.lock().push(raw.to_vec());
        Ok(H256::from(keccak256(raw)))
    }

    async fn get_transaction_receipt(
        &self,
        _hash: H256,
    ) -> Result<Option<TransactionReceipt>, TransportError> {
        Ok(None)
    }
}
