//! Network configuration and protocol defaults.
//!
//! [`Networks`] maps Ethereum network ids to the endpoints and contract addresses
//! the resolvers and signers need. The built-in table covers the public networks
//! the legacy contracts were deployed to; entries can be replaced with
//! [`Networks::register`] or loaded from JSON.

use std::collections::HashMap;

use ethers_core::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// ERC-1056 (ethr DID) registry, same address on every public network
pub const DEFAULT_ETHR_DID_REGISTRY: &str = "0xdca7ef03e98e0dc2b855be647c39abe984fcf21b";

/// Gateway used to fetch legacy profile documents
pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.infura.io";

/// Tolerated clock drift when checking `iat`, in seconds
pub const JWT_CLOCK_SKEW_SECONDS: u64 = 300;

/// Validity used by [`crate::Credentials::sign_jwt`] when none is given
pub const DEFAULT_JWT_VALIDITY_SECONDS: u64 = 300;

/// Gas limit for registry mutations
pub const DEFAULT_REGISTRY_GAS_LIMIT: u64 = 70_000;

/// Gas limit for relayed transactions when the caller leaves it empty
pub const DEFAULT_GAS_LIMIT: u64 = 3_000_000;

/// 20 gwei
pub const DEFAULT_GAS_PRICE: u64 = 20_000_000_000;

/// Endpoints and contract addresses of one Ethereum network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthNetwork {
    /// ex: "rinkeby"
    pub name: String,

    /// Hex encoded network id, ex: "0x4"
    pub network_id: String,

    /// JSON-RPC endpoint
    pub rpc_url: String,

    #[serde(default)]
    pub ethr_did_registry: Option<Address>,

    /// Legacy `uport` registry contract
    #[serde(default)]
    pub uport_registry: Option<Address>,

    /// Meta transaction relay contract
    #[serde(default)]
    pub tx_relay_address: Option<Address>,

    /// Identity manager forwarding calls through proxy contracts
    #[serde(default)]
    pub identity_manager_address: Option<Address>,

    #[serde(default)]
    pub explorer_url: Option<String>,
}

/// Lookup table of configured networks
#[derive(Debug, Clone)]
pub struct Networks {
    networks: HashMap<String, EthNetwork>,
}

impl Networks {
    /// A table without any network
    pub fn empty() -> Self {
        Self {
            networks: HashMap::new(),
        }
    }

    /// Loads a JSON array of [`EthNetwork`] on top of the built-in table
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let overrides: Vec<EthNetwork> = serde_json::from_str(json)
            .map_err(|e| Error::InvalidArgument(format!("network configuration: {e}")))?;
        let mut networks = Self::default();
        for network in overrides {
            networks.register(network);
        }
        Ok(networks)
    }

    /// Adds or replaces the network with the same id
    pub fn register(&mut self, network: EthNetwork) {
        self.networks
            .insert(normalize_network_id(&network.network_id), network);
    }

    /// Looks up a network by id; `0x04`, `0x4` and `4` are the same network
    pub fn get(&self, network_id: &str) -> Result<&EthNetwork, Error> {
        self.networks
            .get(&normalize_network_id(network_id))
            .ok_or_else(|| Error::InvalidArgument(format!("network [{network_id}] not configured")))
    }

    pub fn mainnet(&self) -> Result<&EthNetwork, Error> {
        self.get("0x1")
    }

    pub fn rinkeby(&self) -> Result<&EthNetwork, Error> {
        self.get("0x4")
    }
}

impl Default for Networks {
    fn default() -> Self {
        let mut networks = Self::empty();
        for (name, id, uport_registry, tx_relay) in [
            (
                "mainnet",
                "0x1",
                "ab5c8051b9a1df1aab0149f8b0630848b7ecabf6",
                "ec2642cd5a47fd5cca2a8a280c3b5f88828aa578",
            ),
            (
                "ropsten",
                "0x3",
                "41566e3a081f5032bdcad470adb797635ddfe1f0",
                "a5e04cf2942868f5a66b9f7db790b8ab662039d5",
            ),
            (
                "rinkeby",
                "0x4",
                "2cc31912b2b0f3075a87b3640923d45a26cef3ee",
                "da8c6dce9e9a85e6f9df7b09b2354da44cb48331",
            ),
            (
                "kovan",
                "0x2a",
                "5f8e9351dc2d238fb878b6ae43aa740d62fc9758",
                "a9235151d3afa7912e9091ab76a36cbabe219a0c",
            ),
        ] {
            let explorer = if name == "mainnet" {
                "https://etherscan.io".to_string()
            } else {
                format!("https://{name}.etherscan.io")
            };
            networks.register(EthNetwork {
                name: name.to_string(),
                network_id: id.to_string(),
                rpc_url: format!("https://{name}.infura.io/v3/"),
                ethr_did_registry: parse_address(DEFAULT_ETHR_DID_REGISTRY),
                uport_registry: parse_address(uport_registry),
                tx_relay_address: parse_address(tx_relay),
                identity_manager_address: None,
                explorer_url: Some(explorer),
            });
        }
        networks
    }
}

fn parse_address(hex: &str) -> Option<Address> {
    hex.trim_start_matches("0x").parse().ok()
}

/// `0x0004` → `0x4`
pub fn normalize_network_id(id: &str) -> String {
    let digits = id
        .trim_start_matches("0x")
        .trim_start_matches("0X")
        .trim_start_matches('0')
        .to_lowercase();
    if digits.is_empty() {
        "0x0".to_string()
    } else {
        format!("0x{digits}")
    }
}
