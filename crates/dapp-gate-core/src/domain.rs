use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimestampMs(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Evm,
    Substrate,
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

/// Persisted authorization record for a single website origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUrlInfo {
    pub count: u64,
    pub id: String,
    pub is_allowed: bool,
    pub is_allowed_map: BTreeMap<String, bool>,
    pub origin: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_evm_network_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_type: Option<AccessType>,
}

impl AuthUrlInfo {
    /// True when at least one address is opted in for this origin.
    pub fn is_connected(&self) -> bool {
        self.is_allowed_map.values().any(|allowed| *allowed)
    }

    pub fn allows(&self, address: &str) -> bool {
        self.is_allowed && self.is_allowed_map.get(address).copied().unwrap_or(false)
    }
}

/// Origin (stripped url) -> authorization record.
pub type AuthUrls = BTreeMap<String, AuthUrlInfo>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestAuthorizeTab {
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_type: Option<AccessType>,
}

/// Snapshot of a pending authorization prompt, as seen by UI subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub id: String,
    pub request: RequestAuthorizeTab,
    pub url: String,
}

/// User decision for a pending authorization prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResolution {
    pub result: bool,
    #[serde(default)]
    pub accounts: Vec<String>,
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeypairType {
    Ethereum,
    Sr25519,
    Ed25519,
    Ecdsa,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Externally custodied (QR signer, watch-only, hardware): cannot sign in-process.
    #[serde(default)]
    pub is_external: bool,
    #[serde(default)]
    pub is_hardware: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genesis_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyringPair {
    pub address: String,
    pub key_type: KeypairType,
    #[serde(default)]
    pub meta: AccountMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountJson {
    pub address: String,
    #[serde(flatten)]
    pub meta: AccountMeta,
}

impl From<&KeyringPair> for AccountJson {
    fn from(pair: &KeyringPair) -> Self {
        Self {
            address: pair.address.clone(),
            meta: pair.meta.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chains
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkStatus {
    Connected,
    Connecting,
    #[default]
    Disconnected,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub slug: String,
    pub name: String,
    pub access_type: AccessType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm_chain_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainState {
    pub slug: String,
    pub active: bool,
    pub connection_status: NetworkStatus,
}

/// User-editable chain configuration, persisted in the network map store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkJson {
    pub key: String,
    pub chain: String,
    pub genesis_hash: String,
    #[serde(default)]
    pub is_ethereum: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub api_status: NetworkStatus,
    pub current_provider: String,
    #[serde(default)]
    pub custom_providers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_explorer: Option<String>,
}

impl NetworkJson {
    pub fn access_type(&self) -> AccessType {
        if self.is_ethereum {
            AccessType::Evm
        } else {
            AccessType::Substrate
        }
    }
}

// ---------------------------------------------------------------------------
// Per-chain background items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiItemState {
    #[default]
    Pending,
    Ready,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceItem {
    pub state: ApiItemState,
    #[serde(default)]
    pub timestamp: TimestampMs,
    #[serde(default)]
    pub free: String,
    #[serde(default)]
    pub reserved: String,
    #[serde(default)]
    pub frozen: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingItem {
    pub name: String,
    pub chain: String,
    pub state: ApiItemState,
    #[serde(default)]
    pub timestamp: TimestampMs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrowdloanParaState {
    Ongoing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrowdloanItem {
    pub state: ApiItemState,
    #[serde(default)]
    pub timestamp: TimestampMs,
    #[serde(default)]
    pub contribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub para_state: Option<CrowdloanParaState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftItem {
    pub id: String,
    pub collection_id: String,
    pub chain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftCollection {
    pub collection_id: String,
    pub chain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u32,
    #[serde(default)]
    pub is_main_token: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub erc20_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRegistry {
    pub chain_decimals: Vec<u32>,
    pub chain_tokens: Vec<String>,
    pub token_map: BTreeMap<String, TokenInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvmTokenKind {
    Erc20,
    Erc721,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEvmToken {
    pub smart_contract: String,
    pub chain: String,
    #[serde(rename = "type")]
    pub kind: EvmTokenKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmTokenJson {
    pub erc20: Vec<CustomEvmToken>,
    pub erc721: Vec<CustomEvmToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionHistoryItem {
    pub extrinsic_hash: String,
    pub network_key: String,
    pub time: u64,
    pub is_success: bool,
    #[serde(default)]
    pub change: String,
    #[serde(default)]
    pub fee: String,
    #[serde(default)]
    pub action: String,
}

// ---------------------------------------------------------------------------
// Broadcast snapshots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceJson {
    pub details: BTreeMap<String, BalanceItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingJson {
    pub ready: bool,
    pub details: BTreeMap<String, StakingItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrowdloanJson {
    pub details: BTreeMap<String, CrowdloanItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftJson {
    pub ready: bool,
    pub total: usize,
    pub nft_list: Vec<NftItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftCollectionJson {
    pub ready: bool,
    pub nft_collection_list: Vec<NftCollection>,
}

// ---------------------------------------------------------------------------
// EVM requests
// ---------------------------------------------------------------------------

/// Numeric field as supplied by a dApp: hex string, decimal string or JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberLike {
    Number(serde_json::Number),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmSendTransactionParams {
    #[serde(default)]
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<NumberLike>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<NumberLike>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<NumberLike>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<NumberLike>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<NumberLike>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<NumberLike>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Transaction with numeric fields normalized to decimal strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionConfig {
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionValidate {
    pub transaction: TransactionConfig,
    /// Total fee upper bound in wei, decimal string. Empty when it could not be computed.
    pub estimate_gas: String,
    pub account: AccountJson,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmSignatureRequest {
    pub account: AccountJson,
    #[serde(rename = "type")]
    pub sign_type: String,
    pub payload: Value,
    pub hash_payload: String,
    pub can_sign: bool,
    pub id: String,
}

// ---------------------------------------------------------------------------
// WalletConnect
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WcNamespace {
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WcNamespaces {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eip155: Option<WcNamespace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polkadot: Option<WcNamespace>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WcSession {
    pub topic: String,
    pub namespaces: WcNamespaces,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Fee quote for the current network condition. `base_gas_fee` is set only on EIP-1559 chains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GasFeeParams {
    pub base_gas_fee: Option<alloy::primitives::U256>,
    pub max_priority_fee_per_gas: alloy::primitives::U256,
    pub max_fee_per_gas: alloy::primitives::U256,
    pub gas_price: alloy::primitives::U256,
}
