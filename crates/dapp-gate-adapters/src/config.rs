use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use dapp_gate_core::BackgroundConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be an unsigned integer, got {value:?}")]
    NotANumber { var: &'static str, value: String },
    #[error("{var} entry {entry:?} must look like chain=url")]
    BadRpcEntry { var: &'static str, entry: String },
}

#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Chain slug -> JSON-RPC endpoint.
    pub rpc_urls: BTreeMap<String, String>,
    pub http_timeout_ms: u64,
    /// `None` keeps every store in memory.
    pub store_dir: Option<PathBuf>,
    pub debounce_ms: u64,
    pub gas_estimate_timeout_ms: u64,
    pub subject_capacity: usize,
    pub base_fee_multiplier: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            rpc_urls: BTreeMap::new(),
            http_timeout_ms: 15_000,
            store_dir: None,
            debounce_ms: 300,
            gas_estimate_timeout_ms: 3_000,
            subject_capacity: 64,
            base_fee_multiplier: 2,
        }
    }
}

const RPC_URLS: &str = "DAPP_GATE_RPC_URLS";
const HTTP_TIMEOUT_MS: &str = "DAPP_GATE_HTTP_TIMEOUT_MS";
const STORE_DIR: &str = "DAPP_GATE_STORE_DIR";
const DEBOUNCE_MS: &str = "DAPP_GATE_DEBOUNCE_MS";
const GAS_TIMEOUT_MS: &str = "DAPP_GATE_GAS_TIMEOUT_MS";
const BASE_FEE_MULTIPLIER: &str = "DAPP_GATE_BASE_FEE_MULTIPLIER";

impl AdapterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the config from `lookup`, falling back to defaults for unset variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(raw) = lookup(RPC_URLS) {
            cfg.rpc_urls = parse_rpc_urls(&raw)?;
        }
        if let Some(raw) = lookup(HTTP_TIMEOUT_MS) {
            cfg.http_timeout_ms = parse_u64(HTTP_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(STORE_DIR).filter(|s| !s.trim().is_empty()) {
            cfg.store_dir = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup(DEBOUNCE_MS) {
            cfg.debounce_ms = parse_u64(DEBOUNCE_MS, &raw)?;
        }
        if let Some(raw) = lookup(GAS_TIMEOUT_MS) {
            cfg.gas_estimate_timeout_ms = parse_u64(GAS_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(BASE_FEE_MULTIPLIER) {
            cfg.base_fee_multiplier = parse_u64(BASE_FEE_MULTIPLIER, &raw)?;
        }
        Ok(cfg)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn background_config(&self) -> BackgroundConfig {
        BackgroundConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            gas_estimate_timeout: Duration::from_millis(self.gas_estimate_timeout_ms),
            subject_capacity: self.subject_capacity,
        }
    }
}

fn parse_u64(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::NotANumber {
        var,
        value: raw.to_owned(),
    })
}

/// `ethereum=https://a,moonbeam=https://b`
fn parse_rpc_urls(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((chain, url)) if !chain.trim().is_empty() && !url.trim().is_empty() => {
                Ok((chain.trim().to_owned(), url.trim().to_owned()))
            }
            _ => Err(ConfigError::BadRpcEntry {
                var: RPC_URLS,
                entry: entry.to_owned(),
            }),
        })
        .collect()
}
