use std::sync::{Arc, RwLock};

use tracing::warn;

use dapp_gate_core::domain::{AccountMeta, KeypairType, KeyringPair};
use dapp_gate_core::ports::KeyringPort;
use dapp_gate_core::utils::is_same_address;

/// Account registry without key material. Lookups compare EVM addresses case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKeyring {
    pairs: Arc<RwLock<Vec<KeyringPair>>>,
}

impl InMemoryKeyring {
    pub fn new(pairs: Vec<KeyringPair>) -> Self {
        Self {
            pairs: Arc::new(RwLock::new(pairs)),
        }
    }

    /// Adds `pair`, replacing an existing entry for the same address.
    pub fn add_pair(&self, pair: KeyringPair) {
        let Ok(mut g) = self.pairs.write() else {
            warn!("keyring lock poisoned, pair not added");
            return;
        };
        g.retain(|p| !is_same_address(&p.address, &pair.address));
        g.push(pair);
    }

    pub fn add_evm_account(&self, address: &str, name: &str, is_external: bool) {
        self.add_pair(KeyringPair {
            address: address.to_owned(),
            key_type: KeypairType::Ethereum,
            meta: AccountMeta {
                name: Some(name.to_owned()),
                is_external,
                ..AccountMeta::default()
            },
        });
    }

    pub fn forget(&self, address: &str) -> bool {
        let Ok(mut g) = self.pairs.write() else {
            return false;
        };
        let before = g.len();
        g.retain(|p| !is_same_address(&p.address, address));
        g.len() != before
    }
}

impl KeyringPort for InMemoryKeyring {
    fn get_pair(&self, address: &str) -> Option<KeyringPair> {
        self.pairs
            .read()
            .ok()?
            .iter()
            .find(|p| is_same_address(&p.address, address))
            .cloned()
    }

    fn accounts(&self) -> Vec<KeyringPair> {
        self.pairs.read().map(|g| g.clone()).unwrap_or_default()
    }
}
