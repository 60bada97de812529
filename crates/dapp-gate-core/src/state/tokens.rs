use tokio::sync::broadcast;
use tracing::warn;

use super::{save_json, BackgroundState, EVM_TOKEN_KEY};
use crate::domain::{CustomEvmToken, EvmTokenJson, EvmTokenKind};
use crate::utils::is_same_address;

/// Identifies a token for [`BackgroundState::delete_evm_tokens`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmTokenTarget {
    pub chain: String,
    pub smart_contract: String,
    pub kind: EvmTokenKind,
}

fn same_token(a: &CustomEvmToken, chain: &str, contract: &str) -> bool {
    a.chain == chain && is_same_address(&a.smart_contract, contract)
}

impl BackgroundState {
    pub async fn get_evm_token_state(&self) -> EvmTokenJson {
        self.inner.maps.read().await.evm_tokens.clone()
    }

    pub fn subscribe_evm_token(&self) -> broadcast::Receiver<EvmTokenJson> {
        self.inner.subjects.evm_tokens.subscribe()
    }

    pub async fn active_erc20_tokens(&self) -> Vec<CustomEvmToken> {
        self.inner
            .maps
            .read()
            .await
            .evm_tokens
            .erc20
            .iter()
            .filter(|t| !t.is_deleted)
            .cloned()
            .collect()
    }

    pub async fn active_erc721_tokens(&self) -> Vec<CustomEvmToken> {
        self.inner
            .maps
            .read()
            .await
            .evm_tokens
            .erc721
            .iter()
            .filter(|t| !t.is_deleted)
            .cloned()
            .collect()
    }

    /// Adds a token, or replaces the one with the same chain and contract address.
    pub async fn upsert_evm_token(&self, token: CustomEvmToken) {
        {
            let mut maps = self.inner.maps.write().await;
            let list = match token.kind {
                EvmTokenKind::Erc20 => &mut maps.evm_tokens.erc20,
                EvmTokenKind::Erc721 => &mut maps.evm_tokens.erc721,
            };
            match list
                .iter_mut()
                .find(|t| same_token(t, &token.chain, &token.smart_contract))
            {
                Some(existing) => *existing = token,
                None => list.push(token),
            }
        }
        self.save_evm_tokens().await;
    }

    /// Custom tokens are removed; built-in tokens are only flagged as deleted so a later sync
    /// does not bring them back.
    pub async fn delete_evm_tokens(&self, targets: &[EvmTokenTarget]) {
        {
            let mut maps = self.inner.maps.write().await;
            for target in targets {
                let list = match target.kind {
                    EvmTokenKind::Erc20 => &mut maps.evm_tokens.erc20,
                    EvmTokenKind::Erc721 => &mut maps.evm_tokens.erc721,
                };
                list.retain(|t| !(t.is_custom && same_token(t, &target.chain, &target.smart_contract)));
                for token in list.iter_mut() {
                    if same_token(token, &target.chain, &target.smart_contract) {
                        token.is_deleted = true;
                    }
                }
            }
        }
        self.save_evm_tokens().await;
    }

    async fn save_evm_tokens(&self) {
        let tokens = self.get_evm_token_state().await;
        if let Err(e) = save_json(self.stores().evm_token.as_ref(), EVM_TOKEN_KEY, &tokens).await {
            warn!("failed to persist evm tokens: {e}");
        }
        let _ = self.inner.subjects.evm_tokens.send(tokens);
    }
}
