use std::collections::BTreeMap;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{load_json, save_json, BackgroundState, CurrentAccountInfo, CURRENT_ACCOUNT_KEY};
use crate::domain::{
    ApiItemState, BalanceItem, BalanceJson, ChainRegistry, CrowdloanItem, CrowdloanJson,
    CrowdloanParaState, NftCollection, NftCollectionJson, NftItem, NftJson, StakingItem,
    StakingJson, TransactionHistoryItem,
};
use crate::errors::ValidationError;
use crate::ports::KeyValueStore;

const BALANCE_CHANNEL: &str = "setBalanceItem";
const STAKING_CHANNEL: &str = "setStakingItem";
const CROWDLOAN_CHANNEL: &str = "setCrowdloanItem";
const NFT_CHANNEL: &str = "saveNft";
const NFT_COLLECTION_CHANNEL: &str = "saveNftCollection";
const CHAIN_REGISTRY_CHANNEL: &str = "setChainRegistry";
const HISTORY_CHANNEL: &str = "setHistory";

fn ready_only<T: Clone>(
    map: &BTreeMap<String, T>,
    state: impl Fn(&T) -> ApiItemState,
) -> BTreeMap<String, T> {
    map.iter()
        .filter(|(_, item)| state(item) == ApiItemState::Ready)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl BackgroundState {
    // -- balance --------------------------------------------------------------------------

    pub async fn get_balance(&self) -> BalanceJson {
        BalanceJson {
            details: self.inner.maps.read().await.balance.clone(),
        }
    }

    pub fn subscribe_balance(&self) -> broadcast::Receiver<BalanceJson> {
        self.inner.subjects.balance.subscribe()
    }

    pub async fn set_balance_item(&self, network_key: &str, mut item: BalanceItem) {
        item.timestamp = self.now();
        self.inner
            .maps
            .write()
            .await
            .balance
            .insert(network_key.to_owned(), item);

        self.lazy_next(BALANCE_CHANNEL, |state| async move {
            let (account, ready) = {
                let maps = state.inner.maps.read().await;
                (
                    maps.current_account.clone(),
                    ready_only(&maps.balance, |i| i.state),
                )
            };
            state
                .persist_for_account(state.stores().balance.as_ref(), account, &ready)
                .await;
            let _ = state.inner.subjects.balance.send(state.get_balance().await);
        });
    }

    pub async fn get_stored_balance(
        &self,
        address: &str,
    ) -> Result<BTreeMap<String, BalanceItem>, ValidationError> {
        Ok(load_json(self.stores().balance.as_ref(), address)
            .await?
            .unwrap_or_default())
    }

    // -- staking --------------------------------------------------------------------------

    pub async fn get_staking(&self) -> StakingJson {
        StakingJson {
            ready: true,
            details: self.inner.maps.read().await.staking.clone(),
        }
    }

    pub fn subscribe_staking(&self) -> broadcast::Receiver<StakingJson> {
        self.inner.subjects.staking.subscribe()
    }

    /// Only ready items that change the stored balance (or replace a missing/pending one) are
    /// applied.
    pub async fn set_staking_item(&self, network_key: &str, mut item: StakingItem) -> bool {
        if item.state != ApiItemState::Ready {
            return false;
        }
        item.timestamp = self.now();
        {
            let mut maps = self.inner.maps.write().await;
            let changed = match maps.staking.get(network_key) {
                None => true,
                Some(old) => old.balance != item.balance || old.state == ApiItemState::Pending,
            };
            if !changed {
                return false;
            }
            maps.staking.insert(network_key.to_owned(), item);
        }

        self.lazy_next(STAKING_CHANNEL, |state| async move {
            let (account, ready) = {
                let maps = state.inner.maps.read().await;
                (
                    maps.current_account.clone(),
                    ready_only(&maps.staking, |i| i.state),
                )
            };
            if !ready.is_empty() {
                state
                    .persist_for_account(state.stores().staking.as_ref(), account, &ready)
                    .await;
            }
            let _ = state.inner.subjects.staking.send(state.get_staking().await);
        });
        true
    }

    pub async fn get_stored_staking(
        &self,
        address: &str,
    ) -> Result<BTreeMap<String, StakingItem>, ValidationError> {
        Ok(load_json(self.stores().staking.as_ref(), address)
            .await?
            .unwrap_or_default())
    }

    // -- crowdloan ------------------------------------------------------------------------

    pub async fn get_crowdloan(&self) -> CrowdloanJson {
        CrowdloanJson {
            details: self.inner.maps.read().await.crowdloan.clone(),
        }
    }

    pub fn subscribe_crowdloan(&self) -> broadcast::Receiver<CrowdloanJson> {
        self.inner.subjects.crowdloan.subscribe()
    }

    /// Records the fund status of a parachain crowdloan; applied to items set afterwards.
    pub async fn set_crowdloan_fund_status(&self, network_key: &str, status: CrowdloanParaState) {
        self.inner
            .maps
            .write()
            .await
            .crowdloan_funds
            .insert(network_key.to_owned(), status);
    }

    pub async fn set_crowdloan_item(&self, network_key: &str, mut item: CrowdloanItem) {
        item.timestamp = self.now();
        {
            let mut maps = self.inner.maps.write().await;
            if let Some(status) = maps.crowdloan_funds.get(network_key) {
                item.para_state = Some(*status);
            }
            maps.crowdloan.insert(network_key.to_owned(), item);
        }

        self.lazy_next(CROWDLOAN_CHANNEL, |state| async move {
            let (account, ready) = {
                let maps = state.inner.maps.read().await;
                (
                    maps.current_account.clone(),
                    ready_only(&maps.crowdloan, |i| i.state),
                )
            };
            state
                .persist_for_account(state.stores().crowdloan.as_ref(), account, &ready)
                .await;
            let _ = state
                .inner
                .subjects
                .crowdloan
                .send(state.get_crowdloan().await);
        });
    }

    pub async fn get_stored_crowdloan(
        &self,
        address: &str,
    ) -> Result<BTreeMap<String, CrowdloanItem>, ValidationError> {
        Ok(load_json(self.stores().crowdloan.as_ref(), address)
            .await?
            .unwrap_or_default())
    }

    // -- nft ------------------------------------------------------------------------------

    pub async fn get_nft(&self) -> NftJson {
        self.inner.maps.read().await.nft.clone()
    }

    pub fn subscribe_nft(&self) -> broadcast::Receiver<NftJson> {
        self.inner.subjects.nft.subscribe()
    }

    pub async fn set_nft(&self, data: NftJson) {
        self.inner.maps.write().await.nft = data;
        self.publish_nft_changed();
    }

    /// Inserts `item`, replacing an item with the same collection and id.
    pub async fn update_nft(&self, item: NftItem) {
        {
            let mut maps = self.inner.maps.write().await;
            let list = &mut maps.nft.nft_list;
            match list
                .iter_mut()
                .find(|n| n.collection_id == item.collection_id && n.id == item.id)
            {
                Some(existing) => *existing = item,
                None => list.push(item),
            }
            let total = maps.nft.nft_list.len();
            maps.nft.total = total;
        }
        self.publish_nft_changed();
    }

    pub async fn update_nft_ready(&self, ready: bool) {
        self.inner.maps.write().await.nft.ready = ready;
        self.publish_nft_changed();
    }

    fn publish_nft_changed(&self) {
        self.lazy_next(NFT_CHANNEL, |state| async move {
            let (account, nft) = {
                let maps = state.inner.maps.read().await;
                (maps.current_account.clone(), maps.nft.clone())
            };
            state
                .persist_for_account(state.stores().nft.as_ref(), account, &nft)
                .await;
            let _ = state.inner.subjects.nft.send(nft);
        });
    }

    pub async fn get_nft_collection(&self) -> NftCollectionJson {
        self.inner.maps.read().await.nft_collection.clone()
    }

    pub fn subscribe_nft_collection(&self) -> broadcast::Receiver<NftCollectionJson> {
        self.inner.subjects.nft_collection.subscribe()
    }

    pub async fn set_nft_collection(&self, data: NftCollectionJson) {
        self.inner.maps.write().await.nft_collection = data;
        self.publish_nft_collection_changed();
    }

    pub async fn update_nft_collection(&self, collection: NftCollection) {
        {
            let mut maps = self.inner.maps.write().await;
            let list = &mut maps.nft_collection.nft_collection_list;
            match list.iter_mut().find(|c| {
                c.collection_id == collection.collection_id && c.chain == collection.chain
            }) {
                Some(existing) => *existing = collection,
                None => list.push(collection),
            }
        }
        self.publish_nft_collection_changed();
    }

    fn publish_nft_collection_changed(&self) {
        self.lazy_next(NFT_COLLECTION_CHANNEL, |state| async move {
            let (account, collections) = {
                let maps = state.inner.maps.read().await;
                (maps.current_account.clone(), maps.nft_collection.clone())
            };
            state
                .persist_for_account(state.stores().nft_collection.as_ref(), account, &collections)
                .await;
            let _ = state.inner.subjects.nft_collection.send(collections);
        });
    }

    // -- chain registry -------------------------------------------------------------------

    pub async fn get_chain_registry_map(&self) -> BTreeMap<String, ChainRegistry> {
        self.inner.maps.read().await.chain_registry.clone()
    }

    pub fn subscribe_chain_registry_map(
        &self,
    ) -> broadcast::Receiver<BTreeMap<String, ChainRegistry>> {
        self.inner.subjects.chain_registry.subscribe()
    }

    pub async fn set_chain_registry_item(&self, network_key: &str, registry: ChainRegistry) {
        self.inner
            .maps
            .write()
            .await
            .chain_registry
            .insert(network_key.to_owned(), registry);
        self.lazy_next(CHAIN_REGISTRY_CHANNEL, |state| async move {
            let map = state.get_chain_registry_map().await;
            let _ = state.inner.subjects.chain_registry.send(map);
        });
    }

    // -- history --------------------------------------------------------------------------

    pub async fn get_history_map(&self) -> BTreeMap<String, Vec<TransactionHistoryItem>> {
        self.inner.maps.read().await.history.clone()
    }

    pub fn subscribe_history(
        &self,
    ) -> broadcast::Receiver<BTreeMap<String, Vec<TransactionHistoryItem>>> {
        self.inner.subjects.history.subscribe()
    }

    pub async fn set_history(&self, network_key: &str, items: Vec<TransactionHistoryItem>) {
        self.inner
            .maps
            .write()
            .await
            .history
            .insert(network_key.to_owned(), items);
        self.lazy_next(HISTORY_CHANNEL, |state| async move {
            state.save_history().await;
            let map = state.get_history_map().await;
            let _ = state.inner.subjects.history.send(map);
        });
    }

    /// Adds one history entry (deduplicated by extrinsic hash, newest first), saves and
    /// broadcasts immediately.
    pub async fn add_transaction_history(&self, network_key: &str, item: TransactionHistoryItem) {
        {
            let mut maps = self.inner.maps.write().await;
            let items = maps.history.entry(network_key.to_owned()).or_default();
            if !items.iter().any(|old| old.extrinsic_hash == item.extrinsic_hash) {
                items.push(item);
            }
            items.sort_by(|a, b| b.time.cmp(&a.time));
        }
        self.save_history().await;
        let map = self.get_history_map().await;
        let _ = self.inner.subjects.history.send(map);
    }

    async fn save_history(&self) {
        let (account, history) = {
            let maps = self.inner.maps.read().await;
            let history: BTreeMap<String, Vec<TransactionHistoryItem>> = maps
                .history
                .iter()
                .filter(|(_, items)| !items.is_empty())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            (maps.current_account.clone(), history)
        };
        self.persist_for_account(self.stores().history.as_ref(), account, &history)
            .await;
    }

    // -- account switch -------------------------------------------------------------------

    /// Makes `address` the current account and reloads its stored per-chain maps.
    pub async fn switch_account(&self, address: &str) -> Result<(), ValidationError> {
        save_json(
            self.stores().settings.as_ref(),
            CURRENT_ACCOUNT_KEY,
            &CurrentAccountInfo {
                address: address.to_owned(),
            },
        )
        .await?;

        let (balance, crowdloan, staking, history) = tokio::try_join!(
            self.get_stored_balance(address),
            self.get_stored_crowdloan(address),
            self.get_stored_staking(address),
            async {
                Ok::<_, ValidationError>(
                    load_json::<BTreeMap<String, Vec<TransactionHistoryItem>>>(
                        self.stores().history.as_ref(),
                        address,
                    )
                    .await?
                    .unwrap_or_default(),
                )
            },
        )?;

        {
            let mut maps = self.inner.maps.write().await;
            maps.current_account = Some(address.to_owned());
            maps.balance = balance.clone();
            maps.crowdloan = crowdloan.clone();
            maps.staking = staking.clone();
            maps.history = history.clone();
        }
        debug!(address, "switched current account");

        let _ = self.inner.subjects.balance.send(BalanceJson { details: balance });
        let _ = self
            .inner
            .subjects
            .crowdloan
            .send(CrowdloanJson { details: crowdloan });
        let _ = self.inner.subjects.staking.send(StakingJson {
            ready: false,
            details: staking,
        });
        let _ = self.inner.subjects.history.send(history);
        Ok(())
    }

    async fn persist_for_account<T: serde::Serialize>(
        &self,
        store: &dyn KeyValueStore,
        account: Option<String>,
        value: &T,
    ) {
        let Some(account) = account else {
            debug!("no current account, skipping persistence");
            return;
        };
        if let Err(e) = save_json(store, &account, value).await {
            warn!(account = %account, "failed to persist background item: {e}");
        }
    }
}
