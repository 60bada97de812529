mod common;

use std::collections::BTreeMap;
use std::time::Duration;

use dapp_gate_core::domain::{
    ApiItemState, BalanceItem, CustomEvmToken, EvmTokenKind, NetworkJson, NetworkStatus,
    StakingItem,
};
use dapp_gate_core::ports::ChainRegistryPort;
use dapp_gate_core::state::EvmTokenTarget;

use common::{harness, ALICE, BOB, UNREACHABLE_HOST};

fn ready_balance(free: &str) -> BalanceItem {
    BalanceItem {
        state: ApiItemState::Ready,
        free: free.to_owned(),
        ..BalanceItem::default()
    }
}

fn staking(state: ApiItemState, balance: &str) -> StakingItem {
    StakingItem {
        name: "Moonbeam".to_owned(),
        chain: "moonbeam".to_owned(),
        state,
        balance: Some(balance.to_owned()),
        ..StakingItem::default()
    }
}

fn network(key: &str, active: bool) -> NetworkJson {
    NetworkJson {
        key: key.to_owned(),
        chain: key.to_owned(),
        genesis_hash: format!("0x{key}"),
        is_ethereum: true,
        active,
        api_status: NetworkStatus::Disconnected,
        current_provider: "default".to_owned(),
        custom_providers: BTreeMap::new(),
        native_token: None,
        decimals: Some(18),
        block_explorer: None,
    }
}

#[tokio::test(start_paused = true)]
async fn balance_burst_collapses_into_one_write_and_one_emission() {
    let h = harness();
    h.state.switch_account(ALICE).await.expect("switch");
    let mut updates = h.state.subscribe_balance();

    for chain in ["ethereum", "moonbeam", "polkadot"] {
        h.state.set_balance_item(chain, ready_balance("100")).await;
    }
    assert_eq!(h.stores.balance.write_count(), 0);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(h.stores.balance.write_count(), 1);
    let emitted = updates.try_recv().expect("one emission");
    assert_eq!(emitted.details.len(), 3);
    assert!(updates.try_recv().is_err());

    let stored = h.state.get_stored_balance(ALICE).await.expect("stored");
    assert_eq!(stored.len(), 3);
    assert!(stored.values().all(|item| item.timestamp.0 > 0));
}

#[tokio::test(start_paused = true)]
async fn only_ready_items_are_persisted() {
    let h = harness();
    h.state.switch_account(ALICE).await.expect("switch");

    h.state.set_balance_item("ethereum", ready_balance("5")).await;
    h.state
        .set_balance_item("moonbeam", BalanceItem::default())
        .await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(h.state.get_balance().await.details.len(), 2);
    let stored = h.state.get_stored_balance(ALICE).await.expect("stored");
    assert_eq!(stored.keys().collect::<Vec<_>>(), vec!["ethereum"]);
}

#[tokio::test(start_paused = true)]
async fn without_current_account_items_are_emitted_but_not_stored() {
    let h = harness();
    let mut updates = h.state.subscribe_balance();

    h.state.set_balance_item("ethereum", ready_balance("5")).await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(h.stores.balance.write_count(), 0);
    assert_eq!(updates.try_recv().expect("emission").details.len(), 1);
}

#[tokio::test]
async fn shutdown_flushes_pending_writes() {
    let h = harness();
    h.state.switch_account(ALICE).await.expect("switch");
    h.state.set_balance_item("ethereum", ready_balance("5")).await;
    assert_eq!(h.stores.balance.write_count(), 0);

    h.state.shutdown().await;
    assert_eq!(h.stores.balance.write_count(), 1);
    assert_eq!(
        h.state.get_stored_balance(ALICE).await.expect("stored")["ethereum"].free,
        "5"
    );
}

#[tokio::test]
async fn switching_account_reloads_its_stored_items() {
    let h = harness();
    h.state.switch_account(ALICE).await.expect("switch alice");
    h.state.set_balance_item("ethereum", ready_balance("7")).await;
    h.state.shutdown().await;

    h.state.switch_account(BOB).await.expect("switch bob");
    assert!(h.state.get_balance().await.details.is_empty());
    assert_eq!(h.state.current_account().await.as_deref(), Some(BOB));

    h.state.switch_account(ALICE).await.expect("switch back");
    assert_eq!(h.state.get_balance().await.details["ethereum"].free, "7");
}

#[tokio::test]
async fn staking_accepts_only_ready_changes() {
    let h = harness();

    assert!(!h
        .state
        .set_staking_item("moonbeam", staking(ApiItemState::Pending, "1"))
        .await);
    assert!(h
        .state
        .set_staking_item("moonbeam", staking(ApiItemState::Ready, "1"))
        .await);
    assert!(!h
        .state
        .set_staking_item("moonbeam", staking(ApiItemState::Ready, "1"))
        .await);
    assert!(h
        .state
        .set_staking_item("moonbeam", staking(ApiItemState::Ready, "2"))
        .await);
    assert_eq!(
        h.state.get_staking().await.details["moonbeam"].balance.as_deref(),
        Some("2")
    );
}

#[tokio::test]
async fn network_map_edits_drive_the_chain_registry() {
    let h = harness();
    h.state
        .init(vec![network("ethereum", true), network("moonbeam", false)])
        .await
        .expect("init");
    assert_eq!(h.state.get_ethereum_chains().await.len(), 2);

    assert!(h.state.enable_network_map("moonbeam").await.expect("enable"));
    assert!(h.state.get_chain_state_by_key("moonbeam").expect("moonbeam").active);
    let moonbeam = h.state.get_network_map_by_key("moonbeam").await.expect("moonbeam");
    assert!(moonbeam.active);
    assert_eq!(moonbeam.api_status, NetworkStatus::Connecting);

    assert!(h.state.disable_network_map("moonbeam").await.expect("disable"));
    assert!(!h.state.get_chain_state_by_key("moonbeam").expect("moonbeam").active);

    let mut custom = network("ethereum", true);
    custom.current_provider = "mine".to_owned();
    custom
        .custom_providers
        .insert("mine".to_owned(), "http://127.0.0.1:8545".to_owned());
    assert!(h.state.upsert_network_map(custom).await.expect("upsert"));
    assert_eq!(
        h.state
            .get_network_map_by_key("ethereum")
            .await
            .expect("ethereum")
            .current_provider,
        "mine"
    );
    assert!(h.stores.network_map.write_count() >= 3);
}

#[tokio::test]
async fn failed_network_edit_releases_the_lock() {
    let h = harness();
    h.state.init(vec![network("ethereum", true)]).await.expect("init");

    let err = h
        .state
        .remove_network_map("kusama")
        .await
        .expect_err("unknown network");
    assert!(err.to_string().contains("kusama"));
    assert!(!h.state.is_network_map_locked());

    assert!(h.state.remove_network_map("ethereum").await.expect("remove"));
    assert!(h.state.get_network_map().await.is_empty());
    assert!(!h.state.get_chain_state_by_key("ethereum").expect("ethereum").active);
}

#[tokio::test]
async fn failed_reconnect_leaves_the_network_map_unchanged() {
    let h = harness();
    h.state.init(vec![network("ethereum", true)]).await.expect("init");
    let before = h.state.get_network_map().await;
    let writes = h.stores.network_map.write_count();
    let mut updates = h.state.subscribe_network_map();

    let mut broken = network("ethereum", true);
    broken.current_provider = "broken".to_owned();
    broken
        .custom_providers
        .insert("broken".to_owned(), format!("http://{UNREACHABLE_HOST}"));
    let err = h.state.upsert_network_map(broken).await.expect_err("connect fails");
    assert!(err.to_string().contains(UNREACHABLE_HOST));

    assert_eq!(h.state.get_network_map().await, before);
    assert_eq!(h.stores.network_map.write_count(), writes);
    assert!(updates.try_recv().is_err());
    assert!(!h.state.is_network_map_locked());
    assert!(h.state.get_chain_state_by_key("ethereum").expect("ethereum").active);
    assert!(h.chains.evm_api("ethereum").is_some());
}

#[tokio::test]
async fn persisted_network_map_wins_over_defaults() {
    let h = harness();
    h.state.init(vec![network("ethereum", true)]).await.expect("init");
    h.state
        .update_network_status("ethereum", NetworkStatus::Connected)
        .await
        .expect("status");

    h.state
        .init(vec![network("ethereum", false), network("moonbeam", false)])
        .await
        .expect("re-init");
    let ethereum = h
        .state
        .get_network_map_by_key("ethereum")
        .await
        .expect("ethereum");
    assert!(ethereum.active);
    assert_eq!(ethereum.api_status, NetworkStatus::Connected);
    assert!(h.state.get_network_map_by_key("moonbeam").await.is_some());
}

#[tokio::test]
async fn custom_tokens_are_removed_and_builtin_ones_flagged() {
    let h = harness();
    let token = |contract: &str, is_custom: bool| CustomEvmToken {
        smart_contract: contract.to_owned(),
        chain: "ethereum".to_owned(),
        kind: EvmTokenKind::Erc20,
        name: None,
        symbol: Some("TKN".to_owned()),
        decimals: Some(18),
        is_custom,
        is_deleted: false,
    };
    h.state.upsert_evm_token(token(ALICE, true)).await;
    h.state.upsert_evm_token(token(BOB, false)).await;
    assert_eq!(h.state.active_erc20_tokens().await.len(), 2);

    let targets: Vec<EvmTokenTarget> = [ALICE, BOB]
        .iter()
        .map(|contract| EvmTokenTarget {
            chain: "ethereum".to_owned(),
            smart_contract: (*contract).to_owned(),
            kind: EvmTokenKind::Erc20,
        })
        .collect();
    h.state.delete_evm_tokens(&targets).await;

    assert!(h.state.active_erc20_tokens().await.is_empty());
    let all = h.state.get_evm_token_state().await;
    assert_eq!(all.erc20.len(), 1);
    assert!(all.erc20[0].is_deleted);
}
