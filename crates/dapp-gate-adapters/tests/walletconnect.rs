mod common;

use serde_json::json;

use dapp_gate_core::domain::{WcNamespace, WcNamespaces, WcSession};
use dapp_gate_core::{EvmSendTransactionParams, ValidationError};

use common::{harness, Harness, ALICE, BOB};

const TOPIC: &str = "9c1f0a6e2b";

fn connect_session(h: &Harness) {
    h.walletconnect
        .insert_session(WcSession {
            topic: TOPIC.to_owned(),
            namespaces: WcNamespaces {
                eip155: Some(WcNamespace {
                    accounts: vec![format!("eip155:1:{ALICE}")],
                    methods: vec!["eth_sendTransaction".to_owned(), "personal_sign".to_owned()],
                    events: Vec::new(),
                }),
                polkadot: None,
            },
            peer_url: Some("https://app.example.org".to_owned()),
        })
        .expect("insert session");
}

fn transfer(from: &str) -> EvmSendTransactionParams {
    serde_json::from_value(json!({
        "from": from,
        "to": BOB,
        "gas": "0x5208",
        "gasPrice": "0x3b9aca00",
    }))
    .expect("transaction params")
}

#[tokio::test]
async fn request_without_session_is_unauthorized() {
    let h = harness();

    let err = h
        .state
        .validate_walletconnect_message("", ALICE, "personal_sign", "0x01")
        .await
        .expect_err("no topic");
    assert_eq!(err.code(), Some(3004));

    let err = h
        .state
        .validate_walletconnect_message(TOPIC, ALICE, "personal_sign", "0x01")
        .await
        .expect_err("unknown topic");
    assert_eq!(err.code(), Some(3004));
}

#[tokio::test]
async fn account_outside_session_is_unsupported() {
    let h = harness();
    connect_session(&h);

    let err = h
        .state
        .validate_walletconnect_transaction(TOPIC, "ethereum", transfer(BOB))
        .await
        .expect_err("bob is not in the session");
    assert_eq!(err.code(), Some(5103));
    assert!(err.to_string().contains(BOB));
}

#[tokio::test]
async fn account_missing_from_keyring_is_not_found() {
    let h = harness();
    connect_session(&h);

    let err = h
        .state
        .validate_walletconnect_message(
            TOPIC,
            "0x4000000000000000000000000000000000000004",
            "personal_sign",
            "0x01",
        )
        .await
        .expect_err("unknown account");
    assert!(matches!(err, ValidationError::AccountNotFound));
}

#[tokio::test]
async fn session_account_gets_a_prepared_transaction() {
    let h = harness();
    connect_session(&h);

    let out = h
        .state
        .validate_walletconnect_transaction(TOPIC, "ethereum", transfer(ALICE))
        .await
        .expect("validated");
    assert!(out.errors.is_empty());
    let tx = out.prepared_transaction().expect("prepared transaction");
    assert_eq!(tx.account.address, ALICE);
    assert_eq!(tx.transaction.nonce, Some(7));
    assert_eq!(out.pair.expect("pair").address, ALICE);
}

#[tokio::test]
async fn disconnected_session_stops_authorizing() {
    let h = harness();
    connect_session(&h);
    let out = h
        .state
        .validate_walletconnect_message(TOPIC, ALICE, "personal_sign", "0x01")
        .await
        .expect("validated");
    assert!(out.signature_request().expect("signature request").can_sign);

    h.walletconnect.disconnect(TOPIC).expect("disconnect");
    let err = h
        .state
        .validate_walletconnect_message(TOPIC, ALICE, "personal_sign", "0x01")
        .await
        .expect_err("session gone");
    assert_eq!(err.code(), Some(3004));
}
