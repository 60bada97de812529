mod common;

use dapp_gate_core::domain::EvmSignatureRequest;
use dapp_gate_core::{PayloadValidated, TxErrorKind, ValidationError};

use common::{allow_dapp, harness, Harness, ALICE, DAPP_URL, LEDGER};

const HELLO: &str = "0x68656c6c6f";

const TYPED_DATA: &str = r#"{
  "types": {
    "EIP712Domain": [{"name": "name", "type": "string"}],
    "Mail": [{"name": "contents", "type": "string"}]
  },
  "primaryType": "Mail",
  "domain": {"name": "Ether Mail"},
  "message": {"contents": "Hello, Bob!"}
}"#;

async fn sign(h: &Harness, address: &str, method: &str, message: &str) -> PayloadValidated {
    allow_dapp(&h.state, &[ALICE, LEDGER]).await;
    h.state
        .validate_evm_message(DAPP_URL, address, method, message)
        .await
        .expect("pipeline must not fail")
}

fn request(out: &PayloadValidated) -> &EvmSignatureRequest {
    out.signature_request().expect("signature request")
}

#[tokio::test]
async fn personal_sign_is_signable_even_for_external_accounts() {
    let h = harness();
    let out = sign(&h, LEDGER, "personal_sign", HELLO).await;

    assert!(out.errors.is_empty());
    let req = request(&out);
    assert!(req.can_sign);
    assert_eq!(req.hash_payload, HELLO);
    assert_eq!(req.sign_type, "personal_sign");
    assert_eq!(req.account.address, LEDGER);
    assert!(req.account.meta.is_external);
}

#[tokio::test]
async fn other_methods_follow_the_account_custody() {
    let h = harness();

    let local = sign(&h, ALICE, "eth_sign", HELLO).await;
    assert!(request(&local).can_sign);
    assert_eq!(request(&local).hash_payload, "");

    let external = sign(&h, LEDGER, "eth_sign", HELLO).await;
    assert!(!request(&external).can_sign);
    assert!(external.errors.is_empty());
}

#[tokio::test]
async fn typed_data_v4_payload_is_parsed_as_json() {
    let h = harness();
    let out = sign(&h, ALICE, "eth_signTypedData_v4", TYPED_DATA).await;

    assert!(out.errors.is_empty());
    let req = request(&out);
    assert_eq!(req.payload["primaryType"], "Mail");
    assert_eq!(req.payload["message"]["contents"], "Hello, Bob!");
    assert!(req.can_sign);
}

#[tokio::test]
async fn malformed_typed_data_rejects_the_request() {
    let h = harness();
    allow_dapp(&h.state, &[ALICE]).await;
    let err = h
        .state
        .validate_evm_message(DAPP_URL, ALICE, "eth_signTypedData_v3", "{not json")
        .await
        .expect_err("unparseable typed data");

    assert!(matches!(err, ValidationError::InvalidTypedData(_)));
    assert!(err.to_string().starts_with("Typed data payload is not valid JSON"));
    assert_eq!(err.code(), None);
}

#[tokio::test]
async fn unsupported_method_is_a_finding() {
    let h = harness();
    let out = sign(&h, ALICE, "eth_signTransaction", HELLO).await;

    let errors: Vec<_> = out.errors.iter().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, TxErrorKind::UnsupportedMethod);
    assert_eq!(errors[0].message, "Unsupported action");
    assert!(!request(&out).can_sign);
}

#[tokio::test]
async fn empty_payload_is_a_finding() {
    let h = harness();
    let out = sign(&h, ALICE, "personal_sign", "").await;

    assert!(out
        .errors
        .iter()
        .any(|e| e.message == "Not found address or payload to sign"));
}
