use dapp_gate_core::domain::{AccessType, EvmSignatureRequest, NumberLike};
use dapp_gate_core::{
    AuthUrlInfo, AuthUrls, EvmSendTransactionParams, PayloadValidated, TransactionError,
    TxErrorKind, ValidatedPayload,
};

fn auth_info(origin: &str, allowed: &[(&str, bool)]) -> AuthUrlInfo {
    AuthUrlInfo {
        count: 0,
        id: origin.to_owned(),
        is_allowed: allowed.iter().any(|(_, v)| *v),
        is_allowed_map: allowed
            .iter()
            .map(|(a, v)| ((*a).to_owned(), *v))
            .collect(),
        origin: origin.to_owned(),
        url: format!("https://{origin}/"),
        current_evm_network_key: Some("ethereum".to_owned()),
        access_type: Some(AccessType::Evm),
    }
}

#[test]
fn auth_urls_use_camel_case_wire_names() {
    let info = auth_info("app.example", &[("0xAA", true)]);
    let json = serde_json::to_value(&info).expect("serialize");
    assert_eq!(json["isAllowed"], true);
    assert_eq!(json["isAllowedMap"]["0xAA"], true);
    assert_eq!(json["currentEvmNetworkKey"], "ethereum");
    assert_eq!(json["accessType"], "evm");
}

#[test]
fn auth_urls_roundtrip_keeps_allowed_maps() {
    let mut urls = AuthUrls::new();
    urls.insert(
        "app.example".to_owned(),
        auth_info("app.example", &[("0xAA", true), ("0xBB", false)]),
    );
    urls.insert("other.example".to_owned(), auth_info("other.example", &[]));

    let encoded = serde_json::to_string(&urls).expect("serialize");
    let decoded: AuthUrls = serde_json::from_str(&encoded).expect("deserialize");
    for (origin, info) in &urls {
        assert_eq!(decoded[origin].is_allowed_map, info.is_allowed_map);
    }
}

#[test]
fn send_transaction_params_accept_mixed_number_shapes() {
    let params: EvmSendTransactionParams = serde_json::from_str(
        r#"{"from":"0x1","to":"0x2","value":"0x10","gas":21000,"gasPrice":"1000"}"#,
    )
    .expect("params");
    assert!(matches!(params.value, Some(NumberLike::Text(ref v)) if v == "0x10"));
    assert!(matches!(params.gas, Some(NumberLike::Number(_))));
    assert!(params.max_fee_per_gas.is_none());
}

#[test]
fn findings_serialize_with_kind_and_message() {
    let mut payload = PayloadValidated::message("0x1", Some("personal_sign".to_owned()), "hi");
    payload
        .errors
        .push(TransactionError::new(TxErrorKind::NotEnoughBalance, ""));
    let json = serde_json::to_value(&payload).expect("serialize");
    assert_eq!(json["errors"][0]["kind"], "NOT_ENOUGH_BALANCE");
    assert_eq!(json["errors"][0]["message"], "Insufficient balance");
    assert_eq!(json["payloadAfterValidated"]["kind"], "rawMessage");
}

#[test]
fn signature_request_uses_type_field() {
    let request: EvmSignatureRequest = serde_json::from_value(serde_json::json!({
        "account": {"address": "0x1", "isExternal": true},
        "type": "eth_sign",
        "payload": "0xdead",
        "hashPayload": "",
        "canSign": false,
        "id": ""
    }))
    .expect("deserialize");
    assert_eq!(request.sign_type, "eth_sign");
    assert!(request.account.meta.is_external);

    let wrapped = ValidatedPayload::SignatureRequest(request);
    let json = serde_json::to_value(&wrapped).expect("serialize");
    assert_eq!(json["kind"], "signatureRequest");
    assert_eq!(json["data"]["type"], "eth_sign");
}
