use super::BackgroundState;
use crate::domain::EvmSendTransactionParams;
use crate::errors::ValidationError;
use crate::pipeline::{
    generate_validation_process, AuthStep, ConnectStep, EvmSignMessageStep, EvmTransactionStep,
    PayloadValidated, ValidateStep, WalletConnectAuthStep,
};

impl BackgroundState {
    /// `eth_sendTransaction` from an injected-provider dApp.
    pub async fn validate_evm_transaction(
        &self,
        url: &str,
        network_key: Option<String>,
        params: EvmSendTransactionParams,
    ) -> Result<PayloadValidated, ValidationError> {
        let payload = PayloadValidated::transaction(params.from.clone(), network_key, params);
        let steps: [&dyn ValidateStep<BackgroundState>; 3] =
            [&AuthStep, &ConnectStep, &EvmTransactionStep];
        generate_validation_process(self, url, payload, &steps, None).await
    }

    /// `personal_sign`, `eth_sign` and `eth_signTypedData*` from an injected-provider dApp.
    pub async fn validate_evm_message(
        &self,
        url: &str,
        address: &str,
        method: &str,
        message: &str,
    ) -> Result<PayloadValidated, ValidationError> {
        let payload = PayloadValidated::message(address, Some(method.to_owned()), message);
        let steps: [&dyn ValidateStep<BackgroundState>; 3] =
            [&AuthStep, &ConnectStep, &EvmSignMessageStep];
        generate_validation_process(self, url, payload, &steps, None).await
    }

    /// `eth_sendTransaction` relayed through a WalletConnect session.
    pub async fn validate_walletconnect_transaction(
        &self,
        topic: &str,
        network_key: &str,
        params: EvmSendTransactionParams,
    ) -> Result<PayloadValidated, ValidationError> {
        let url = self.walletconnect_url(topic);
        let payload = PayloadValidated::transaction(
            params.from.clone(),
            Some(network_key.to_owned()),
            params,
        );
        let steps: [&dyn ValidateStep<BackgroundState>; 2] =
            [&WalletConnectAuthStep, &EvmTransactionStep];
        generate_validation_process(self, &url, payload, &steps, Some(topic)).await
    }

    /// Message signing relayed through a WalletConnect session.
    pub async fn validate_walletconnect_message(
        &self,
        topic: &str,
        address: &str,
        method: &str,
        message: &str,
    ) -> Result<PayloadValidated, ValidationError> {
        let url = self.walletconnect_url(topic);
        let payload = PayloadValidated::message(address, Some(method.to_owned()), message);
        let steps: [&dyn ValidateStep<BackgroundState>; 2] =
            [&WalletConnectAuthStep, &EvmSignMessageStep];
        generate_validation_process(self, &url, payload, &steps, Some(topic)).await
    }

    fn walletconnect_url(&self, topic: &str) -> String {
        self.walletconnect()
            .get_session(topic)
            .and_then(|s| s.peer_url)
            .unwrap_or_default()
    }
}
