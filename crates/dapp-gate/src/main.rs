//! dapp-gate: runs a dApp wallet request through the authorization and validation pipeline and
//! prints what the wallet would show the user.

mod request;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use eyre::{Result, WrapErr};

use dapp_gate_adapters::{
    build_background_state, AdapterConfig, ChainRegistryAdapter, WalletConnectAdapter,
};
use dapp_gate_core::domain::{AccessType, ChainInfo, NetworkJson, NetworkStatus};

const DEFAULT_PROVIDER: &str = "default";

/// One network map entry per configured RPC endpoint.
fn default_networks(config: &AdapterConfig) -> Vec<NetworkJson> {
    config
        .rpc_urls
        .iter()
        .map(|(slug, url)| NetworkJson {
            key: slug.clone(),
            chain: slug.clone(),
            genesis_hash: String::new(),
            is_ethereum: true,
            active: true,
            api_status: NetworkStatus::Connected,
            current_provider: DEFAULT_PROVIDER.to_owned(),
            custom_providers: BTreeMap::from([(DEFAULT_PROVIDER.to_owned(), url.clone())]),
            native_token: None,
            decimals: None,
            block_explorer: None,
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| eyre::eyre!("usage: dapp-gate <request.json>"))?;
    let raw = tokio::fs::read(&path)
        .await
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    let file: request::RequestFile =
        serde_json::from_slice(&raw).wrap_err("request file is malformed")?;

    let config = AdapterConfig::from_env()?;
    let chains = Arc::new(ChainRegistryAdapter::json_rpc(config.http_timeout()));
    for (slug, url) in &config.rpc_urls {
        let info = ChainInfo {
            slug: slug.clone(),
            name: slug.clone(),
            access_type: AccessType::Evm,
            evm_chain_id: None,
        };
        chains
            .register(info, url, true)
            .wrap_err_with(|| format!("failed to connect {slug}"))?;
    }

    let walletconnect = WalletConnectAdapter::in_memory();
    let state = build_background_state(
        &config,
        request::keyring(&file.accounts),
        chains,
        walletconnect.clone(),
    );
    state.init(default_networks(&config)).await?;

    tracing::info!(url = %file.url, chains = config.rpc_urls.len(), "validating dApp request");
    let outcome = request::run(&state, &walletconnect, file).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    state.shutdown().await;
    Ok(())
}
