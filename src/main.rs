// src/main.rs — the sentinel oracle daemon.
//
// Wires the configuration, state store, chain gateway, indexer, and LLM
// diagnostic into the pipeline, then hands control to the cycle scheduler.
// SIGINT/SIGTERM flip the shutdown flag; the scheduler refuses the next
// cycle, drains the current one, and the store connection is dropped on the
// way out.

use std::sync::Arc;

use agent_sentinel::sentinel::chain::{Chain, EthChain};
use agent_sentinel::sentinel::config::Config;
use agent_sentinel::sentinel::indexer::{GraphIndexer, Indexer};
use agent_sentinel::sentinel::llm::{ChatClient, LlmDiagnostic, OpenAiCompatClient};
use agent_sentinel::sentinel::metadata::MetadataResolver;
use agent_sentinel::sentinel::pipeline::Pipeline;
use agent_sentinel::sentinel::probe::ProbeClient;
use agent_sentinel::sentinel::scheduler::{shutdown_channel, Scheduler};
use agent_sentinel::sentinel::store::Store;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("{}", err);
            std::process::exit(1);
        }
    };

    let store = match Store::connect(
        &config.state_store_uri,
        config.state_store_token.as_deref(),
    )
    .await
    {
        Ok(store) => Arc::new(store),
        Err(err) => {
            log::error!("state store unavailable: {}", err);
            std::process::exit(1);
        }
    };

    let chain: Arc<dyn Chain> = match EthChain::connect(
        &config.rpc_url,
        &config.private_key,
        &config.health_monitor,
        &config.identity_registry,
        &config.reputation_registry,
    ) {
        Ok(chain) => Arc::new(chain),
        Err(err) => {
            log::error!("chain gateway unavailable: {}", err);
            std::process::exit(1);
        }
    };

    let indexer: Arc<dyn Indexer> = Arc::new(GraphIndexer::new(&config.indexer_url));
    let chat: Arc<dyn ChatClient> = Arc::new(OpenAiCompatClient::new(
        &config.llm_api_url,
        &config.llm_api_key,
        &config.llm_model,
    ));
    let llm = LlmDiagnostic::new(chat, store.clone(), config.cache_ttl);

    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        chain,
        indexer,
        llm,
        ProbeClient::new(),
        MetadataResolver::new(&config.metadata_gateway),
    ));

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    tokio::spawn(async move {
        wait_for_signal().await;
        log::info!("shutdown requested; finishing the in-flight cycle");
        let _ = shutdown_tx.send(true);
    });

    log::info!(
        "sentinel started: cycle every {:?}, store at {}",
        config.cycle_interval,
        config.state_store_uri
    );

    Scheduler::new(config.cycle_interval, shutdown_rx)
        .run(move || {
            let pipeline = pipeline.clone();
            async move { pipeline.run_cycle().await }
        })
        .await;

    log::info!("closing state store");
    drop(store);
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            log::error!("SIGTERM handler unavailable: {}", err);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
