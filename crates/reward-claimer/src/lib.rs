pub mod api;
pub mod arguments;
pub mod domain;
pub mod engine;
pub mod infra;
pub mod scheduler;
pub mod shutdown;
pub mod traits;

use {
    crate::{
        arguments::Arguments,
        engine::{Collaborators, Engine},
        infra::{ChainLogSource, PostgresLedger, SimulatedPayout, TransferPayout},
        scheduler::Scheduler,
        shutdown::Shutdown,
        traits::{ClaimLedger, LogSource, PayoutExecutor},
    },
    anyhow::{Context, Result},
    std::sync::Arc,
    tokio::{net::TcpListener, sync::Mutex},
};

/// Runs the service until SIGINT or SIGTERM.
///
/// Missing configuration is not fatal: the HTTP API keeps serving the health
/// status while the scanner stays idle.
pub async fn run(args: Arguments) -> Result<()> {
    let config = args.configuration();
    if !config.missing().is_empty() {
        tracing::warn!(
            missing = ?config.missing(),
            "missing or placeholder configuration, not scanning for eligible wallets"
        );
    }
    let rpc = ethrpc::Config {
        request_timeout: args.node_timeout,
    };

    let ledger: Option<Arc<dyn ClaimLedger>> = match &config.db_url {
        Some(url) => Some(Arc::new(PostgresLedger::connect_lazy(url)?)),
        None => None,
    };
    let log_source: Option<Arc<dyn LogSource>> = match (&config.node_url, config.contract) {
        (Some(url), Some(contract)) => Some(Arc::new(ChainLogSource::new(
            ethrpc::provider(&rpc, url)?,
            contract,
        ))),
        _ => None,
    };
    let payout: Option<Arc<dyn PayoutExecutor>> = if config.simulate_payouts {
        tracing::warn!("payouts are simulated, no funds will be sent");
        Some(Arc::new(SimulatedPayout))
    } else {
        match (&config.node_url, config.signer.clone()) {
            (Some(url), Some(signer)) => {
                tracing::info!(account = %signer.address(), "paying rewards from account");
                Some(Arc::new(TransferPayout::new(
                    ethrpc::provider_with_signer(&rpc, url, signer)?,
                    args.payout_amount,
                    args.payout_timeout,
                )))
            }
            _ => None,
        }
    };

    let components = api::Components {
        ledger: ledger.is_some(),
        log_source: log_source.is_some(),
        payout: payout.is_some(),
        contract_address: config.contract.is_some(),
    };
    let engine_config = engine::Config {
        lookback_blocks: args.lookback_blocks,
        max_block_range: args.max_block_range,
    };
    let engine = match (log_source, ledger.clone(), payout) {
        (Some(log_source), Some(ledger), Some(payout)) => Engine::new(
            Collaborators {
                log_source,
                ledger,
                payout,
            },
            engine_config,
        ),
        _ => Engine::disabled(engine_config),
    };

    let shutdown = Shutdown::new();
    let listener = TcpListener::bind(args.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", args.bind_address))?;
    let api = tokio::spawn(api::serve(
        listener,
        api::State::new(engine.subscribe(), ledger, components, config.missing()),
        shutdown.signal().wait(),
    ));

    let scheduler = Scheduler::new(Arc::new(Mutex::new(engine)), args.scan_interval);
    let stop_scanning = shutdown.signal();
    shutdown.on_os_signal();
    scheduler.run_until(stop_scanning.wait()).await;

    api.await
        .context("HTTP API task panicked")?
        .context("HTTP API failed")
}
