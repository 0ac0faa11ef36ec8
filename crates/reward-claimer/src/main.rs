use clap::Parser;

#[tokio::main]
async fn main() {
    let args = reward_claimer::arguments::Arguments::parse();
    observe::tracing::initialize(&args.log_filter, args.log_stderr_threshold);
    observe::metrics::setup_registry(Some("reward_claimer".to_string()), None);
    tracing::info!("running reward claimer with validated arguments:\n{}", args);
    if let Err(err) = reward_claimer::run(args).await {
        tracing::error!(?err, "reward claimer stopped");
        std::process::exit(1);
    }
}
