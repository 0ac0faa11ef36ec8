use {
    alloy::{
        primitives::{Address, U256, utils::parse_ether},
        signers::local::PrivateKeySigner,
    },
    std::{
        fmt::{self, Display, Formatter},
        net::SocketAddr,
        num::NonZeroU64,
        str::FromStr,
        time::Duration,
    },
    tracing::level_filters::LevelFilter,
    url::Url,
};

#[derive(clap::Parser)]
pub struct Arguments {
    #[clap(long, env, default_value = "0.0.0.0:3001")]
    pub bind_address: SocketAddr,

    #[clap(long, env, default_value = "warn,reward_claimer=debug,ethrpc=debug")]
    pub log_filter: String,

    #[clap(long, env, default_value = "error")]
    pub log_stderr_threshold: LevelFilter,

    /// The Ethereum node URL to connect to.
    #[clap(long, env)]
    pub node_url: Option<String>,

    /// Timeout for every single request to the node.
    #[clap(long, env, default_value = "10s", value_parser = humantime::parse_duration)]
    pub node_timeout: Duration,

    /// Address of the contract emitting the eligibility events.
    #[clap(long, env)]
    pub contract_address: Option<String>,

    /// Hex encoded private key of the account paying the rewards.
    #[clap(long, env)]
    pub private_key: Option<String>,

    /// Url of the Postgres database holding the claims.
    #[clap(long, env)]
    pub db_url: Option<String>,

    /// How often to scan for new eligibility events.
    #[clap(long, env, default_value = "15s", value_parser = humantime::parse_duration)]
    pub scan_interval: Duration,

    /// How many blocks behind the latest block the first scan after startup
    /// begins.
    #[clap(long, env, default_value = "500")]
    pub lookback_blocks: u64,

    /// Maximum number of blocks requested in a single log query. Nodes
    /// reject queries spanning too many blocks.
    #[clap(long, env, default_value = "500")]
    pub max_block_range: NonZeroU64,

    /// Reward sent to every eligible wallet, in ether.
    #[clap(long, env, default_value = "1", value_parser = parse_ether_amount)]
    pub payout_amount: U256,

    /// How long to wait for a reward transfer to be mined.
    #[clap(long, env, default_value = "2m", value_parser = humantime::parse_duration)]
    pub payout_timeout: Duration,

    /// Record claims with fake transaction hashes instead of sending funds.
    #[clap(long, env, default_value = "false", action = clap::ArgAction::Set)]
    pub simulate_payouts: bool,
}

fn parse_ether_amount(s: &str) -> Result<U256, String> {
    parse_ether(s).map_err(|err| format!("invalid ether amount {s:?}: {err}"))
}

/// Values containing this marker were copied from a template and never
/// filled in.
const PLACEHOLDER_MARKER: &str = "your-";

/// Returns the value unless it is unset, empty or a template placeholder.
fn configured(value: &Option<String>) -> Option<&str> {
    let value = value.as_deref()?.trim();
    (!value.is_empty() && !value.contains(PLACEHOLDER_MARKER)).then_some(value)
}

/// Parses a configured value. Unparsable values are logged and treated like
/// missing ones.
fn parse<T>(name: &'static str, value: &Option<String>) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let value = configured(value)?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::warn!(name, %err, "ignoring invalid configuration value");
            None
        }
    }
}

/// The connection settings the service needs to do its job. Every setting
/// that is absent is listed in `missing`.
#[derive(Debug)]
pub struct Configuration {
    pub node_url: Option<Url>,
    pub contract: Option<Address>,
    pub signer: Option<PrivateKeySigner>,
    pub db_url: Option<String>,
    pub simulate_payouts: bool,
    missing: Vec<&'static str>,
}

impl Configuration {
    /// Names of the environment variables that still need a value.
    pub fn missing(&self) -> &[&'static str] {
        &self.missing
    }
}

impl Arguments {
    pub fn configuration(&self) -> Configuration {
        let node_url: Option<Url> = parse("NODE_URL", &self.node_url);
        let contract: Option<Address> = parse("CONTRACT_ADDRESS", &self.contract_address);
        let signer: Option<PrivateKeySigner> = parse("PRIVATE_KEY", &self.private_key);
        let db_url = configured(&self.db_url).map(str::to_string);

        let missing = [
            ("NODE_URL", node_url.is_none()),
            ("CONTRACT_ADDRESS", contract.is_none()),
            ("PRIVATE_KEY", signer.is_none() && !self.simulate_payouts),
            ("DB_URL", db_url.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect();

        Configuration {
            node_url,
            contract,
            signer,
            db_url,
            simulate_payouts: self.simulate_payouts,
            missing,
        }
    }
}

fn display_secret_option<T>(f: &mut Formatter<'_>, name: &str, option: &Option<T>) -> fmt::Result {
    writeln!(
        f,
        "{name}: {}",
        if option.is_some() { "SECRET" } else { "None" }
    )
}

impl Display for Arguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self {
            bind_address,
            log_filter,
            log_stderr_threshold,
            node_url,
            node_timeout,
            contract_address,
            private_key,
            db_url,
            scan_interval,
            lookback_blocks,
            max_block_range,
            payout_amount,
            payout_timeout,
            simulate_payouts,
        } = self;

        writeln!(f, "bind_address: {bind_address}")?;
        writeln!(f, "log_filter: {log_filter}")?;
        writeln!(f, "log_stderr_threshold: {log_stderr_threshold}")?;
        // Node urls often embed an api key.
        display_secret_option(f, "node_url", node_url)?;
        writeln!(f, "node_timeout: {node_timeout:?}")?;
        writeln!(f, "contract_address: {contract_address:?}")?;
        display_secret_option(f, "private_key", private_key)?;
        display_secret_option(f, "db_url", db_url)?;
        writeln!(f, "scan_interval: {scan_interval:?}")?;
        writeln!(f, "lookback_blocks: {lookback_blocks}")?;
        writeln!(f, "max_block_range: {max_block_range}")?;
        writeln!(f, "payout_amount: {payout_amount} wei")?;
        writeln!(f, "payout_timeout: {payout_timeout:?}")?;
        writeln!(f, "simulate_payouts: {simulate_payouts}")?;
        Ok(())
    }
}
