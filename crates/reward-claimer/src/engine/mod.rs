//! Turns a sequence of block-range log queries into "pay this wallet exactly
//! once" decisions.
//!
//! One scan cycle:
//! 1. Read the latest block. On the very first cycle only place the cursor
//!    `lookback_blocks` behind it.
//! 2. Fetch the eligibility events of all blocks after the cursor, in chunks
//!    of at most `max_block_range` blocks. If any chunk fails the cycle is
//!    aborted before anything is decided and the cursor stays where it was.
//! 3. Decide every event in block order: skip wallets already handled by this
//!    process, skip wallets with a claim in the ledger, otherwise pay and
//!    record the claim.
//! 4. Move the cursor to the latest block.
//!
//! Wallets whose decision could not be completed (ledger unreachable, payout
//! failed) are kept and decided again at the start of the next cycle.

mod cursor;
mod processed;

pub use {cursor::ScanCursor, processed::ProcessedSet};
use {
    crate::{
        domain::{ClaimRecord, EligibilityEvent, WalletAddress},
        traits::{ClaimLedger, LedgerError, LogSource, PayoutExecutor},
    },
    anyhow::Context,
    chrono::{DateTime, Utc},
    ethrpc::block_range::RangeInclusive,
    std::{
        collections::{BTreeSet, HashSet},
        num::NonZeroU64,
        sync::Arc,
    },
    tokio::sync::watch,
    tracing::Instrument,
};

#[derive(Debug, Clone)]
pub struct Config {
    /// How many blocks behind the latest block the first cycle starts.
    pub lookback_blocks: u64,
    /// Maximum number of blocks covered by a single log query.
    pub max_block_range: NonZeroU64,
}

/// The external systems the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub log_source: Arc<dyn LogSource>,
    pub ledger: Arc<dyn ClaimLedger>,
    pub payout: Arc<dyn PayoutExecutor>,
}

#[derive(Debug)]
pub enum ScanOutcome {
    /// The service is not fully configured, nothing was scanned.
    Disabled,
    /// First cycle of the process: the cursor was placed, nothing scanned.
    Initialized { cursor: u64 },
    /// No new blocks and nothing left to retry.
    UpToDate { cursor: u64 },
    Scanned(CycleReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Blocks scanned in this cycle. `None` if only retries ran.
    pub range: Option<RangeInclusive<u64>>,
    pub chunks: usize,
    pub events: usize,
    /// Wallets left over from the previous cycle that were decided again.
    pub retried: usize,
    pub paid: usize,
    /// Wallets this process already handled in an earlier decision.
    pub cached: usize,
    /// Wallets the ledger already has a claim for.
    pub already_claimed: usize,
    /// Decisions postponed to the next cycle.
    pub deferred: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("log source unavailable: {0:#}")]
    SourceUnavailable(anyhow::Error),
}

/// Snapshot of the engine state published after every cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineStatus {
    pub enabled: bool,
    pub last_processed_block: Option<u64>,
    pub processed_count: usize,
    pub pending_retries: usize,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    /// Handled earlier by this process.
    Cached,
    /// The ledger already has a claim.
    AlreadyClaimed,
    Paid,
    /// The ledger could not be read, nothing was paid.
    LedgerUnavailable,
    PayoutFailed,
}

impl Decision {
    fn label(self) -> &'static str {
        match self {
            Self::Cached => "cached",
            Self::AlreadyClaimed => "already_claimed",
            Self::Paid => "paid",
            Self::LedgerUnavailable => "ledger_unavailable",
            Self::PayoutFailed => "payout_failed",
        }
    }
}

/// The dedup engine. Not safe to run concurrently with itself, callers
/// serialize cycles (see [`crate::scheduler::Scheduler`]).
pub struct Engine {
    collaborators: Option<Collaborators>,
    config: Config,
    cursor: ScanCursor,
    processed: ProcessedSet,
    retries: BTreeSet<WalletAddress>,
    status: watch::Sender<EngineStatus>,
}

impl Engine {
    pub fn new(collaborators: Collaborators, config: Config) -> Self {
        Self::build(Some(collaborators), config)
    }

    /// An engine whose cycles do nothing. Used when the configuration is
    /// incomplete so the rest of the service can still run.
    pub fn disabled(config: Config) -> Self {
        Self::build(None, config)
    }

    fn build(collaborators: Option<Collaborators>, config: Config) -> Self {
        let (status, _) = watch::channel(EngineStatus {
            enabled: collaborators.is_some(),
            ..Default::default()
        });
        Self {
            collaborators,
            config,
            cursor: ScanCursor::default(),
            processed: ProcessedSet::default(),
            retries: BTreeSet::new(),
            status,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.status.subscribe()
    }

    pub fn last_processed_block(&self) -> Option<u64> {
        self.cursor.last_processed_block()
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub async fn run_scan_cycle(&mut self) -> Result<ScanOutcome, ScanError> {
        let result = self.scan().await;
        self.publish(&result);
        result
    }

    async fn scan(&mut self) -> Result<ScanOutcome, ScanError> {
        let Some(collaborators) = self.collaborators.clone() else {
            return Ok(ScanOutcome::Disabled);
        };

        let latest = collaborators
            .log_source
            .current_block()
            .await
            .context("failed to fetch current block")
            .map_err(ScanError::SourceUnavailable)?;

        let Some(last_processed) = self.cursor.last_processed_block() else {
            let start = latest.saturating_sub(self.config.lookback_blocks);
            self.cursor.initialize(start);
            tracing::info!(latest, start, "initialized scan cursor");
            return Ok(ScanOutcome::Initialized { cursor: start });
        };

        if last_processed >= latest && self.retries.is_empty() {
            if last_processed > latest {
                tracing::debug!(last_processed, latest, "node is behind the cursor");
            }
            return Ok(ScanOutcome::UpToDate {
                cursor: last_processed,
            });
        }

        let range = (last_processed < latest).then(|| {
            RangeInclusive::try_new(last_processed + 1, latest)
                .expect("start is at most the latest block")
        });
        let (events, chunks) = match &range {
            Some(range) => self.fetch_events(collaborators.log_source.as_ref(), range).await?,
            None => (Vec::new(), 0),
        };

        let retries = std::mem::take(&mut self.retries);
        let mut report = CycleReport {
            range: range.clone(),
            chunks,
            events: events.len(),
            retried: retries.len(),
            paid: 0,
            cached: 0,
            already_claimed: 0,
            deferred: 0,
        };

        let mut deferred = HashSet::new();
        let wallets = retries
            .into_iter()
            .chain(events.iter().map(|event| event.wallet));
        for wallet in wallets {
            if deferred.contains(&wallet) {
                report.deferred += 1;
                continue;
            }
            let decision = self
                .decide(&collaborators, wallet)
                .instrument(tracing::debug_span!("decide", %wallet))
                .await;
            Metrics::get()
                .decisions
                .with_label_values(&[decision.label()])
                .inc();
            match decision {
                Decision::Cached => report.cached += 1,
                Decision::AlreadyClaimed => report.already_claimed += 1,
                Decision::Paid => report.paid += 1,
                Decision::LedgerUnavailable | Decision::PayoutFailed => {
                    deferred.insert(wallet);
                    report.deferred += 1;
                }
            }
        }
        self.retries.extend(deferred);

        if range.is_some() {
            self.cursor.advance(latest);
        }
        Ok(ScanOutcome::Scanned(report))
    }

    /// Fetches the events of the whole range or nothing at all. Returns the
    /// events in block order together with the number of queries made.
    async fn fetch_events(
        &self,
        log_source: &dyn LogSource,
        range: &RangeInclusive<u64>,
    ) -> Result<(Vec<EligibilityEvent>, usize), ScanError> {
        let mut events = Vec::new();
        let mut chunks = 0;
        for chunk in range.chunks(self.config.max_block_range) {
            let mut chunk_events = log_source
                .eligibility_events(&chunk)
                .await
                .with_context(|| format!("failed to fetch events of blocks {chunk}"))
                .map_err(ScanError::SourceUnavailable)?;
            tracing::debug!(%chunk, events = chunk_events.len(), "fetched chunk");
            events.append(&mut chunk_events);
            chunks += 1;
        }
        events.sort_by_key(|event| (event.block_number, event.log_index));
        Ok((events, chunks))
    }

    /// Decides a single wallet. Safe to call any number of times for the same
    /// wallet: the reward is only sent if neither this process nor the ledger
    /// know about an earlier payment.
    async fn decide(&mut self, collaborators: &Collaborators, wallet: WalletAddress) -> Decision {
        if self.processed.contains(&wallet) {
            return Decision::Cached;
        }

        match collaborators.ledger.exists(&wallet).await {
            Ok(true) => {
                tracing::debug!("wallet already claimed");
                self.processed.insert(wallet);
                return Decision::AlreadyClaimed;
            }
            Ok(false) => (),
            Err(err) => {
                tracing::warn!(?err, "failed to check ledger, not paying");
                return Decision::LedgerUnavailable;
            }
        }

        let payout = match collaborators.payout.transfer(&wallet).await {
            Ok(payout) => payout,
            Err(err) => {
                tracing::error!(?err, "payout failed, retrying next cycle");
                return Decision::PayoutFailed;
            }
        };

        let claim = ClaimRecord {
            wallet,
            claimed_at: Utc::now(),
            tx_hash: payout.tx_hash,
        };
        match collaborators.ledger.insert(&claim).await {
            Ok(()) => tracing::info!(tx_hash = %claim.tx_hash, "reward sent and claim recorded"),
            Err(LedgerError::AlreadyExists) => {
                tracing::warn!(tx_hash = %claim.tx_hash, "claim was recorded by another writer")
            }
            Err(LedgerError::Unavailable(err)) => tracing::error!(
                ?err,
                tx_hash = %claim.tx_hash,
                "reward sent but recording the claim failed"
            ),
        }
        // Even without a ledger record this process must not pay again.
        self.processed.insert(wallet);
        Decision::Paid
    }

    fn publish(&self, result: &Result<ScanOutcome, ScanError>) {
        let metrics = Metrics::get();
        let label = match result {
            Ok(ScanOutcome::Disabled) => "disabled",
            Ok(ScanOutcome::Initialized { .. }) => "initialized",
            Ok(ScanOutcome::UpToDate { .. }) => "up_to_date",
            Ok(ScanOutcome::Scanned(_)) => "scanned",
            Err(ScanError::SourceUnavailable(_)) => "source_unavailable",
        };
        metrics.scan_cycles.with_label_values(&[label]).inc();
        if let Some(block) = self.cursor.last_processed_block() {
            metrics
                .last_processed_block
                .set(i64::try_from(block).unwrap_or(i64::MAX));
        }
        metrics
            .processed_addresses
            .set(i64::try_from(self.processed.len()).unwrap_or(i64::MAX));

        self.status.send_modify(|status| {
            status.last_processed_block = self.cursor.last_processed_block();
            status.processed_count = self.processed.len();
            status.pending_retries = self.retries.len();
            status.last_cycle_at = Some(Utc::now());
            status.last_error = result.as_ref().err().map(ToString::to_string);
        });
    }
}

#[derive(prometheus_metric_storage::MetricStorage)]
#[metric(subsystem = "engine")]
struct Metrics {
    /// Scan cycles by outcome.
    #[metric(labels("result"))]
    scan_cycles: prometheus::IntCounterVec,

    /// Wallet decisions by outcome.
    #[metric(labels("result"))]
    decisions: prometheus::IntCounterVec,

    /// Highest block whose events have all been decided.
    last_processed_block: prometheus::IntGauge,

    /// Wallets handled since the process started.
    processed_addresses: prometheus::IntGauge,
}

impl Metrics {
    fn get() -> &'static Self {
        Self::instance(observe::metrics::get_storage_registry())
            .expect("unexpected error getting metrics instance")
    }
}
