use {
    crate::{
        domain::{ClaimRecord, WalletAddress},
        traits::{ClaimLedger, LedgerError},
    },
    anyhow::{Context, Result},
    sqlx::PgPool,
};

/// Claim ledger stored in the `claims` table.
#[derive(Debug, Clone)]
pub struct PostgresLedger(PgPool);

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self(pool)
    }

    /// Connections are opened on first use so the service starts even while
    /// the database is unreachable.
    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = PgPool::connect_lazy(url).context("invalid database url")?;
        Ok(Self(pool))
    }
}

#[async_trait::async_trait]
impl ClaimLedger for PostgresLedger {
    async fn exists(&self, wallet: &WalletAddress) -> Result<bool> {
        let _timer = Metrics::get()
            .database_queries
            .with_label_values(&["exists"])
            .start_timer();
        let mut ex = self.0.acquire().await.context("acquire connection")?;
        database::claims::exists(&mut ex, &wallet.to_string())
            .await
            .context("claims::exists")
    }

    async fn insert(&self, claim: &ClaimRecord) -> Result<(), LedgerError> {
        let _timer = Metrics::get()
            .database_queries
            .with_label_values(&["insert"])
            .start_timer();
        let mut ex = self.0.acquire().await.context("acquire connection")?;
        let row = database::claims::Claim {
            address: claim.wallet.to_string(),
            claimed_at: claim.claimed_at,
            tx_hash: claim.tx_hash.clone(),
        };
        match database::claims::insert(&mut ex, &row).await {
            Ok(()) => Ok(()),
            Err(err) if database::is_unique_violation(&err) => Err(LedgerError::AlreadyExists),
            Err(err) => Err(anyhow::Error::new(err).context("claims::insert").into()),
        }
    }
}

#[derive(prometheus_metric_storage::MetricStorage)]
struct Metrics {
    /// Timing of db queries.
    #[metric(name = "ledger_database_queries", labels("type"))]
    database_queries: prometheus::HistogramVec,
}

impl Metrics {
    fn get() -> &'static Self {
        Metrics::instance(observe::metrics::get_storage_registry())
            .expect("unexpected error getting metrics instance")
    }
}

#[cfg(test)]
pub use in_memory::InMemoryLedger;
