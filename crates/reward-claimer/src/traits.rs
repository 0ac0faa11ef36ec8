//! Trait definitions for external system boundaries.
//!
//! These traits abstract the chain, the claim ledger and the payout so the
//! engine can be unit tested with mocks.

use {
    crate::domain::{ClaimRecord, EligibilityEvent, Payout, WalletAddress},
    anyhow::Result,
    ethrpc::block_range::RangeInclusive,
};

/// Read access to the eligibility events emitted on chain.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LogSource: Send + Sync {
    /// Returns the number of the latest block.
    async fn current_block(&self) -> Result<u64>;

    /// Returns all eligibility events emitted in the given block range.
    ///
    /// The caller keeps the range within the node's limit for a single log
    /// query.
    async fn eligibility_events(&self, range: &RangeInclusive<u64>)
    -> Result<Vec<EligibilityEvent>>;
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The wallet already has a claim. Happens when two writers raced.
    #[error("claim already recorded")]
    AlreadyExists,
    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

/// Durable set of wallets that have been paid. The storage enforces at most
/// one record per wallet.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ClaimLedger: Send + Sync {
    async fn exists(&self, wallet: &WalletAddress) -> Result<bool>;

    async fn insert(&self, claim: &ClaimRecord) -> Result<(), LedgerError>;
}

/// Sends the fixed reward to a wallet.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PayoutExecutor: Send + Sync {
    /// Returns an error only if the reward was certainly not sent.
    async fn transfer(&self, wallet: &WalletAddress) -> Result<Payout>;
}
