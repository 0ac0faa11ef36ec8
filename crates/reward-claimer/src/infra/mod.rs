//! Implementations of the boundary traits against real systems.

pub mod chain;
pub mod ledger;
pub mod payout;

pub use {
    chain::ChainLogSource,
    ledger::PostgresLedger,
    payout::{SimulatedPayout, TransferPayout},
};
