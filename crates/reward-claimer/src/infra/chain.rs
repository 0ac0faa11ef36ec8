use {
    crate::{
        domain::{EligibilityEvent, WalletAddress},
        traits::LogSource,
    },
    alloy::{
        primitives::Address,
        providers::Provider,
        rpc::types::{Filter, FilterSet, Log},
        sol_types::SolEvent,
    },
    anyhow::{Context, Result},
    ethrpc::{AlloyProvider, block_range::RangeInclusive},
};

alloy::sol! {
    /// Emitted by the rewards contract once a wallet qualifies for the reward.
    event UserEligible(address indexed user);
}

/// Reads eligibility events of one contract from a JSON-RPC node.
pub struct ChainLogSource {
    provider: AlloyProvider,
    contract: Address,
}

impl ChainLogSource {
    pub fn new(provider: AlloyProvider, contract: Address) -> Self {
        Self { provider, contract }
    }

    fn filter(&self, range: &RangeInclusive<u64>) -> Filter {
        Filter::new()
            .address(self.contract)
            .event_signature(FilterSet::from_iter([UserEligible::SIGNATURE_HASH]))
            .from_block(*range.start())
            .to_block(*range.end())
    }
}

#[async_trait::async_trait]
impl LogSource for ChainLogSource {
    async fn current_block(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .context("eth_blockNumber failed")
    }

    async fn eligibility_events(
        &self,
        range: &RangeInclusive<u64>,
    ) -> Result<Vec<EligibilityEvent>> {
        let logs = self
            .provider
            .get_logs(&self.filter(range))
            .await
            .with_context(|| format!("eth_getLogs failed for blocks {range}"))?;
        Ok(logs.iter().filter_map(to_event).collect())
    }
}

/// Logs that are still pending or do not match the event layout are skipped.
fn to_event(log: &Log) -> Option<EligibilityEvent> {
    let (Some(block_number), Some(log_index)) = (log.block_number, log.log_index) else {
        tracing::warn!(?log, "skipping log without block position");
        return None;
    };
    match log.log_decode::<UserEligible>() {
        Ok(decoded) => Some(EligibilityEvent {
            wallet: WalletAddress::new(decoded.inner.data.user),
            block_number,
            log_index,
        }),
        Err(err) => {
            tracing::warn!(?err, block_number, log_index, "skipping undecodable log");
            None
        }
    }
}
