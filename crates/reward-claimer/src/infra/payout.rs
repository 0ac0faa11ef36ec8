use {
    crate::{
        domain::{Payout, WalletAddress},
        traits::PayoutExecutor,
    },
    alloy::{
        network::TransactionBuilder,
        primitives::{TxHash, U256},
        providers::Provider,
        rpc::types::TransactionRequest,
    },
    anyhow::{Context, Result},
    ethrpc::AlloyProvider,
    std::{fmt::Debug, time::Duration},
};

/// Sends the reward as a plain value transfer from the service account.
pub struct TransferPayout {
    /// Provider signing with the funded service account.
    provider: AlloyProvider,
    amount: U256,
    confirmation_timeout: Duration,
}

impl TransferPayout {
    pub fn new(provider: AlloyProvider, amount: U256, confirmation_timeout: Duration) -> Self {
        Self {
            provider,
            amount,
            confirmation_timeout,
        }
    }
}

#[async_trait::async_trait]
impl PayoutExecutor for TransferPayout {
    async fn transfer(&self, wallet: &WalletAddress) -> Result<Payout> {
        let tx = TransactionRequest::default()
            .with_to(wallet.as_address())
            .with_value(self.amount);
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .context("failed to submit reward transfer")?;
        let tx_hash = *pending.tx_hash();
        tracing::debug!(?tx_hash, "submitted reward transfer");

        let status = pending
            .with_timeout(Some(self.confirmation_timeout))
            .get_receipt()
            .await
            .map(|receipt| receipt.status());
        outcome(tx_hash, status)
    }
}

/// Once the node accepted the transaction the funds may move at any time, so
/// only a confirmed revert counts as not paid. `status` is the receipt
/// status, or the error of waiting for the receipt.
fn outcome(tx_hash: TxHash, status: Result<bool, impl Debug>) -> Result<Payout> {
    match status {
        Ok(succeeded) => anyhow::ensure!(succeeded, "reward transfer {tx_hash:?} reverted"),
        Err(err) => tracing::warn!(
            ?err,
            ?tx_hash,
            "reward transfer not confirmed in time, treating it as sent"
        ),
    }
    Ok(Payout {
        tx_hash: tx_hash.to_string(),
    })
}

/// Pretends to pay. Produces a recognizable fake transaction hash so that
/// claims recorded in dry runs can be told apart.
#[derive(Debug, Default)]
pub struct SimulatedPayout;

impl SimulatedPayout {
    fn tx_hash(wallet: &WalletAddress) -> String {
        let wallet = wallet.to_string();
        format!("0xmocktx_{}", &wallet[2..8])
    }
}

#[async_trait::async_trait]
impl PayoutExecutor for SimulatedPayout {
    async fn transfer(&self, wallet: &WalletAddress) -> Result<Payout> {
        let tx_hash = Self::tx_hash(wallet);
        tracing::info!(%tx_hash, "simulated reward transfer");
        Ok(Payout { tx_hash })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        alloy::{
            primitives::{Address, Bytes, address, b256, utils::parse_ether},
            signers::local::PrivateKeySigner,
        },
        std::borrow::Cow,
    };

    const TX: TxHash = b256!("0x00000000000000000000000000000000000000000000000000000000000000aa");

    // First account of a default anvil node.
    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn signing_provider(node: &str) -> AlloyProvider {
        let signer: PrivateKeySigner = ANVIL_KEY.parse().unwrap();
        ethrpc::provider_with_signer(
            &ethrpc::Config {
                request_timeout: Duration::from_secs(5),
            },
            &node.parse().unwrap(),
            signer,
        )
        .unwrap()
    }

    fn transfer_payout(provider: AlloyProvider, confirmation_timeout: Duration) -> TransferPayout {
        TransferPayout::new(provider, parse_ether("0.01").unwrap(), confirmation_timeout)
    }

    #[test]
    fn successful_receipt_is_paid() {
        let payout = outcome(TX, Ok::<_, ()>(true)).unwrap();
        assert_eq!(payout.tx_hash, TX.to_string());
    }

    #[test]
    fn reverted_receipt_is_not_paid() {
        let err = outcome(TX, Ok::<_, ()>(false)).unwrap_err();
        assert!(err.to_string().contains("reverted"));
    }

    #[test]
    fn missing_receipt_counts_as_paid() {
        let payout = outcome(TX, Err("timed out waiting for receipt")).unwrap();
        assert_eq!(payout.tx_hash, TX.to_string());
    }

    #[tokio::test]
    async fn unreachable_node_fails_transfer() {
        let payout = transfer_payout(signing_provider("http://localhost:1"), Duration::from_secs(1));
        let wallet = WalletAddress::new(address!("0x000000000000000000000000000000000000dEaD"));
        assert!(payout.transfer(&wallet).await.is_err());
    }

    #[tokio::test]
    #[ignore]
    async fn local_node_transfer_pays_wallet() {
        let provider = signing_provider("http://localhost:8545");
        let recipient = address!("0x000000000000000000000000000000000000dEaD");
        let before = provider.get_balance(recipient).await.unwrap();

        let payout = transfer_payout(provider.clone(), Duration::from_secs(30))
            .transfer(&WalletAddress::new(recipient))
            .await
            .unwrap();

        assert!(payout.tx_hash.starts_with("0x"));
        let after = provider.get_balance(recipient).await.unwrap();
        assert_eq!(after - before, parse_ether("0.01").unwrap());
    }

    #[tokio::test]
    #[ignore]
    async fn local_node_reverting_recipient_is_not_paid() {
        let provider = signing_provider("http://localhost:8545");
        let recipient = address!("0x00000000000000000000000000000000000bad01");
        // PUSH1 0 PUSH1 0 REVERT
        let _: () = provider
            .raw_request(
                Cow::Borrowed("anvil_setCode"),
                (recipient, Bytes::from_static(&[0x60, 0x00, 0x60, 0x00, 0xfd])),
            )
            .await
            .unwrap();

        let result = transfer_payout(provider, Duration::from_secs(30))
            .transfer(&WalletAddress::new(recipient))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    #[ignore]
    async fn local_node_unmined_transfer_counts_as_paid() {
        let provider = signing_provider("http://localhost:8545");
        let set_automine = |enabled: bool| {
            let provider = provider.clone();
            async move {
                let _: () = provider
                    .raw_request(Cow::Borrowed("evm_setAutomine"), (enabled,))
                    .await
                    .unwrap();
            }
        };
        set_automine(false).await;

        let result = transfer_payout(provider.clone(), Duration::from_secs(2))
            .transfer(&WalletAddress::new(Address::repeat_byte(0x42)))
            .await;
        set_automine(true).await;

        assert!(result.unwrap().tx_hash.starts_with("0x"));
    }

    #[tokio::test]
    async fn simulated_payout_hash() {
        let wallet: WalletAddress = "0xAbCdEf0123456789abcdef0123456789abcdef01"
            .parse()
            .unwrap();
        let payout = SimulatedPayout.transfer(&wallet).await.unwrap();
        assert_eq!(payout.tx_hash, "0xmocktx_abcdef");
    }
}
