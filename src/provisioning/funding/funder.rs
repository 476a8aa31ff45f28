use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};

use super::config::FundingConfig;
use crate::chain::TransferClient;
use crate::errors::ProvisionResult;
use crate::provisioning::accounts::AccountBatch;
use crate::provisioning::shared::{BatchItem, BatchReport, run_sequential};

/// Source balance compared with what a funding run will spend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceCheck {
    pub source: Address,
    pub balance: U256,
    /// Sum of all transfers, excluding fees
    pub required: U256,
}

impl BalanceCheck {
    pub fn is_sufficient(&self) -> bool {
        self.balance >= self.required
    }
}

/// Sends a fixed amount of native currency to every account of a batch
pub struct Funder<C> {
    client: C,
    config: FundingConfig,
}

impl<C: TransferClient> Funder<C> {
    pub fn new(client: C, config: FundingConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Compare the source balance against `recipients * amount`
    pub async fn check_balance(&self, recipients: usize) -> ProvisionResult<BalanceCheck> {
        let source = self.client.source();
        let balance = self.client.balance_of(source).await?;
        let required = self.config.amount.saturating_mul(U256::from(recipients));

        Ok(BalanceCheck {
            source,
            balance,
            required,
        })
    }

    /// Fund every account of the batch in order.
    ///
    /// A batch that fails verification is an error; individual transfer
    /// failures are only recorded in the report.
    pub async fn fund_batch(&self, batch: &AccountBatch) -> ProvisionResult<BatchReport> {
        let recipients = batch.addresses()?;
        Ok(self.fund_addresses(&recipients).await)
    }

    /// Fund the given recipients one confirmation at a time
    pub async fn fund_addresses(&self, recipients: &[Address]) -> BatchReport {
        let amount = self.config.amount;
        let amount_ether = format_ether(amount);

        tracing::info!(
            source = %self.client.source(),
            recipients = recipients.len(),
            amount = %amount_ether,
            "funding test accounts"
        );

        let report = BatchReport::new("fund").with_amount(amount_ether);
        let items = recipients.iter().copied().map(BatchItem::new).collect();

        run_sequential(report, items, self.config.retry, |_, recipient| {
            self.client.transfer(recipient, amount)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioning::funding::parse_amount;
    use crate::provisioning::accounts::{AccountGenerator, GeneratorConfig};
    use crate::provisioning::shared::{FailureKind, ItemStatus, RetryPolicy, TransferFailure, TxConfirmation};
    use alloy::primitives::B256;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Records every transfer and fails the configured recipients
    #[derive(Default)]
    struct MockTransferClient {
        transfers: RefCell<Vec<(Address, U256)>>,
        failures: HashMap<usize, FailureKind>,
        /// Transport failures left per recipient before transfers go through
        flaky: RefCell<HashMap<Address, u32>>,
        balance: U256,
    }

    impl MockTransferClient {
        fn failing(failures: &[(usize, FailureKind)]) -> Self {
            Self {
                failures: failures.iter().copied().collect(),
                ..Default::default()
            }
        }
    }

    impl TransferClient for MockTransferClient {
        fn source(&self) -> Address {
            Address::repeat_byte(0xaa)
        }

        async fn transfer(&self, to: Address, value: U256) -> Result<TxConfirmation, TransferFailure> {
            let call = {
                let mut transfers = self.transfers.borrow_mut();
                transfers.push((to, value));
                transfers.len() - 1
            };

            if let Some(remaining) = self.flaky.borrow_mut().get_mut(&to) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(TransferFailure::new(FailureKind::Transport, "connection reset"));
                }
            }

            match self.failures.get(&call) {
                Some(kind) => Err(TransferFailure::new(*kind, "mock failure")),
                None => Ok(TxConfirmation {
                    tx_hash: B256::with_last_byte(call as u8),
                    block_number: Some(100 + call as u64),
                }),
            }
        }

        async fn balance_of(&self, _account: Address) -> ProvisionResult<U256> {
            Ok(self.balance)
        }
    }

    fn batch(n: u32) -> AccountBatch {
        AccountGenerator::new(GeneratorConfig::new().with_batch_size(n))
            .generate_batch()
            .unwrap()
    }

    #[tokio::test]
    async fn test_issues_one_transfer_per_recipient_in_order() {
        let batch = batch(7);
        let funder = Funder::new(MockTransferClient::default(), FundingConfig::default());

        let report = funder.fund_batch(&batch).await.unwrap();

        let expected = batch.addresses().unwrap();
        let transfers = funder.client().transfers.borrow().clone();
        assert_eq!(transfers.len(), 7);
        for (i, (to, value)) in transfers.iter().enumerate() {
            assert_eq!(*to, expected[i]);
            assert_eq!(*value, FundingConfig::default().amount);
        }

        assert!(report.all_confirmed());
        let reported = report.amount.as_deref().unwrap();
        assert_eq!(parse_amount(reported).unwrap(), FundingConfig::default().amount);
        let accounts: Vec<_> = report.outcomes.iter().map(|o| o.account).collect();
        assert_eq!(accounts, expected);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_recipients() {
        let batch = batch(5);
        let client = MockTransferClient::failing(&[(1, FailureKind::Rejected), (3, FailureKind::Timeout)]);
        let funder = Funder::new(client, FundingConfig::default());

        let report = funder.fund_batch(&batch).await.unwrap();

        assert_eq!(funder.client().transfers.borrow().len(), 5);
        assert_eq!(report.confirmed_count(), 3);
        assert_eq!(report.failed_count(), 2);

        let failed: Vec<_> = report.failures().map(|o| o.index).collect();
        assert_eq!(failed, vec![1, 3]);
        assert!(matches!(
            report.outcomes[3].status,
            ItemStatus::Failed { kind: FailureKind::Timeout, .. }
        ));
    }

    #[tokio::test]
    async fn test_transport_failures_are_retried_within_budget() {
        let batch = batch(2);
        let addresses = batch.addresses().unwrap();
        let client = MockTransferClient::default();
        client.flaky.borrow_mut().insert(addresses[0], 2);
        client.flaky.borrow_mut().insert(addresses[1], 5);

        let config = FundingConfig::default().with_retry(RetryPolicy::new(2, 1));
        let funder = Funder::new(client, config);
        let report = funder.fund_batch(&batch).await.unwrap();

        assert!(report.outcomes[0].is_confirmed());
        assert_eq!(report.outcomes[0].attempts(), 3);
        assert!(!report.outcomes[1].is_confirmed());
        assert_eq!(report.outcomes[1].attempts(), 3);
    }

    #[tokio::test]
    async fn test_rejections_are_never_retried() {
        let batch = batch(1);
        let client = MockTransferClient::failing(&[(0, FailureKind::Rejected)]);
        let config = FundingConfig::default().with_retry(RetryPolicy::new(4, 1));
        let funder = Funder::new(client, config);

        let report = funder.fund_batch(&batch).await.unwrap();

        assert_eq!(funder.client().transfers.borrow().len(), 1);
        assert_eq!(report.outcomes[0].attempts(), 1);
    }

    #[tokio::test]
    async fn test_rerun_sends_again() {
        let batch = batch(3);
        let funder = Funder::new(MockTransferClient::default(), FundingConfig::default());

        funder.fund_batch(&batch).await.unwrap();
        funder.fund_batch(&batch).await.unwrap();

        assert_eq!(funder.client().transfers.borrow().len(), 6);
    }

    #[tokio::test]
    async fn test_empty_batch_sends_nothing() {
        let funder = Funder::new(MockTransferClient::default(), FundingConfig::default());
        let report = funder.fund_batch(&AccountBatch::new()).await.unwrap();

        assert_eq!(report.requested(), 0);
        assert!(funder.client().transfers.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_balance_check() {
        let client = MockTransferClient {
            balance: U256::from(25_000_000_000_000_000u64),
            ..Default::default()
        };
        let funder = Funder::new(client, FundingConfig::default());

        assert!(funder.check_balance(2).await.unwrap().is_sufficient());
        assert!(!funder.check_balance(3).await.unwrap().is_sufficient());
    }
}
