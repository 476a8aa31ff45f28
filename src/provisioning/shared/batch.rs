use std::future::Future;

use alloy::primitives::Address;

use super::report::{BatchReport, ItemOutcome, TransferFailure, TxConfirmation};
use super::retry::RetryPolicy;

/// One unit of work in a sequential batch
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub account: Address,
    pub detail: Option<String>,
}

impl BatchItem {
    pub fn new(account: Address) -> Self {
        Self { account, detail: None }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Run `submit` for every item in order, one confirmation at a time.
///
/// A failing item is logged and recorded; the remaining items still run.
pub async fn run_sequential<F, Fut>(
    mut report: BatchReport,
    items: Vec<BatchItem>,
    policy: RetryPolicy,
    mut submit: F,
) -> BatchReport
where
    F: FnMut(usize, Address) -> Fut,
    Fut: Future<Output = Result<TxConfirmation, TransferFailure>>,
{
    let total = items.len();

    for (index, item) in items.into_iter().enumerate() {
        let mut retry = policy.backoff();
        let account = item.account;

        let result = retry
            .execute(|| submit(index, account), TransferFailure::is_transient)
            .await;

        let outcome = match result {
            Ok(confirmation) => {
                tracing::info!(
                    action = %report.action,
                    account = %account,
                    tx_hash = %confirmation.tx_hash,
                    block = ?confirmation.block_number,
                    "[{}/{}] confirmed",
                    index + 1,
                    total
                );
                ItemOutcome::confirmed(index, account, confirmation, retry.attempts())
            }
            Err(failure) => {
                tracing::warn!(
                    action = %report.action,
                    account = %account,
                    kind = %failure.kind,
                    "[{}/{}] failed: {}",
                    index + 1,
                    total,
                    failure.reason
                );
                ItemOutcome::failed(index, account, failure, retry.attempts())
            }
        };

        let outcome = match item.detail {
            Some(detail) => outcome.with_detail(detail),
            None => outcome,
        };
        report.record(outcome);
    }

    report.mark_completed();
    report
}
