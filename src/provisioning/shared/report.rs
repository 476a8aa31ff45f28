use std::fmt;

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Proof that a transaction made it into a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxConfirmation {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

/// Why a single item of a batch failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The node refused the transaction (insufficient funds, bad nonce, ...)
    Rejected,
    /// Possibly broadcast, but no receipt was observed within the confirmation timeout
    Timeout,
    /// RPC or network failure before the transaction reached the node
    Transport,
    /// Mined with a failed status
    Reverted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Rejected => "rejected",
            FailureKind::Timeout => "timeout",
            FailureKind::Transport => "transport",
            FailureKind::Reverted => "reverted",
        };
        write!(f, "{}", label)
    }
}

/// A failed submit/confirm cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl TransferFailure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    /// Only failures where nothing was broadcast are safe to resubmit
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, FailureKind::Transport)
    }
}

impl fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

impl std::error::Error for TransferFailure {}

/// Final state of one batch item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Confirmed {
        tx_hash: B256,
        block_number: Option<u64>,
        attempts: u32,
    },
    Failed {
        kind: FailureKind,
        reason: String,
        attempts: u32,
    },
}

/// Outcome for one account of the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Position in the batch
    pub index: usize,

    /// Account the action was performed for
    pub account: Address,

    /// Action-specific note, e.g. the chosen proposal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(flatten)]
    pub status: ItemStatus,
}

impl ItemOutcome {
    pub fn confirmed(index: usize, account: Address, confirmation: TxConfirmation, attempts: u32) -> Self {
        Self {
            index,
            account,
            detail: None,
            status: ItemStatus::Confirmed {
                tx_hash: confirmation.tx_hash,
                block_number: confirmation.block_number,
                attempts,
            },
        }
    }

    pub fn failed(index: usize, account: Address, failure: TransferFailure, attempts: u32) -> Self {
        Self {
            index,
            account,
            detail: None,
            status: ItemStatus::Failed {
                kind: failure.kind,
                reason: failure.reason,
                attempts,
            },
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self.status, ItemStatus::Confirmed { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self.status {
            ItemStatus::Confirmed { attempts, .. } | ItemStatus::Failed { attempts, .. } => attempts,
        }
    }
}

/// Aggregated result of a sequential batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Unique run identifier
    pub run_id: Uuid,

    /// What was done for each account, e.g. "fund"
    pub action: String,

    /// Per-item value in ether, when the action transfers value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,

    /// Outcomes in batch order
    pub outcomes: Vec<ItemOutcome>,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchReport {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            action: action.into(),
            amount: None,
            outcomes: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn with_amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = Some(amount.into());
        self
    }

    pub fn record(&mut self, outcome: ItemOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn mark_completed(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn requested(&self) -> usize {
        self.outcomes.len()
    }

    pub fn confirmed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_confirmed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.requested() - self.confirmed_count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_confirmed())
    }

    pub fn all_confirmed(&self) -> bool {
        self.failed_count() == 0
    }

    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 100.0;
        }
        (self.confirmed_count() as f64 / self.requested() as f64) * 100.0
    }

    pub fn duration_seconds(&self) -> f64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirmation(n: u8) -> TxConfirmation {
        TxConfirmation {
            tx_hash: B256::repeat_byte(n),
            block_number: Some(n as u64),
        }
    }

    #[test]
    fn test_counters_track_outcomes() {
        let mut report = BatchReport::new("fund").with_amount("0.01");
        report.record(ItemOutcome::confirmed(0, Address::repeat_byte(1), confirmation(1), 1));
        report.record(ItemOutcome::failed(
            1,
            Address::repeat_byte(2),
            TransferFailure::new(FailureKind::Rejected, "insufficient funds"),
            1,
        ));
        report.record(ItemOutcome::confirmed(2, Address::repeat_byte(3), confirmation(3), 2));
        report.mark_completed();

        assert_eq!(report.requested(), 3);
        assert_eq!(report.confirmed_count(), 2);
        assert_eq!(report.failed_count(), 1);
        assert!(!report.all_confirmed());
        assert_eq!(report.failures().next().unwrap().index, 1);
        assert!((report.success_rate() - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_empty_report_is_fully_successful() {
        let report = BatchReport::new("fund");
        assert!(report.all_confirmed());
        assert_eq!(report.success_rate(), 100.0);
    }

    #[test]
    fn test_outcome_json_is_flat() {
        let outcome = ItemOutcome::failed(
            4,
            Address::repeat_byte(9),
            TransferFailure::new(FailureKind::Timeout, "no receipt"),
            3,
        )
        .with_detail("proposal 2");

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["kind"], "timeout");
        assert_eq!(value["attempts"], 3);
        assert_eq!(value["detail"], "proposal 2");
    }

    #[test]
    fn test_only_unsent_transfers_are_transient() {
        assert!(TransferFailure::new(FailureKind::Transport, "").is_transient());
        assert!(!TransferFailure::new(FailureKind::Timeout, "").is_transient());
        assert!(!TransferFailure::new(FailureKind::Rejected, "").is_transient());
        assert!(!TransferFailure::new(FailureKind::Reverted, "").is_transient());
    }
}
