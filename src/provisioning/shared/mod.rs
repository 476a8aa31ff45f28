pub mod batch;
pub mod report;
pub mod retry;

pub use batch::{BatchItem, run_sequential};
pub use report::{BatchReport, FailureKind, ItemOutcome, ItemStatus, TransferFailure, TxConfirmation};
pub use retry::{ExponentialBackoffRetry, RetryPolicy};
