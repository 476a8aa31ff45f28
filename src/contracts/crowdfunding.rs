//! Crowdfunding contract bindings and batch contributions

use std::time::Duration;

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};
use alloy::sol;

use crate::chain::{ChainConnection, ChainProvider, TxSender, await_confirmation};
use crate::errors::{ProvisionError, ProvisionResult};
use crate::provisioning::accounts::AccountBatch;
use crate::provisioning::shared::{BatchItem, BatchReport, RetryPolicy, TxConfirmation, run_sequential};

/// Value each test account contributes
pub const DEFAULT_CONTRIBUTION: &str = "0.001";

sol! {
    #[sol(rpc)]
    interface Crowdfunding {
        function contribute() external payable;
        function totalContributed() external view returns (uint256);
        function extendDeadline(uint256 additionalMinutes) external;
        function withdrawFunds() external;
    }
}

pub type CrowdfundingContract = Crowdfunding::CrowdfundingInstance<ChainProvider>;

pub fn crowdfunding(address: Address, provider: ChainProvider) -> CrowdfundingContract {
    Crowdfunding::new(address, provider)
}

fn call_error(method: &str, err: impl std::fmt::Display) -> ProvisionError {
    ProvisionError::contract(format!("Crowdfunding.{} failed: {}", method, err))
}

pub async fn total_contributed(contract: &CrowdfundingContract) -> ProvisionResult<U256> {
    contract
        .totalContributed()
        .call()
        .await
        .map_err(|e| call_error("totalContributed", e))
}

pub async fn withdraw_funds(contract: &CrowdfundingContract, timeout: Duration) -> ProvisionResult<TxConfirmation> {
    let pending = contract
        .withdrawFunds()
        .send()
        .await
        .map_err(|e| call_error("withdrawFunds", e))?;

    await_confirmation(pending, timeout)
        .await
        .map_err(|e| call_error("withdrawFunds", e))
}

pub async fn extend_deadline(
    contract: &CrowdfundingContract,
    additional_minutes: u64,
    timeout: Duration,
) -> ProvisionResult<TxConfirmation> {
    let pending = contract
        .extendDeadline(U256::from(additional_minutes))
        .send()
        .await
        .map_err(|e| call_error("extendDeadline", e))?;

    await_confirmation(pending, timeout)
        .await
        .map_err(|e| call_error("extendDeadline", e))
}

/// Every batch account contributes `amount` wei
pub async fn contribute_with_batch(
    connection: &ChainConnection,
    address: Address,
    batch: &AccountBatch,
    amount: U256,
    retry: RetryPolicy,
) -> ProvisionResult<BatchReport> {
    let signers = batch
        .iter()
        .map(|account| {
            account.verify()?;
            account.signer()
        })
        .collect::<ProvisionResult<Vec<_>>>()?;

    let items = signers.iter().map(|signer| BatchItem::new(signer.address())).collect();
    let report = BatchReport::new("contribute").with_amount(format_ether(amount));
    let contract = crowdfunding(address, connection.provider());

    let report = run_sequential(report, items, retry, |index, _| {
        let sender = TxSender::new(connection, signers[index].clone());
        let tx = contract.contribute().value(amount).into_transaction_request();
        async move { sender.submit(tx).await }
    })
    .await;

    Ok(report)
}
