use alloy::primitives::{Address, U256};

use crate::errors::ProvisionResult;
use crate::provisioning::shared::{TransferFailure, TxConfirmation};

/// Native-currency transfers from a single source account
pub trait TransferClient {
    /// Account the transfers are sent from
    fn source(&self) -> Address;

    /// Submit a value transfer and wait until it is confirmed
    async fn transfer(&self, to: Address, value: U256) -> Result<TxConfirmation, TransferFailure>;

    async fn balance_of(&self, account: Address) -> ProvisionResult<U256>;
}
