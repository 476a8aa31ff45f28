//! KuiToken bindings and read/mint helpers

use alloy::primitives::{Address, U256};
use alloy::sol;

use crate::chain::{ChainProvider, await_confirmation};
use crate::errors::{ProvisionError, ProvisionResult};
use crate::provisioning::shared::TxConfirmation;

sol! {
    #[sol(rpc)]
    interface KuiToken {
        function name() external view returns (string memory);
        function symbol() external view returns (string memory);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function owner() external view returns (address);
        function mint(address to, uint256 amount) external;
    }
}

/// A KuiToken instance with the crate's provider
pub type KuiTokenContract = KuiToken::KuiTokenInstance<ChainProvider>;

/// Snapshot of the token's public state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSummary {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
    pub owner: Address,
    pub owner_balance: U256,
    /// Tokens held by the token contract itself
    pub contract_balance: U256,
}

pub fn kui_token(address: Address, provider: ChainProvider) -> KuiTokenContract {
    KuiToken::new(address, provider)
}

fn call_error(method: &str, err: impl std::fmt::Display) -> ProvisionError {
    ProvisionError::contract(format!("KuiToken.{} failed: {}", method, err))
}

pub async fn token_summary(token: &KuiTokenContract) -> ProvisionResult<TokenSummary> {
    let address = *token.address();
    let name = token.name().call().await.map_err(|e| call_error("name", e))?;
    let symbol = token.symbol().call().await.map_err(|e| call_error("symbol", e))?;
    let decimals = token.decimals().call().await.map_err(|e| call_error("decimals", e))?;
    let total_supply = token
        .totalSupply()
        .call()
        .await
        .map_err(|e| call_error("totalSupply", e))?;
    let owner = token.owner().call().await.map_err(|e| call_error("owner", e))?;
    let owner_balance = token
        .balanceOf(owner)
        .call()
        .await
        .map_err(|e| call_error("balanceOf", e))?;
    let contract_balance = token
        .balanceOf(address)
        .call()
        .await
        .map_err(|e| call_error("balanceOf", e))?;

    Ok(TokenSummary {
        address,
        name,
        symbol,
        decimals,
        total_supply,
        owner,
        owner_balance,
        contract_balance,
    })
}

pub async fn decimals(token: &KuiTokenContract) -> ProvisionResult<u8> {
    token.decimals().call().await.map_err(|e| call_error("decimals", e))
}

pub async fn token_owner(token: &KuiTokenContract) -> ProvisionResult<Address> {
    token.owner().call().await.map_err(|e| call_error("owner", e))
}

pub async fn balance_of(token: &KuiTokenContract, account: Address) -> ProvisionResult<U256> {
    token
        .balanceOf(account)
        .call()
        .await
        .map_err(|e| call_error("balanceOf", e))
}

/// Mint `amount` base units to `to`; only the owner may do this
pub async fn mint(
    token: &KuiTokenContract,
    to: Address,
    amount: U256,
    timeout: std::time::Duration,
) -> ProvisionResult<TxConfirmation> {
    let pending = token
        .mint(to, amount)
        .send()
        .await
        .map_err(|e| call_error("mint", e))?;

    await_confirmation(pending, timeout)
        .await
        .map_err(|e| call_error("mint", e))
}

/// Check that `expected` owns the token
pub async fn ensure_owner(token: &KuiTokenContract, expected: Address) -> ProvisionResult<()> {
    let owner = token_owner(token).await?;
    if owner != expected {
        return Err(ProvisionError::contract(format!(
            "token owner is {}, expected {}",
            owner, expected
        )));
    }
    Ok(())
}
