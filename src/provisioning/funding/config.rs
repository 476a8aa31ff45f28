use alloy::primitives::U256;
use alloy::primitives::utils::{ParseUnits, format_ether, parse_units};

use crate::errors::{ProvisionError, ProvisionResult};
use crate::provisioning::shared::RetryPolicy;

/// Native currency sent to each test account
pub const DEFAULT_FUNDING_AMOUNT: &str = "0.01";

/// Configuration for funding a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingConfig {
    /// Amount in wei sent to every recipient
    pub amount: U256,

    pub retry: RetryPolicy,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            amount: U256::from(10_000_000_000_000_000u64),
            retry: RetryPolicy::default(),
        }
    }
}

impl FundingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the amount from a decimal ether string such as "0.01"
    pub fn with_amount_ether(mut self, amount: &str) -> ProvisionResult<Self> {
        self.amount = parse_amount(amount)?;
        Ok(self)
    }

    pub fn with_amount(mut self, amount: U256) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn amount_ether(&self) -> String {
        format_ether(self.amount)
    }
}

/// Parse a positive decimal ether amount into wei
pub fn parse_amount(amount: &str) -> ProvisionResult<U256> {
    parse_amount_units(amount, 18)
}

/// Parse a positive decimal amount into base units with `decimals` places
pub fn parse_amount_units(amount: &str, decimals: u8) -> ProvisionResult<U256> {
    let trimmed = amount.trim();
    if trimmed.starts_with('-') {
        return Err(ProvisionError::config(format!("amount '{}' must not be negative", amount)));
    }

    let value = match parse_units(trimmed, decimals) {
        Ok(ParseUnits::U256(value)) => value,
        Ok(ParseUnits::I256(_)) => {
            return Err(ProvisionError::config(format!("amount '{}' must not be negative", amount)));
        }
        Err(e) => return Err(ProvisionError::config(format!("invalid amount '{}': {}", amount, e))),
    };

    if value.is_zero() {
        return Err(ProvisionError::config("amount must be greater than zero"));
    }

    Ok(value)
}
