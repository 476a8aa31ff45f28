pub mod config;
pub mod funder;

pub use config::{DEFAULT_FUNDING_AMOUNT, FundingConfig, parse_amount, parse_amount_units};
pub use funder::{BalanceCheck, Funder};
