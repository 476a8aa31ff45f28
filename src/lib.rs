// Public library interface for kui-testnet
pub mod chain;
pub mod cli_helper;
pub mod cli_utils;
pub mod contracts;
pub mod errors;
pub mod listener;
pub mod provisioning;
pub mod utils;

pub use errors::{ProvisionError, ProvisionResult};
