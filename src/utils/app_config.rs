use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{Address, address};
use alloy::signers::local::PrivateKeySigner;
use dotenvy::dotenv;
use reqwest::Url;

use crate::errors::{ProvisionError, ProvisionResult};

/// BSC testnet public endpoint
pub const DEFAULT_RPC_URL: &str = "https://data-seed-prebsc-1-s1.binance.org:8545/";
pub const DEFAULT_ACCOUNTS_FILE: &str = "test-accounts.json";
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 120;
/// Upper bound for a single JSON-RPC request, connect included
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_KUI_TOKEN_ADDRESS: Address = address!("0xEc3Fe840fE40F1Df344eA16B44e1fB19A04a31e4");
pub const DEFAULT_VOTING_ADDRESS: Address = address!("0x9F48a6B286935F268dd5c33FF3d0c7CbFd83Cb7C");
pub const DEFAULT_CROWDFUNDING_ADDRESS: Address =
    address!("0xa39Cb2466F6CeffC7D7Aae143A2c173811036FAE");

/// Deployed contract addresses on the target network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    pub kui_token: Address,
    pub voting: Address,
    pub crowdfunding: Address,
}

impl Default for ContractAddresses {
    fn default() -> Self {
        Self {
            kui_token: DEFAULT_KUI_TOKEN_ADDRESS,
            voting: DEFAULT_VOTING_ADDRESS,
            crowdfunding: DEFAULT_CROWDFUNDING_ADDRESS,
        }
    }
}

/// Process-wide configuration, loaded once at startup and passed down explicitly
#[derive(Clone)]
pub struct AppConfig {
    pub rpc_url: Url,
    pub proxy_url: Option<Url>,
    private_key: Option<String>,
    pub accounts_file: PathBuf,
    pub confirmation_timeout: Duration,
    pub request_timeout: Duration,
    pub contracts: ContractAddresses,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("proxy_url", &self.proxy_url.as_ref().map(Url::as_str))
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("accounts_file", &self.accounts_file)
            .field("confirmation_timeout", &self.confirmation_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("contracts", &self.contracts)
            .finish()
    }
}

impl AppConfig {
    pub fn new(rpc_url: Url) -> Self {
        Self {
            rpc_url,
            proxy_url: None,
            private_key: None,
            accounts_file: PathBuf::from(DEFAULT_ACCOUNTS_FILE),
            confirmation_timeout: Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
            contracts: ContractAddresses::default(),
        }
    }

    /// Load configuration from the process environment, reading `.env` first if present
    pub fn from_env() -> ProvisionResult<Self> {
        if let Err(e) = dotenv() {
            tracing::debug!("no .env file loaded: {}", e);
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> ProvisionResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let rpc_url = get("RPC_URL")
            .or_else(|| get("FETCH_REQUEST"))
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        let rpc_url = parse_url("RPC_URL", &rpc_url)?;

        let proxy_url = get("PROXY_URL")
            .map(|raw| parse_url("PROXY_URL", &raw))
            .transpose()?;

        let accounts_file = get("ACCOUNTS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ACCOUNTS_FILE));

        let timeout_secs = parse_secs_or(
            "CONFIRMATION_TIMEOUT_SECS",
            get("CONFIRMATION_TIMEOUT_SECS"),
            DEFAULT_CONFIRMATION_TIMEOUT_SECS,
        )?;
        let rpc_timeout_secs = parse_secs_or("RPC_TIMEOUT_SECS", get("RPC_TIMEOUT_SECS"), DEFAULT_RPC_TIMEOUT_SECS)?;

        let contracts = ContractAddresses {
            kui_token: parse_address_or("KUI_TOKEN_ADDRESS", get("KUI_TOKEN_ADDRESS"), DEFAULT_KUI_TOKEN_ADDRESS)?,
            voting: parse_address_or("VOTING_ADDRESS", get("VOTING_ADDRESS"), DEFAULT_VOTING_ADDRESS)?,
            crowdfunding: parse_address_or(
                "CROWDFUNDING_ADDRESS",
                get("CROWDFUNDING_ADDRESS"),
                DEFAULT_CROWDFUNDING_ADDRESS,
            )?,
        };

        Ok(Self {
            rpc_url,
            proxy_url,
            private_key: get("PRIVATE_KEY"),
            accounts_file,
            confirmation_timeout: Duration::from_secs(timeout_secs),
            request_timeout: Duration::from_secs(rpc_timeout_secs),
            contracts,
        })
    }

    pub fn with_private_key(mut self, private_key: impl Into<String>) -> Self {
        self.private_key = Some(private_key.into());
        self
    }

    pub fn with_proxy_url(mut self, proxy_url: Option<Url>) -> Self {
        self.proxy_url = proxy_url;
        self
    }

    pub fn with_accounts_file(mut self, path: PathBuf) -> Self {
        self.accounts_file = path;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    /// Signer for the funded source account
    pub fn source_signer(&self) -> ProvisionResult<PrivateKeySigner> {
        let key = self
            .private_key
            .as_deref()
            .ok_or_else(|| ProvisionError::config("PRIVATE_KEY must be set in .env file or environment variables"))?;

        PrivateKeySigner::from_str(key.trim())
            .map_err(|e| ProvisionError::config(format!("invalid PRIVATE_KEY: {}", e)))
    }
}

fn parse_url(name: &str, raw: &str) -> ProvisionResult<Url> {
    Url::parse(raw.trim()).map_err(|e| ProvisionError::config(format!("invalid {} '{}': {}", name, raw, e)))
}

fn parse_secs_or(name: &str, raw: Option<String>, default: u64) -> ProvisionResult<u64> {
    let secs = match raw {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ProvisionError::config(format!("invalid {} '{}': {}", name, raw, e)))?,
        None => default,
    };

    if secs == 0 {
        return Err(ProvisionError::config(format!("{} must be at least 1 second", name)));
    }
    Ok(secs)
}

fn parse_address_or(name: &str, raw: Option<String>, default: Address) -> ProvisionResult<Address> {
    match raw {
        Some(raw) => Address::from_str(raw.trim())
            .map_err(|e| ProvisionError::config(format!("invalid {} '{}': {}", name, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.rpc_url.as_str(), DEFAULT_RPC_URL);
        assert!(config.proxy_url.is_none());
        assert!(!config.has_private_key());
        assert_eq!(config.accounts_file, PathBuf::from(DEFAULT_ACCOUNTS_FILE));
        assert_eq!(config.confirmation_timeout, Duration::from_secs(120));
        assert_eq!(config.request_timeout, Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS));
        assert_eq!(config.contracts, ContractAddresses::default());
    }

    #[test]
    fn test_fetch_request_is_accepted_as_rpc_alias() {
        let config = AppConfig::from_lookup(lookup(&[
            ("FETCH_REQUEST", "https://data-seed-prebsc-2-s1.bnbchain.org:8545/"),
            ("PROXY_URL", "http://127.0.0.1:7890"),
        ]))
        .unwrap();

        assert_eq!(config.rpc_url.host_str(), Some("data-seed-prebsc-2-s1.bnbchain.org"));
        assert_eq!(config.proxy_url.unwrap().port(), Some(7890));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let err = AppConfig::from_lookup(lookup(&[("CONFIRMATION_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)));

        let err = AppConfig::from_lookup(lookup(&[("RPC_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)));

        let err = AppConfig::from_lookup(lookup(&[("VOTING_ADDRESS", "0x1234")])).unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)));
    }

    #[test]
    fn test_rpc_timeout_from_environment() {
        let config = AppConfig::from_lookup(lookup(&[("RPC_TIMEOUT_SECS", "5")])).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_source_signer_requires_private_key() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert!(matches!(config.source_signer(), Err(ProvisionError::Config(_))));

        let signer = PrivateKeySigner::random();
        let key = alloy::hex::encode_prefixed(signer.to_bytes());
        let config = config.with_private_key(key);
        assert_eq!(config.source_signer().unwrap().address(), signer.address());
    }

    #[test]
    fn test_debug_output_redacts_private_key() {
        let config = AppConfig::from_lookup(lookup(&[("PRIVATE_KEY", "0xdeadbeef")])).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("deadbeef"));
        assert!(rendered.contains("<redacted>"));
    }
}
