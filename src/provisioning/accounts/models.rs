use std::str::FromStr;

use alloy::hex;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use serde::{Deserialize, Serialize};

use crate::errors::{ProvisionError, ProvisionResult};

/// A generated key pair as stored in the batch file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    /// Checksummed address
    pub address: String,

    /// 0x-prefixed hex secret key
    pub private_key: String,
}

impl AccountRecord {
    pub fn from_signer(signer: &PrivateKeySigner) -> Self {
        Self {
            address: signer.address().to_checksum(None),
            private_key: hex::encode_prefixed(signer.to_bytes()),
        }
    }

    /// Parse the stored address
    pub fn address(&self) -> ProvisionResult<Address> {
        Address::from_str(&self.address)
            .map_err(|e| ProvisionError::persistence(format!("invalid address '{}': {}", self.address, e)))
    }

    /// Rebuild the signer from the stored key
    pub fn signer(&self) -> ProvisionResult<PrivateKeySigner> {
        PrivateKeySigner::from_str(&self.private_key).map_err(|e| {
            ProvisionError::persistence(format!("invalid private key for {}: {}", self.address, e))
        })
    }

    /// Check that the address is the one derived from the private key
    pub fn verify(&self) -> ProvisionResult<Address> {
        let stored = self.address()?;
        let derived = self.signer()?.address();

        if stored != derived {
            return Err(ProvisionError::persistence(format!(
                "address {} does not match its private key (derives {})",
                self.address, derived
            )));
        }

        Ok(derived)
    }
}

/// Ordered set of generated accounts, persisted as a bare JSON array
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountBatch {
    pub accounts: Vec<AccountRecord>,
}

impl AccountBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&mut self, account: AccountRecord) {
        self.accounts.push(account);
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccountRecord> {
        self.accounts.iter()
    }

    /// Verified addresses in batch order
    pub fn addresses(&self) -> ProvisionResult<Vec<Address>> {
        self.accounts.iter().map(AccountRecord::verify).collect()
    }

    /// Verify every record of the batch
    pub fn verify(&self) -> ProvisionResult<()> {
        for (i, account) in self.accounts.iter().enumerate() {
            account
                .verify()
                .map_err(|e| ProvisionError::persistence(format!("record {}: {}", i, e)))?;
        }
        Ok(())
    }
}

impl From<Vec<AccountRecord>> for AccountBatch {
    fn from(accounts: Vec<AccountRecord>) -> Self {
        Self { accounts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_round_trips_through_signer() {
        let signer = PrivateKeySigner::random();
        let record = AccountRecord::from_signer(&signer);

        assert!(record.private_key.starts_with("0x"));
        assert_eq!(record.private_key.len(), 66);
        assert_eq!(record.verify().unwrap(), signer.address());
        assert_eq!(record.signer().unwrap().address(), signer.address());
    }

    #[test]
    fn test_mismatched_address_fails_verification() {
        let mut record = AccountRecord::from_signer(&PrivateKeySigner::random());
        record.address = PrivateKeySigner::random().address().to_checksum(None);

        assert!(matches!(record.verify(), Err(ProvisionError::Persistence(_))));
    }

    #[test]
    fn test_batch_serializes_as_array_with_camel_case_keys() {
        let batch = AccountBatch::from(vec![AccountRecord::from_signer(&PrivateKeySigner::random())]);
        let value = serde_json::to_value(&batch).unwrap();

        let entries = value.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].get("address").is_some());
        assert!(entries[0].get("privateKey").is_some());
    }
}
