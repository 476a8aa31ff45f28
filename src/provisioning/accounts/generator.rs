use alloy::signers::local::PrivateKeySigner;

use super::config::GeneratorConfig;
use super::models::{AccountBatch, AccountRecord};
use super::storage::save_batch_to_json;
use crate::errors::{ProvisionError, ProvisionResult};

/// Creates batches of fresh random key pairs
pub struct AccountGenerator {
    config: GeneratorConfig,
}

impl AccountGenerator {
    /// Create a new account generator
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Generate `batch_size` new key pairs in memory
    pub fn generate_batch(&self) -> ProvisionResult<AccountBatch> {
        if self.config.batch_size == 0 {
            return Err(ProvisionError::config("batch size must be at least 1"));
        }

        let mut batch = AccountBatch::new();
        for i in 0..self.config.batch_size {
            let signer = PrivateKeySigner::random();
            tracing::debug!("[{}/{}] generated {}", i + 1, self.config.batch_size, signer.address());
            batch.add_account(AccountRecord::from_signer(&signer));
        }

        Ok(batch)
    }

    /// Generate a batch and persist it over the configured output file
    pub fn generate_and_save(&self) -> ProvisionResult<AccountBatch> {
        let batch = self.generate_batch()?;
        save_batch_to_json(&batch, &self.config.output_file)?;

        tracing::info!(
            accounts = batch.len(),
            path = %self.config.output_file.display(),
            "test accounts generated"
        );

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioning::accounts::storage::load_batch_from_json;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_generates_exactly_n_valid_distinct_accounts() {
        for n in [1, 3, 7, 20] {
            let generator = AccountGenerator::new(GeneratorConfig::new().with_batch_size(n));
            let batch = generator.generate_batch().unwrap();

            assert_eq!(batch.len(), n as usize);
            let addresses = batch.addresses().unwrap();
            let unique: HashSet<_> = addresses.iter().collect();
            assert_eq!(unique.len(), n as usize);
        }
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let generator = AccountGenerator::new(GeneratorConfig::new().with_batch_size(0));
        assert!(matches!(generator.generate_batch(), Err(ProvisionError::Config(_))));
    }

    #[test]
    fn test_second_run_replaces_first_batch() {
        let dir = TempDir::new().unwrap();
        let config = GeneratorConfig::new()
            .with_batch_size(3)
            .with_output_file(dir.path().join("test-accounts.json"));
        let generator = AccountGenerator::new(config.clone());

        let first = generator.generate_and_save().unwrap();
        let second = generator.generate_and_save().unwrap();
        let on_disk = load_batch_from_json(&config.output_file).unwrap();

        assert_eq!(on_disk, second);
        assert!(first.iter().all(|a| !on_disk.accounts.contains(a)));
    }
}
