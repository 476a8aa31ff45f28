use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use super::models::AccountBatch;
use crate::errors::{ProvisionError, ProvisionResult};

/// Save a batch of generated accounts to a JSON file.
///
/// The batch is written to a temporary file next to `path` and renamed over it,
/// so a failed write leaves any previous batch untouched.
pub fn save_batch_to_json(batch: &AccountBatch, path: &Path) -> ProvisionResult<()> {
    let json_string = serde_json::to_string_pretty(batch)
        .map_err(|e| ProvisionError::persistence(format!("Failed to serialize batch to JSON: {}", e)))?;

    write_atomically(path, json_string.as_bytes(), |file, bytes| file.write_all(bytes))?;

    tracing::debug!(path = %path.display(), accounts = batch.len(), "batch persisted");

    Ok(())
}

/// Write `contents` through `write` into a sibling temp file, then rename it onto `path`
fn write_atomically<W>(path: &Path, contents: &[u8], write: W) -> ProvisionResult<()>
where
    W: FnOnce(&mut File, &[u8]) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
        ProvisionError::persistence(format!("Failed to create temp file in {}: {}", dir.display(), e))
    })?;

    write(temp_file.as_file_mut(), contents)
        .map_err(|e| ProvisionError::persistence(format!("Failed to write batch: {}", e)))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| ProvisionError::persistence(format!("Failed to flush batch: {}", e)))?;

    temp_file.persist(path).map_err(|e| {
        ProvisionError::persistence(format!("Failed to write JSON file to {}: {}", path.display(), e.error))
    })?;

    Ok(())
}

/// Load a batch of generated accounts from a JSON file, verifying every key pair
pub fn load_batch_from_json(path: &Path) -> ProvisionResult<AccountBatch> {
    if !path.exists() {
        return Err(ProvisionError::persistence(format!("File not found: {}", path.display())));
    }

    let json_string = fs::read_to_string(path).map_err(|e| {
        ProvisionError::persistence(format!("Failed to read JSON file from {}: {}", path.display(), e))
    })?;

    let batch: AccountBatch = serde_json::from_str(&json_string)
        .map_err(|e| ProvisionError::persistence(format!("Failed to deserialize JSON: {}", e)))?;

    batch.verify()?;

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioning::accounts::models::AccountRecord;
    use alloy::signers::local::PrivateKeySigner;
    use tempfile::TempDir;

    fn random_batch(n: usize) -> AccountBatch {
        (0..n)
            .map(|_| AccountRecord::from_signer(&PrivateKeySigner::random()))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_save_and_load_batch() -> ProvisionResult<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("test-accounts.json");

        let batch = random_batch(5);
        save_batch_to_json(&batch, &path)?;

        let loaded_batch = load_batch_from_json(&path)?;
        assert_eq!(loaded_batch, batch);

        Ok(())
    }

    #[test]
    fn test_save_overwrites_previous_batch() -> ProvisionResult<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("test-accounts.json");

        save_batch_to_json(&random_batch(7), &path)?;
        let second = random_batch(2);
        save_batch_to_json(&second, &path)?;

        assert_eq!(load_batch_from_json(&path)?, second);
        Ok(())
    }

    #[test]
    fn test_failed_write_keeps_previous_batch() -> ProvisionResult<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("test-accounts.json");
        let first = random_batch(3);
        save_batch_to_json(&first, &path)?;

        let replacement = serde_json::to_string_pretty(&random_batch(3))?;
        let result = write_atomically(&path, replacement.as_bytes(), |file, bytes| {
            file.write_all(&bytes[..bytes.len() / 2])?;
            Err(io::Error::other("disk full"))
        });

        assert!(matches!(result, Err(ProvisionError::Persistence(_))));
        assert_eq!(load_batch_from_json(&path)?, first);
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_failed_rename_cleans_up_temp_file() -> ProvisionResult<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("test-accounts.json");
        let first = random_batch(3);
        save_batch_to_json(&first, &path)?;

        // Renaming over a non-empty directory fails after the temp file was written
        let blocked = dir.path().join("blocked");
        fs::create_dir(&blocked)?;
        fs::write(blocked.join("keep"), "x")?;
        assert!(save_batch_to_json(&random_batch(3), &blocked).is_err());

        assert_eq!(load_batch_from_json(&path)?, first);
        let leftovers = fs::read_dir(dir.path())?.count();
        assert_eq!(leftovers, 2);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let result = load_batch_from_json(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(ProvisionError::Persistence(_))));
    }

    #[test]
    fn test_tampered_batch_is_rejected() -> ProvisionResult<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("test-accounts.json");

        let mut batch = random_batch(2);
        batch.accounts[1].address = PrivateKeySigner::random().address().to_checksum(None);
        fs::write(&path, serde_json::to_string_pretty(&batch)?)?;

        assert!(matches!(load_batch_from_json(&path), Err(ProvisionError::Persistence(_))));
        Ok(())
    }
}
