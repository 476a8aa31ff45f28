// Shared CLI utilities for the binaries
pub mod formatting;

pub use formatting::{format_record, format_table, print_batch_summary, print_header};

use crate::errors::{ProvisionError, ProvisionResult};

/// Confirm an irreversible operation
pub fn confirm(message: &str) -> ProvisionResult<bool> {
    use dialoguer::Confirm;
    Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| ProvisionError::config(format!("confirmation prompt failed: {}", e)))
}

/// Ask for the source account's private key without echoing it
pub fn prompt_private_key() -> ProvisionResult<String> {
    use dialoguer::Password;
    Password::new()
        .with_prompt("Source account private key")
        .interact()
        .map_err(|e| ProvisionError::config(format!("private key prompt failed: {}", e)))
}

/// Print a success message
pub fn print_success(message: &str) {
    use colored::Colorize;
    eprintln!("{}", format!("✓ {}", message).green());
}

/// Print an info message
pub fn print_info(message: &str) {
    use colored::Colorize;
    eprintln!("{}", format!("ℹ {}", message).bright_cyan());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    use colored::Colorize;
    eprintln!("{}", format!("⚠ {}", message).yellow());
}
