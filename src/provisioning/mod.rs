//! Test-account provisioning: generate a batch of key pairs, persist it, then
//! fund every account from one source account.

pub mod accounts;
pub mod funding;
pub mod shared;
