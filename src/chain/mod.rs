pub mod client;
pub mod traits;

#[cfg(test)]
pub(crate) mod mock_rpc;

pub use client::{ChainConnection, ChainProvider, EvmTransferClient, TxSender, await_confirmation};
pub use traits::TransferClient;
