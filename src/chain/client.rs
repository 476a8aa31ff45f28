//! Provider construction and transaction confirmation over JSON-RPC

use std::time::Duration;

use alloy::consensus::TxEnvelope;
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{Ethereum, EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::Http;
use alloy::transports::{RpcError, TransportError};

use super::traits::TransferClient;
use crate::errors::{ProvisionError, ProvisionResult};
use crate::provisioning::shared::{FailureKind, TransferFailure, TxConfirmation};
use crate::utils::app_config::AppConfig;

/// Gas for a plain value transfer to an externally owned account
pub const TRANSFER_GAS: u64 = 21_000;

/// The provider type used everywhere in the crate
pub type ChainProvider = DynProvider<Ethereum>;

/// A configured RPC connection that providers and signers are attached to
#[derive(Clone)]
pub struct ChainConnection {
    client: RpcClient,
    confirmation_timeout: Duration,
}

impl ChainConnection {
    /// Build the HTTP transport, routing through the configured proxy if any.
    ///
    /// Every request, connect included, is bounded by `request_timeout`.
    pub fn connect(config: &AppConfig) -> ProvisionResult<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout);

        if let Some(proxy_url) = &config.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url.clone())
                .map_err(|e| ProvisionError::network(format!("invalid proxy {}: {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
            tracing::info!(proxy = %proxy_url, "routing RPC traffic through proxy");
        }

        let http_client = builder
            .build()
            .map_err(|e| ProvisionError::network(format!("failed to build HTTP client: {}", e)))?;

        let is_local = matches!(config.rpc_url.host_str(), Some("localhost" | "127.0.0.1"));
        let transport = Http::with_client(http_client, config.rpc_url.clone());
        let client = RpcClient::new(transport, is_local);

        tracing::debug!(rpc_url = %config.rpc_url, timeout = ?config.request_timeout, "RPC client ready");

        Ok(Self {
            client,
            confirmation_timeout: config.confirmation_timeout,
        })
    }

    pub fn confirmation_timeout(&self) -> Duration {
        self.confirmation_timeout
    }

    /// Read-only provider
    pub fn provider(&self) -> ChainProvider {
        DynProvider::new(ProviderBuilder::new().connect_client(self.client.clone()))
    }

    /// Provider that signs and fills transactions for `signer`
    pub fn signing_provider(&self, signer: PrivateKeySigner) -> ChainProvider {
        DynProvider::new(ProviderBuilder::new().wallet(signer).connect_client(self.client.clone()))
    }

    pub async fn chain_id(&self) -> ProvisionResult<u64> {
        self.provider()
            .get_chain_id()
            .await
            .map_err(|e| ProvisionError::network(format!("failed to fetch chain id: {}", e)))
    }

    pub async fn balance_of(&self, account: Address) -> ProvisionResult<U256> {
        self.provider()
            .get_balance(account)
            .await
            .map_err(|e| ProvisionError::network(format!("failed to fetch balance of {}: {}", account, e)))
    }
}

/// Failure while preparing a transaction; nothing has been sent yet
pub fn prepare_failure(err: TransportError) -> TransferFailure {
    let kind = match &err {
        RpcError::ErrorResp(_) => FailureKind::Rejected,
        _ => FailureKind::Transport,
    };
    TransferFailure::new(kind, err.to_string())
}

/// Failure while broadcasting a signed transaction.
///
/// Unless the node answered with an error, the transaction may have been
/// accepted before the response was lost, so the outcome is unknown.
pub fn broadcast_failure(err: &TransportError, tx_hash: B256) -> TransferFailure {
    match err {
        RpcError::ErrorResp(payload) => TransferFailure::new(FailureKind::Rejected, payload.to_string()),
        _ => TransferFailure::new(
            FailureKind::Timeout,
            format!("broadcast of {} was not acknowledged and may still land: {}", tx_hash, err),
        ),
    }
}

/// Turn a mined receipt into a confirmation, or a `Reverted` failure
pub fn confirmation_from_receipt<R: ReceiptResponse>(receipt: &R) -> Result<TxConfirmation, TransferFailure> {
    let tx_hash = receipt.transaction_hash();

    if !receipt.status() {
        return Err(TransferFailure::new(
            FailureKind::Reverted,
            format!("transaction {} reverted in block {:?}", tx_hash, receipt.block_number()),
        ));
    }

    Ok(TxConfirmation {
        tx_hash,
        block_number: receipt.block_number(),
    })
}

/// Wait for a broadcast transaction's receipt and check it succeeded
pub async fn await_confirmation(
    pending: PendingTransactionBuilder<Ethereum>,
    timeout: Duration,
) -> Result<TxConfirmation, TransferFailure> {
    let tx_hash = *pending.tx_hash();
    tracing::debug!(%tx_hash, "waiting for confirmation");

    // The transaction may still land after any error here, so none of them are retryable
    let receipt = pending
        .with_timeout(Some(timeout))
        .get_receipt()
        .await
        .map_err(|e| TransferFailure::new(FailureKind::Timeout, format!("{} (tx {})", e, tx_hash)))?;

    confirmation_from_receipt(&receipt)
}

/// Signs transactions for one account and broadcasts them as raw bytes.
///
/// Only the preparation steps can fail with a retryable `Transport` error;
/// once signed bytes have been handed to the node a transaction is never rebuilt.
#[derive(Clone)]
pub struct TxSender {
    provider: ChainProvider,
    wallet: EthereumWallet,
    address: Address,
    confirmation_timeout: Duration,
}

impl TxSender {
    pub fn new(connection: &ChainConnection, signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        Self {
            provider: connection.provider(),
            wallet: EthereumWallet::from(signer),
            address,
            confirmation_timeout: connection.confirmation_timeout(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Fill nonce, chain id, gas price and gas limit, then sign
    pub async fn sign(&self, tx: TransactionRequest) -> Result<TxEnvelope, TransferFailure> {
        let nonce = self
            .provider
            .get_transaction_count(self.address)
            .pending()
            .await
            .map_err(prepare_failure)?;
        let chain_id = self.provider.get_chain_id().await.map_err(prepare_failure)?;
        let gas_price = self.provider.get_gas_price().await.map_err(prepare_failure)?;

        let mut tx = tx
            .with_from(self.address)
            .with_nonce(nonce)
            .with_chain_id(chain_id)
            .with_gas_price(gas_price);

        if TransactionBuilder::<Ethereum>::gas_limit(&tx).is_none() {
            let gas = self.provider.estimate_gas(tx.clone()).await.map_err(prepare_failure)?;
            tx = tx.with_gas_limit(gas);
        }

        tx.build(&self.wallet)
            .await
            .map_err(|e| TransferFailure::new(FailureKind::Rejected, format!("failed to sign transaction: {}", e)))
    }

    pub async fn broadcast(&self, envelope: &TxEnvelope) -> Result<PendingTransactionBuilder<Ethereum>, TransferFailure> {
        let tx_hash = *envelope.tx_hash();
        tracing::debug!(%tx_hash, from = %self.address, "broadcasting");

        self.provider
            .send_raw_transaction(&envelope.encoded_2718())
            .await
            .map_err(|e| broadcast_failure(&e, tx_hash))
    }

    /// Sign, broadcast once and wait for the receipt
    pub async fn submit(&self, tx: TransactionRequest) -> Result<TxConfirmation, TransferFailure> {
        let envelope = self.sign(tx).await?;
        let pending = self.broadcast(&envelope).await?;
        await_confirmation(pending, self.confirmation_timeout).await
    }
}

/// Value transfers from the funded source account over a live RPC endpoint
pub struct EvmTransferClient {
    provider: ChainProvider,
    sender: TxSender,
}

impl EvmTransferClient {
    pub fn new(connection: &ChainConnection, signer: PrivateKeySigner) -> Self {
        Self {
            provider: connection.provider(),
            sender: TxSender::new(connection, signer),
        }
    }
}

impl TransferClient for EvmTransferClient {
    fn source(&self) -> Address {
        self.sender.address()
    }

    async fn transfer(&self, to: Address, value: U256) -> Result<TxConfirmation, TransferFailure> {
        let tx = TransactionRequest::default()
            .with_to(to)
            .with_value(value)
            .with_gas_limit(TRANSFER_GAS);

        self.sender.submit(tx).await
    }

    async fn balance_of(&self, account: Address) -> ProvisionResult<U256> {
        self.provider
            .get_balance(account)
            .await
            .map_err(|e| ProvisionError::network(format!("failed to fetch balance of {}: {}", account, e)))
    }
}
