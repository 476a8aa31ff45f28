//! Follows the voting contract's events by polling block ranges

use std::time::Duration;

use alloy::primitives::Address;
use alloy::providers::Provider;
use alloy::rpc::types::Filter;

use crate::chain::{ChainConnection, ChainProvider};
use crate::contracts::voting::{VotingEvent, decode_voting_event};
use crate::errors::{ProvisionError, ProvisionResult};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Public BSC endpoints reject wider `eth_getLogs` ranges
pub const MAX_BLOCK_RANGE: u64 = 5_000;

/// Inclusive block range to fetch next, if any
pub fn next_range(cursor: u64, latest: u64) -> Option<(u64, u64)> {
    if cursor > latest {
        return None;
    }
    Some((cursor, latest.min(cursor + MAX_BLOCK_RANGE - 1)))
}

/// An event together with the block it was emitted in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedEvent {
    pub block_number: Option<u64>,
    pub event: VotingEvent,
}

pub struct VoteListener {
    provider: ChainProvider,
    address: Address,
    poll_interval: Duration,
    cursor: Option<u64>,
}

impl VoteListener {
    pub fn new(connection: &ChainConnection, address: Address) -> Self {
        Self {
            provider: connection.provider(),
            address,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cursor: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Start from a given block instead of the chain head
    pub fn from_block(mut self, block: u64) -> Self {
        self.cursor = Some(block);
        self
    }

    /// Fetch and decode events since the last successful poll.
    ///
    /// The cursor only moves once a range has been fetched.
    pub async fn poll_once(&mut self) -> ProvisionResult<Vec<ObservedEvent>> {
        let latest = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| ProvisionError::network(format!("failed to fetch block number: {}", e)))?;

        let cursor = *self.cursor.get_or_insert(latest);
        let Some((from, to)) = next_range(cursor, latest) else {
            return Ok(Vec::new());
        };

        let filter = Filter::new().address(self.address).from_block(from).to_block(to);
        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| ProvisionError::network(format!("failed to fetch logs {}..={}: {}", from, to, e)))?;

        self.cursor = Some(to + 1);

        Ok(logs
            .iter()
            .filter_map(|log| {
                decode_voting_event(&log.inner.data).map(|event| ObservedEvent {
                    block_number: log.block_number,
                    event,
                })
            })
            .collect())
    }

    /// Poll until Ctrl-C, handing every event to `on_event`
    pub async fn run<F>(self, on_event: F) -> ProvisionResult<()>
    where
        F: FnMut(&ObservedEvent),
    {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };
        self.run_until(ctrl_c, on_event).await
    }

    /// Poll until `shutdown` resolves, even if a poll is still in flight
    pub async fn run_until<S, F>(mut self, shutdown: S, mut on_event: F) -> ProvisionResult<()>
    where
        S: Future<Output = ()>,
        F: FnMut(&ObservedEvent),
    {
        tracing::info!(contract = %self.address, interval = ?self.poll_interval, "listening for voting events");

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                polled = self.poll_once() => match polled {
                    Ok(events) => events.iter().for_each(&mut on_event),
                    Err(e) => tracing::warn!("poll failed, retrying next tick: {}", e),
                },
            }
        }

        tracing::info!("stopping listener");
        Ok(())
    }
}
