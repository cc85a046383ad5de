//! Relay service
//!
//! The single off-chain process that moves messages between chains: on a
//! fixed interval it scans every chain's outbound log from a per-chain
//! cursor and, for each new message, calls `approve` then `execute` on the
//! destination chain's gateway.
//!
//! Two properties the loop guarantees:
//!
//! - **Single flight**: at most one relay cycle runs at a time. The cycle
//!   guard is taken with `try_lock`; a timer tick (or a manual trigger)
//!   that finds a cycle in flight is skipped entirely, never queued.
//! - **Idempotent retry without bookkeeping**: the cursor only advances
//!   past a message once its submission succeeded. On a submission failure
//!   the message is still in the source log at the cursor, so the next
//!   scan retries it; the destination gateway's status field is the only
//!   record of what has been delivered.
//!
//! Cursors are persisted to a JSON file (when configured) so a restarted
//! relayer resumes from where the previous process stopped.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::chain::gateway::GatewayError;
use crate::chain::{Chain, LocalNetwork};
use crate::config::RelayerConfig;
use crate::types::{Address, Message, MessageStatus};

// ============================================================================
// RELAY STATE
// ============================================================================

/// Per-source-chain scan offsets into the outbound logs.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CursorStore {
    cursors: HashMap<String, u64>,
}

impl CursorStore {
    fn load(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(CursorStore::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read cursor file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse cursor file {}", path.display()))
    }

    fn save(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write cursor file {}", path.display()))
    }
}

// ============================================================================
// RELAYER
// ============================================================================

/// The observation-and-forward loop between the configured chains.
pub struct Relayer {
    /// The trusted address gateways accept `approve` from
    address: Address,
    chains: HashMap<String, Arc<Chain>>,
    polling_interval: Duration,
    cursor_path: Option<PathBuf>,
    cursors: RwLock<CursorStore>,
    /// Non-blocking re-entry guard: held for the duration of one cycle
    cycle_guard: Mutex<()>,
}

impl Relayer {
    /// Create a relayer over the network's chains, resuming from persisted
    /// cursors when a cursor file is configured and present.
    pub fn new(network: &LocalNetwork, config: &RelayerConfig) -> Result<Self> {
        let chains: HashMap<String, Arc<Chain>> = network
            .chains()
            .into_iter()
            .map(|chain| (chain.name().to_string(), chain))
            .collect();

        let cursors = match &config.cursor_path {
            Some(path) => CursorStore::load(path)?,
            None => CursorStore::default(),
        };

        Ok(Relayer {
            address: config.address,
            chains,
            polling_interval: Duration::from_millis(config.polling_interval_ms),
            cursor_path: config.cursor_path.clone(),
            cursors: RwLock::new(cursors),
            cycle_guard: Mutex::new(()),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Current scan offset for a source chain.
    pub async fn cursor(&self, chain: &str) -> u64 {
        self.cursors
            .read()
            .await
            .cursors
            .get(chain)
            .copied()
            .unwrap_or(0)
    }

    /// Start the relay service (blocking).
    pub async fn run(&self) {
        info!(
            "starting relayer: {} chains, polling_interval={}ms",
            self.chains.len(),
            self.polling_interval.as_millis()
        );

        let mut interval = tokio::time::interval(self.polling_interval);
        // A tick that fires while a cycle is still running is dropped, not
        // queued behind it.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if !self.trigger().await {
                debug!("relay cycle already in flight, skipping tick");
            }
        }
    }

    /// Run one relay cycle now, unless one is already in flight. Returns
    /// whether a cycle ran. This is the entry point for both the timer task
    /// and the manual trigger.
    pub async fn trigger(&self) -> bool {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            return false;
        };
        self.run_cycle().await;
        true
    }

    /// Scan every chain's outbound log and forward the new messages.
    /// Per-chain failures are logged and retried on the next cycle; they do
    /// not stop the scan of the other chains.
    async fn run_cycle(&self) {
        for (name, chain) in &self.chains {
            if let Err(e) = self.process_source(name, chain).await {
                error!("error relaying from `{}`: {:#}", name, e);
            }
        }
    }

    async fn process_source(&self, source: &str, chain: &Arc<Chain>) -> Result<()> {
        let cursor = self.cursor(source).await;
        let messages = chain.outbound_since(cursor).await;
        if messages.is_empty() {
            return Ok(());
        }
        debug!("found {} new messages on `{}`", messages.len(), source);

        for message in messages {
            let id = message.id;
            let destination = message.destination_chain.clone();

            let Some(dest_chain) = self.chains.get(&destination) else {
                // Unroutable: no configured chain will ever accept this
                // message, so advance past it instead of wedging the scan.
                warn!(
                    "message {} from `{}` addressed to unknown chain `{}`, skipping",
                    id, source, destination
                );
                self.advance_cursor(source).await;
                continue;
            };

            match self.deliver(dest_chain, message).await {
                Ok(status) => {
                    info!(
                        "relayed message {} from `{}` to `{}`: {}",
                        id, source, destination, status
                    );
                    self.advance_cursor(source).await;
                }
                Err(e) => {
                    // The cursor stays put: the message is still in the
                    // source log and the next scan retries it.
                    return Err(e).with_context(|| {
                        format!("delivering message {} to `{}`", id, destination)
                    });
                }
            }
        }

        Ok(())
    }

    /// Approve then execute one message on its destination gateway. A
    /// duplicate delivery is reported by the gateway's replay gate and
    /// treated as already done.
    async fn deliver(&self, dest_chain: &Arc<Chain>, message: Message) -> Result<MessageStatus> {
        let id = message.id;

        match dest_chain.approve_message(self.address, message).await {
            Ok(()) => {}
            Err(GatewayError::AlreadyApproved(_)) => {
                debug!("message {} already approved, continuing to execute", id);
            }
            Err(e) => return Err(e).context("approve failed"),
        }

        match dest_chain.execute_message(id).await {
            Ok(status) => Ok(status),
            Err(GatewayError::NotExecutable { status, .. }) if status.is_terminal() => {
                // Delivered by an earlier cycle; nothing left to do.
                Ok(status)
            }
            Err(e) => Err(e).context("execute failed"),
        }
    }

    async fn advance_cursor(&self, source: &str) {
        let mut store = self.cursors.write().await;
        *store.cursors.entry(source.to_string()).or_insert(0) += 1;
        if let Some(path) = &self.cursor_path {
            if let Err(e) = store.save(path) {
                warn!("failed to persist relay cursors: {:#}", e);
            }
        }
    }
}
