//! Swap GMP Service Library
//!
//! This crate provides cross-chain message relay with token-swap execution:
//! per-chain gateways custody deposited tokens and emit call requests, a
//! trusted relayer forwards them, and the destination executable swaps the
//! delivered token against a constant-product pool for the final recipient.

pub mod api;
pub mod chain;
pub mod config;
pub mod payload;
pub mod relay;
pub mod types;

// Re-export commonly used types
pub use chain::{Chain, ChainState, LocalNetwork};
pub use config::{ApiConfig, ChainSpec, Config, RelayerConfig};
pub use payload::{SwapPayload, CMD_SWAP_TOKENS_TO_NATIVES, CMD_SWAP_TOKENS_TO_TOKENS};
pub use relay::Relayer;
pub use types::{Address, Message, MessageId, MessageRecord, MessageStatus, TokenTransfer};
