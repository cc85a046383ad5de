//! Destination-side executable
//!
//! Receives dispatched messages from the local gateway, decodes the payload,
//! and performs the requested swap against a pool, crediting the final
//! recipient. Two deliberate behaviors:
//!
//! - the sender must be the registered sibling executable for the source
//!   chain, otherwise the call fails with `UntrustedSender`;
//! - a swap that would yield less than `min_out` (or hits an empty pool)
//!   does not fail the message; the raw received token is transferred to
//!   the recipient instead, so destination-side price movement never
//!   strands funds here.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::chain::gateway::{Gateway, GatewayError};
use crate::chain::pool::{PoolError, PoolFactory};
use crate::chain::token::{TokenError, TokenLedger};
use crate::payload::{
    PayloadError, SwapPayload, CMD_SWAP_TOKENS_TO_NATIVES, CMD_SWAP_TOKENS_TO_TOKENS,
};
use crate::types::{Address, MessageId, TokenTransfer};

/// Errors that fail a message during destination-side execution. The
/// gateway absorbs them into the message's `Failed` status.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("untrusted sender {source_address} for chain `{source_chain}`")]
    UntrustedSender {
        source_chain: String,
        source_address: Address,
    },
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] PayloadError),
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("command requires an accompanying token")]
    MissingToken,
    #[error("no factory at {0}")]
    UnknownFactory(Address),
    #[error("payload token {0} is not registered on this chain")]
    UnregisteredToken(Address),
    #[error("delivered token `{symbol}` is {registered}, payload names {payload}")]
    TokenMismatch {
        symbol: String,
        registered: Address,
        payload: Address,
    },
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("no sibling registered for chain `{0}`")]
    UnknownSibling(String),
    #[error("caller {0} is not the owner")]
    NotOwner(Address),
    #[error("invalid sibling registration: {0}")]
    InvalidSibling(String),
}

/// The application contract executing swap requests on one chain.
#[derive(Debug)]
pub struct SwapExecutable {
    address: Address,
    owner: Address,
    /// Trusted peer executables, keyed by source chain name
    siblings: HashMap<String, Address>,
}

impl SwapExecutable {
    pub fn new(address: Address, owner: Address) -> Self {
        SwapExecutable { address, owner, siblings: HashMap::new() }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Register the peer executable deployed on `chain`. Owner-only; a later
    /// registration for the same chain overwrites the previous address
    /// (trust is managed out of band).
    pub fn add_sibling(
        &mut self,
        caller: Address,
        chain: &str,
        address: Address,
    ) -> Result<(), ExecuteError> {
        if caller != self.owner {
            return Err(ExecuteError::NotOwner(caller));
        }
        if chain.is_empty() {
            return Err(ExecuteError::InvalidSibling(
                "empty chain name".to_string(),
            ));
        }
        if let Some(previous) = self.siblings.insert(chain.to_string(), address) {
            if previous != address {
                warn!(
                    "sibling for `{}` overwritten: {} -> {}",
                    chain, previous, address
                );
            }
        }
        Ok(())
    }

    pub fn sibling(&self, chain: &str) -> Option<Address> {
        self.siblings.get(chain).copied()
    }

    /// Initiate a cross-chain call to the sibling executable on
    /// `destination_chain`. The sibling registry determines the destination
    /// address, never the caller, and this executable is the sender the
    /// destination validates against.
    ///
    /// The caller must have pre-approved this executable for the token
    /// amount; the funds are pulled in, the local gateway is approved, and
    /// the request is locked and emitted.
    pub fn send_to_sibling(
        &self,
        ledger: &mut TokenLedger,
        gateway: &mut Gateway,
        caller: Address,
        destination_chain: &str,
        payload: Vec<u8>,
        token: Option<TokenTransfer>,
    ) -> Result<MessageId, ExecuteError> {
        let destination = self
            .sibling(destination_chain)
            .ok_or_else(|| ExecuteError::UnknownSibling(destination_chain.to_string()))?;

        if let Some(transfer) = &token {
            ledger.transfer_from(
                &transfer.symbol,
                self.address,
                caller,
                self.address,
                transfer.amount,
            )?;
            ledger.approve(&transfer.symbol, self.address, gateway.address(), transfer.amount)?;
        }

        let id = gateway.lock_and_call(
            ledger,
            self.address,
            destination_chain,
            destination,
            payload,
            token,
        )?;
        Ok(id)
    }

    /// Entry point for messages without an accompanying token.
    pub fn execute(
        &self,
        _ledger: &mut TokenLedger,
        _factories: &mut HashMap<Address, PoolFactory>,
        message_id: MessageId,
        source_chain: &str,
        source_address: Address,
        payload: &[u8],
    ) -> Result<(), ExecuteError> {
        self.require_sibling(source_chain, source_address)?;
        let decoded = SwapPayload::decode(payload)?;
        match decoded.command.as_str() {
            // Both swap commands move a delivered token; without one there
            // is nothing to swap.
            CMD_SWAP_TOKENS_TO_TOKENS | CMD_SWAP_TOKENS_TO_NATIVES => {
                warn!("message {}: swap command without a token", message_id);
                Err(ExecuteError::MissingToken)
            }
            other => Err(ExecuteError::UnknownCommand(other.to_string())),
        }
    }

    /// Entry point for messages with a token: the gateway has already made
    /// `amount` of `token_symbol` available to this executable.
    pub fn execute_with_token(
        &self,
        ledger: &mut TokenLedger,
        factories: &mut HashMap<Address, PoolFactory>,
        message_id: MessageId,
        source_chain: &str,
        source_address: Address,
        payload: &[u8],
        token_symbol: &str,
        amount: u128,
    ) -> Result<(), ExecuteError> {
        self.require_sibling(source_chain, source_address)?;
        let decoded = SwapPayload::decode(payload)?;
        match decoded.command.as_str() {
            CMD_SWAP_TOKENS_TO_TOKENS | CMD_SWAP_TOKENS_TO_NATIVES => {
                self.swap_with_fallback(ledger, factories, message_id, &decoded, token_symbol, amount)
            }
            other => Err(ExecuteError::UnknownCommand(other.to_string())),
        }
    }

    fn require_sibling(
        &self,
        source_chain: &str,
        source_address: Address,
    ) -> Result<(), ExecuteError> {
        match self.siblings.get(source_chain) {
            Some(registered) if *registered == source_address => Ok(()),
            _ => Err(ExecuteError::UntrustedSender {
                source_chain: source_chain.to_string(),
                source_address,
            }),
        }
    }

    /// Swap the delivered token for `token_out` and credit the recipient.
    /// A quote below `min_out` (or an empty pool) engages the fallback:
    /// the raw delivered amount is transferred to the recipient unswapped.
    fn swap_with_fallback(
        &self,
        ledger: &mut TokenLedger,
        factories: &mut HashMap<Address, PoolFactory>,
        message_id: MessageId,
        payload: &SwapPayload,
        token_symbol: &str,
        amount: u128,
    ) -> Result<(), ExecuteError> {
        let token_in = ledger.resolve(token_symbol)?.address;
        if token_in != payload.token_in {
            return Err(ExecuteError::TokenMismatch {
                symbol: token_symbol.to_string(),
                registered: token_in,
                payload: payload.token_in,
            });
        }
        let token_out_symbol = ledger
            .symbol_of(payload.token_out)
            .ok_or(ExecuteError::UnregisteredToken(payload.token_out))?
            .to_string();

        let factory = factories
            .get_mut(&payload.exchange_factory)
            .ok_or(ExecuteError::UnknownFactory(payload.exchange_factory))?;
        let factory_address = factory.address();
        let pool = factory.pool_mut(payload.token_in, payload.token_out)?;

        let quote = match pool.quote_out(amount, token_in, payload.fee_basis_points) {
            Ok(quote) => Some(quote),
            Err(PoolError::InsufficientLiquidity { .. }) => None,
            Err(other) => return Err(other.into()),
        };

        match quote {
            Some(quote) if quote >= payload.min_out => {
                let amount_out = pool.swap(amount, token_in, payload.fee_basis_points)?;
                ledger.transfer(token_symbol, self.address, factory_address, amount)?;
                ledger.transfer(&token_out_symbol, factory_address, payload.recipient, amount_out)?;
                info!(
                    "message {}: swapped {} `{}` for {} `{}` to {}",
                    message_id, amount, token_symbol, amount_out, token_out_symbol, payload.recipient
                );
                Ok(())
            }
            quote => {
                // Slippage or empty pool: deliver the raw token instead of
                // reverting, so the funds reach the recipient either way.
                ledger.transfer(token_symbol, self.address, payload.recipient, amount)?;
                warn!(
                    "message {}: swap below min_out (quote {:?}, min {}), transferred {} `{}` raw to {}",
                    message_id, quote, payload.min_out, amount, token_symbol, payload.recipient
                );
                Ok(())
            }
        }
    }
}
