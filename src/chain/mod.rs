//! Simulated chains
//!
//! Each [`Chain`] is one independent blockchain from the protocol's point
//! of view: a token ledger, pool factories, a gateway, and the application
//! executable, behind a single `RwLock` so the chain behaves as the
//! sequential transaction machine the protocol assumes. The only
//! concurrency against it is the relayer's polling task and the API.
//!
//! [`LocalNetwork`] builds the configured set of chains: registers tokens,
//! mints genesis balances, creates and seeds pools, and registers each
//! executable as the sibling of every other chain's executable.

pub mod executable;
pub mod gateway;
pub mod pool;
pub mod token;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::RwLock;
use tracing::info;

use crate::config::{ChainSpec, Config};
use crate::types::{Address, Message, MessageId, MessageRecord, MessageStatus, TokenTransfer};

use executable::{ExecuteError, SwapExecutable};
use gateway::{Gateway, GatewayError};
use pool::{PoolError, PoolFactory};
use token::{TokenError, TokenLedger};

/// Mutable state of one chain. All protocol operations on a chain go
/// through exactly one of these, under its chain's lock.
#[derive(Debug)]
pub struct ChainState {
    pub ledger: TokenLedger,
    pub factories: HashMap<Address, PoolFactory>,
    pub gateway: Gateway,
    pub executable: SwapExecutable,
}

/// One simulated chain.
#[derive(Debug)]
pub struct Chain {
    name: String,
    state: RwLock<ChainState>,
}

impl Chain {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The gateway's custody address.
    pub async fn gateway_address(&self) -> Address {
        self.state.read().await.gateway.address()
    }

    /// The executable's address.
    pub async fn executable_address(&self) -> Address {
        self.state.read().await.executable.address()
    }

    /// Faucet: mint tokens to an address, as the original network helper
    /// hands out test tokens.
    pub async fn give_token(
        &self,
        symbol: &str,
        to: Address,
        amount: u128,
    ) -> Result<(), TokenError> {
        self.state.write().await.ledger.mint(symbol, to, amount)
    }

    /// Approve the gateway to spend `amount` of the caller's tokens.
    pub async fn approve_gateway(
        &self,
        owner: Address,
        symbol: &str,
        amount: u128,
    ) -> Result<(), TokenError> {
        let state = &mut *self.state.write().await;
        let gateway = state.gateway.address();
        state.ledger.approve(symbol, owner, gateway, amount)
    }

    /// Approve the executable to spend `amount` of the caller's tokens, as
    /// a deposit through [`Chain::send_to_sibling`] requires.
    pub async fn approve_executable(
        &self,
        owner: Address,
        symbol: &str,
        amount: u128,
    ) -> Result<(), TokenError> {
        let state = &mut *self.state.write().await;
        let executable = state.executable.address();
        state.ledger.approve(symbol, owner, executable, amount)
    }

    /// Deposit a token with an instruction for the sibling executable on
    /// another chain. The sibling registry determines the destination
    /// address, and the local executable is the sender the destination
    /// will validate.
    pub async fn send_to_sibling(
        &self,
        caller: Address,
        destination_chain: &str,
        payload: Vec<u8>,
        token: Option<TokenTransfer>,
    ) -> Result<MessageId, ExecuteError> {
        let state = &mut *self.state.write().await;
        state.executable.send_to_sibling(
            &mut state.ledger,
            &mut state.gateway,
            caller,
            destination_chain,
            payload,
            token,
        )
    }

    /// Deposit a token with an instruction for another chain.
    pub async fn lock_and_call(
        &self,
        caller: Address,
        destination_chain: &str,
        destination_address: Address,
        payload: Vec<u8>,
        token: Option<TokenTransfer>,
    ) -> Result<MessageId, GatewayError> {
        let state = &mut *self.state.write().await;
        state.gateway.lock_and_call(
            &mut state.ledger,
            caller,
            destination_chain,
            destination_address,
            payload,
            token,
        )
    }

    /// Inbound: admit a message (trusted relayer only).
    pub async fn approve_message(
        &self,
        caller: Address,
        message: Message,
    ) -> Result<(), GatewayError> {
        self.state.write().await.gateway.approve(caller, message)
    }

    /// Inbound: execute an approved message, returning its terminal status.
    pub async fn execute_message(&self, id: MessageId) -> Result<MessageStatus, GatewayError> {
        let state = &mut *self.state.write().await;
        state
            .gateway
            .execute(&mut state.ledger, &mut state.factories, &state.executable, id)
    }

    /// Outbound log length (the relay cursor's upper bound).
    pub async fn outbound_len(&self) -> u64 {
        self.state.read().await.gateway.outbound_len()
    }

    /// Outbound messages from `cursor` onwards.
    pub async fn outbound_since(&self, cursor: u64) -> Vec<Message> {
        self.state.read().await.gateway.outbound_since(cursor)
    }

    /// Status record of an inbound message.
    pub async fn message_record(&self, id: MessageId) -> Option<MessageRecord> {
        self.state.read().await.gateway.message(id).cloned()
    }

    pub async fn balance_of(&self, symbol: &str, holder: Address) -> u128 {
        self.state.read().await.ledger.balance_of(symbol, holder)
    }

    /// All non-zero balances of `holder`, keyed by symbol.
    pub async fn balances_of(&self, holder: Address) -> HashMap<String, u128> {
        self.state.read().await.ledger.balances_of(holder)
    }

    /// Reserves of the pool for `(token_a, token_b)` behind `factory`.
    pub async fn reserves(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<(u128, u128), PoolError> {
        let state = self.state.read().await;
        let factory = state
            .factories
            .get(&factory)
            .ok_or(PoolError::UnknownPool { token_a, token_b })?;
        let pool = factory.pool(token_a, token_b)?;
        // Orient the reply to the caller's argument order.
        let (reserve_a, reserve_b) = pool.get_reserves();
        if pool.tokens().0 == token_a {
            Ok((reserve_a, reserve_b))
        } else {
            Ok((reserve_b, reserve_a))
        }
    }

    /// Resolve a token symbol to its address on this chain.
    pub async fn token_address(&self, symbol: &str) -> Result<Address, TokenError> {
        Ok(self.state.read().await.ledger.resolve(symbol)?.address)
    }

    /// Register the sibling executable for another chain (owner only).
    pub async fn add_sibling(
        &self,
        caller: Address,
        chain: &str,
        address: Address,
    ) -> Result<(), ExecuteError> {
        self.state
            .write()
            .await
            .executable
            .add_sibling(caller, chain, address)
    }
}

/// The configured set of chains running in this process.
#[derive(Debug, Clone)]
pub struct LocalNetwork {
    chains: HashMap<String, Arc<Chain>>,
}

impl LocalNetwork {
    /// Build every configured chain and wire the executables together.
    pub fn from_config(config: &Config) -> Result<Self> {
        let relayer = config.relayer.address;

        let mut states: Vec<(String, Address, ChainState)> = Vec::new();
        for spec in &config.chains {
            let state = build_chain_state(spec, relayer)
                .with_context(|| format!("failed to build chain `{}`", spec.name))?;
            states.push((spec.name.clone(), spec.owner, state));
        }

        // Register every other chain's executable as a trusted sibling,
        // the way the original deployment wires addSibling both ways.
        let peers: Vec<(String, Address)> = states
            .iter()
            .map(|(name, _, state)| (name.clone(), state.executable.address()))
            .collect();
        for (name, owner, state) in &mut states {
            for (peer_name, peer_executable) in &peers {
                if peer_name == name {
                    continue;
                }
                state
                    .executable
                    .add_sibling(*owner, peer_name, *peer_executable)
                    .map_err(|e| anyhow!("sibling registration on `{}` failed: {}", name, e))?;
            }
        }

        let chains = states
            .into_iter()
            .map(|(name, _, state)| {
                info!("chain `{}` ready", name);
                (
                    name.clone(),
                    Arc::new(Chain { name, state: RwLock::new(state) }),
                )
            })
            .collect();

        Ok(LocalNetwork { chains })
    }

    pub fn chain(&self, name: &str) -> Option<Arc<Chain>> {
        self.chains.get(name).cloned()
    }

    pub fn chains(&self) -> Vec<Arc<Chain>> {
        self.chains.values().cloned().collect()
    }
}

fn build_chain_state(spec: &ChainSpec, relayer: Address) -> Result<ChainState> {
    let mut ledger = TokenLedger::new();
    for token in &spec.tokens {
        ledger
            .register(&token.symbol, token.address)
            .with_context(|| format!("registering token `{}`", token.symbol))?;
    }
    for balance in &spec.balances {
        ledger
            .mint(&balance.symbol, balance.holder, balance.amount as u128)
            .with_context(|| format!("minting genesis balance of `{}`", balance.symbol))?;
    }

    let mut factories = HashMap::new();
    for factory_spec in &spec.factories {
        let mut factory = PoolFactory::new(factory_spec.address);
        for pool_spec in &factory_spec.pools {
            let token_a = ledger.resolve(&pool_spec.token_a)?.address;
            let token_b = ledger.resolve(&pool_spec.token_b)?.address;
            factory
                .create_pool(token_a, token_b)
                .map_err(|e| anyhow!("creating pool on `{}`: {}", spec.name, e))?;
            factory
                .pool_mut(token_a, token_b)
                .and_then(|pool| {
                    pool.deposit(pool_spec.reserve_a as u128, pool_spec.reserve_b as u128)
                })
                .map_err(|e| anyhow!("seeding pool on `{}`: {}", spec.name, e))?;
            // Reserves are backed by ledger balances held at the factory, so
            // swap outputs are ordinary transfers out of factory custody.
            ledger.mint(&pool_spec.token_a, factory_spec.address, pool_spec.reserve_a as u128)?;
            ledger.mint(&pool_spec.token_b, factory_spec.address, pool_spec.reserve_b as u128)?;
        }
        factories.insert(factory_spec.address, factory);
    }

    Ok(ChainState {
        ledger,
        factories,
        gateway: Gateway::new(&spec.name, spec.gateway_address, relayer),
        executable: SwapExecutable::new(spec.executable_address, spec.owner),
    })
}
