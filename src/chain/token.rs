//! Token registry and balance ledger
//!
//! Each chain keeps a registry of its tokens (symbol to address) and a
//! ledger of balances and spending allowances. The gateway debits deposits
//! through the allowance path, the same way the original callers pre-approve
//! the gateway before `lock_and_call`.

use crate::types::Address;
use serde::Serialize;
use std::collections::HashMap;

/// Errors raised by ledger operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("unknown token `{0}`")]
    UnknownToken(String),
    #[error("token `{0}` is already registered")]
    DuplicateToken(String),
    #[error("insufficient balance of `{symbol}` for {holder}: required {required}, available {available}")]
    InsufficientBalance {
        symbol: String,
        holder: Address,
        required: u128,
        available: u128,
    },
    #[error("insufficient allowance of `{symbol}` from {owner} to {spender}: required {required}, available {available}")]
    InsufficientAllowance {
        symbol: String,
        owner: Address,
        spender: Address,
        required: u128,
        available: u128,
    },
    #[error("balance overflow for `{symbol}`")]
    BalanceOverflow { symbol: String },
}

/// Registered token metadata.
#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub address: Address,
}

/// Balance and allowance ledger for one chain's tokens.
#[derive(Debug, Default)]
pub struct TokenLedger {
    tokens: HashMap<String, TokenInfo>,
    balances: HashMap<(String, Address), u128>,
    allowances: HashMap<(String, Address, Address), u128>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token symbol at an address. Registration happens once at
    /// chain construction.
    pub fn register(&mut self, symbol: &str, address: Address) -> Result<(), TokenError> {
        if self.tokens.contains_key(symbol) {
            return Err(TokenError::DuplicateToken(symbol.to_string()));
        }
        self.tokens.insert(
            symbol.to_string(),
            TokenInfo { symbol: symbol.to_string(), address },
        );
        Ok(())
    }

    /// Resolve a symbol against the registry.
    pub fn resolve(&self, symbol: &str) -> Result<&TokenInfo, TokenError> {
        self.tokens
            .get(symbol)
            .ok_or_else(|| TokenError::UnknownToken(symbol.to_string()))
    }

    /// Find the registered symbol for a token address.
    pub fn symbol_of(&self, address: Address) -> Option<&str> {
        self.tokens
            .values()
            .find(|t| t.address == address)
            .map(|t| t.symbol.as_str())
    }

    pub fn balance_of(&self, symbol: &str, holder: Address) -> u128 {
        self.balances
            .get(&(symbol.to_string(), holder))
            .copied()
            .unwrap_or(0)
    }

    /// All non-zero balances held by `holder`, keyed by symbol.
    pub fn balances_of(&self, holder: Address) -> HashMap<String, u128> {
        self.balances
            .iter()
            .filter(|((_, h), amount)| *h == holder && **amount > 0)
            .map(|((symbol, _), amount)| (symbol.clone(), *amount))
            .collect()
    }

    pub fn allowance(&self, symbol: &str, owner: Address, spender: Address) -> u128 {
        self.allowances
            .get(&(symbol.to_string(), owner, spender))
            .copied()
            .unwrap_or(0)
    }

    /// Credit freshly minted tokens to `to`. Used for genesis balances and
    /// the faucet.
    pub fn mint(&mut self, symbol: &str, to: Address, amount: u128) -> Result<(), TokenError> {
        self.resolve(symbol)?;
        self.credit(symbol, to, amount)
    }

    /// Grant `spender` the right to move up to `amount` of `owner`'s tokens.
    pub fn approve(
        &mut self,
        symbol: &str,
        owner: Address,
        spender: Address,
        amount: u128,
    ) -> Result<(), TokenError> {
        self.resolve(symbol)?;
        self.allowances
            .insert((symbol.to_string(), owner, spender), amount);
        Ok(())
    }

    /// Move tokens between two holders.
    pub fn transfer(
        &mut self,
        symbol: &str,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), TokenError> {
        self.resolve(symbol)?;
        self.debit(symbol, from, amount)?;
        self.credit(symbol, to, amount)
    }

    /// Move tokens on behalf of `owner`, consuming `spender`'s allowance.
    pub fn transfer_from(
        &mut self,
        symbol: &str,
        spender: Address,
        owner: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), TokenError> {
        self.resolve(symbol)?;
        let key = (symbol.to_string(), owner, spender);
        let allowance = self.allowances.get(&key).copied().unwrap_or(0);
        if allowance < amount {
            return Err(TokenError::InsufficientAllowance {
                symbol: symbol.to_string(),
                owner,
                spender,
                required: amount,
                available: allowance,
            });
        }
        self.debit(symbol, owner, amount)?;
        self.allowances.insert(key, allowance - amount);
        self.credit(symbol, to, amount)
    }

    fn debit(&mut self, symbol: &str, holder: Address, amount: u128) -> Result<(), TokenError> {
        let key = (symbol.to_string(), holder);
        let balance = self.balances.get(&key).copied().unwrap_or(0);
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                symbol: symbol.to_string(),
                holder,
                required: amount,
                available: balance,
            });
        }
        self.balances.insert(key, balance - amount);
        Ok(())
    }

    fn credit(&mut self, symbol: &str, holder: Address, amount: u128) -> Result<(), TokenError> {
        let key = (symbol.to_string(), holder);
        let balance = self.balances.get(&key).copied().unwrap_or(0);
        let updated = balance
            .checked_add(amount)
            .ok_or_else(|| TokenError::BalanceOverflow { symbol: symbol.to_string() })?;
        self.balances.insert(key, updated);
        Ok(())
    }
}
