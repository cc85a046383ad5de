//! Constant-product liquidity pools
//!
//! A pool holds reserves of a two-token pair and exposes the swap surface
//! the executable consumes: `get_reserves`, a pure `quote_out`, and the
//! mutating `swap`. Output amounts round down and the fee stays in the
//! pool, so `reserve_a * reserve_b` never decreases across a swap.
//!
//! Pools are owned by a [`PoolFactory`] keyed by the unordered token pair,
//! the factory being addressed by the `exchange_factory` field of the swap
//! payload.

use crate::types::Address;
use std::collections::HashMap;

/// Denominator for fee fractions expressed in basis points.
pub const BASIS_POINTS: u64 = 10_000;

/// Errors raised by pool operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("insufficient liquidity: reserves ({reserve_a}, {reserve_b})")]
    InsufficientLiquidity { reserve_a: u128, reserve_b: u128 },
    #[error("no pool for pair ({token_a}, {token_b})")]
    UnknownPool { token_a: Address, token_b: Address },
    #[error("pool for pair ({token_a}, {token_b}) already exists")]
    DuplicatePool { token_a: Address, token_b: Address },
    #[error("cannot create a pool of identical tokens ({0})")]
    IdenticalTokens(Address),
    #[error("token {0} is not part of this pool")]
    TokenNotInPool(Address),
    #[error("fee of {0} basis points exceeds the denominator")]
    InvalidFee(u64),
    #[error("arithmetic overflow in reserve update")]
    AmountOverflow,
}

/// Reserves of one two-token pair.
#[derive(Debug, Clone)]
pub struct LiquidityPool {
    token_a: Address,
    token_b: Address,
    reserve_a: u128,
    reserve_b: u128,
}

impl LiquidityPool {
    fn new(token_a: Address, token_b: Address) -> Self {
        LiquidityPool { token_a, token_b, reserve_a: 0, reserve_b: 0 }
    }

    /// Current reserves in `(token_a, token_b)` order.
    pub fn get_reserves(&self) -> (u128, u128) {
        (self.reserve_a, self.reserve_b)
    }

    pub fn tokens(&self) -> (Address, Address) {
        (self.token_a, self.token_b)
    }

    /// Add liquidity on both sides. Used to seed the pool at network
    /// construction.
    pub fn deposit(&mut self, amount_a: u128, amount_b: u128) -> Result<(), PoolError> {
        self.reserve_a = self
            .reserve_a
            .checked_add(amount_a)
            .ok_or(PoolError::AmountOverflow)?;
        self.reserve_b = self
            .reserve_b
            .checked_add(amount_b)
            .ok_or(PoolError::AmountOverflow)?;
        Ok(())
    }

    /// Compute the swap output for `amount_in` of `token_in` without
    /// touching the reserves.
    ///
    /// `fee_basis_points` is the fraction of the input that trades; the
    /// remainder accrues to the pool. The constant-product formula with the
    /// fee folded in:
    ///
    /// ```text
    /// out = (in * fee * reserve_out) / (reserve_in * 10000 + in * fee)
    /// ```
    pub fn quote_out(
        &self,
        amount_in: u128,
        token_in: Address,
        fee_basis_points: u64,
    ) -> Result<u128, PoolError> {
        if fee_basis_points > BASIS_POINTS {
            return Err(PoolError::InvalidFee(fee_basis_points));
        }
        let (reserve_in, reserve_out) = self.oriented_reserves(token_in)?;
        if reserve_in == 0 || reserve_out == 0 {
            return Err(PoolError::InsufficientLiquidity {
                reserve_a: self.reserve_a,
                reserve_b: self.reserve_b,
            });
        }

        let in_with_fee = amount_in
            .checked_mul(fee_basis_points as u128)
            .ok_or(PoolError::AmountOverflow)?;
        let numerator = in_with_fee
            .checked_mul(reserve_out)
            .ok_or(PoolError::AmountOverflow)?;
        let denominator = reserve_in
            .checked_mul(BASIS_POINTS as u128)
            .and_then(|scaled| scaled.checked_add(in_with_fee))
            .ok_or(PoolError::AmountOverflow)?;

        Ok(numerator / denominator)
    }

    /// Execute a swap of `amount_in` of `token_in`, returning the output
    /// amount of the other token. The full input (fee included) is added to
    /// the input reserve.
    pub fn swap(
        &mut self,
        amount_in: u128,
        token_in: Address,
        fee_basis_points: u64,
    ) -> Result<u128, PoolError> {
        let amount_out = self.quote_out(amount_in, token_in, fee_basis_points)?;

        if token_in == self.token_a {
            self.reserve_a = self
                .reserve_a
                .checked_add(amount_in)
                .ok_or(PoolError::AmountOverflow)?;
            self.reserve_b -= amount_out;
        } else {
            self.reserve_b = self
                .reserve_b
                .checked_add(amount_in)
                .ok_or(PoolError::AmountOverflow)?;
            self.reserve_a -= amount_out;
        }

        Ok(amount_out)
    }

    fn oriented_reserves(&self, token_in: Address) -> Result<(u128, u128), PoolError> {
        if token_in == self.token_a {
            Ok((self.reserve_a, self.reserve_b))
        } else if token_in == self.token_b {
            Ok((self.reserve_b, self.reserve_a))
        } else {
            Err(PoolError::TokenNotInPool(token_in))
        }
    }
}

/// Registry of the pools deployed behind one factory address.
#[derive(Debug)]
pub struct PoolFactory {
    address: Address,
    pools: HashMap<(Address, Address), LiquidityPool>,
}

impl PoolFactory {
    pub fn new(address: Address) -> Self {
        PoolFactory { address, pools: HashMap::new() }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Create an empty pool for the pair. The pair key is unordered, so
    /// `(a, b)` and `(b, a)` name the same pool.
    pub fn create_pool(&mut self, token_a: Address, token_b: Address) -> Result<(), PoolError> {
        if token_a == token_b {
            return Err(PoolError::IdenticalTokens(token_a));
        }
        let key = pair_key(token_a, token_b);
        if self.pools.contains_key(&key) {
            return Err(PoolError::DuplicatePool { token_a, token_b });
        }
        self.pools.insert(key, LiquidityPool::new(token_a, token_b));
        Ok(())
    }

    pub fn pool(&self, token_a: Address, token_b: Address) -> Result<&LiquidityPool, PoolError> {
        self.pools
            .get(&pair_key(token_a, token_b))
            .ok_or(PoolError::UnknownPool { token_a, token_b })
    }

    pub fn pool_mut(
        &mut self,
        token_a: Address,
        token_b: Address,
    ) -> Result<&mut LiquidityPool, PoolError> {
        self.pools
            .get_mut(&pair_key(token_a, token_b))
            .ok_or(PoolError::UnknownPool { token_a, token_b })
    }
}

fn pair_key(a: Address, b: Address) -> (Address, Address) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
