//! Shared test helpers
//!
//! Constants and builders used by the integration tests: dummy addresses,
//! a two-chain test configuration mirroring the demo deployment (a UST and
//! a wrapped-native token per chain, one seeded UST/WNATIVE pool each),
//! and a payload builder with sensible defaults.

#![allow(dead_code)]

use swap_gmp::config::{
    ApiConfig, BalanceSpec, ChainSpec, Config, FactorySpec, PoolSpec, RelayerConfig, TokenSpec,
};
use swap_gmp::payload::{SwapPayload, CMD_SWAP_TOKENS_TO_NATIVES};
use swap_gmp::types::Address;
use swap_gmp::LocalNetwork;

// ============================================================================
// CONSTANTS
// ============================================================================

pub const CHAIN_1: &str = "chain1";
pub const CHAIN_2: &str = "chain2";

/// The trusted relayer address configured on every gateway
pub const RELAYER_ADDR: &str = "0xf0";

// -------------------------------- chain1 --------------------------------

pub const GATEWAY_1: &str = "0x1001";
pub const EXECUTABLE_1: &str = "0x1002";
pub const OWNER_1: &str = "0x1003";
pub const USER_1: &str = "0x1010";
pub const UST_1: &str = "0x1100";
pub const WNATIVE_1: &str = "0x1101";
pub const FACTORY_1: &str = "0x1200";

// -------------------------------- chain2 --------------------------------

pub const GATEWAY_2: &str = "0x2001";
pub const EXECUTABLE_2: &str = "0x2002";
pub const OWNER_2: &str = "0x2003";
pub const USER_2: &str = "0x2010";
pub const UST_2: &str = "0x2100";
pub const WNATIVE_2: &str = "0x2101";
pub const FACTORY_2: &str = "0x2200";

// -------------------------------- amounts -------------------------------

/// Genesis UST balance of the chain1 demo user
pub const USER_1_UST: u64 = 500_000_000_000;

/// Deposit amount used by the happy-path swap scenario
pub const DEPOSIT: u128 = 200_000_000_000;

/// Seeded UST reserve of each pool
pub const POOL_UST: u64 = 300_000_000_000;

/// Seeded wrapped-native reserve of each pool (3 units of 1e18)
pub const POOL_WNATIVE: u64 = 3_000_000_000_000_000_000;

/// Fee used by the scenarios: 9970 basis points of the input trade
pub const FEE_BPS: u64 = 9_970;

// ============================================================================
// BUILDERS
// ============================================================================

/// Parse a 0x-hex address constant.
pub fn addr(s: &str) -> Address {
    s.parse().expect("valid test address")
}

fn chain_spec(
    name: &str,
    gateway: &str,
    executable: &str,
    owner: &str,
    user: &str,
    user_ust: u64,
    ust: &str,
    wnative: &str,
    factory: &str,
) -> ChainSpec {
    ChainSpec {
        name: name.to_string(),
        gateway_address: addr(gateway),
        executable_address: addr(executable),
        owner: addr(owner),
        tokens: vec![
            TokenSpec { symbol: "UST".to_string(), address: addr(ust) },
            TokenSpec { symbol: "WNATIVE".to_string(), address: addr(wnative) },
        ],
        balances: vec![BalanceSpec {
            holder: addr(user),
            symbol: "UST".to_string(),
            amount: user_ust,
        }],
        factories: vec![FactorySpec {
            address: addr(factory),
            pools: vec![PoolSpec {
                token_a: "UST".to_string(),
                token_b: "WNATIVE".to_string(),
                reserve_a: POOL_UST,
                reserve_b: POOL_WNATIVE,
            }],
        }],
    }
}

/// Two-chain test configuration mirroring the demo deployment.
pub fn build_test_config() -> Config {
    Config {
        chains: vec![
            chain_spec(
                CHAIN_1, GATEWAY_1, EXECUTABLE_1, OWNER_1, USER_1, USER_1_UST, UST_1, WNATIVE_1,
                FACTORY_1,
            ),
            chain_spec(
                CHAIN_2, GATEWAY_2, EXECUTABLE_2, OWNER_2, USER_2, 300_000_000_000, UST_2,
                WNATIVE_2, FACTORY_2,
            ),
        ],
        relayer: RelayerConfig {
            address: addr(RELAYER_ADDR),
            polling_interval_ms: 50,
            cursor_path: None,
        },
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec![],
        },
    }
}

/// Build the two-chain network from the test configuration.
pub fn build_network() -> LocalNetwork {
    LocalNetwork::from_config(&build_test_config()).expect("test network builds")
}

/// The demo swap payload: swap the delivered UST on chain2 for wrapped
/// native and credit the chain2 user.
pub fn swap_to_natives_payload(min_out: u128) -> SwapPayload {
    SwapPayload {
        command: CMD_SWAP_TOKENS_TO_NATIVES.to_string(),
        exchange_factory: addr(FACTORY_2),
        token_in: addr(UST_2),
        token_out: addr(WNATIVE_2),
        min_out,
        fee_basis_points: FEE_BPS,
        recipient: addr(USER_2),
    }
}

/// Expected constant-product output for `amount_in` against reserves
/// `(reserve_in, reserve_out)` at `fee_bps`.
pub fn expected_out(amount_in: u128, reserve_in: u128, reserve_out: u128, fee_bps: u64) -> u128 {
    let in_with_fee = amount_in * fee_bps as u128;
    (in_with_fee * reserve_out) / (reserve_in * 10_000 + in_with_fee)
}
