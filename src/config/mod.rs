//! Configuration management
//!
//! Loads and validates the service configuration: the set of simulated
//! chains (tokens, genesis balances, factories and seeded pools, gateway
//! and executable addresses), the relayer settings, and the API server
//! settings.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::types::Address;

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The chains this process simulates and relays between
    pub chains: Vec<ChainSpec>,
    /// Relayer settings (trusted address, polling, cursor persistence)
    pub relayer: RelayerConfig,
    /// API server configuration (host, port, CORS settings)
    pub api: ApiConfig,
}

/// Configuration of one simulated chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSpec {
    /// Chain name, used as the routing key in messages
    pub name: String,
    /// Custody address of the chain's gateway
    pub gateway_address: Address,
    /// Address of the chain's executable
    pub executable_address: Address,
    /// Deployer/owner of the executable (may call add_sibling)
    pub owner: Address,
    /// Tokens registered on this chain
    pub tokens: Vec<TokenSpec>,
    /// Genesis balances minted at construction
    #[serde(default)]
    pub balances: Vec<BalanceSpec>,
    /// Pool factories and their seeded pools
    #[serde(default)]
    pub factories: Vec<FactorySpec>,
}

/// One registered token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSpec {
    pub symbol: String,
    pub address: Address,
}

/// A genesis balance minted to `holder` at chain construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSpec {
    pub holder: Address,
    pub symbol: String,
    pub amount: u64,
}

/// A pool factory and the pools it is seeded with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorySpec {
    pub address: Address,
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
}

/// One seeded pool. Tokens are referenced by their registered symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSpec {
    pub token_a: String,
    pub token_b: String,
    pub reserve_a: u64,
    pub reserve_b: u64,
}

/// Relayer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerConfig {
    /// The trusted relayer address gateways accept `approve` from
    pub address: Address,
    /// Polling interval for outbound-log scans in milliseconds
    pub polling_interval_ms: u64,
    /// Where relay cursors are persisted across restarts; in-memory only
    /// when unset
    #[serde(default)]
    pub cursor_path: Option<PathBuf>,
}

/// API server configuration for external communication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host address to bind the API server to
    pub host: String,
    /// Port number to bind the API server to
    pub port: u16,
    /// Allowed CORS origins for cross-origin requests
    pub cors_origins: Vec<String>,
}

// ============================================================================
// CONFIGURATION LOADING AND MANAGEMENT
// ============================================================================

impl Config {
    /// Loads configuration from the TOML file.
    ///
    /// The path comes from `SWAP_GMP_CONFIG_PATH` when set, otherwise
    /// `config/swap-gmp.toml`. A missing file is reported with the
    /// template-copy instruction.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("SWAP_GMP_CONFIG_PATH")
            .unwrap_or_else(|_| "config/swap-gmp.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/swap-gmp.template.toml config/swap-gmp.toml\n\
                Then edit config/swap-gmp.toml with your actual values.",
                config_path
            ))
        }
    }

    /// Validates the configuration.
    ///
    /// Rejects duplicate chain names, duplicate token symbols or addresses
    /// within a chain, balances or pools referencing unregistered tokens,
    /// pools of identical tokens, a zero polling interval, and an empty
    /// chain set.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chains.is_empty() {
            return Err(anyhow::anyhow!(
                "Configuration error: at least one chain must be configured"
            ));
        }

        let mut chain_names = HashSet::new();
        for chain in &self.chains {
            if chain.name.is_empty() {
                return Err(anyhow::anyhow!("Configuration error: empty chain name"));
            }
            if !chain_names.insert(chain.name.as_str()) {
                return Err(anyhow::anyhow!(
                    "Configuration error: duplicate chain name `{}`. Each chain must have a unique name.",
                    chain.name
                ));
            }
            chain.validate()?;
        }

        if self.relayer.polling_interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "Configuration error: relayer polling interval must be greater than 0"
            ));
        }

        Ok(())
    }
}

impl ChainSpec {
    fn validate(&self) -> anyhow::Result<()> {
        let mut symbols = HashSet::new();
        let mut addresses = HashSet::new();
        for token in &self.tokens {
            if !symbols.insert(token.symbol.as_str()) {
                return Err(anyhow::anyhow!(
                    "Configuration error: duplicate token symbol `{}` on chain `{}`",
                    token.symbol,
                    self.name
                ));
            }
            if !addresses.insert(token.address) {
                return Err(anyhow::anyhow!(
                    "Configuration error: duplicate token address {} on chain `{}`",
                    token.address,
                    self.name
                ));
            }
        }

        for balance in &self.balances {
            if !symbols.contains(balance.symbol.as_str()) {
                return Err(anyhow::anyhow!(
                    "Configuration error: genesis balance references unknown token `{}` on chain `{}`",
                    balance.symbol,
                    self.name
                ));
            }
        }

        for factory in &self.factories {
            for pool in &factory.pools {
                for symbol in [&pool.token_a, &pool.token_b] {
                    if !symbols.contains(symbol.as_str()) {
                        return Err(anyhow::anyhow!(
                            "Configuration error: pool references unknown token `{}` on chain `{}`",
                            symbol,
                            self.name
                        ));
                    }
                }
                if pool.token_a == pool.token_b {
                    return Err(anyhow::anyhow!(
                        "Configuration error: pool of identical tokens `{}` on chain `{}`",
                        pool.token_a,
                        self.name
                    ));
                }
            }
        }

        Ok(())
    }
}
