//! Network and build configuration.
//!
//! The configuration is layered with figment: built-in defaults, then an optional
//! `Thrive.toml`, then `THRIVE_`-prefixed environment variables.

use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, address};
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{accounts::NamedAccounts, protocol::ProtocolConfig};

/// The default name for the configuration file.
pub const CONFIG_FILENAME: &str = "Thrive.toml";

/// Prefix of environment variables overriding configuration keys.
pub const ENV_PREFIX: &str = "THRIVE_";

/// Environment variable holding the deployer private key.
pub const DEFAULT_ACCOUNTS_ENV: &str = "DEPLOYER_PRIVATE_KEY";
/// Environment variable holding the Basescan API key.
pub const BASESCAN_API_KEY_ENV: &str = "BASESCAN_API_KEY";
/// Environment variable holding the Etherscan API key (fallback for every explorer).
pub const ETHERSCAN_API_KEY_ENV: &str = "ETHERSCAN_API_KEY";

/// Name of the Base mainnet network.
pub const BASE: &str = "base";
/// Name of the Base Sepolia network.
pub const BASE_SEPOLIA: &str = "baseSepolia";

/// Address both default named accounts resolve to.
pub const DEFAULT_DEPLOYER: Address = address!("E3c347cEa95B7BfdB921074bdb39b8571F905f6D");

/// Full tool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThriveConfig {
    /// Network used when none is given on the command line.
    pub default_network: String,
    /// Compiler settings the artifacts were built with.
    pub solidity: SolidityConfig,
    /// Filesystem locations.
    pub paths: PathsConfig,
    /// Logical roles mapped to addresses.
    pub named_accounts: NamedAccounts,
    /// Networks by name.
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Explorer settings shared by every network.
    pub verify: VerifyConfig,
}

/// Solidity compiler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolidityConfig {
    pub version: String,
    pub optimizer: OptimizerConfig,
    /// Compiler outputs requested for every contract.
    pub output_selection: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub enabled: bool,
    pub runs: u32,
}

impl Default for SolidityConfig {
    fn default() -> Self {
        Self {
            version: "0.8.10".to_string(),
            optimizer: OptimizerConfig {
                enabled: true,
                runs: 200,
            },
            output_selection: ["abi", "evm.bytecode", "evm.deployedBytecode", "metadata"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding compiled contract artifacts.
    pub artifacts: PathBuf,
    /// Root of the deployment artifact store.
    pub deployments: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            artifacts: PathBuf::from("artifacts"),
            deployments: PathBuf::from("deployments"),
        }
    }
}

/// Configuration of a single network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint.
    pub url: String,
    /// Expected chain ID.
    pub chain_id: u64,
    /// Environment variable holding the signing key.
    pub accounts_env: String,
    /// Block explorer verification settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify: Option<NetworkVerifyConfig>,
    /// Addresses the protocol scripts are wired with.
    pub protocol: ProtocolConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkVerifyConfig {
    /// Etherscan-compatible API endpoint.
    pub api_url: String,
    /// Environment variable holding the explorer API key.
    pub api_key_env: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Fallback API key variable when a network does not name its own.
    pub api_key_env: String,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            api_key_env: ETHERSCAN_API_KEY_ENV.to_string(),
        }
    }
}

impl Default for ThriveConfig {
    fn default() -> Self {
        let networks = BTreeMap::from([
            (
                BASE.to_string(),
                NetworkConfig {
                    url: "https://mainnet.base.org".to_string(),
                    chain_id: 8453,
                    accounts_env: DEFAULT_ACCOUNTS_ENV.to_string(),
                    verify: Some(NetworkVerifyConfig {
                        api_url: "https://api.basescan.org/api".to_string(),
                        api_key_env: BASESCAN_API_KEY_ENV.to_string(),
                    }),
                    protocol: ProtocolConfig::base(),
                },
            ),
            (
                BASE_SEPOLIA.to_string(),
                NetworkConfig {
                    url: "https://sepolia.base.org".to_string(),
                    chain_id: 84532,
                    accounts_env: DEFAULT_ACCOUNTS_ENV.to_string(),
                    verify: Some(NetworkVerifyConfig {
                        api_url: "https://api-sepolia.basescan.org".to_string(),
                        api_key_env: BASESCAN_API_KEY_ENV.to_string(),
                    }),
                    protocol: ProtocolConfig::base_sepolia(),
                },
            ),
        ]);

        Self {
            default_network: BASE_SEPOLIA.to_string(),
            solidity: SolidityConfig::default(),
            paths: PathsConfig::default(),
            named_accounts: NamedAccounts::default(),
            networks,
            verify: VerifyConfig::default(),
        }
    }
}

impl ThriveConfig {
    /// Load the configuration.
    ///
    /// A missing file is not an error: the built-in defaults (Base and Base Sepolia)
    /// are used, overridden by `THRIVE_` environment variables. Nested keys are
    /// separated with `__`, e.g. `THRIVE_PATHS__DEPLOYMENTS`.
    pub fn load(path: &Path) -> Result<Self> {
        let config_path = if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        if config_path.exists() {
            tracing::debug!(path = %config_path.display(), "Reading configuration file");
        } else {
            tracing::debug!(path = %config_path.display(), "No configuration file, using defaults");
        }

        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["config", "network", "verbosity"]))
            .extract()
            .context(format!(
                "Failed to load configuration from {}",
                config_path.display()
            ))?;

        config.validate()?;

        tracing::info!(path = %config_path.display(), networks = config.networks.len(), "Configuration loaded");
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Look up a network, or the default network when `name` is `None`.
    pub fn network(&self, name: Option<&str>) -> Result<(&str, &NetworkConfig)> {
        let name = name.unwrap_or(&self.default_network);
        self.networks
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .with_context(|| {
                format!(
                    "Unknown network '{}' (configured: {})",
                    name,
                    self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
                )
            })
    }

    /// Check that every endpoint is a well-formed http(s) URL and that no two
    /// networks share an RPC or explorer endpoint.
    pub fn validate(&self) -> Result<()> {
        if !self.networks.contains_key(&self.default_network) {
            anyhow::bail!(
                "Default network '{}' is not configured",
                self.default_network
            );
        }

        let mut rpc_urls = HashSet::new();
        let mut explorer_urls = HashSet::new();
        let mut chain_ids = HashSet::new();

        for (name, network) in &self.networks {
            let rpc = parse_http_url(&network.url)
                .with_context(|| format!("Invalid RPC URL for network '{}'", name))?;
            if !rpc_urls.insert(rpc) {
                anyhow::bail!("Network '{}' reuses an RPC URL: {}", name, network.url);
            }

            if !chain_ids.insert(network.chain_id) {
                anyhow::bail!(
                    "Network '{}' reuses chain ID {}",
                    name,
                    network.chain_id
                );
            }

            if let Some(verify) = &network.verify {
                let api = normalize_api_url(&verify.api_url)
                    .with_context(|| format!("Invalid explorer API URL for network '{}'", name))?;
                if !explorer_urls.insert(api) {
                    anyhow::bail!(
                        "Network '{}' reuses an explorer API URL: {}",
                        name,
                        verify.api_url
                    );
                }
            }
        }

        Ok(())
    }
}

/// Parse an explorer API endpoint. An endpoint not ending in `/api` gets it appended.
pub fn normalize_api_url(raw: &str) -> Result<Url> {
    let mut url = parse_http_url(raw)?;

    if !url.path().trim_end_matches('/').ends_with("/api") {
        let path = format!("{}/api", url.path().trim_end_matches('/'));
        url.set_path(&path);
    }

    Ok(url)
}

/// Parse an http(s) URL with a host.
fn parse_http_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).context(format!("'{}' is not a URL", raw))?;

    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("'{}' must use http or https", raw);
    }
    if url.host_str().is_none() {
        anyhow::bail!("'{}' has no host", raw);
    }

    Ok(url)
}
