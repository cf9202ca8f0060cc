//! Named accounts: logical roles mapped to addresses, and the signer backing them.

use std::collections::BTreeMap;

use alloy_core::primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_DEPLOYER, NetworkConfig};

/// Role used to sign deployments.
pub const DEPLOYER: &str = "deployer";
/// Secondary wallet role.
pub const WALLET5: &str = "wallet5";

/// An address for a role, with optional per-network overrides.
///
/// In TOML:
///
/// ```toml
/// [named_accounts.deployer]
/// default = "0xE3c347cEa95B7BfdB921074bdb39b8571F905f6D"
/// base = "0x..."
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedAccount {
    pub default: Address,
    #[serde(flatten)]
    pub networks: BTreeMap<String, Address>,
}

impl NamedAccount {
    pub fn new(default: Address) -> Self {
        Self {
            default,
            networks: BTreeMap::new(),
        }
    }

    /// The address for `network`, falling back to the default.
    pub fn for_network(&self, network: &str) -> Address {
        self.networks.get(network).copied().unwrap_or(self.default)
    }
}

/// All named accounts, keyed by role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamedAccounts(pub BTreeMap<String, NamedAccount>);

impl Default for NamedAccounts {
    fn default() -> Self {
        Self(BTreeMap::from([
            (DEPLOYER.to_string(), NamedAccount::new(DEFAULT_DEPLOYER)),
            (WALLET5.to_string(), NamedAccount::new(DEFAULT_DEPLOYER)),
        ]))
    }
}

impl NamedAccounts {
    /// Resolve `role` on `network`.
    pub fn resolve(&self, role: &str, network: &str) -> Result<Address> {
        self.0
            .get(role)
            .map(|account| account.for_network(network))
            .with_context(|| format!("Unknown named account '{}'", role))
    }

    /// Resolve every role on `network`, sorted by role.
    pub fn resolve_all(&self, network: &str) -> Vec<(&str, Address)> {
        self.0
            .iter()
            .map(|(role, account)| (role.as_str(), account.for_network(network)))
            .collect()
    }
}

/// Read the signing key for `network` from its environment variable.
///
/// Fails unless the key controls `expected`.
pub fn load_signer(network: &NetworkConfig, expected: Address) -> Result<PrivateKeySigner> {
    signer_from(network, expected, |name| std::env::var(name).ok())
}

fn signer_from(
    network: &NetworkConfig,
    expected: Address,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PrivateKeySigner> {
    let raw = lookup(&network.accounts_env)
        .filter(|value| !value.trim().is_empty())
        .with_context(|| {
            format!(
                "Signing key not set: export {} to sign transactions",
                network.accounts_env
            )
        })?;

    let signer = parse_signer(&raw)
        .with_context(|| format!("Invalid private key in {}", network.accounts_env))?;

    if signer.address() != expected {
        anyhow::bail!(
            "Key in {} controls {}, but the deployer account is {}",
            network.accounts_env,
            signer.address(),
            expected
        );
    }

    Ok(signer)
}

/// Parse a hex private key, with or without `0x` prefix.
pub fn parse_signer(raw: &str) -> Result<PrivateKeySigner> {
    let raw = raw.trim();
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    raw.parse::<PrivateKeySigner>()
        .map_err(|e| anyhow::anyhow!("Failed to parse private key: {}", e))
}
