//! Thrive protocol deployment scripts.
//!
//! `Thrive` is deployed first with the network's stablecoin. `ThrivePiggy` follows
//! when the network configures a lending pool provider for it.

use std::{fmt, str::FromStr};

use alloy_core::primitives::{Address, address};
use alloy_sol_types::{SolConstructor, sol};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    chain::ChainClient,
    deployer::{DeployRequest, Deployer, DeploymentOutcome},
};

sol! {
    contract Thrive {
        constructor(address stablecoin);
    }

    contract ThrivePiggy {
        constructor(address lendingPoolProvider, address stablecoin, address initialOwner);
    }
}

pub const THRIVE: &str = "Thrive";
pub const THRIVE_PIGGY: &str = "ThrivePiggy";

/// USDC on Base Sepolia.
pub const BASE_SEPOLIA_USDC: Address = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");
/// USDC on Base.
pub const BASE_USDC: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
/// Aave v3 PoolAddressesProvider on Base.
pub const BASE_AAVE_POOL_ADDRESSES_PROVIDER: Address =
    address!("e20fCBdBfFC4Dd138cE8b2E6FBb6CB49777ad64D");

/// Addresses the scripts are wired with on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Stablecoin used as the protocol's unit of account.
    pub stablecoin: Address,
    /// ThrivePiggy settings; without them ThrivePiggy is not deployed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub piggy: Option<PiggyConfig>,
}

impl ProtocolConfig {
    pub fn base() -> Self {
        Self {
            stablecoin: BASE_USDC,
            piggy: Some(PiggyConfig {
                lending_pool_provider: BASE_AAVE_POOL_ADDRESSES_PROVIDER,
                owner: PiggyOwner::Thrive,
            }),
        }
    }

    pub fn base_sepolia() -> Self {
        Self {
            stablecoin: BASE_SEPOLIA_USDC,
            piggy: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiggyConfig {
    pub lending_pool_provider: Address,
    #[serde(default)]
    pub owner: PiggyOwner,
}

/// Who ThrivePiggy's `initialOwner` is.
///
/// Written as `"thrive"`, `"deployer"` or a literal address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PiggyOwner {
    /// The Thrive contract deployed in the same run.
    #[default]
    Thrive,
    /// The deployer named account.
    Deployer,
    Fixed(Address),
}

impl FromStr for PiggyOwner {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "thrive" => Ok(Self::Thrive),
            "deployer" => Ok(Self::Deployer),
            other => other
                .parse::<Address>()
                .map(Self::Fixed)
                .map_err(|_| {
                    anyhow::anyhow!(
                        "Invalid owner '{}': expected \"thrive\", \"deployer\" or an address",
                        other
                    )
                }),
        }
    }
}

impl TryFrom<String> for PiggyOwner {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for PiggyOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thrive => f.write_str("thrive"),
            Self::Deployer => f.write_str("deployer"),
            Self::Fixed(address) => write!(f, "{}", address),
        }
    }
}

impl From<PiggyOwner> for String {
    fn from(owner: PiggyOwner) -> Self {
        owner.to_string()
    }
}

/// A deploy script: one contract, its tags, and what must run before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployScript {
    pub contract: &'static str,
    pub tags: &'static [&'static str],
    pub dependencies: &'static [&'static str],
}

impl DeployScript {
    fn matches(&self, tags: &[String]) -> bool {
        tags.iter()
            .any(|tag| self.tags.contains(&tag.as_str()) || self.contract == tag.as_str())
    }
}

pub const THRIVE_SCRIPT: DeployScript = DeployScript {
    contract: THRIVE,
    tags: &["Thrive", "Th"],
    dependencies: &[],
};

pub const THRIVE_PIGGY_SCRIPT: DeployScript = DeployScript {
    contract: THRIVE_PIGGY,
    tags: &["ThrivePiggy", "Piggy"],
    dependencies: &[THRIVE],
};

/// Every script, in execution order.
pub const SCRIPTS: [DeployScript; 2] = [THRIVE_SCRIPT, THRIVE_PIGGY_SCRIPT];

/// Pick the scripts selected by `tags`, plus their dependencies, in execution order.
///
/// No tags selects every script. A tag matching nothing is an error.
pub fn select_scripts(tags: &[String]) -> Result<Vec<DeployScript>> {
    if tags.is_empty() {
        return Ok(SCRIPTS.to_vec());
    }

    for tag in tags {
        if !SCRIPTS.iter().any(|s| s.matches(std::slice::from_ref(tag))) {
            anyhow::bail!("No deploy script is tagged '{}'", tag);
        }
    }

    let mut selected: Vec<&str> = SCRIPTS
        .iter()
        .filter(|s| s.matches(tags))
        .map(|s| s.contract)
        .collect();

    // Dependencies are declared on earlier scripts only, one pass from the end suffices.
    for script in SCRIPTS.iter().rev() {
        if selected.contains(&script.contract) {
            for dep in script.dependencies {
                if !selected.contains(dep) {
                    selected.push(dep);
                }
            }
        }
    }

    Ok(SCRIPTS
        .iter()
        .filter(|s| selected.contains(&s.contract))
        .copied()
        .collect())
}

/// Runs the protocol deploy scripts against one network.
pub struct ProtocolDeployment<'a, C> {
    pub deployer: Deployer<'a, C>,
    pub config: &'a ProtocolConfig,
    /// Address of the `deployer` named account.
    pub from: Address,
}

impl<'a, C: ChainClient> ProtocolDeployment<'a, C> {
    /// Run the scripts selected by `tags`.
    ///
    /// ThrivePiggy without configuration is skipped when it was not asked for by tag,
    /// and is an error when it was.
    pub async fn run(&self, tags: &[String]) -> Result<Vec<DeploymentOutcome>> {
        let scripts = select_scripts(tags)?;
        let explicitly_tagged = |script: &DeployScript| !tags.is_empty() && script.matches(tags);

        let mut outcomes = Vec::new();
        let mut thrive: Option<Address> = None;

        for script in scripts {
            match script.contract {
                THRIVE => {
                    let outcome = self.deploy_thrive().await?;
                    thrive = Some(outcome.record.address);
                    outcomes.push(outcome);
                }
                THRIVE_PIGGY => {
                    let Some(piggy) = &self.config.piggy else {
                        if explicitly_tagged(&script) {
                            anyhow::bail!(
                                "ThrivePiggy is not configured for '{}' (set protocol.piggy.lending_pool_provider)",
                                self.deployer.store().network()
                            );
                        }
                        tracing::warn!(
                            network = %self.deployer.store().network(),
                            "No lending pool provider configured, skipping ThrivePiggy"
                        );
                        continue;
                    };

                    let owner = match piggy.owner {
                        PiggyOwner::Thrive => match thrive {
                            Some(address) => address,
                            None => self.deployer.store().get(THRIVE)?.address,
                        },
                        PiggyOwner::Deployer => self.from,
                        PiggyOwner::Fixed(address) => address,
                    };

                    outcomes.push(self.deploy_piggy(piggy.lending_pool_provider, owner).await?);
                }
                other => anyhow::bail!("No deploy routine for '{}'", other),
            }
        }

        Ok(outcomes)
    }

    /// Deploy `Thrive(stablecoin)`.
    pub async fn deploy_thrive(&self) -> Result<DeploymentOutcome> {
        let stablecoin = self.config.stablecoin;
        let constructor = Thrive::constructorCall { stablecoin };

        self.deployer
            .deploy(DeployRequest {
                contract: THRIVE.to_string(),
                from: self.from,
                args: vec![stablecoin],
                constructor_data: constructor.abi_encode().into(),
            })
            .await
            .context("Thrive deployment failed")
    }

    /// Deploy `ThrivePiggy(lendingPoolProvider, stablecoin, initialOwner)`.
    pub async fn deploy_piggy(
        &self,
        lending_pool_provider: Address,
        initial_owner: Address,
    ) -> Result<DeploymentOutcome> {
        let stablecoin = self.config.stablecoin;
        let constructor = ThrivePiggy::constructorCall {
            lendingPoolProvider: lending_pool_provider,
            stablecoin,
            initialOwner: initial_owner,
        };

        self.deployer
            .deploy(DeployRequest {
                contract: THRIVE_PIGGY.to_string(),
                from: self.from,
                args: vec![lending_pool_provider, stablecoin, initial_owner],
                constructor_data: constructor.abi_encode().into(),
            })
            .await
            .context("ThrivePiggy deployment failed")
    }
}
