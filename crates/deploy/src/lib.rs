//! thrive-deploy - Deployment library for the Thrive protocol.
//!
//! This crate deploys the `Thrive` and `ThrivePiggy` contracts to Base networks,
//! records the deployments per network, checks stablecoin balances against them
//! and submits their sources to block explorers.

pub mod accounts;
pub mod artifacts;
pub mod chain;
pub mod config;
mod deployer;
pub mod diagnostics;
pub mod protocol;
pub mod store;
pub mod token;
pub mod units;
pub mod verify;

pub use accounts::{DEPLOYER, NamedAccount, NamedAccounts, WALLET5, load_signer};
pub use artifacts::{BuildInfo, ContractArtifact};
pub use chain::{AlloyClient, ChainClient, TxOutcome};
pub use config::{NetworkConfig, ThriveConfig};
pub use deployer::{DeployRequest, Deployer, DeploymentOutcome};
pub use diagnostics::{BalanceReport, TokenAction, check_balances};
pub use protocol::{PiggyOwner, ProtocolConfig, ProtocolDeployment, THRIVE, THRIVE_PIGGY};
pub use store::{DeploymentRecord, DeploymentStore, deployment_hash};
pub use token::{Erc20, TokenInfo};
pub use units::{format_units, parse_units};
pub use verify::{ExplorerClient, VerificationStatus, verify_deployments};
