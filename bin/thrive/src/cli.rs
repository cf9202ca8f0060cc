use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thrive_deploy::config::CONFIG_FILENAME;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "thrive")]
#[command(
    author,
    version,
    about = "Deploy and inspect the Thrive protocol contracts on Base"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "THRIVE_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the Thrive.toml configuration file.
    ///
    /// A missing file is fine: the built-in Base and Base Sepolia networks are used.
    #[arg(short, long, global = true, alias = "conf", env = "THRIVE_CONFIG", default_value = CONFIG_FILENAME)]
    pub config: PathBuf,

    /// The network to operate on. Defaults to `default_network` from the configuration.
    #[arg(short, long, global = true, env = "THRIVE_NETWORK")]
    pub network: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the deploy scripts (Thrive, then ThrivePiggy).
    Deploy {
        /// Only run the scripts carrying one of these tags, plus their dependencies.
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Redeploy even when an identical deployment is already recorded.
        #[arg(long, default_value_t = false)]
        reset: bool,
    },

    /// Show the deployer's and ThrivePiggy's stablecoin balances and allowance.
    Balances {
        /// Approve ThrivePiggy to spend this amount of the deployer's stablecoin.
        #[arg(long, value_name = "AMOUNT")]
        approve: Option<String>,

        /// Transfer this amount of stablecoin from the deployer to ThrivePiggy.
        #[arg(long, value_name = "AMOUNT")]
        transfer: Option<String>,
    },

    /// Verify recorded deployments on the network's block explorer.
    Verify {
        /// Contracts to verify. All recorded deployments when omitted.
        contracts: Vec<String>,
    },

    /// List the configured networks.
    Networks,

    /// List the deployments recorded for the network.
    Deployments,

    /// List the named accounts as resolved for the network.
    Accounts,
}
