//! thrive is a CLI tool to deploy and inspect the Thrive protocol contracts.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};

use cli::{Cli, Command};
use thrive_deploy::{
    AlloyClient, ChainClient, DEPLOYER, Deployer, DeploymentStore, ExplorerClient, NetworkConfig,
    ProtocolDeployment, ThriveConfig, TokenAction, check_balances, load_signer, verify,
    verify_deployments,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Keys live in .env, which must be loaded before clap reads its env fallbacks.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }

    let config = ThriveConfig::load(&cli.config)?;
    let (name, network) = config.network(cli.network.as_deref())?;

    match cli.command {
        Command::Deploy { tags, reset } => deploy(&config, name, network, &tags, reset).await,
        Command::Balances { approve, transfer } => {
            let actions = approve
                .map(TokenAction::Approve)
                .into_iter()
                .chain(transfer.map(TokenAction::Transfer))
                .collect::<Vec<_>>();
            balances(&config, name, network, &actions).await
        }
        Command::Verify { contracts } => verify_contracts(&config, name, network, &contracts).await,
        Command::Networks => list_networks(&config),
        Command::Deployments => list_deployments(&config, name),
        Command::Accounts => list_accounts(&config, name),
    }
}

/// Query the RPC chain ID and check it against the network's configuration.
async fn rpc_chain_id(name: &str, network: &NetworkConfig, client: &AlloyClient) -> Result<u64> {
    let chain_id = client
        .chain_id()
        .await
        .context(format!("Failed to reach RPC for '{}' at {}", name, network.url))?;

    if chain_id != network.chain_id {
        anyhow::bail!(
            "RPC {} serves chain {} but '{}' is configured for chain {}",
            network.url,
            chain_id,
            name,
            network.chain_id
        );
    }

    Ok(chain_id)
}

async fn deploy(
    config: &ThriveConfig,
    name: &str,
    network: &NetworkConfig,
    tags: &[String],
    reset: bool,
) -> Result<()> {
    let from = config.named_accounts.resolve(DEPLOYER, name)?;
    let signer = load_signer(network, from)?;
    let client = AlloyClient::connect(&network.url, Some(signer))?;
    let chain_id = rpc_chain_id(name, network, &client).await?;
    let store = DeploymentStore::open(&config.paths.deployments, name)?;
    store.check_chain_id(chain_id)?;
    let _lock = store.lock()?;

    tracing::info!(
        network = name,
        chain_id = network.chain_id,
        deployer = %from,
        tags = ?tags,
        reset,
        "Starting deployment..."
    );

    let deployment = ProtocolDeployment {
        deployer: Deployer::new(&client, &store, config.paths.artifacts.clone()).reset(reset),
        config: &network.protocol,
        from,
    };
    let outcomes = deployment.run(tags).await?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Contract", "Address", "Transaction", "Status"]);
    for outcome in &outcomes {
        table.add_row(vec![
            outcome.record.contract_name.clone(),
            outcome.record.address.to_string(),
            outcome.record.transaction_hash.to_string(),
            if outcome.reused { "reused" } else { "deployed" }.to_string(),
        ]);
    }
    println!("{table}");

    tracing::info!(network = name, count = outcomes.len(), "Deployment complete");
    Ok(())
}

async fn balances(
    config: &ThriveConfig,
    name: &str,
    network: &NetworkConfig,
    actions: &[TokenAction],
) -> Result<()> {
    let deployer = config.named_accounts.resolve(DEPLOYER, name)?;

    // Read-only unless asked to approve or transfer.
    let signer = if actions.is_empty() {
        None
    } else {
        Some(load_signer(network, deployer)?)
    };

    let client = AlloyClient::connect(&network.url, signer)?;
    let chain_id = rpc_chain_id(name, network, &client).await?;
    let store = DeploymentStore::at(&config.paths.deployments, name);
    store.ensure_chain_id(chain_id)?;

    let report = check_balances(
        &client,
        &store,
        network.protocol.stablecoin,
        deployer,
        actions,
    )
    .await?;

    let symbol = &report.token.symbol;
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Account", "Address", symbol.as_str()]);
    table.add_row(vec![
        "deployer".to_string(),
        report.deployer.to_string(),
        report.token.format(report.deployer_balance)?,
    ]);
    table.add_row(vec![
        "ThrivePiggy".to_string(),
        report.piggy.to_string(),
        report.token.format(report.piggy_balance)?,
    ]);
    table.add_row(vec![
        "allowance (deployer -> ThrivePiggy)".to_string(),
        String::new(),
        report.token.format(report.allowance)?,
    ]);
    println!("{table}");

    if let Some(failed) = report.failed_action() {
        let reason = failed.result.as_ref().err().cloned().unwrap_or_default();
        anyhow::bail!("{} failed: {}", failed.action.name(), reason);
    }

    Ok(())
}

async fn verify_contracts(
    config: &ThriveConfig,
    name: &str,
    network: &NetworkConfig,
    contracts: &[String],
) -> Result<()> {
    let explorer = network
        .verify
        .as_ref()
        .context(format!("No block explorer configured for '{}'", name))?;

    let api_key = verify::api_key(explorer, &config.verify)?;
    let explorer = ExplorerClient::new(&explorer.api_url, api_key)?;
    let store = DeploymentStore::at(&config.paths.deployments, name);

    let verified = verify_deployments(
        &explorer,
        &store,
        &config.paths.artifacts,
        &config.solidity,
        contracts,
    )
    .await?;

    tracing::info!(network = name, count = verified.len(), "Verification complete");
    Ok(())
}

fn list_networks(config: &ThriveConfig) -> Result<()> {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Network",
        "Chain ID",
        "RPC URL",
        "Explorer",
        "Stablecoin",
        "ThrivePiggy",
    ]);

    for (name, network) in &config.networks {
        let default = if *name == config.default_network { " (default)" } else { "" };
        table.add_row(vec![
            format!("{}{}", name, default),
            network.chain_id.to_string(),
            network.url.clone(),
            network
                .verify
                .as_ref()
                .map(|v| v.api_url.clone())
                .unwrap_or_else(|| "-".to_string()),
            network.protocol.stablecoin.to_string(),
            if network.protocol.piggy.is_some() { "yes" } else { "no" }.to_string(),
        ]);
    }

    println!("{table}");
    Ok(())
}

fn list_deployments(config: &ThriveConfig, name: &str) -> Result<()> {
    let store = DeploymentStore::at(&config.paths.deployments, name);
    let records = store.list()?;

    if records.is_empty() {
        tracing::info!(network = name, "No deployments recorded");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Contract", "Address", "Arguments", "Block", "Deployed at"]);
    for record in records {
        table.add_row(vec![
            record.contract_name,
            record.address.to_string(),
            record
                .args
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
            record
                .block_number
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record.deployed_at,
        ]);
    }

    println!("{table}");
    Ok(())
}

fn list_accounts(config: &ThriveConfig, name: &str) -> Result<()> {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Role", "Address"]);
    for (role, address) in config.named_accounts.resolve_all(name) {
        table.add_row(vec![role.to_string(), address.to_string()]);
    }

    println!("{table}");
    Ok(())
}
