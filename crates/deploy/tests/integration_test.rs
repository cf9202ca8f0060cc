//! Integration tests for thrive-deploy.
//!
//! These exercise the public API end to end against an in-process chain: load a
//! configuration file, resolve the deployer, run the protocol scripts and read the
//! deployment store back. No RPC endpoint is needed.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
};

use alloy_core::primitives::{Address, B256, Bytes, U256, address};
use anyhow::Result;
use tempdir::TempDir;
use thrive_deploy::{
    ChainClient, DEPLOYER, Deployer, DeploymentStore, PiggyOwner, ProtocolDeployment, THRIVE,
    THRIVE_PIGGY, ThriveConfig, TxOutcome, config::CONFIG_FILENAME, format_units, parse_units,
};

const LOCAL_DEPLOYER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
const LOCAL_STABLECOIN: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
const LOCAL_POOL_PROVIDER: Address = address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512");

/// Chain that deploys at `from.create(nonce)` and keeps the created code.
#[derive(Clone, Default)]
struct LocalChain {
    state: Arc<Mutex<LocalState>>,
}

#[derive(Default)]
struct LocalState {
    code: HashMap<Address, Bytes>,
    creations: Vec<Bytes>,
    nonce: u64,
}

impl LocalChain {
    fn creations(&self) -> Vec<Bytes> {
        self.state.lock().unwrap().creations.clone()
    }
}

impl ChainClient for LocalChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(31337)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .code
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn call(&self, to: Address, _input: Bytes) -> Result<Bytes> {
        anyhow::bail!("unexpected call to {}", to)
    }

    async fn deploy(&self, from: Address, init_code: Bytes) -> Result<TxOutcome> {
        let mut state = self.state.lock().unwrap();
        let address = from.create(state.nonce);
        state.nonce += 1;
        state.code.insert(address, Bytes::from_static(&[0x60, 0x80]));
        state.creations.push(init_code);

        Ok(TxOutcome {
            transaction_hash: B256::with_last_byte(state.nonce as u8),
            block_number: Some(state.nonce),
            gas_used: 100_000,
            contract_address: Some(address),
        })
    }

    async fn send(&self, _from: Address, to: Address, _input: Bytes) -> Result<TxOutcome> {
        anyhow::bail!("unexpected transaction to {}", to)
    }
}

fn write_artifact(root: &Path, name: &str) {
    let dir = root.join(format!("contracts/{}.sol", name));
    std::fs::create_dir_all(&dir).unwrap();
    let artifact = serde_json::json!({
        "contractName": name,
        "sourceName": format!("contracts/{}.sol", name),
        "abi": [],
        "bytecode": "0x60806040",
        "deployedBytecode": "0x6080",
    });
    std::fs::write(dir.join(format!("{}.json", name)), artifact.to_string()).unwrap();
}

fn write_config(root: &Path) -> std::path::PathBuf {
    let path = root.join(CONFIG_FILENAME);
    let content = format!(
        r#"
default_network = "local"

[paths]
artifacts = "{artifacts}"
deployments = "{deployments}"

[named_accounts.deployer]
default = "0xE3c347cEa95B7BfdB921074bdb39b8571F905f6D"
local = "{deployer}"

[networks.local]
url = "http://127.0.0.1:8545"
chain_id = 31337
accounts_env = "LOCAL_DEPLOYER_KEY"

[networks.local.protocol]
stablecoin = "{stablecoin}"

[networks.local.protocol.piggy]
lending_pool_provider = "{pool}"
owner = "deployer"
"#,
        artifacts = root.join("artifacts").display(),
        deployments = root.join("deployments").display(),
        deployer = LOCAL_DEPLOYER,
        stablecoin = LOCAL_STABLECOIN,
        pool = LOCAL_POOL_PROVIDER,
    );
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_config_file_extends_builtin_networks() {
    let temp_dir = TempDir::new("thrive-test").unwrap();
    let path = write_config(temp_dir.path());

    let config = ThriveConfig::load(&path).unwrap();

    assert_eq!(config.networks.len(), 3);
    let (name, network) = config.network(None).unwrap();
    assert_eq!(name, "local");
    assert_eq!(network.chain_id, 31337);
    assert_eq!(
        network.protocol.piggy.as_ref().unwrap().owner,
        PiggyOwner::Deployer
    );

    assert_eq!(
        config.named_accounts.resolve(DEPLOYER, "local").unwrap(),
        LOCAL_DEPLOYER
    );
    assert_eq!(
        config.named_accounts.resolve(DEPLOYER, "base").unwrap(),
        address!("E3c347cEa95B7BfdB921074bdb39b8571F905f6D")
    );
}

#[test]
fn test_config_rejects_shared_rpc_url() {
    let temp_dir = TempDir::new("thrive-test").unwrap();
    let path = temp_dir.path().join(CONFIG_FILENAME);
    std::fs::write(
        &path,
        r#"
[networks.mirror]
url = "https://sepolia.base.org"
chain_id = 84532
accounts_env = "DEPLOYER_PRIVATE_KEY"

[networks.mirror.protocol]
stablecoin = "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
"#,
    )
    .unwrap();

    assert!(ThriveConfig::load(&path).is_err());
}

#[tokio::test]
async fn test_deploy_protocol_from_config() {
    let temp_dir = TempDir::new("thrive-test").unwrap();
    let path = write_config(temp_dir.path());
    let config = ThriveConfig::load(&path).unwrap();
    write_artifact(&config.paths.artifacts, THRIVE);
    write_artifact(&config.paths.artifacts, THRIVE_PIGGY);

    let (name, network) = config.network(None).unwrap();
    let from = config.named_accounts.resolve(DEPLOYER, name).unwrap();
    let chain = LocalChain::default();

    let store = DeploymentStore::open(&config.paths.deployments, name).unwrap();
    store.check_chain_id(chain.chain_id().await.unwrap()).unwrap();
    let _lock = store.lock().unwrap();

    let deployment = ProtocolDeployment {
        deployer: Deployer::new(&chain, &store, config.paths.artifacts.clone()),
        config: &network.protocol,
        from,
    };

    let outcomes = deployment.run(&[]).await.unwrap();
    assert_eq!(outcomes.len(), 2);

    let thrive = store.get(THRIVE).unwrap();
    assert_eq!(thrive.args, vec![LOCAL_STABLECOIN]);

    let piggy = store.get(THRIVE_PIGGY).unwrap();
    assert_eq!(
        piggy.args,
        vec![LOCAL_POOL_PROVIDER, LOCAL_STABLECOIN, LOCAL_DEPLOYER]
    );

    // A second run finds both deployments live and sends nothing.
    let again = deployment.run(&[]).await.unwrap();
    assert!(again.iter().all(|o| o.reused));
    assert_eq!(chain.creations().len(), 2);

    let names: Vec<_> = store
        .list()
        .unwrap()
        .into_iter()
        .map(|r| r.contract_name)
        .collect();
    assert_eq!(names, vec![THRIVE.to_string(), THRIVE_PIGGY.to_string()]);
}

#[tokio::test]
async fn test_store_pinned_to_other_chain_is_rejected() {
    let temp_dir = TempDir::new("thrive-test").unwrap();
    let store = DeploymentStore::open(temp_dir.path(), "baseSepolia").unwrap();

    store.check_chain_id(84532).unwrap();
    store.check_chain_id(84532).unwrap();
    assert!(store.check_chain_id(8453).is_err());
}

#[test]
fn test_units_round_trip_usdc_amounts() {
    assert_eq!(format_units(U256::from(5_000_000u64), 6).unwrap(), "5.0");

    let raw = parse_units("1000", 6).unwrap();
    assert_eq!(raw, U256::from(1_000_000_000u64));
    assert_eq!(format_units(raw, 6).unwrap(), "1000.0");
}
