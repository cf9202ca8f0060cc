//! Deployment artifact store.
//!
//! Records live under `<root>/<network>/<Contract>.json`, next to a `.chainId` file
//! pinning the network directory to one chain.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

const CHAIN_ID_FILENAME: &str = ".chainId";
const LOCK_FILENAME: &str = ".lock";

/// Outcome of one contract deployment, written once and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub contract_name: String,
    pub address: Address,
    /// Constructor arguments, in declaration order.
    pub args: Vec<Address>,
    pub transaction_hash: B256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// Hash of the init code, see [`deployment_hash`].
    pub deployment_hash: String,
    pub abi: Value,
    /// RFC 3339 timestamp.
    pub deployed_at: String,
}

/// SHA-256 over creation bytecode followed by the encoded constructor arguments.
pub fn deployment_hash(bytecode: &[u8], constructor_data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytecode);
    hasher.update(constructor_data);
    hex::encode(hasher.finalize())
}

/// Per-network view of the store.
#[derive(Debug, Clone)]
pub struct DeploymentStore {
    network: String,
    dir: PathBuf,
}

/// Exclusive lock on a network directory, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(err = %e, "Failed to release deployments lock");
        }
    }
}

impl DeploymentStore {
    /// Open (creating if needed) the store for `network` under `root`.
    pub fn open(root: &Path, network: &str) -> Result<Self> {
        let dir = root.join(network);
        std::fs::create_dir_all(&dir)
            .context(format!("Failed to create deployments directory {}", dir.display()))?;

        Ok(Self {
            network: network.to_string(),
            dir,
        })
    }

    /// The store for `network` under `root`, without touching the filesystem.
    pub fn at(root: &Path, network: &str) -> Self {
        Self {
            network: network.to_string(),
            dir: root.join(network),
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    /// Take an exclusive lock on the network directory.
    ///
    /// Fails immediately when another run holds it.
    pub fn lock(&self) -> Result<StoreLock> {
        let path = self.dir.join(LOCK_FILENAME);
        let file = File::create(&path).context(format!("Failed to create {}", path.display()))?;
        file.try_lock_exclusive().with_context(|| {
            format!(
                "Deployments for '{}' are locked by another run ({})",
                self.network,
                path.display()
            )
        })?;
        Ok(StoreLock { file })
    }

    /// Pin the directory to `chain_id`, or check it against the pinned value.
    pub fn check_chain_id(&self, chain_id: u64) -> Result<()> {
        if self.pinned_chain_id()?.is_some() {
            return self.ensure_chain_id(chain_id);
        }

        let path = self.dir.join(CHAIN_ID_FILENAME);
        std::fs::write(&path, chain_id.to_string())
            .context(format!("Failed to write {}", path.display()))?;
        tracing::debug!(network = %self.network, chain_id, "Pinned deployments to chain");
        Ok(())
    }

    /// Check `chain_id` against the pinned value without writing anything.
    ///
    /// An unpinned store accepts any chain.
    pub fn ensure_chain_id(&self, chain_id: u64) -> Result<()> {
        match self.pinned_chain_id()? {
            Some(stored) if stored != chain_id => anyhow::bail!(
                "Deployments for '{}' belong to chain {} but the RPC reports chain {}",
                self.network,
                stored,
                chain_id
            ),
            _ => Ok(()),
        }
    }

    fn pinned_chain_id(&self) -> Result<Option<u64>> {
        let path = self.dir.join(CHAIN_ID_FILENAME);
        if !path.exists() {
            return Ok(None);
        }

        let content =
            std::fs::read_to_string(&path).context(format!("Failed to read {}", path.display()))?;
        let stored = content
            .trim()
            .parse()
            .context(format!("Corrupted chain ID in {}", path.display()))?;
        Ok(Some(stored))
    }

    /// Load the record for `name`, if any.
    pub fn load(&self, name: &str) -> Result<Option<DeploymentRecord>> {
        let path = self.record_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let content =
            std::fs::read_to_string(&path).context(format!("Failed to read {}", path.display()))?;
        let record = serde_json::from_str(&content)
            .context(format!("Failed to parse deployment record {}", path.display()))?;
        Ok(Some(record))
    }

    /// Load the record for `name`, failing when it was never deployed.
    pub fn get(&self, name: &str) -> Result<DeploymentRecord> {
        self.load(name)?.with_context(|| {
            format!(
                "No deployment of '{}' on '{}' (run deploy first)",
                name, self.network
            )
        })
    }

    /// Write a record, replacing any previous one for the same contract.
    pub fn save(&self, record: &DeploymentRecord) -> Result<()> {
        let path = self.record_path(&record.contract_name);
        let json = serde_json::to_string_pretty(record)
            .context("Failed to serialize deployment record")?;
        std::fs::write(&path, json).context(format!("Failed to write {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Deployment record saved");
        Ok(())
    }

    /// All records, sorted by contract name.
    pub fn list(&self) -> Result<Vec<DeploymentRecord>> {
        let mut records = Vec::new();
        if !self.dir.exists() {
            return Ok(records);
        }

        for entry in std::fs::read_dir(&self.dir)
            .context(format!("Failed to list {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                    if let Some(record) = self.load(name)? {
                        records.push(record);
                    }
                }
            }
        }

        records.sort_by(|a, b| a.contract_name.cmp(&b.contract_name));
        Ok(records)
    }
}
