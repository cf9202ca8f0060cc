//! Single-contract deployment with skip-if-unchanged semantics.

use std::path::PathBuf;

use alloy_core::primitives::{Address, Bytes};
use anyhow::{Context, Result};

use crate::{
    artifacts::ContractArtifact,
    chain::ChainClient,
    store::{DeploymentRecord, DeploymentStore, deployment_hash},
};

/// What to deploy and with which constructor arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    /// Contract name, as found in the artifacts.
    pub contract: String,
    /// Account sending the creation transaction.
    pub from: Address,
    /// Constructor arguments, recorded alongside the deployment.
    pub args: Vec<Address>,
    /// ABI-encoded constructor arguments appended to the bytecode.
    pub constructor_data: Bytes,
}

/// A deployment record and whether it came from a previous run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentOutcome {
    pub record: DeploymentRecord,
    pub reused: bool,
}

/// Deploys contracts to one network and records them in its store.
#[derive(Debug)]
pub struct Deployer<'a, C> {
    client: &'a C,
    store: &'a DeploymentStore,
    artifacts_dir: PathBuf,
    /// Ignore existing records and always send a creation transaction.
    reset: bool,
}

impl<'a, C: ChainClient> Deployer<'a, C> {
    pub fn new(client: &'a C, store: &'a DeploymentStore, artifacts_dir: PathBuf) -> Self {
        Self {
            client,
            store,
            artifacts_dir,
            reset: false,
        }
    }

    pub fn reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    pub fn store(&self) -> &DeploymentStore {
        self.store
    }

    /// Deploy `request.contract` unless an identical deployment is already live.
    ///
    /// A stored record is reused when its hash matches the new init code and the chain
    /// still has code at its address.
    pub async fn deploy(&self, request: DeployRequest) -> Result<DeploymentOutcome> {
        let artifact = ContractArtifact::load(&self.artifacts_dir, &request.contract)?;
        let hash = deployment_hash(&artifact.bytecode, &request.constructor_data);

        if !self.reset {
            if let Some(record) = self.reusable(&request.contract, &hash).await? {
                tracing::info!(
                    contract = %request.contract,
                    address = %record.address,
                    "reusing \"{}\" at {}",
                    request.contract,
                    record.address
                );
                return Ok(DeploymentOutcome {
                    record,
                    reused: true,
                });
            }
        }

        let init_code: Bytes = [artifact.bytecode.as_ref(), request.constructor_data.as_ref()]
            .concat()
            .into();

        tracing::info!(
            contract = %request.contract,
            from = %request.from,
            args = ?request.args,
            network = %self.store.network(),
            "Deploying {}...",
            request.contract
        );

        let outcome = self
            .client
            .deploy(request.from, init_code)
            .await
            .with_context(|| format!("Failed to deploy {}", request.contract))?;

        let address = outcome
            .contract_address
            .context("Deployment receipt carries no contract address")?;

        let record = DeploymentRecord {
            contract_name: request.contract.clone(),
            address,
            args: request.args,
            transaction_hash: outcome.transaction_hash,
            block_number: outcome.block_number,
            gas_used: outcome.gas_used,
            deployment_hash: hash,
            abi: artifact.abi,
            deployed_at: chrono::Utc::now().to_rfc3339(),
        };

        self.store.save(&record)?;

        tracing::info!(
            contract = %record.contract_name,
            tx_hash = %record.transaction_hash,
            gas_used = record.gas_used,
            "deployed \"{}\" at {}",
            record.contract_name,
            record.address
        );

        Ok(DeploymentOutcome {
            record,
            reused: false,
        })
    }

    async fn reusable(&self, contract: &str, hash: &str) -> Result<Option<DeploymentRecord>> {
        let Some(record) = self.store.load(contract)? else {
            return Ok(None);
        };

        if record.deployment_hash != hash {
            tracing::info!(contract, "Bytecode or arguments changed, redeploying");
            return Ok(None);
        }

        let code = self.client.code_at(record.address).await?;
        if code.is_empty() {
            tracing::warn!(
                contract,
                address = %record.address,
                "Recorded deployment has no code on chain, redeploying"
            );
            return Ok(None);
        }

        Ok(Some(record))
    }
}
