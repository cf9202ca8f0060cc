//! Source verification on Etherscan-compatible block explorers.

use std::{path::Path, time::Duration};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use url::Url;

use crate::{
    artifacts::ContractArtifact,
    config::{NetworkVerifyConfig, SolidityConfig, VerifyConfig, normalize_api_url},
    store::{DeploymentRecord, DeploymentStore},
};

/// Default timeout for explorer requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between verification status checks.
const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Status checks before giving up.
const STATUS_POLL_ATTEMPTS: usize = 24;

/// Explorer API envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

/// Answer to a verification submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Queued, poll with this GUID.
    Queued(String),
    AlreadyVerified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    Pending,
    Verified,
    Failed(String),
}

impl VerificationStatus {
    fn from_result(result: &str) -> Self {
        let lower = result.to_lowercase();
        if lower.contains("pending") {
            Self::Pending
        } else if lower.starts_with("pass") || lower.contains("already verified") {
            Self::Verified
        } else {
            Self::Failed(result.to_string())
        }
    }
}

/// What to submit for one contract.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub address: Address,
    /// Standard-JSON compiler input, serialized.
    pub source: String,
    /// `<source>:<name>`.
    pub contract_name: String,
    /// e.g. `v0.8.10+commit.fc410830`.
    pub compiler_version: String,
    /// ABI-encoded constructor arguments, hex without prefix.
    pub constructor_args: String,
}

impl VerificationRequest {
    /// Build the request for a recorded deployment from its artifact and build info.
    pub fn from_record(
        record: &DeploymentRecord,
        artifact: &ContractArtifact,
        solidity: &SolidityConfig,
    ) -> Result<Self> {
        let build_info = artifact.build_info()?;

        if build_info.solc_version != solidity.version {
            tracing::warn!(
                contract = %record.contract_name,
                built_with = %build_info.solc_version,
                configured = %solidity.version,
                "Artifact was compiled with a different solc version than configured"
            );
        }

        let source = serde_json::to_string(&build_info.input)
            .context("Failed to serialize compiler input")?;

        Ok(Self {
            address: record.address,
            source,
            contract_name: artifact.qualified_name(),
            compiler_version: format!("v{}", build_info.solc_long_version),
            constructor_args: encode_address_args(&record.args),
        })
    }
}

/// ABI encoding of a list of static `address` parameters, as hex.
pub fn encode_address_args(args: &[Address]) -> String {
    args.iter()
        .map(|arg| hex::encode(arg.into_word()))
        .collect()
}

#[derive(Debug)]
struct StillPending;

impl std::fmt::Display for StillPending {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("verification still pending")
    }
}

impl std::error::Error for StillPending {}

/// Client for an Etherscan-compatible API.
#[derive(Debug, Clone)]
pub struct ExplorerClient {
    client: reqwest::Client,
    api_url: Url,
    api_key: String,
    poll_interval: Duration,
}

impl ExplorerClient {
    /// Create a client. An endpoint not ending in `/api` gets it appended.
    pub fn new(api_url: &str, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url: normalize_api_url(api_url)?,
            api_key,
            poll_interval: STATUS_POLL_INTERVAL,
        })
    }

    /// Interval between status checks while a verification is queued.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Submit a contract for verification.
    pub async fn submit(&self, request: &VerificationRequest) -> Result<Submission> {
        let address = request.address.to_string();
        let form = [
            ("apikey", self.api_key.as_str()),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", address.as_str()),
            ("sourceCode", request.source.as_str()),
            ("codeformat", "solidity-standard-json-input"),
            ("contractname", request.contract_name.as_str()),
            ("compilerversion", request.compiler_version.as_str()),
            // sic, the explorer API spells it this way
            ("constructorArguements", request.constructor_args.as_str()),
        ];

        let response: ApiResponse = self
            .client
            .post(self.api_url.clone())
            .form(&form)
            .send()
            .await
            .context("Failed to send verification request")?
            .json()
            .await
            .context("Failed to parse verification response")?;

        if response.status == "1" {
            return Ok(Submission::Queued(response.result));
        }

        if response.result.to_lowercase().contains("already verified") {
            return Ok(Submission::AlreadyVerified);
        }

        anyhow::bail!(
            "Explorer rejected verification of {}: {} ({})",
            request.address,
            response.result,
            response.message
        )
    }

    /// Query the status of a queued verification.
    pub async fn status(&self, guid: &str) -> Result<VerificationStatus> {
        let response: ApiResponse = self
            .client
            .get(self.api_url.clone())
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .send()
            .await
            .context("Failed to send verification status request")?
            .json()
            .await
            .context("Failed to parse verification status response")?;

        Ok(VerificationStatus::from_result(&response.result))
    }

    /// Poll until the verification leaves the queue.
    pub async fn wait_for(&self, guid: &str) -> Result<VerificationStatus> {
        let poll = || async {
            match self.status(guid).await? {
                VerificationStatus::Pending => Err(anyhow::Error::new(StillPending)),
                done => Ok(done),
            }
        };

        poll.retry(
            ConstantBuilder::default()
                .with_delay(self.poll_interval)
                .with_max_times(STATUS_POLL_ATTEMPTS),
        )
        .when(|e| e.is::<StillPending>())
        .notify(|_, delay| tracing::debug!(guid, ?delay, "Verification pending, retrying..."))
        .await
        .with_context(|| format!("Verification {} did not complete", guid))
    }

    /// Submit and wait for the outcome.
    pub async fn verify(&self, request: &VerificationRequest) -> Result<VerificationStatus> {
        match self.submit(request).await? {
            Submission::AlreadyVerified => Ok(VerificationStatus::Verified),
            Submission::Queued(guid) => {
                tracing::info!(address = %request.address, guid = %guid, "Verification submitted");
                self.wait_for(&guid).await
            }
        }
    }
}

/// Explorer API key for a network: its own variable first, then the global one.
pub fn api_key(network: &NetworkVerifyConfig, global: &VerifyConfig) -> Result<String> {
    api_key_from(network, global, |name| std::env::var(name).ok())
}

fn api_key_from(
    network: &NetworkVerifyConfig,
    global: &VerifyConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    [network.api_key_env.as_str(), global.api_key_env.as_str()]
        .into_iter()
        .find_map(|name| lookup(name).filter(|key| !key.trim().is_empty()))
        .with_context(|| {
            format!(
                "Explorer API key not set: export {} or {}",
                network.api_key_env, global.api_key_env
            )
        })
}

/// Verify the recorded deployments named in `contracts`, or all of them.
///
/// Stops at the first failure.
pub async fn verify_deployments(
    explorer: &ExplorerClient,
    store: &DeploymentStore,
    artifacts_dir: &Path,
    solidity: &SolidityConfig,
    contracts: &[String],
) -> Result<Vec<(String, VerificationStatus)>> {
    let records = if contracts.is_empty() {
        store.list()?
    } else {
        contracts
            .iter()
            .map(|name| store.get(name))
            .collect::<Result<Vec<_>>>()?
    };

    if records.is_empty() {
        tracing::warn!(network = %store.network(), "Nothing to verify");
    }

    let mut results = Vec::new();
    for record in records {
        let artifact = ContractArtifact::load(artifacts_dir, &record.contract_name)?;
        let request = VerificationRequest::from_record(&record, &artifact, solidity)?;

        tracing::info!(
            contract = %record.contract_name,
            address = %record.address,
            explorer = %explorer.api_url(),
            "Verifying {}...",
            record.contract_name
        );

        let status = explorer.verify(&request).await?;
        if let VerificationStatus::Failed(reason) = &status {
            anyhow::bail!("Verification of {} failed: {}", record.contract_name, reason);
        }

        tracing::info!(contract = %record.contract_name, "Verified");
        results.push((record.contract_name, status));
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::tests::write_artifact;
    use alloy_core::primitives::{B256, address};
    use mockito::{Matcher, Server};
    use tempdir::TempDir;

    const STABLECOIN: Address = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");

    fn record(name: &str, address: Address) -> DeploymentRecord {
        DeploymentRecord {
            contract_name: name.to_string(),
            address,
            args: vec![STABLECOIN],
            transaction_hash: B256::ZERO,
            block_number: Some(1),
            gas_used: 0,
            deployment_hash: String::new(),
            abi: serde_json::json!([]),
            deployed_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn explorer(server: &Server) -> ExplorerClient {
        ExplorerClient::new(&server.url(), "test-key".to_string())
            .unwrap()
            .with_poll_interval(Duration::from_millis(10))
    }

    fn request() -> VerificationRequest {
        VerificationRequest {
            address: address!("5FbDB2315678afecb367f032d93F642f64180aa3"),
            source: "{}".to_string(),
            contract_name: "contracts/Thrive.sol:Thrive".to_string(),
            compiler_version: "v0.8.10+commit.fc410830".to_string(),
            constructor_args: encode_address_args(&[STABLECOIN]),
        }
    }

    fn body(status: &str, result: &str) -> String {
        serde_json::json!({ "status": status, "message": "", "result": result }).to_string()
    }

    #[test]
    fn test_api_key_fallback() {
        let network = NetworkVerifyConfig {
            api_url: "https://api.basescan.org/api".to_string(),
            api_key_env: "BASESCAN_API_KEY".to_string(),
        };
        let global = VerifyConfig::default();

        let own = api_key_from(&network, &global, |name| match name {
            "BASESCAN_API_KEY" => Some("base-key".to_string()),
            "ETHERSCAN_API_KEY" => Some("global-key".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(own, "base-key");

        let fallback = api_key_from(&network, &global, |name| match name {
            "BASESCAN_API_KEY" => Some(String::new()),
            "ETHERSCAN_API_KEY" => Some("global-key".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(fallback, "global-key");

        let err = api_key_from(&network, &global, |_| None).unwrap_err();
        assert!(err.to_string().contains("BASESCAN_API_KEY"));
    }

    #[test]
    fn test_status_from_result() {
        assert_eq!(
            VerificationStatus::from_result("Pending in queue"),
            VerificationStatus::Pending
        );
        assert_eq!(
            VerificationStatus::from_result("Pass - Verified"),
            VerificationStatus::Verified
        );
        assert_eq!(
            VerificationStatus::from_result("Already Verified"),
            VerificationStatus::Verified
        );
        assert_eq!(
            VerificationStatus::from_result("Fail - Unable to verify"),
            VerificationStatus::Failed("Fail - Unable to verify".to_string())
        );
    }

    #[test]
    fn test_encode_address_args() {
        let encoded = encode_address_args(&[
            address!("036CbD53842c5426634e7929541eC2318f3dCF7e"),
            Address::ZERO,
        ]);

        assert_eq!(encoded.len(), 128);
        assert_eq!(
            &encoded[..64],
            "000000000000000000000000036cbd53842c5426634e7929541ec2318f3dcf7e"
        );
        assert_eq!(&encoded[64..], "0".repeat(64));
    }

    #[test]
    fn test_encode_matches_constructor_encoding() {
        use crate::protocol::Thrive;
        use alloy_sol_types::SolConstructor;

        let stablecoin = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");
        let typed = Thrive::constructorCall { stablecoin }.abi_encode();

        assert_eq!(encode_address_args(&[stablecoin]), hex::encode(typed));
    }

    #[test]
    fn test_request_from_record() {
        let temp_dir = TempDir::new("thrive-test").unwrap();
        write_artifact(temp_dir.path(), "Thrive", "0x6080604052");
        let artifact = ContractArtifact::load(temp_dir.path(), "Thrive").unwrap();

        // Built with 0.8.10, configured for another version: warns but still builds.
        let solidity = SolidityConfig {
            version: "0.8.20".to_string(),
            ..SolidityConfig::default()
        };
        let address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
        let request =
            VerificationRequest::from_record(&record("Thrive", address), &artifact, &solidity)
                .unwrap();

        assert_eq!(request.address, address);
        assert_eq!(request.contract_name, "contracts/Thrive.sol:Thrive");
        assert_eq!(request.compiler_version, "v0.8.10+commit.fc410830");
        assert_eq!(request.constructor_args, encode_address_args(&[STABLECOIN]));
        let source: serde_json::Value = serde_json::from_str(&request.source).unwrap();
        assert_eq!(source["language"], "Solidity");
    }

    #[tokio::test]
    async fn test_verify_polls_until_pass() {
        let mut server = Server::new_async().await;
        let submit = server
            .mock("POST", "/api")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "verifysourcecode".into()),
                Matcher::UrlEncoded("codeformat".into(), "solidity-standard-json-input".into()),
                Matcher::UrlEncoded("contractname".into(), "contracts/Thrive.sol:Thrive".into()),
                Matcher::UrlEncoded("apikey".into(), "test-key".into()),
            ]))
            .with_body(body("1", "guid-1"))
            .expect(1)
            .create_async()
            .await;
        let pending = server
            .mock("GET", "/api")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "checkverifystatus".into()),
                Matcher::UrlEncoded("guid".into(), "guid-1".into()),
            ]))
            .with_body(body("0", "Pending in queue"))
            .expect(1)
            .create_async()
            .await;
        let pass = server
            .mock("GET", "/api")
            .match_query(Matcher::UrlEncoded("guid".into(), "guid-1".into()))
            .with_body(body("1", "Pass - Verified"))
            .expect(1)
            .create_async()
            .await;

        let status = explorer(&server).verify(&request()).await.unwrap();

        assert_eq!(status, VerificationStatus::Verified);
        submit.assert_async().await;
        pending.assert_async().await;
        pass.assert_async().await;
    }

    #[tokio::test]
    async fn test_already_verified_on_submit() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api")
            .with_body(body("0", "Contract source code already verified"))
            .create_async()
            .await;
        let status_check = server
            .mock("GET", "/api")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = explorer(&server);
        assert_eq!(
            client.submit(&request()).await.unwrap(),
            Submission::AlreadyVerified
        );
        assert_eq!(
            client.verify(&request()).await.unwrap(),
            VerificationStatus::Verified
        );
        status_check.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_submission() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api")
            .with_body(body("0", "Invalid API Key"))
            .create_async()
            .await;

        let err = explorer(&server).submit(&request()).await.unwrap_err();
        assert!(err.to_string().contains("Invalid API Key"));
    }

    #[tokio::test]
    async fn test_failed_status_aborts_remaining_contracts() {
        let temp_dir = TempDir::new("thrive-test").unwrap();
        let artifacts = temp_dir.path().join("artifacts");
        write_artifact(&artifacts, "Thrive", "0x6080604052");
        write_artifact(&artifacts, "ThrivePiggy", "0x6080604052");

        let store = DeploymentStore::open(&temp_dir.path().join("deployments"), "baseSepolia")
            .unwrap();
        store
            .save(&record("Thrive", address!("5FbDB2315678afecb367f032d93F642f64180aa3")))
            .unwrap();
        store
            .save(&record("ThrivePiggy", address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512")))
            .unwrap();

        let mut server = Server::new_async().await;
        let submit = server
            .mock("POST", "/api")
            .with_body(body("1", "guid-1"))
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", "/api")
            .match_query(Matcher::UrlEncoded("guid".into(), "guid-1".into()))
            .with_body(body("0", "Fail - Unable to verify"))
            .create_async()
            .await;

        let err = verify_deployments(
            &explorer(&server),
            &store,
            &artifacts,
            &SolidityConfig::default(),
            &[],
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("Verification of Thrive failed"));
        // ThrivePiggy is never submitted.
        submit.assert_async().await;
    }
}
