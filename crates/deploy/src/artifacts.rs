//! Compiled contract artifacts.
//!
//! Artifacts follow the Hardhat layout: `<artifacts>/<source>/<Name>.json` holds the
//! ABI and bytecode, `<Name>.dbg.json` next to it points at the build-info file that
//! carries the compiler version and the standard-JSON input.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Bytes;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// A compiled contract.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    /// Source file the contract is declared in, e.g. `contracts/Thrive.sol`.
    pub source_name: String,
    pub abi: Value,
    /// Creation bytecode, without constructor arguments.
    pub bytecode: Bytes,
    #[serde(default)]
    pub deployed_bytecode: Option<Bytes>,

    /// Where the artifact was read from.
    #[serde(skip)]
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: PathBuf,
}

/// The compiler invocation an artifact came from.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    /// Short version, e.g. `0.8.10`.
    pub solc_version: String,
    /// Full version, e.g. `0.8.10+commit.fc410830`.
    pub solc_long_version: String,
    /// The standard-JSON input given to the compiler.
    pub input: Value,
}

impl ContractArtifact {
    /// Find and load the artifact for `name` under `artifacts_dir`.
    pub fn load(artifacts_dir: &Path, name: &str) -> Result<Self> {
        let path = find_artifact(artifacts_dir, name)?.with_context(|| {
            format!(
                "No artifact for contract '{}' under {} (compile the contracts first)",
                name,
                artifacts_dir.display()
            )
        })?;

        Self::load_from_file(&path)
    }

    /// Load an artifact from an explicit path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read artifact {}", path.display()))?;
        let mut artifact: Self = serde_json::from_str(&content)
            .context(format!("Failed to parse artifact {}", path.display()))?;

        if artifact.bytecode.is_empty() {
            anyhow::bail!(
                "Contract '{}' has no bytecode (abstract contract or interface?)",
                artifact.contract_name
            );
        }

        artifact.path = path.to_path_buf();
        tracing::trace!(contract = %artifact.contract_name, path = %path.display(), "Artifact loaded");
        Ok(artifact)
    }

    /// Fully qualified name, as explorers expect it: `<source>:<name>`.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }

    /// Load the build-info referenced by the artifact's debug file.
    pub fn build_info(&self) -> Result<BuildInfo> {
        let dbg_path = self.path.with_extension("dbg.json");
        let content = std::fs::read_to_string(&dbg_path)
            .context(format!("Failed to read debug file {}", dbg_path.display()))?;
        let dbg: DebugFile = serde_json::from_str(&content)
            .context(format!("Failed to parse debug file {}", dbg_path.display()))?;

        let parent = dbg_path
            .parent()
            .context("Artifact path must have a parent directory")?;
        let build_info_path = parent.join(&dbg.build_info);

        let content = std::fs::read_to_string(&build_info_path).context(format!(
            "Failed to read build info {}",
            build_info_path.display()
        ))?;
        serde_json::from_str(&content).context(format!(
            "Failed to parse build info {}",
            build_info_path.display()
        ))
    }
}

/// Walk `dir` looking for `<name>.json`.
///
/// Build-info and debug files never match since their stems differ.
fn find_artifact(dir: &Path, name: &str) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }

    let file_name = format!("{}.json", name);
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current)
            .context(format!("Failed to list {}", current.display()))?;

        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                if path.file_name().is_some_and(|n| n == "build-info") {
                    continue;
                }
                pending.push(path);
            } else if path.file_name().is_some_and(|n| n == file_name.as_str()) {
                return Ok(Some(path));
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempdir::TempDir;

    /// Write a minimal Hardhat artifact tree for `name`.
    pub(crate) fn write_artifact(root: &Path, name: &str, bytecode: &str) {
        let dir = root.join(format!("contracts/{}.sol", name));
        std::fs::create_dir_all(&dir).unwrap();

        let artifact = serde_json::json!({
            "_format": "hh-sol-artifact-1",
            "contractName": name,
            "sourceName": format!("contracts/{}.sol", name),
            "abi": [],
            "bytecode": bytecode,
            "deployedBytecode": "0x00",
            "linkReferences": {},
            "deployedLinkReferences": {}
        });
        std::fs::write(dir.join(format!("{}.json", name)), artifact.to_string()).unwrap();

        let dbg = serde_json::json!({
            "_format": "hh-sol-dbg-1",
            "buildInfo": "../../build-info/abc123.json"
        });
        std::fs::write(dir.join(format!("{}.dbg.json", name)), dbg.to_string()).unwrap();

        let build_info_dir = root.join("build-info");
        std::fs::create_dir_all(&build_info_dir).unwrap();
        let build_info = serde_json::json!({
            "solcVersion": "0.8.10",
            "solcLongVersion": "0.8.10+commit.fc410830",
            "input": { "language": "Solidity", "sources": {} }
        });
        std::fs::write(build_info_dir.join("abc123.json"), build_info.to_string()).unwrap();
    }

    #[test]
    fn test_load_by_name() {
        let temp_dir = TempDir::new("thrive-test").unwrap();
        write_artifact(temp_dir.path(), "Thrive", "0x6080604052");

        let artifact = ContractArtifact::load(temp_dir.path(), "Thrive").unwrap();
        assert_eq!(artifact.contract_name, "Thrive");
        assert_eq!(artifact.bytecode.as_ref(), &[0x60, 0x80, 0x60, 0x40, 0x52]);
        assert_eq!(artifact.qualified_name(), "contracts/Thrive.sol:Thrive");
    }

    #[test]
    fn test_missing_artifact() {
        let temp_dir = TempDir::new("thrive-test").unwrap();
        write_artifact(temp_dir.path(), "Thrive", "0x6080604052");

        let err = ContractArtifact::load(temp_dir.path(), "ThrivePiggy").unwrap_err();
        assert!(err.to_string().contains("No artifact"));
    }

    #[test]
    fn test_empty_bytecode_rejected() {
        let temp_dir = TempDir::new("thrive-test").unwrap();
        write_artifact(temp_dir.path(), "IThrive", "0x");

        assert!(ContractArtifact::load(temp_dir.path(), "IThrive").is_err());
    }

    #[test]
    fn test_build_info() {
        let temp_dir = TempDir::new("thrive-test").unwrap();
        write_artifact(temp_dir.path(), "Thrive", "0x6080604052");

        let artifact = ContractArtifact::load(temp_dir.path(), "Thrive").unwrap();
        let build_info = artifact.build_info().unwrap();
        assert_eq!(build_info.solc_version, "0.8.10");
        assert_eq!(build_info.solc_long_version, "0.8.10+commit.fc410830");
        assert_eq!(build_info.input["language"], "Solidity");
    }
}
