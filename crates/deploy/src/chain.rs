//! RPC access to an EVM chain.

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes};
use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::{TransactionReceipt, TransactionRequest};
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// Address of the created contract, for creation transactions.
    pub contract_address: Option<Address>,
}

impl From<&TransactionReceipt> for TxOutcome {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            contract_address: receipt.contract_address,
        }
    }
}

/// The chain operations the deployment and diagnostic flows need.
///
/// Writes wait for the receipt and fail on revert.
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Runtime code at `address`, empty for accounts without code.
    fn code_at(&self, address: Address) -> impl Future<Output = Result<Bytes>> + Send;

    /// Read-only `eth_call`.
    fn call(&self, to: Address, input: Bytes) -> impl Future<Output = Result<Bytes>> + Send;

    /// Send a contract creation transaction with `init_code`.
    fn deploy(
        &self,
        from: Address,
        init_code: Bytes,
    ) -> impl Future<Output = Result<TxOutcome>> + Send;

    /// Send a call transaction.
    fn send(
        &self,
        from: Address,
        to: Address,
        input: Bytes,
    ) -> impl Future<Output = Result<TxOutcome>> + Send;
}

/// [`ChainClient`] backed by an alloy HTTP provider.
#[derive(Clone)]
pub struct AlloyClient {
    provider: DynProvider,
    url: String,
    can_sign: bool,
}

impl std::fmt::Debug for AlloyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlloyClient")
            .field("url", &self.url)
            .field("can_sign", &self.can_sign)
            .finish()
    }
}

impl AlloyClient {
    /// Connect to `rpc_url`. Without a signer the client is read-only.
    pub fn connect(rpc_url: &str, signer: Option<PrivateKeySigner>) -> Result<Self> {
        let url = rpc_url
            .parse()
            .context(format!("Invalid RPC URL: {}", rpc_url))?;

        let can_sign = signer.is_some();
        let provider = match signer {
            Some(signer) => ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer))
                .connect_http(url)
                .erased(),
            None => ProviderBuilder::new().connect_http(url).erased(),
        };

        tracing::debug!(url = %rpc_url, can_sign, "RPC client created");

        Ok(Self {
            provider,
            url: rpc_url.to_string(),
            can_sign,
        })
    }

    async fn submit(&self, tx: TransactionRequest) -> Result<TxOutcome> {
        if !self.can_sign {
            anyhow::bail!("RPC client for {} has no signer", self.url);
        }

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .context("Failed to send transaction")?;

        tracing::debug!(tx_hash = %pending.tx_hash(), "Transaction sent, waiting for receipt");

        let receipt = pending
            .get_receipt()
            .await
            .context("Failed to get transaction receipt")?;

        if !receipt.status() {
            anyhow::bail!("Transaction {} reverted", receipt.transaction_hash);
        }

        Ok(TxOutcome::from(&receipt))
    }
}

impl ChainClient for AlloyClient {
    async fn chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .context(format!("Failed to get chain ID from {}", self.url))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes> {
        self.provider
            .get_code_at(address)
            .await
            .context(format!("Failed to get code at {}", address))
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(input);
        self.provider
            .call(tx)
            .await
            .context(format!("eth_call to {} failed", to))
    }

    async fn deploy(&self, from: Address, init_code: Bytes) -> Result<TxOutcome> {
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_deploy_code(init_code);

        let outcome = self.submit(tx).await?;
        if outcome.contract_address.is_none() {
            anyhow::bail!(
                "Receipt of {} carries no contract address",
                outcome.transaction_hash
            );
        }
        Ok(outcome)
    }

    async fn send(&self, from: Address, to: Address, input: Bytes) -> Result<TxOutcome> {
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_input(input);
        self.submit(tx).await
    }
}
