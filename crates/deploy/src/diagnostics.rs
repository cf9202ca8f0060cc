//! Stablecoin balance and allowance check for a deployed ThrivePiggy.
//!
//! Read-only unless approve/transfer amounts are given.

use alloy_core::primitives::{Address, B256, U256};
use anyhow::Result;

use crate::{
    chain::ChainClient,
    protocol::THRIVE_PIGGY,
    store::DeploymentStore,
    token::{Erc20, TokenInfo},
};

/// A write to perform after the reads, with a human amount.
#[derive(Debug, Clone, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum TokenAction {
    /// Approve ThrivePiggy to spend the deployer's tokens.
    Approve(String),
    /// Transfer tokens from the deployer to ThrivePiggy.
    Transfer(String),
}

impl TokenAction {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn amount(&self) -> &str {
        match self {
            Self::Approve(amount) | Self::Transfer(amount) => amount,
        }
    }
}

/// Result of one [`TokenAction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub action: TokenAction,
    /// Transaction hash, or the error message.
    pub result: Result<B256, String>,
}

/// Balances and allowance as read from the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceReport {
    pub token: TokenInfo,
    pub deployer: Address,
    pub piggy: Address,
    pub deployer_balance: U256,
    pub piggy_balance: U256,
    /// Allowance granted by the deployer to ThrivePiggy.
    pub allowance: U256,
    /// Actions attempted, in order. Stops at the first failure.
    pub actions: Vec<ActionOutcome>,
}

impl BalanceReport {
    /// The first failed action, if any.
    pub fn failed_action(&self) -> Option<&ActionOutcome> {
        self.actions.iter().find(|a| a.result.is_err())
    }
}

/// Check the stablecoin position of `deployer` against the recorded ThrivePiggy.
pub async fn check_balances<C: ChainClient>(
    client: &C,
    store: &DeploymentStore,
    stablecoin: Address,
    deployer: Address,
    actions: &[TokenAction],
) -> Result<BalanceReport> {
    let piggy = store.get(THRIVE_PIGGY)?.address;

    tracing::info!(deployer = %deployer, "this is deployer");
    tracing::info!(address = %piggy, "verify protocol contracts");

    let token = Erc20::new(client, stablecoin);
    let info = token.info().await?;
    tracing::info!(
        token = %info.address,
        name = %info.name,
        symbol = %info.symbol,
        decimals = info.decimals,
        total_supply = %info.format(info.total_supply)?,
        "Token"
    );

    let deployer_balance = token.balance_of(deployer).await?;
    tracing::info!(
        "Deployer {} balance: {}",
        info.symbol,
        info.format(deployer_balance)?
    );

    let piggy_balance = token.balance_of(piggy).await?;
    tracing::info!(
        "ThrivePiggy {} balance: {}",
        info.symbol,
        info.format(piggy_balance)?
    );

    let allowance = token.allowance(deployer, piggy).await?;
    tracing::info!(
        "Deployer {} allowance for ThrivePiggy: {}",
        info.symbol,
        info.format(allowance)?
    );

    let mut outcomes = Vec::new();
    for action in actions {
        let result = run_action(&token, &info, deployer, piggy, action).await;

        match &result {
            Ok(tx_hash) => {
                tracing::info!(action = action.name(), tx_hash = %tx_hash, "{} successful", action.name());
            }
            Err(e) => {
                tracing::error!(action = action.name(), err = %e, "Error during {}", action.name());
            }
        }

        let failed = result.is_err();
        outcomes.push(ActionOutcome {
            action: action.clone(),
            result: result.map_err(|e| format!("{:#}", e)),
        });
        if failed {
            break;
        }
    }

    Ok(BalanceReport {
        token: info,
        deployer,
        piggy,
        deployer_balance,
        piggy_balance,
        allowance,
        actions: outcomes,
    })
}

async fn run_action<C: ChainClient>(
    token: &Erc20<'_, C>,
    info: &TokenInfo,
    deployer: Address,
    piggy: Address,
    action: &TokenAction,
) -> Result<B256> {
    let amount = info.parse(action.amount())?;

    let outcome = match action {
        TokenAction::Approve(_) => {
            tracing::info!("Approving ThrivePiggy contract to spend {} {}...", action.amount(), info.symbol);
            token.approve(deployer, piggy, amount).await?
        }
        TokenAction::Transfer(_) => {
            tracing::info!("Transferring {} {} to ThrivePiggy...", action.amount(), info.symbol);
            token.transfer(deployer, piggy, amount).await?
        }
    };

    Ok(outcome.transaction_hash)
}
