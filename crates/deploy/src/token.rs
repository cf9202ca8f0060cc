//! ERC-20 token access.

use alloy_core::primitives::{Address, U256};
use alloy_sol_types::{SolCall, sol};
use anyhow::{Context, Result};

use crate::{
    chain::{ChainClient, TxOutcome},
    units,
};

sol! {
    /// Standard fungible-token interface.
    interface IERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address owner) external view returns (uint256 balance);
        function transfer(address to, uint256 value) external returns (bool);
        function approve(address spender, uint256 value) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
    }
}

/// Token metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
}

impl TokenInfo {
    /// Format a raw amount with this token's precision.
    pub fn format(&self, amount: U256) -> Result<String> {
        units::format_units(amount, self.decimals)
    }

    /// Parse a human amount with this token's precision.
    pub fn parse(&self, amount: &str) -> Result<U256> {
        units::parse_units(amount, self.decimals)
    }
}

/// Handle on an ERC-20 contract.
#[derive(Debug, Clone)]
pub struct Erc20<'a, C> {
    client: &'a C,
    address: Address,
}

impl<'a, C: ChainClient> Erc20<'a, C> {
    pub fn new(client: &'a C, address: Address) -> Self {
        Self { client, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn read<T: SolCall>(&self, call: T) -> Result<T::Return> {
        let output = self
            .client
            .call(self.address, call.abi_encode().into())
            .await
            .with_context(|| format!("{} on token {} failed", T::SIGNATURE, self.address))?;

        T::abi_decode_returns(&output).with_context(|| {
            format!(
                "Failed to decode {} result from token {}",
                T::SIGNATURE,
                self.address
            )
        })
    }

    pub async fn name(&self) -> Result<String> {
        self.read(IERC20::nameCall {}).await
    }

    pub async fn symbol(&self) -> Result<String> {
        self.read(IERC20::symbolCall {}).await
    }

    pub async fn decimals(&self) -> Result<u8> {
        self.read(IERC20::decimalsCall {}).await
    }

    pub async fn total_supply(&self) -> Result<U256> {
        self.read(IERC20::totalSupplyCall {}).await
    }

    pub async fn balance_of(&self, owner: Address) -> Result<U256> {
        self.read(IERC20::balanceOfCall { owner }).await
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        self.read(IERC20::allowanceCall { owner, spender }).await
    }

    /// Read name, symbol, decimals and total supply.
    pub async fn info(&self) -> Result<TokenInfo> {
        Ok(TokenInfo {
            address: self.address,
            name: self.name().await?,
            symbol: self.symbol().await?,
            decimals: self.decimals().await?,
            total_supply: self.total_supply().await?,
        })
    }

    /// Approve `spender` for `value`, signed by `from`.
    pub async fn approve(&self, from: Address, spender: Address, value: U256) -> Result<TxOutcome> {
        let input = IERC20::approveCall { spender, value }.abi_encode();
        self.client
            .send(from, self.address, input.into())
            .await
            .with_context(|| format!("approve on token {} failed", self.address))
    }

    /// Transfer `value` to `to`, signed by `from`.
    pub async fn transfer(&self, from: Address, to: Address, value: U256) -> Result<TxOutcome> {
        let input = IERC20::transferCall { to, value }.abi_encode();
        self.client
            .send(from, self.address, input.into())
            .await
            .with_context(|| format!("transfer on token {} failed", self.address))
    }
}
