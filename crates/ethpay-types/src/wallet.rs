//! The contract a wallet provider fulfils for a checkout.
//!
//! A provider is whatever holds the user's keys: a browser-injected signer bridged into
//! Rust, a remote signer, or a local private key (see the `ethpay-eip155` crate). The
//! checkout never touches key material; it only asks the provider to connect, report
//! account and chain, sign a message and send a transfer.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::chain::Eip155ChainId;

/// Notifications a provider emits when the user changes wallet context.
///
/// Each of these invalidates the payment details and signature of an attempt in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// `accountsChanged`; the first address is the selected one.
    AccountsChanged(Vec<Address>),
    /// `chainChanged`, carrying the hex chain id as reported (`"0xa"`).
    ChainChanged(String),
    /// `networkChanged`, carrying the legacy network id.
    NetworkChanged(String),
}

impl WalletEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WalletEvent::AccountsChanged(_) => "accountsChanged",
            WalletEvent::ChainChanged(_) => "chainChanged",
            WalletEvent::NetworkChanged(_) => "networkChanged",
        }
    }
}

/// ERC-20 identity as read from the token contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub ticker: String,
    pub name: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WalletError {
    #[error("Wallet connection was rejected by the user")]
    UserRejected,
    #[error("No wallet provider available: {0}")]
    ProviderUnavailable(String),
    #[error("Message signature was rejected: {0}")]
    SignatureRejected(String),
    #[error("Transaction was rejected: {0}")]
    TransactionRejected(String),
    #[error("Insufficient funds to pay for this order")]
    InsufficientFunds,
    #[error("Wallet request failed: {0}")]
    Rpc(String),
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Asks the wallet for access to its accounts; the first one is the selected account.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

    async fn chain_id(&self) -> Result<Eip155ChainId, WalletError>;

    /// `wallet_switchEthereumChain`. Resolves once the wallet answers the prompt; the
    /// resulting chain change is reported separately as [`WalletEvent::ChainChanged`].
    async fn switch_chain(&self, chain_id: Eip155ChainId) -> Result<(), WalletError>;

    /// `personal_sign` of a UTF-8 message; returns the `0x`-prefixed signature.
    async fn personal_sign(&self, message: &str, address: Address) -> Result<String, WalletError>;

    async fn send_native_transfer(
        &self,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<B256, WalletError>;

    /// ERC-20 `transfer(to, amount)`; `amount` is in base units.
    async fn send_token_transfer(
        &self,
        from: Address,
        contract: Address,
        to: Address,
        amount: U256,
    ) -> Result<B256, WalletError>;

    async fn token_info(&self, contract: Address) -> Result<TokenInfo, WalletError>;

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}
