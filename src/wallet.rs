//! Account, chain and signature state for one wallet connection.
//!
//! [`WalletSession`] wraps a [`WalletProvider`] and remembers what the checkout learned from
//! it: the selected account, the current chain and the ownership signatures already produced.
//! Signatures are cached per `(address, message)` so a restarted attempt for the same order
//! does not prompt the user a second time, while a different account or a different message
//! always asks again.

use alloy_primitives::utils::parse_units;
use alloy_primitives::{Address, B256, U256};
use ethpay_types::chain::Eip155ChainId;
use ethpay_types::wallet::{TokenInfo, WalletError, WalletEvent, WalletProvider};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

#[derive(Debug, thiserror::Error)]
pub enum WalletSessionError {
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error("The wallet did not return any account")]
    NoAccount,
    #[error("Invalid payment amount {amount:?}: {reason}")]
    InvalidAmount { amount: String, reason: String },
}

/// The account a session is connected with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountHandle {
    pub address: Address,
    pub chain_id: Eip155ChainId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CachedSignature {
    message: String,
    signature: String,
}

#[derive(Debug, Clone, Default)]
pub struct WalletAccountState {
    pub selected_address: Option<Address>,
    pub chain_id: Option<Eip155ChainId>,
    signatures: HashMap<Address, CachedSignature>,
}

impl WalletAccountState {
    pub fn signature_for(&self, address: Address, message: &str) -> Option<&str> {
        self.signatures
            .get(&address)
            .filter(|cached| cached.message == message)
            .map(|cached| cached.signature.as_str())
    }
}

/// Result of [`WalletSession::ensure_chain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainCheck {
    Matches,
    /// The wallet was asked to switch; the attempt proceeds without waiting for the answer.
    SwitchRequested {
        current: Option<Eip155ChainId>,
        desired: Eip155ChainId,
    },
}

pub struct WalletSession {
    provider: Arc<dyn WalletProvider>,
    state: Mutex<WalletAccountState>,
}

impl WalletSession {
    pub fn new(provider: Arc<dyn WalletProvider>) -> Self {
        Self {
            provider,
            state: Mutex::new(WalletAccountState::default()),
        }
    }

    fn state_mut(&self) -> MutexGuard<'_, WalletAccountState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of what the session currently knows.
    pub fn state(&self) -> WalletAccountState {
        self.state_mut().clone()
    }

    pub async fn connect(&self) -> Result<AccountHandle, WalletSessionError> {
        let (address, chain_id) = self.active_account_and_chain().await?;
        tracing::info!(%address, %chain_id, "Wallet connected");
        Ok(AccountHandle { address, chain_id })
    }

    /// Re-queries the provider for the selected account and chain and records both.
    pub async fn active_account_and_chain(
        &self,
    ) -> Result<(Address, Eip155ChainId), WalletSessionError> {
        let accounts = self.provider.request_accounts().await?;
        let address = *accounts.first().ok_or(WalletSessionError::NoAccount)?;
        let chain_id = self.provider.chain_id().await?;
        let mut state = self.state_mut();
        state.selected_address = Some(address);
        state.chain_id = Some(chain_id);
        Ok((address, chain_id))
    }

    /// Compares the last known chain with `desired` and, on mismatch, asks the wallet to
    /// switch in the background. Must be called from within a tokio runtime.
    pub fn ensure_chain(&self, desired: Eip155ChainId) -> ChainCheck {
        let current = self.state_mut().chain_id;
        if current == Some(desired) {
            return ChainCheck::Matches;
        }
        tracing::info!(?current, %desired, "Requesting wallet chain switch");
        let provider = Arc::clone(&self.provider);
        tokio::spawn(async move {
            if let Err(error) = provider.switch_chain(desired).await {
                tracing::warn!(%desired, %error, "Wallet chain switch failed");
            }
        });
        ChainCheck::SwitchRequested { current, desired }
    }

    /// Signs `message` with `address`, reusing an earlier signature of the same message by the
    /// same address.
    pub async fn sign_message(
        &self,
        message: &str,
        address: Address,
    ) -> Result<String, WalletSessionError> {
        let cached = self
            .state_mut()
            .signature_for(address, message)
            .map(str::to_string);
        if let Some(signature) = cached {
            tracing::debug!(%address, "Reusing ownership signature");
            return Ok(signature);
        }
        let signature = self.provider.personal_sign(message, address).await?;
        self.state_mut().signatures.insert(
            address,
            CachedSignature {
                message: message.to_string(),
                signature: signature.clone(),
            },
        );
        Ok(signature)
    }

    /// Sends `value` wei from `from` to `to`. `value` is a base-10 integer string.
    pub async fn send_native_transfer(
        &self,
        from: Address,
        to: Address,
        value: &str,
    ) -> Result<B256, WalletSessionError> {
        let value = wei_amount(value)?;
        Ok(self.provider.send_native_transfer(from, to, value).await?)
    }

    /// Transfers `amount` whole tokens, scaled by `decimals`, through the ERC-20 at `contract`.
    pub async fn send_token_transfer(
        &self,
        from: Address,
        contract: Address,
        to: Address,
        amount: &str,
        decimals: u8,
    ) -> Result<B256, WalletSessionError> {
        let amount = token_base_units(amount, decimals)?;
        Ok(self
            .provider
            .send_token_transfer(from, contract, to, amount)
            .await?)
    }

    pub async fn token_metadata(&self, contract: Address) -> Result<TokenInfo, WalletSessionError> {
        Ok(self.provider.token_info(contract).await?)
    }

    pub fn events(&self) -> broadcast::Receiver<WalletEvent> {
        self.provider.subscribe()
    }

    /// Folds a wallet notification into the session state.
    pub fn apply_event(&self, event: &WalletEvent) {
        let mut state = self.state_mut();
        match event {
            WalletEvent::AccountsChanged(accounts) => {
                state.selected_address = accounts.first().copied();
            }
            WalletEvent::ChainChanged(chain_id) => {
                state.chain_id = Eip155ChainId::from_str(chain_id).ok();
            }
            WalletEvent::NetworkChanged(_) => {}
        }
    }
}

fn invalid_amount(amount: &str, reason: impl ToString) -> WalletSessionError {
    WalletSessionError::InvalidAmount {
        amount: amount.to_string(),
        reason: reason.to_string(),
    }
}

/// Parses a base-10 wei amount.
pub fn wei_amount(value: &str) -> Result<U256, WalletSessionError> {
    U256::from_str_radix(value.trim(), 10).map_err(|e| invalid_amount(value, e))
}

/// Scales a decimal token amount (`"12.5"`) into base units.
pub fn token_base_units(amount: &str, decimals: u8) -> Result<U256, WalletSessionError> {
    let trimmed = amount.trim();
    if trimmed.starts_with('-') {
        return Err(invalid_amount(amount, "amount must not be negative"));
    }
    let parsed = parse_units(trimmed, decimals).map_err(|e| invalid_amount(amount, e))?;
    Ok(parsed.get_absolute())
}
