use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, B256, U256, hex};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use ethpay_types::chain::Eip155ChainId;
use ethpay_types::wallet::{TokenInfo, WalletError, WalletEvent, WalletProvider};
use std::fmt::Display;
use tokio::sync::broadcast;

use crate::config::LocalWalletConfig;
use crate::erc20::IERC20;

#[derive(Debug, thiserror::Error)]
pub enum LocalWalletError {
    #[error("Invalid private key: {0}")]
    InvalidKey(String),
}

/// A wallet backed by a private key held in process.
///
/// Transactions are filled (nonce, gas, chain id), signed locally and broadcast through
/// the configured RPC endpoint. The wallet has a single account and cannot switch chains:
/// the chain is whatever the endpoint serves.
///
/// Nothing inside the wallet changes account or chain by itself, so it never emits
/// events on its own; an embedding host may publish through [`LocalWallet::event_sender`]
/// to simulate or relay user-driven changes.
pub struct LocalWallet {
    signer: PrivateKeySigner,
    provider: DynProvider,
    events: broadcast::Sender<WalletEvent>,
}

impl LocalWallet {
    const EVENT_CAPACITY: usize = 16;

    pub fn try_new(config: &LocalWalletConfig) -> Result<Self, LocalWalletError> {
        let signer = PrivateKeySigner::from_bytes(config.private_key().as_b256())
            .map_err(|e| LocalWalletError::InvalidKey(e.to_string()))?;
        let wallet = EthereumWallet::from(signer.clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(config.rpc().clone())
            .erased();
        let (events, _) = broadcast::channel(Self::EVENT_CAPACITY);

        #[cfg(feature = "telemetry")]
        tracing::info!(address = %signer.address(), rpc = %config.rpc(), "Using local wallet");

        Ok(Self {
            signer,
            provider,
            events,
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn event_sender(&self) -> broadcast::Sender<WalletEvent> {
        self.events.clone()
    }

    fn ensure_own_account(&self, address: Address) -> Result<(), String> {
        if address == self.signer.address() {
            Ok(())
        } else {
            Err(format!("account {address} is not managed by this wallet"))
        }
    }
}

/// Maps a transport or contract error from a send into the checkout's wallet taxonomy.
fn send_error(err: impl Display) -> WalletError {
    let message = err.to_string();
    if message.to_ascii_lowercase().contains("insufficient funds") {
        WalletError::InsufficientFunds
    } else {
        WalletError::TransactionRejected(message)
    }
}

fn rpc_error(err: impl Display) -> WalletError {
    WalletError::Rpc(err.to_string())
}

#[async_trait]
impl WalletProvider for LocalWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        // Query the endpoint once so an unreachable RPC surfaces at connect time.
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| WalletError::ProviderUnavailable(e.to_string()))?;
        Ok(vec![self.signer.address()])
    }

    async fn chain_id(&self) -> Result<Eip155ChainId, WalletError> {
        let chain_id = self.provider.get_chain_id().await.map_err(rpc_error)?;
        Ok(Eip155ChainId::new(chain_id))
    }

    async fn switch_chain(&self, chain_id: Eip155ChainId) -> Result<(), WalletError> {
        let current = self.chain_id().await?;
        if current == chain_id {
            Ok(())
        } else {
            Err(WalletError::Rpc(format!(
                "RPC endpoint serves chain {current} and cannot switch to chain {chain_id}"
            )))
        }
    }

    async fn personal_sign(&self, message: &str, address: Address) -> Result<String, WalletError> {
        self.ensure_own_account(address)
            .map_err(WalletError::SignatureRejected)?;
        let signature = self
            .signer
            .sign_message(message.as_bytes())
            .await
            .map_err(|e| WalletError::SignatureRejected(e.to_string()))?;
        Ok(hex::encode_prefixed(signature.as_bytes()))
    }

    async fn send_native_transfer(
        &self,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<B256, WalletError> {
        self.ensure_own_account(from)
            .map_err(WalletError::TransactionRejected)?;
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_value(value);
        let pending = self.provider.send_transaction(tx).await.map_err(send_error)?;
        let hash = *pending.tx_hash();

        #[cfg(feature = "telemetry")]
        tracing::info!(%hash, %to, %value, "Native transfer broadcast");

        Ok(hash)
    }

    async fn send_token_transfer(
        &self,
        from: Address,
        contract: Address,
        to: Address,
        amount: U256,
    ) -> Result<B256, WalletError> {
        self.ensure_own_account(from)
            .map_err(WalletError::TransactionRejected)?;
        let token = IERC20::new(contract, self.provider.clone());
        let pending = token
            .transfer(to, amount)
            .from(from)
            .send()
            .await
            .map_err(send_error)?;
        let hash = *pending.tx_hash();

        #[cfg(feature = "telemetry")]
        tracing::info!(%hash, %contract, %to, %amount, "Token transfer broadcast");

        Ok(hash)
    }

    async fn token_info(&self, contract: Address) -> Result<TokenInfo, WalletError> {
        let token = IERC20::new(contract, self.provider.clone());
        let ticker = token.symbol().call().await.map_err(rpc_error)?;
        let name = token.name().call().await.map_err(rpc_error)?;
        let decimals = token.decimals().call().await.map_err(rpc_error)?;
        Ok(TokenInfo {
            ticker,
            name,
            decimals,
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethpay_types::config::LiteralOrEnv;

    const KEY: &str = "0xcafe000000000000000000000000000000000000000000000000000000000001";

    fn wallet() -> LocalWallet {
        let config = LocalWalletConfig {
            rpc: LiteralOrEnv::from_literal("http://127.0.0.1:1".parse().unwrap()),
            private_key: LiteralOrEnv::from_literal(KEY.parse().unwrap()),
        };
        LocalWallet::try_new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_personal_sign_recovers_to_wallet_address() {
        let wallet = wallet();
        let signature = wallet
            .personal_sign("Sign to pay order ABC", wallet.address())
            .await
            .unwrap();
        let bytes = hex::decode(&signature).unwrap();
        let parsed = alloy_primitives::Signature::try_from(bytes.as_slice()).unwrap();
        let recovered = parsed
            .recover_address_from_msg("Sign to pay order ABC")
            .unwrap();
        assert_eq!(recovered, wallet.address());
    }

    #[tokio::test]
    async fn test_personal_sign_rejects_foreign_account() {
        let wallet = wallet();
        let err = wallet
            .personal_sign("m", Address::repeat_byte(0x11))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::SignatureRejected(_)));
    }

    #[tokio::test]
    async fn test_unreachable_rpc_is_provider_unavailable() {
        let wallet = wallet();
        let err = wallet.request_accounts().await.unwrap_err();
        assert!(matches!(err, WalletError::ProviderUnavailable(_)));
    }

    #[test]
    fn test_insufficient_funds_classified() {
        assert!(matches!(
            send_error("server returned an error response: insufficient funds for gas * price + value"),
            WalletError::InsufficientFunds
        ));
        assert!(matches!(
            send_error("nonce too low"),
            WalletError::TransactionRejected(_)
        ));
    }
}
