use alloy_primitives::B256;
use ethpay_types::config::LiteralOrEnv;
use serde::Deserialize;
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use url::Url;

/// Configuration of a [`crate::LocalWallet`].
///
/// ```json
/// {
///   "rpc": "$CHECKOUT_RPC_URL",
///   "private_key": "$CHECKOUT_PRIVATE_KEY"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct LocalWalletConfig {
    /// JSON-RPC endpoint of the chain the wallet pays on.
    pub rpc: LiteralOrEnv<Url>,
    pub private_key: LiteralOrEnv<EvmPrivateKey>,
}

impl LocalWalletConfig {
    pub fn rpc(&self) -> &Url {
        self.rpc.inner()
    }

    pub fn private_key(&self) -> &EvmPrivateKey {
        self.private_key.inner()
    }
}

/// A validated 32-byte EVM private key. Never printed.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EvmPrivateKey(B256);

impl EvmPrivateKey {
    pub fn as_b256(&self) -> &B256 {
        &self.0
    }
}

impl Debug for EvmPrivateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("EvmPrivateKey(<redacted>)")
    }
}

impl FromStr for EvmPrivateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s.trim())
            .map(Self)
            .map_err(|e| format!("Invalid evm private key: {e}"))
    }
}
