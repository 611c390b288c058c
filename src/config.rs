//! Configuration of the checkout binary.
//!
//! ```json
//! {
//!   "transaction_details_url": "https://shop.example/order/ABC123/transaction_details/",
//!   "mode": "wallet",
//!   "csrf_token": "$CHECKOUT_CSRF_TOKEN",
//!   "request_timeout_secs": 30,
//!   "pending_store": "pending-submissions.json",
//!   "wallet": {
//!     "rpc": "$CHECKOUT_RPC_URL",
//!     "private_key": "$CHECKOUT_PRIVATE_KEY"
//!   },
//!   "iframe": {
//!     "pay_link": "#/pay?c=CAESFAKY9DyfOhjyGFXhFQ8MYSKlcMAh",
//!     "parent_window_origin": "https://shop.example"
//!   }
//! }
//! ```

use clap::{Parser, Subcommand};
use ethpay_eip155::LocalWalletConfig;
use ethpay_types::config::LiteralOrEnv;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::iframe::IframeSettings;

#[derive(Parser, Debug)]
#[command(name = "ethpay-checkout")]
#[command(about = "Pay an order with a crypto wallet and deliver the proof to its backend")]
pub struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = "checkout.json")]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Pay the configured order (default)
    Pay,
    /// List proofs the backend has not acknowledged
    Pending,
    /// Submit every unacknowledged proof once more
    Resubmit,
    /// Forget an unacknowledged proof
    Discard {
        /// Transaction hash of the proof to drop
        transaction_hash: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    #[default]
    Wallet,
    Iframe,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    transaction_details_url: LiteralOrEnv<Url>,
    #[serde(default)]
    mode: PaymentMode,
    #[serde(default)]
    csrf_token: Option<LiteralOrEnv<String>>,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
    #[serde(default = "config_defaults::default_pending_store")]
    pending_store: PathBuf,
    #[serde(default)]
    wallet: Option<LocalWalletConfig>,
    #[serde(default)]
    iframe: Option<IframeSettings>,
}

mod config_defaults {
    use std::path::PathBuf;

    pub const DEFAULT_PENDING_STORE: &str = "pending-submissions.json";

    pub fn default_pending_store() -> PathBuf {
        PathBuf::from(DEFAULT_PENDING_STORE)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("Payment mode `{mode}` needs a `{section}` section in the config file")]
    MissingSection {
        mode: &'static str,
        section: &'static str,
    },
}

impl Config {
    pub fn transaction_details_url(&self) -> &Url {
        self.transaction_details_url.inner()
    }

    pub fn mode(&self) -> PaymentMode {
        self.mode
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_ref().map(|token| token.inner().as_str())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn pending_store(&self) -> &Path {
        &self.pending_store
    }

    pub fn wallet(&self) -> Result<&LocalWalletConfig, ConfigError> {
        self.wallet.as_ref().ok_or(ConfigError::MissingSection {
            mode: "wallet",
            section: "wallet",
        })
    }

    pub fn iframe(&self) -> Result<&IframeSettings, ConfigError> {
        self.iframe.as_ref().ok_or(ConfigError::MissingSection {
            mode: "iframe",
            section: "iframe",
        })
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_config_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"transaction_details_url": "https://shop.example/o/1/details/"}"#,
        )
        .unwrap();
        assert_eq!(config.mode(), PaymentMode::Wallet);
        assert_eq!(config.pending_store(), Path::new("pending-submissions.json"));
        assert!(config.csrf_token().is_none());
        assert!(config.request_timeout().is_none());
        assert!(matches!(
            config.wallet(),
            Err(ConfigError::MissingSection { section: "wallet", .. })
        ));
    }

    #[test]
    fn test_iframe_config_with_env_secret() {
        unsafe {
            std::env::set_var("ETHPAY_TEST_CSRF_TOKEN", "csrf-from-env");
        }
        let config: Config = serde_json::from_str(
            r##"{
                "transaction_details_url": "https://shop.example/o/1/details/",
                "mode": "iframe",
                "csrf_token": "$ETHPAY_TEST_CSRF_TOKEN",
                "request_timeout_secs": 15,
                "iframe": {
                    "pay_link": "#/pay?c=abc",
                    "verify_eip1271_signature": false
                }
            }"##,
        )
        .unwrap();
        assert_eq!(config.mode(), PaymentMode::Iframe);
        assert_eq!(config.csrf_token(), Some("csrf-from-env"));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
        let iframe = config.iframe().unwrap();
        assert_eq!(iframe.pay_link.as_deref(), Some("#/pay?c=abc"));
        assert!(iframe.authenticate_sender_address);
        assert!(!iframe.verify_eip1271_signature);
        assert!(iframe.require_native_token_transfer_proxy);
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"transaction_details_url": "https://shop.example/o/1/details/", "pending_store": "/var/lib/ethpay/pending.json"}}"#
        )
        .unwrap();
        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(
            config.transaction_details_url().as_str(),
            "https://shop.example/o/1/details/"
        );
        assert_eq!(config.pending_store(), Path::new("/var/lib/ethpay/pending.json"));

        let missing = Config::load_from_path(Path::new("/nonexistent/checkout.json"));
        assert!(matches!(missing, Err(ConfigError::FileRead(..))));
    }

    #[test]
    fn test_cli_subcommands() {
        let args = CliArgs::parse_from(["ethpay-checkout", "-c", "shop.json", "discard", "0xabc"]);
        assert_eq!(args.config, PathBuf::from("shop.json"));
        assert_eq!(
            args.command,
            Some(Command::Discard {
                transaction_hash: "0xabc".to_string()
            })
        );
        let args = CliArgs::parse_from(["ethpay-checkout", "--config", "shop.json"]);
        assert_eq!(args.command, None);
    }
}
