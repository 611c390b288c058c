#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EVM wallet provider for ethpay checkouts.
//!
//! [`LocalWallet`] implements [`ethpay_types::wallet::WalletProvider`] over a private key
//! held in process and an HTTP JSON-RPC endpoint. It is what the headless checkout binary
//! pays with; browser integrations bridge the injected wallet into the same trait instead.
//!
//! # Modules
//!
//! - [`config`] - Wallet configuration (RPC endpoint, private key)
//! - [`erc20`] - The subset of the ERC-20 interface a checkout needs
//! - [`wallet`] - The [`LocalWallet`] provider

pub mod config;
pub mod erc20;
pub mod wallet;

pub use config::{EvmPrivateKey, LocalWalletConfig};
pub use wallet::{LocalWallet, LocalWalletError};
