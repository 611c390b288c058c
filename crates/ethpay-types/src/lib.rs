#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for ethpay checkouts.
//!
//! This crate holds the data that flows between a storefront's order backend, a wallet,
//! and a hosted payment iframe during a single checkout attempt. It has no opinion on how
//! those parties are reached: HTTP, wallet RPC and cross-window messaging live in
//! `ethpay-checkout` and the chain crates.
//!
//! # Modules
//!
//! - [`chain`] - EIP-155 chain ids and checksummed addresses
//! - [`config`] - Environment variable resolution for configuration values
//! - [`details`] - Order payment parameters served by the backend
//! - [`iframe`] - Typed events posted by the hosted payment iframe
//! - [`proof`] - Proof of payment and its backend submission form
//! - [`wallet`] - The contract a wallet provider must fulfil
//! - [`util`] - Serde helpers

pub mod chain;
pub mod config;
pub mod details;
pub mod iframe;
pub mod proof;
pub mod util;
pub mod wallet;
