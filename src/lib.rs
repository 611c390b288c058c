//! Client-side crypto checkout for an order backend.
//!
//! A buyer pays an order either with a connected wallet or through a hosted checkout page
//! embedded in an iframe. Either way the result is a [`TransactionProof`](ethpay_types::proof::TransactionProof)
//! that is delivered back to the order's transaction-details endpoint.
//!
//! # Modules
//!
//! - [`details`] - [`PaymentDetailsClient`](details::PaymentDetailsClient), fetches what to pay.
//! - [`wallet`] - [`WalletSession`](wallet::WalletSession), account, chain and signature state.
//! - [`iframe`] - the hosted checkout: URL construction and the
//!   [`IframeMessageChannel`](iframe::IframeMessageChannel) that listens for its messages.
//! - [`pending`] - [`PendingSubmissionBuffer`](pending::PendingSubmissionBuffer), keeps proofs
//!   durable until the backend acknowledges them.
//! - [`orchestrator`] - [`PaymentOrchestrator`](orchestrator::PaymentOrchestrator), the payment
//!   state machine tying the above together.
//! - [`config`], [`telemetry`], [`sig_down`] - the binary's configuration, logging and
//!   shutdown handling.

pub mod config;
pub mod details;
pub mod endpoint;
pub mod error;
pub mod iframe;
pub mod orchestrator;
pub mod pending;
pub mod sig_down;
pub mod telemetry;
pub mod ui;
pub mod wallet;

#[cfg(test)]
mod test_support;

pub use error::CheckoutError;
pub use orchestrator::{PaymentOrchestrator, PaymentRoute, PaymentState};
