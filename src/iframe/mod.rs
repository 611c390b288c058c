//! Hosted-iframe checkout.
//!
//! Instead of driving a wallet directly, the checkout can embed a hosted payment page in an
//! iframe. The page posts its result back to the parent window; [`IframeMessageChannel`]
//! listens on the parent's [`MessageWindow`], authenticates each message by origin and turns
//! it into an [`IframeOutcome`].
//!
//! - [`url`] - URL and origin of a hosted checkout session
//! - [`window`] - The parent window's message bus, holding at most one listener
//! - [`host`] - Mounting and unmounting of the iframe container
//! - [`channel`] - The session lifecycle and message handling

pub mod channel;
pub mod host;
pub mod url;
pub mod window;

pub use self::channel::{CloseTrigger, IframeMessageChannel, IframeOutcome};
pub use self::host::IframeHost;
pub use self::url::{IframeCheckoutParams, IframeSettings};
pub use self::window::{DispatchOutcome, InboundMessage, MessageWindow};

#[derive(Debug, thiserror::Error)]
pub enum IframeError {
    #[error("Hosted checkout is not configured: set `iframe.pay_link` or `iframe.base_url`")]
    NotConfigured,
    #[error("Order details do not name a hosted checkout domain")]
    MissingInterfaceDomain,
    #[error("Order details do not carry the USD/ETH exchange rate the hosted checkout needs")]
    MissingExchangeRate,
    #[error("Invalid hosted checkout URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: ::url::ParseError,
    },
    #[error("Hosted checkout URL {0:?} has no origin to authenticate messages against")]
    OpaqueOrigin(String),
    /// The hosted checkout reported transaction `transaction_hash` in a message that cannot
    /// be turned into a proof. `payload` is the message as received.
    #[error(
        "Critical error: payment was sent but details were lost. Please email these details to support: {payload} Error: {reason}"
    )]
    UnreadableTransaction {
        transaction_hash: String,
        payload: String,
        reason: String,
    },
}
