use ethpay_types::iframe::{IframeDecodeError, IframeEvent};
use ethpay_types::proof::TransactionProof;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::mpsc;

use crate::iframe::IframeError;
use crate::iframe::host::IframeHost;
use crate::iframe::url::IframeCheckoutParams;
use crate::iframe::window::{DispatchOutcome, InboundMessage, ListenerId, MessageHandler, MessageWindow};

pub const IFRAME_CONTAINER_ID: &str = "ethpay-checkout-iframe";

/// Why a hosted checkout session ended without a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTrigger {
    CloseControl,
    BackdropClick,
    EscapeKey,
    /// The hosted page asked to be closed.
    IframeRequest,
    /// A new session was opened in its place.
    Replaced,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IframeOutcome {
    TransactionSigned(Box<TransactionProof>),
    /// A transaction was reported in a message that does not make a proof.
    Unreadable {
        transaction_hash: String,
        payload: String,
        reason: String,
    },
    Closed(CloseTrigger),
}

/// A mounted hosted checkout, held in the [`MessageWindow`] slot next to its listener.
///
/// Whoever takes it out of the slot ends it, so a session replaced by another channel is
/// torn down exactly once.
pub struct IframeSession {
    container_id: String,
    outcomes: mpsc::UnboundedSender<IframeOutcome>,
}

impl IframeSession {
    fn end(self, host: &dyn IframeHost, trigger: CloseTrigger) {
        host.unmount(&self.container_id);
        tracing::info!(?trigger, "Hosted checkout session closed");
        // The receiver may already be gone once a payment was signed.
        let _ = self.outcomes.send(IframeOutcome::Closed(trigger));
    }
}

/// Lifecycle of the hosted checkout iframe and of the message listener attached to it.
///
/// The session lives in the shared [`MessageWindow`] slot, so there is at most one per
/// window no matter how many channels use it. [`open`](Self::open) replaces whatever session
/// holds the slot; a channel whose session was replaced is no longer open and its
/// [`close`](Self::close) leaves the newer session alone.
///
/// Lock order is channel, then window slot; the window never holds its slot while a
/// handler runs.
#[derive(Clone)]
pub struct IframeMessageChannel {
    window: Arc<MessageWindow>,
    host: Arc<dyn IframeHost>,
    listener: Arc<Mutex<Option<ListenerId>>>,
}

impl IframeMessageChannel {
    pub fn new(window: Arc<MessageWindow>, host: Arc<dyn IframeHost>) -> Self {
        Self {
            window,
            host,
            listener: Arc::new(Mutex::new(None)),
        }
    }

    fn listener(&self) -> MutexGuard<'_, Option<ListenerId>> {
        self.listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// True while the session this channel opened still holds the window.
    pub fn is_open(&self) -> bool {
        let listener = *self.listener();
        listener.is_some_and(|id| self.window.is_current(id))
    }

    /// Mounts the hosted checkout for `params` and starts listening for its messages.
    pub fn open(
        &self,
        params: &IframeCheckoutParams,
    ) -> Result<mpsc::UnboundedReceiver<IframeOutcome>, IframeError> {
        let origin = params.origin()?;
        let url = params.to_url();
        let (outcomes, receiver) = mpsc::unbounded_channel();

        let mut listener = self.listener();
        let (id, replaced) = self.window.install(|id| {
            let handler = message_handler(
                id,
                origin.clone(),
                Arc::downgrade(&self.window),
                Arc::clone(&self.host),
            );
            let session = IframeSession {
                container_id: IFRAME_CONTAINER_ID.to_string(),
                outcomes,
            };
            (handler, session)
        });
        if let Some(previous) = replaced {
            previous.end(self.host.as_ref(), CloseTrigger::Replaced);
        }
        self.host.mount(IFRAME_CONTAINER_ID, &url);
        *listener = Some(id);
        tracing::info!(%origin, "Hosted checkout session opened");
        Ok(receiver)
    }

    /// Closes the session this channel opened; returns `false` when it is not open.
    pub fn close(&self, trigger: CloseTrigger) -> bool {
        let Some(id) = self.listener().take() else {
            return false;
        };
        match self.window.remove(id) {
            Some(session) => {
                session.end(self.host.as_ref(), trigger);
                true
            }
            None => false,
        }
    }

    pub fn on_key_down(&self, key: &str) -> bool {
        key == "Escape" && self.close(CloseTrigger::EscapeKey)
    }

    /// A click that landed on the backdrop itself, not on the iframe, closes the session.
    pub fn on_backdrop_click(&self, target_is_backdrop: bool) -> bool {
        target_is_backdrop && self.close(CloseTrigger::BackdropClick)
    }
}

/// Hands `outcome` to the session and stops listening; the iframe stays mounted.
fn deliver(window: &MessageWindow, id: ListenerId, outcome: IframeOutcome) -> DispatchOutcome {
    match window.detach(id, |session| session.outcomes.send(outcome)) {
        None => DispatchOutcome::Ignored,
        Some(Err(_)) => {
            tracing::warn!("Hosted checkout result arrived after the payment attempt ended");
            DispatchOutcome::Handled
        }
        Some(Ok(())) => DispatchOutcome::Handled,
    }
}

fn message_handler(
    id: ListenerId,
    origin: String,
    window: Weak<MessageWindow>,
    host: Arc<dyn IframeHost>,
) -> MessageHandler {
    Arc::new(move |message: &InboundMessage| {
        if message.origin != origin {
            tracing::warn!(
                expected = %origin,
                received = %message.origin,
                "Ignoring message from untrusted origin"
            );
            return DispatchOutcome::UntrustedOrigin;
        }
        let Some(window) = window.upgrade() else {
            return DispatchOutcome::Ignored;
        };
        let event = match IframeEvent::decode(&message.data) {
            Ok(event) => event,
            Err(IframeDecodeError::UnreadableTransaction {
                transaction_hash,
                source,
            }) => {
                tracing::error!(
                    %transaction_hash,
                    error = %source,
                    "Hosted checkout reported a transaction that cannot be read"
                );
                let outcome = IframeOutcome::Unreadable {
                    transaction_hash,
                    payload: message.data.clone(),
                    reason: source.to_string(),
                };
                return deliver(&window, id, outcome);
            }
            Err(error) => {
                tracing::error!(%error, "Unrecognized message from hosted checkout");
                return DispatchOutcome::Malformed;
            }
        };
        match event {
            IframeEvent::TransactionSigned(signed) => {
                let proof = TransactionProof::from(*signed);
                tracing::info!(
                    transaction_hash = %proof.transaction_hash,
                    "Hosted checkout reported a signed transaction"
                );
                deliver(&window, id, IframeOutcome::TransactionSigned(Box::new(proof)))
            }
            IframeEvent::CloseIframe => match window.remove(id) {
                Some(session) => {
                    tracing::info!("Hosted checkout asked to be closed");
                    session.end(host.as_ref(), CloseTrigger::IframeRequest);
                    DispatchOutcome::Handled
                }
                None => DispatchOutcome::Ignored,
            },
            IframeEvent::Checkout => DispatchOutcome::Ignored,
            IframeEvent::Unknown(kind) => {
                tracing::error!(%kind, "Unknown message kind from hosted checkout");
                DispatchOutcome::Ignored
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingHost;

    const ORIGIN: &str = "https://pay.example";

    fn params() -> IframeCheckoutParams {
        IframeCheckoutParams {
            base_url: format!("{ORIGIN}/#/pay?c=1"),
            receiver_address: "0x67406f6F75F3Bb2bA0DeDdf2676D3bA6F55C700F".to_string(),
            amount: "25.00".to_string(),
            currency: "USD".to_string(),
            usd_per_eth: "3000".to_string(),
            require_in_iframe_or_error_with: None,
            iframe_parent_window_origin: None,
            authenticate_sender_address: None,
            click_to_close_iframe_label: None,
            require_native_token_transfer_proxy: false,
        }
    }

    fn signed_message() -> String {
        serde_json::json!({
            "kind": "TransactionSigned",
            "caip222StyleSignature": "0xsig",
            "caip222StyleMessageThatWasSigned": {"senderAddress": "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"},
            "transactionHash": "0xfeed",
            "chainId": 10,
            "tokenTicker": "USDC",
            "tokenName": "USD Coin",
            "tokenAmount": "25000000",
            "tokenDecimals": 6
        })
        .to_string()
    }

    fn channel() -> (Arc<MessageWindow>, Arc<RecordingHost>, IframeMessageChannel) {
        let window = Arc::new(MessageWindow::new());
        let host = Arc::new(RecordingHost::default());
        let channel = IframeMessageChannel::new(window.clone(), host.clone());
        (window, host, channel)
    }

    #[tokio::test]
    async fn test_transaction_signed_delivers_proof() {
        let (window, host, channel) = channel();
        let mut outcomes = channel.open(&params()).unwrap();
        assert_eq!(host.mounted().len(), 1);
        assert!(host.mounted()[0].1.contains("&amount=25.00"));

        let outcome = window.dispatch(&InboundMessage::new(ORIGIN, signed_message()));
        assert_eq!(outcome, DispatchOutcome::Handled);
        assert_eq!(window.listener_count(), 0);

        let Some(IframeOutcome::TransactionSigned(proof)) = outcomes.recv().await else {
            panic!("expected a signed transaction");
        };
        assert_eq!(proof.transaction_hash, "0xfeed");
        assert_eq!(proof.token.ticker.as_deref(), Some("USDC"));

        assert!(channel.is_open());
        assert!(host.unmounted().is_empty());
        assert_eq!(
            window.dispatch(&InboundMessage::new(ORIGIN, signed_message())),
            DispatchOutcome::NoListener
        );
        assert!(channel.close(CloseTrigger::CloseControl));
        assert_eq!(host.unmounted(), vec![IFRAME_CONTAINER_ID.to_string()]);
    }

    fn signed_without(keys: &[&str]) -> String {
        let mut value: serde_json::Value = serde_json::from_str(&signed_message()).unwrap();
        let object = value.as_object_mut().unwrap();
        for key in keys {
            object.remove(*key);
        }
        value.to_string()
    }

    #[tokio::test]
    async fn test_partial_transaction_signed_still_delivers_proof() {
        let (window, _host, channel) = channel();

        let mut outcomes = channel.open(&params()).unwrap();
        let outcome = window.dispatch(&InboundMessage::new(ORIGIN, signed_without(&["tokenName"])));
        assert_eq!(outcome, DispatchOutcome::Handled);
        let Some(IframeOutcome::TransactionSigned(proof)) = outcomes.recv().await else {
            panic!("expected a signed transaction");
        };
        assert_eq!(proof.token.name, None);
        assert_eq!(proof.token.ticker.as_deref(), Some("USDC"));

        let mut outcomes = channel.open(&params()).unwrap();
        let unauthenticated = signed_without(&[
            "caip222StyleSignature",
            "caip222StyleMessageThatWasSigned",
        ]);
        let outcome = window.dispatch(&InboundMessage::new(ORIGIN, unauthenticated));
        assert_eq!(outcome, DispatchOutcome::Handled);
        let Some(IframeOutcome::TransactionSigned(proof)) = outcomes.recv().await else {
            panic!("expected a signed transaction");
        };
        assert_eq!(proof.transaction_hash, "0xfeed");
        assert_eq!(proof.sender_address, None);
        assert_eq!(proof.signature, None);
    }

    #[tokio::test]
    async fn test_unreadable_transaction_is_surfaced_with_payload() {
        let (window, _host, channel) = channel();
        let mut outcomes = channel.open(&params()).unwrap();

        let data = signed_message().replace("\"chainId\":10", "\"chainId\":\"optimism\"");
        let outcome = window.dispatch(&InboundMessage::new(ORIGIN, data.clone()));
        assert_eq!(outcome, DispatchOutcome::Handled);
        assert_eq!(window.listener_count(), 0);

        let Some(IframeOutcome::Unreadable {
            transaction_hash,
            payload,
            ..
        }) = outcomes.recv().await
        else {
            panic!("expected an unreadable transaction");
        };
        assert_eq!(transaction_hash, "0xfeed");
        assert_eq!(payload, data);
    }

    #[tokio::test]
    async fn test_foreign_origin_is_ignored() {
        let (window, _host, channel) = channel();
        let mut outcomes = channel.open(&params()).unwrap();

        let outcome = window.dispatch(&InboundMessage::new("https://evil.example", signed_message()));
        assert_eq!(outcome, DispatchOutcome::UntrustedOrigin);
        let outcome = window.dispatch(&InboundMessage::new(
            "https://evil.example",
            r#"{"kind":"CloseIframe"}"#,
        ));
        assert_eq!(outcome, DispatchOutcome::UntrustedOrigin);

        assert_eq!(window.listener_count(), 1);
        assert!(channel.is_open());
        assert!(outcomes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_iframe_request_tears_down_session() {
        let (window, host, channel) = channel();
        let mut outcomes = channel.open(&params()).unwrap();

        let outcome = window.dispatch(&InboundMessage::new(ORIGIN, r#"{"kind":"CloseIframe"}"#));
        assert_eq!(outcome, DispatchOutcome::Handled);
        assert_eq!(window.listener_count(), 0);
        assert_eq!(host.unmounted(), vec![IFRAME_CONTAINER_ID.to_string()]);
        assert!(!channel.is_open());
        assert_eq!(
            outcomes.recv().await,
            Some(IframeOutcome::Closed(CloseTrigger::IframeRequest))
        );

        let later = window.dispatch(&InboundMessage::new(ORIGIN, signed_message()));
        assert_eq!(later, DispatchOutcome::NoListener);
    }

    #[tokio::test]
    async fn test_checkout_and_unknown_kinds_keep_channel_open() {
        let (window, _host, channel) = channel();
        let _outcomes = channel.open(&params()).unwrap();
        assert_eq!(
            window.dispatch(&InboundMessage::new(ORIGIN, r#"{"kind":"Checkout"}"#)),
            DispatchOutcome::Ignored
        );
        assert_eq!(
            window.dispatch(&InboundMessage::new(ORIGIN, r#"{"kind":"Resize"}"#)),
            DispatchOutcome::Ignored
        );
        assert_eq!(
            window.dispatch(&InboundMessage::new(ORIGIN, "not json")),
            DispatchOutcome::Malformed
        );
        assert_eq!(window.listener_count(), 1);
        assert!(channel.is_open());
    }

    #[tokio::test]
    async fn test_reopen_replaces_previous_session() {
        let (window, host, channel) = channel();
        let mut first = channel.open(&params()).unwrap();
        let _second = channel.open(&params()).unwrap();

        assert_eq!(window.listener_count(), 1);
        assert_eq!(host.mounted().len(), 2);
        assert_eq!(host.unmounted().len(), 1);
        assert_eq!(
            first.recv().await,
            Some(IframeOutcome::Closed(CloseTrigger::Replaced))
        );
    }

    #[tokio::test]
    async fn test_two_channels_share_one_listener() {
        let window = Arc::new(MessageWindow::new());
        let host = Arc::new(RecordingHost::default());
        let first = IframeMessageChannel::new(window.clone(), host.clone());
        let second = IframeMessageChannel::new(window.clone(), host.clone());

        let mut first_outcomes = first.open(&params()).unwrap();
        let mut second_outcomes = second.open(&params()).unwrap();
        assert_eq!(window.listener_count(), 1);

        assert!(!first.is_open());
        assert!(second.is_open());
        assert_eq!(
            first_outcomes.recv().await,
            Some(IframeOutcome::Closed(CloseTrigger::Replaced))
        );

        let unmounted_before = host.unmounted().len();
        assert!(!first.close(CloseTrigger::CloseControl));
        assert_eq!(host.unmounted().len(), unmounted_before);
        assert!(second.is_open());
        assert_eq!(window.listener_count(), 1);

        window.dispatch(&InboundMessage::new(ORIGIN, signed_message()));
        assert!(matches!(
            second_outcomes.recv().await,
            Some(IframeOutcome::TransactionSigned(_))
        ));
        assert!(first_outcomes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_host_close_affordances() {
        let (window, _host, channel) = channel();

        let mut outcomes = channel.open(&params()).unwrap();
        assert!(!channel.on_key_down("Enter"));
        assert!(!channel.on_backdrop_click(false));
        assert!(channel.on_key_down("Escape"));
        assert_eq!(
            outcomes.recv().await,
            Some(IframeOutcome::Closed(CloseTrigger::EscapeKey))
        );
        assert_eq!(window.listener_count(), 0);

        let mut outcomes = channel.open(&params()).unwrap();
        assert!(channel.on_backdrop_click(true));
        assert_eq!(
            outcomes.recv().await,
            Some(IframeOutcome::Closed(CloseTrigger::BackdropClick))
        );

        assert!(!channel.close(CloseTrigger::CloseControl));
    }
}
