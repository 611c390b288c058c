//! The payment state machine.
//!
//! [`PaymentOrchestrator`] drives one order from "fetch details" to "proof acknowledged",
//! either through a connected wallet ([`PaymentRoute::DirectWallet`]) or through the hosted
//! checkout iframe ([`PaymentRoute::HostedIframe`]).
//!
//! Every call to [`PaymentOrchestrator::start`] begins a new attempt and supersedes the one
//! before it. Attempts carry a generation number; after each suspension point an attempt
//! checks that its generation is still current and stops if it is not. A superseded attempt
//! never changes the published state or the UI. If it had already sent a transaction, its
//! proof is parked in the [`PendingSubmissionBuffer`] rather than dropped.

use ethpay_types::details::PaymentDetails;
use ethpay_types::proof::{SignedMessage, TokenMetadata, TransactionProof};
use ethpay_types::wallet::WalletEvent;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::details::PaymentDetailsClient;
use crate::error::CheckoutError;
use crate::iframe::{CloseTrigger, IframeError, IframeMessageChannel, IframeOutcome, IframeSettings};
use crate::pending::PendingSubmissionBuffer;
use crate::ui::{ALREADY_PAID_MESSAGE, CheckoutUi};
use crate::wallet::{WalletSession, token_base_units};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentState {
    Idle,
    FetchingDetails,
    AlreadyPaid,
    AwaitingSignature,
    AwaitingIframePayment,
    Signing,
    AwaitingTransaction,
    SubmittingProof,
    Done,
    Error(String),
}

impl PaymentState {
    /// States an attempt does not leave on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentState::AlreadyPaid | PaymentState::Done | PaymentState::Error(_)
        )
    }
}

impl Display for PaymentState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PaymentState::Idle => "idle",
            PaymentState::FetchingDetails => "fetching_details",
            PaymentState::AlreadyPaid => "already_paid",
            PaymentState::AwaitingSignature => "awaiting_signature",
            PaymentState::AwaitingIframePayment => "awaiting_iframe_payment",
            PaymentState::Signing => "signing",
            PaymentState::AwaitingTransaction => "awaiting_transaction",
            PaymentState::SubmittingProof => "submitting_proof",
            PaymentState::Done => "done",
            PaymentState::Error(_) => "error",
        };
        f.write_str(name)
    }
}

/// How the buyer pays.
pub enum PaymentRoute {
    DirectWallet(WalletSession),
    HostedIframe {
        channel: IframeMessageChannel,
        settings: IframeSettings,
    },
}

struct Inner {
    details: PaymentDetailsClient,
    route: PaymentRoute,
    buffer: Arc<PendingSubmissionBuffer>,
    ui: Arc<dyn CheckoutUi>,
    /// Generation of the current attempt. Held while publishing so that a newer attempt
    /// cannot start between the check and the update.
    generation: Mutex<u64>,
    state: watch::Sender<PaymentState>,
}

#[derive(Clone)]
pub struct PaymentOrchestrator {
    inner: Arc<Inner>,
}

impl PaymentOrchestrator {
    pub fn new(
        details: PaymentDetailsClient,
        route: PaymentRoute,
        buffer: Arc<PendingSubmissionBuffer>,
        ui: Arc<dyn CheckoutUi>,
    ) -> Self {
        let (state, _) = watch::channel(PaymentState::Idle);
        Self {
            inner: Arc::new(Inner {
                details,
                route,
                buffer,
                ui,
                generation: Mutex::new(0),
                state,
            }),
        }
    }

    pub fn state(&self) -> PaymentState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PaymentState> {
        self.inner.state.subscribe()
    }

    pub fn buffer(&self) -> &Arc<PendingSubmissionBuffer> {
        &self.inner.buffer
    }

    /// Starts a new attempt, superseding any attempt in flight.
    pub fn start(&self) -> JoinHandle<()> {
        let generation = self.inner.advance();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.attempt(generation).await })
    }

    /// Account, chain and network changes invalidate the attempt in flight.
    pub fn handle_wallet_event(&self, event: &WalletEvent) -> JoinHandle<()> {
        tracing::info!(event = event.name(), "Wallet context changed, restarting payment");
        if let PaymentRoute::DirectWallet(session) = &self.inner.route {
            session.apply_event(event);
        }
        self.start()
    }

    /// Runs the checkout until `cancel` fires: starts the first attempt, then restarts on
    /// every wallet event. In-flight attempts are superseded on the way out.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut events = match &self.inner.route {
            PaymentRoute::DirectWallet(session) => Some(session.events()),
            PaymentRoute::HostedIframe { .. } => None,
        };
        self.start();
        loop {
            let received = match events.as_mut() {
                Some(events) => tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = events.recv() => received,
                },
                None => {
                    cancel.cancelled().await;
                    break;
                }
            };
            match received {
                Ok(event) => {
                    self.handle_wallet_event(&event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Missed wallet events, restarting payment");
                    self.start();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("Wallet event stream ended");
                    events = None;
                }
            }
        }
        self.shutdown();
    }

    /// Supersedes the attempt in flight and closes the iframe, if any.
    pub fn shutdown(&self) {
        self.inner.advance();
        if let PaymentRoute::HostedIframe { channel, .. } = &self.inner.route {
            channel.close(CloseTrigger::CloseControl);
        }
    }
}

impl Inner {
    fn generation(&self) -> MutexGuard<'_, u64> {
        self.generation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn advance(&self) -> u64 {
        let mut generation = self.generation();
        *generation += 1;
        *generation
    }

    /// Runs `f` only while `generation` is still the current attempt.
    fn with_current<R>(&self, generation: u64, f: impl FnOnce() -> R) -> Result<R, CheckoutError> {
        let current = self.generation();
        if *current != generation {
            return Err(CheckoutError::Superseded);
        }
        let result = f();
        drop(current);
        Ok(result)
    }

    fn checkpoint(&self, generation: u64) -> Result<(), CheckoutError> {
        self.with_current(generation, || ())
    }

    fn publish(&self, next: PaymentState) {
        tracing::info!(state = %next, "Payment state changed");
        self.ui.state_changed(&next);
        self.state.send_replace(next);
    }

    fn transition(&self, generation: u64, next: PaymentState) -> Result<(), CheckoutError> {
        self.with_current(generation, || self.publish(next))
    }

    async fn attempt(self: Arc<Self>, generation: u64) {
        if self.with_current(generation, || self.ui.reset_message()).is_err() {
            return;
        }
        let result = match &self.route {
            PaymentRoute::DirectWallet(session) => self.pay_with_wallet(generation, session).await,
            PaymentRoute::HostedIframe { channel, settings } => {
                self.pay_with_iframe(generation, channel, settings).await
            }
        };
        match result {
            Ok(()) => {}
            Err(CheckoutError::Superseded) => {
                tracing::debug!(generation, "Payment attempt superseded");
            }
            Err(error) => self.fail(generation, error),
        }
    }

    fn fail(&self, generation: u64, error: CheckoutError) {
        let message = error.to_string();
        let published = self.with_current(generation, || {
            tracing::error!(generation, error = %message, "Payment attempt failed");
            self.ui.show_error(&message);
            self.publish(PaymentState::Error(message.clone()));
        });
        if published.is_err() {
            tracing::debug!(generation, error = %message, "Discarding failure of superseded attempt");
        }
    }

    /// Publishes `AlreadyPaid` when the backend already holds a proof; returns whether it did.
    fn already_paid(&self, generation: u64, details: &PaymentDetails) -> Result<bool, CheckoutError> {
        if !details.is_signature_submitted {
            self.checkpoint(generation)?;
            return Ok(false);
        }
        self.with_current(generation, || {
            self.publish(PaymentState::AlreadyPaid);
            self.ui.show_info(ALREADY_PAID_MESSAGE);
        })?;
        Ok(true)
    }

    async fn pay_with_wallet(
        &self,
        generation: u64,
        session: &WalletSession,
    ) -> Result<(), CheckoutError> {
        self.transition(generation, PaymentState::FetchingDetails)?;
        let (sender, _) = session.active_account_and_chain().await?;
        self.checkpoint(generation)?;
        let details = self.details.fetch(Some(sender)).await?;
        if self.already_paid(generation, &details)? {
            return Ok(());
        }

        self.transition(generation, PaymentState::AwaitingSignature)?;
        session.ensure_chain(details.chain_id);
        self.transition(generation, PaymentState::Signing)?;
        let signature = session.sign_message(&details.message, sender).await?;

        // A requested switch may not have happened; the proof names the chain actually used.
        let (_, chain_id) = session.active_account_and_chain().await?;
        if chain_id != details.chain_id {
            tracing::warn!(
                %chain_id,
                expected = %details.chain_id,
                "Wallet is not on the order's chain, paying on its current chain"
            );
        }
        self.transition(generation, PaymentState::AwaitingTransaction)?;

        let recipient = details.recipient_address.0;
        let (transaction_hash, token) = match &details.erc20_contract_address {
            Some(contract) => {
                let info = session.token_metadata(contract.0).await?;
                self.checkpoint(generation)?;
                let base_units = token_base_units(&details.amount, info.decimals)?;
                let hash = session
                    .send_token_transfer(sender, contract.0, recipient, &details.amount, info.decimals)
                    .await?;
                let token = TokenMetadata {
                    ticker: Some(info.ticker),
                    name: Some(info.name),
                    amount: Some(base_units.to_string()),
                    decimals: Some(info.decimals),
                    contract_address: Some(contract.to_string()),
                    currency: None,
                };
                (hash, token)
            }
            None => {
                let hash = session
                    .send_native_transfer(sender, recipient, &details.amount)
                    .await?;
                (hash, TokenMetadata::native_ether(details.amount.clone()))
            }
        };

        let proof = TransactionProof {
            sender_address: Some(sender.to_checksum(None)),
            signature: Some(signature),
            signed_message: Some(SignedMessage::Text(details.message)),
            transaction_hash: transaction_hash.to_string(),
            chain_id,
            token,
            receipt_url: None,
            chain_name: None,
            is_testnet: None,
        };
        self.submit(generation, proof).await
    }

    async fn pay_with_iframe(
        &self,
        generation: u64,
        channel: &IframeMessageChannel,
        settings: &IframeSettings,
    ) -> Result<(), CheckoutError> {
        self.transition(generation, PaymentState::FetchingDetails)?;
        let details = self.details.fetch(None).await?;
        if self.already_paid(generation, &details)? {
            return Ok(());
        }
        let params = settings.checkout_params(&details)?;
        let mut outcomes = channel.open(&params)?;
        self.transition(generation, PaymentState::AwaitingIframePayment)?;

        match outcomes.recv().await {
            Some(IframeOutcome::TransactionSigned(proof)) => self.submit(generation, *proof).await,
            Some(IframeOutcome::Unreadable {
                transaction_hash,
                payload,
                reason,
            }) => Err(IframeError::UnreadableTransaction {
                transaction_hash,
                payload,
                reason,
            }
            .into()),
            Some(IframeOutcome::Closed(trigger)) => {
                tracing::info!(?trigger, "Hosted checkout closed before payment");
                self.transition(generation, PaymentState::Idle)
            }
            None => self.transition(generation, PaymentState::Idle),
        }
    }

    async fn submit(&self, generation: u64, proof: TransactionProof) -> Result<(), CheckoutError> {
        if self
            .transition(generation, PaymentState::SubmittingProof)
            .is_err()
        {
            self.buffer
                .park(proof, "transaction sent by a superseded payment attempt");
            return Err(CheckoutError::Superseded);
        }
        self.buffer.deliver(proof).await?;
        self.transition(generation, PaymentState::Done)
    }
}
