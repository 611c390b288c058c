//! In-process doubles for the checkout's seams.

use alloy_primitives::{Address, B256, U256, address};
use async_trait::async_trait;
use ethpay_types::chain::Eip155ChainId;
use ethpay_types::proof::{SignedMessage, SubmissionForm, TokenMetadata, TransactionProof};
use ethpay_types::wallet::{TokenInfo, WalletError, WalletEvent, WalletProvider};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, oneshot};

use crate::iframe::IframeHost;
use crate::orchestrator::PaymentState;
use crate::pending::{ProofSubmitter, SubmitError};
use crate::ui::CheckoutUi;

pub fn sample_proof(transaction_hash: &str) -> TransactionProof {
    TransactionProof {
        sender_address: Some("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".to_string()),
        signature: Some("0xsig".to_string()),
        signed_message: Some(SignedMessage::Text("Sign to pay order ABC".to_string())),
        transaction_hash: transaction_hash.to_string(),
        chain_id: Eip155ChainId::new(10),
        token: TokenMetadata::native_ether("1000"),
        receipt_url: None,
        chain_name: None,
        is_testnet: None,
    }
}

/// A wallet that answers from memory and counts what it was asked.
pub struct ScriptedWallet {
    accounts: Mutex<Vec<Address>>,
    chain_id: Eip155ChainId,
    token_info: Mutex<Option<TokenInfo>>,
    reject_signatures: AtomicBool,
    sign_calls: AtomicUsize,
    sent_values: Mutex<Vec<U256>>,
    switch_requests: Mutex<Vec<Eip155ChainId>>,
    send_gate: Mutex<Option<oneshot::Receiver<()>>>,
    next_hash: AtomicU8,
    events: broadcast::Sender<WalletEvent>,
}

impl ScriptedWallet {
    pub const ALICE: Address = address!("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
    pub const BOB: Address = address!("1111111111111111111111111111111111111111");

    pub fn new(chain_id: u64) -> Arc<Self> {
        let (events, _) = broadcast::channel(8);
        Arc::new(Self {
            accounts: Mutex::new(vec![Self::ALICE]),
            chain_id: Eip155ChainId::new(chain_id),
            token_info: Mutex::new(None),
            reject_signatures: AtomicBool::new(false),
            sign_calls: AtomicUsize::new(0),
            sent_values: Mutex::new(Vec::new()),
            switch_requests: Mutex::new(Vec::new()),
            send_gate: Mutex::new(None),
            next_hash: AtomicU8::new(1),
            events,
        })
    }

    /// Hash of the `n`-th transaction this wallet sends.
    pub fn hash(n: u8) -> B256 {
        B256::with_last_byte(n)
    }

    pub fn signature_of(&self, address: Address) -> String {
        format!("0x5160{}", hex_tail(address))
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        *self.accounts.lock().unwrap() = accounts;
    }

    pub fn set_token_info(&self, info: TokenInfo) {
        *self.token_info.lock().unwrap() = Some(info);
    }

    pub fn reject_signatures(&self, reject: bool) {
        self.reject_signatures.store(reject, Ordering::SeqCst);
    }

    /// Holds the next send until the returned sender fires.
    pub fn gate_next_send(&self) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        *self.send_gate.lock().unwrap() = Some(gate);
        release
    }

    pub fn emit(&self, event: WalletEvent) {
        let _ = self.events.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> usize {
        self.sent_values.lock().unwrap().len()
    }

    pub fn sent_values(&self) -> Vec<U256> {
        self.sent_values.lock().unwrap().clone()
    }

    pub fn switch_requests(&self) -> Vec<Eip155ChainId> {
        self.switch_requests.lock().unwrap().clone()
    }

    async fn send(&self, value: U256) -> Result<B256, WalletError> {
        let hash = Self::hash(self.next_hash.fetch_add(1, Ordering::SeqCst));
        self.sent_values.lock().unwrap().push(value);
        let gate = self.send_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(hash)
    }
}

fn hex_tail(address: Address) -> String {
    address.to_string().trim_start_matches("0x").to_lowercase()
}

#[async_trait]
impl WalletProvider for ScriptedWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn chain_id(&self) -> Result<Eip155ChainId, WalletError> {
        Ok(self.chain_id)
    }

    async fn switch_chain(&self, chain_id: Eip155ChainId) -> Result<(), WalletError> {
        self.switch_requests.lock().unwrap().push(chain_id);
        Err(WalletError::Rpc("switch not supported".to_string()))
    }

    async fn personal_sign(&self, _message: &str, address: Address) -> Result<String, WalletError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_signatures.load(Ordering::SeqCst) {
            return Err(WalletError::SignatureRejected("user denied".to_string()));
        }
        Ok(self.signature_of(address))
    }

    async fn send_native_transfer(
        &self,
        _from: Address,
        _to: Address,
        value: U256,
    ) -> Result<B256, WalletError> {
        self.send(value).await
    }

    async fn send_token_transfer(
        &self,
        _from: Address,
        _contract: Address,
        _to: Address,
        amount: U256,
    ) -> Result<B256, WalletError> {
        self.send(amount).await
    }

    async fn token_info(&self, _contract: Address) -> Result<TokenInfo, WalletError> {
        self.token_info
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| WalletError::Rpc("not a token".to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
pub struct RecordingHost {
    mounted: Mutex<Vec<(String, String)>>,
    unmounted: Mutex<Vec<String>>,
}

impl RecordingHost {
    pub fn mounted(&self) -> Vec<(String, String)> {
        self.mounted.lock().unwrap().clone()
    }

    pub fn unmounted(&self) -> Vec<String> {
        self.unmounted.lock().unwrap().clone()
    }
}

impl IframeHost for RecordingHost {
    fn mount(&self, container_id: &str, url: &str) {
        self.mounted
            .lock()
            .unwrap()
            .push((container_id.to_string(), url.to_string()));
    }

    fn unmount(&self, container_id: &str) {
        self.unmounted.lock().unwrap().push(container_id.to_string());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Reset,
    Info(String),
    Error(String),
    State(PaymentState),
}

#[derive(Default)]
pub struct RecordingUi {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingUi {
    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&UiEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| predicate(e)).count()
    }

    pub fn states(&self) -> Vec<PaymentState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::State(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn infos(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Info(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl CheckoutUi for RecordingUi {
    fn reset_message(&self) {
        self.events.lock().unwrap().push(UiEvent::Reset);
    }

    fn show_info(&self, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(UiEvent::Info(message.to_string()));
    }

    fn show_error(&self, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(UiEvent::Error(message.to_string()));
    }

    fn state_changed(&self, state: &PaymentState) {
        self.events
            .lock()
            .unwrap()
            .push(UiEvent::State(state.clone()));
    }
}

/// A submitter whose verdict can be flipped between calls.
pub struct ScriptedSubmitter {
    accept: AtomicBool,
    submitted: Mutex<Vec<String>>,
}

impl ScriptedSubmitter {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            accept: AtomicBool::new(true),
            submitted: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        let submitter = Self::accepting();
        submitter.accept_all(false);
        submitter
    }

    pub fn accept_all(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProofSubmitter for ScriptedSubmitter {
    async fn submit(&self, form: &SubmissionForm) -> Result<(), SubmitError> {
        self.submitted
            .lock()
            .unwrap()
            .push(form.transaction_hash.clone());
        if self.accept.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SubmitError::HttpStatus {
                status: http::StatusCode::INTERNAL_SERVER_ERROR,
                body: "scripted failure".to_string(),
            })
        }
    }
}
