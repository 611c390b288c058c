use ethpay_types::proof::TransactionProof;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::pending::store::{PendingSubmission, StoreError, SubmissionStore};
use crate::pending::submitter::{ProofSubmitter, SubmitError};

/// A proof that was paid for on chain but could not be handed to the backend.
///
/// The message embeds the submission payload verbatim so the buyer can forward it.
#[derive(Debug, thiserror::Error)]
#[error(
    "Critical error: payment was sent but details were lost. Please email these details to support: {payload} Error: {source}"
)]
pub struct SubmissionLost {
    pub transaction_hash: String,
    pub payload: String,
    #[source]
    pub source: SubmitError,
}

/// Result of [`PendingSubmissionBuffer::resubmit_pending`].
#[derive(Debug, Default)]
pub struct ResubmitReport {
    pub acknowledged: Vec<String>,
    pub failed: Vec<SubmissionLost>,
}

/// Keeps every proof durable until the backend acknowledges it.
///
/// A proof is written to the store before the first submission attempt and removed only on
/// a 2xx answer, so a crash or a failed request never loses evidence of a payment. Failed
/// entries stay until an operator resubmits or discards them; nothing retries in the
/// background.
pub struct PendingSubmissionBuffer {
    store: Arc<dyn SubmissionStore>,
    submitter: Arc<dyn ProofSubmitter>,
    entries: Mutex<Vec<PendingSubmission>>,
}

impl PendingSubmissionBuffer {
    /// Loads whatever the store already holds.
    pub fn open(
        store: Arc<dyn SubmissionStore>,
        submitter: Arc<dyn ProofSubmitter>,
    ) -> Result<Self, StoreError> {
        let entries = store.load()?;
        if !entries.is_empty() {
            tracing::warn!(count = entries.len(), "Unacknowledged payment proofs on record");
        }
        Ok(Self {
            store,
            submitter,
            entries: Mutex::new(entries),
        })
    }

    fn entries(&self) -> MutexGuard<'_, Vec<PendingSubmission>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Writes the current set through to the store. The in-memory copy stays authoritative
    /// when the write fails.
    fn persist(&self, entries: &[PendingSubmission]) {
        if let Err(error) = self.store.save(entries) {
            tracing::error!(%error, "Failed to persist pending payment proofs");
        }
    }

    fn upsert(&self, entry: PendingSubmission) -> PendingSubmission {
        let mut entries = self.entries();
        match entries
            .iter_mut()
            .find(|e| e.transaction_hash() == entry.transaction_hash())
        {
            Some(existing) => existing.proof = entry.proof.clone(),
            None => entries.push(entry.clone()),
        }
        self.persist(&entries);
        entry
    }

    /// Records `proof` durably, keyed by transaction hash.
    pub fn enqueue(&self, proof: TransactionProof) -> PendingSubmission {
        self.upsert(PendingSubmission::new(proof))
    }

    /// Records `proof` without submitting it.
    pub fn park(&self, proof: TransactionProof, reason: &str) -> PendingSubmission {
        tracing::warn!(
            transaction_hash = %proof.transaction_hash,
            reason,
            "Parking payment proof for manual resubmission"
        );
        let mut entry = PendingSubmission::new(proof);
        entry.parked_reason = Some(reason.to_string());
        let mut entries = self.entries();
        match entries
            .iter_mut()
            .find(|e| e.transaction_hash() == entry.transaction_hash())
        {
            Some(existing) => existing.parked_reason = entry.parked_reason.clone(),
            None => entries.push(entry.clone()),
        }
        self.persist(&entries);
        entry
    }

    /// Records `proof` and makes one submission attempt.
    pub async fn deliver(&self, proof: TransactionProof) -> Result<(), SubmissionLost> {
        let entry = self.enqueue(proof);
        self.attempt(entry).await
    }

    async fn attempt(&self, entry: PendingSubmission) -> Result<(), SubmissionLost> {
        let form = entry.proof.to_form();
        let transaction_hash = entry.transaction_hash().to_string();
        match self.submitter.submit(&form).await {
            Ok(()) => {
                let mut entries = self.entries();
                entries.retain(|e| e.transaction_hash() != transaction_hash);
                self.persist(&entries);
                tracing::info!(%transaction_hash, "Payment proof acknowledged");
                Ok(())
            }
            Err(source) => {
                {
                    let mut entries = self.entries();
                    if let Some(existing) = entries
                        .iter_mut()
                        .find(|e| e.transaction_hash() == transaction_hash)
                    {
                        existing.attempt_count += 1;
                        existing.last_error = Some(source.to_string());
                    }
                    self.persist(&entries);
                }
                let lost = SubmissionLost {
                    transaction_hash,
                    payload: form.to_json(),
                    source,
                };
                tracing::error!(
                    transaction_hash = %lost.transaction_hash,
                    error = %lost.source,
                    "Payment proof was not accepted"
                );
                Err(lost)
            }
        }
    }

    pub fn pending(&self) -> Vec<PendingSubmission> {
        self.entries().clone()
    }

    /// One attempt per stored entry, in the order they were recorded.
    pub async fn resubmit_pending(&self) -> ResubmitReport {
        let mut report = ResubmitReport::default();
        for entry in self.pending() {
            let transaction_hash = entry.transaction_hash().to_string();
            match self.attempt(entry).await {
                Ok(()) => report.acknowledged.push(transaction_hash),
                Err(lost) => report.failed.push(lost),
            }
        }
        report
    }

    /// Drops an entry without submitting it.
    pub fn discard(&self, transaction_hash: &str) -> Option<PendingSubmission> {
        let mut entries = self.entries();
        let index = entries
            .iter()
            .position(|e| e.transaction_hash() == transaction_hash)?;
        let removed = entries.remove(index);
        self.persist(&entries);
        tracing::info!(transaction_hash, "Discarded pending payment proof");
        Some(removed)
    }
}
