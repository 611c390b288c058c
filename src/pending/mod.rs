//! Delivery of payment proofs to the order backend.
//!
//! - [`store`] - Durable storage of unacknowledged proofs
//! - [`submitter`] - The HTTP form submission
//! - [`buffer`] - Store-then-submit delivery and operator resubmission

pub mod buffer;
pub mod store;
pub mod submitter;

pub use buffer::{PendingSubmissionBuffer, ResubmitReport, SubmissionLost};
pub use store::{
    FileSubmissionStore, MemorySubmissionStore, PendingSubmission, StoreError, SubmissionStore,
};
pub use submitter::{HttpProofSubmitter, ProofSubmitter, SubmitError};
