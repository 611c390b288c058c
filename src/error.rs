use crate::details::DetailsClientError;
use crate::iframe::IframeError;
use crate::pending::SubmissionLost;
use crate::wallet::WalletSessionError;

/// Everything that can end a payment attempt.
///
/// The `Display` text of each variant is what the buyer sees.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Details(#[from] DetailsClientError),
    #[error(transparent)]
    Wallet(#[from] WalletSessionError),
    #[error(transparent)]
    Iframe(#[from] IframeError),
    #[error(transparent)]
    SubmissionLost(#[from] SubmissionLost),
    /// A newer attempt started; never shown.
    #[error("Payment attempt was superseded by a newer one")]
    Superseded,
}
