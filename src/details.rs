//! Client for fetching an order's payment parameters.
//!
//! [`PaymentDetailsClient`] performs `GET <transaction-details-url>?sender_address=<addr>` and
//! decodes the response into [`PaymentDetails`]. It is called at the start of every payment
//! attempt: the backend binds the amount and signature message to the queried sender, so a
//! copy fetched for one account is never reused for another.

use alloy_primitives::Address;
use ethpay_types::details::PaymentDetails;
use http::StatusCode;
use std::time::Duration;

use crate::endpoint::{EndpointUrlError, TransactionDetailsEndpoint};

/// Text shown to the buyer whenever the details endpoint answers with an error status.
pub const FETCH_FAILED_MESSAGE: &str =
    "Failed to fetch order details. If this problem persists, please contact the organizer directly.";

#[derive(Debug, thiserror::Error)]
pub enum DetailsClientError {
    #[error(transparent)]
    UrlParse(#[from] EndpointUrlError),
    #[error("{context}: {source}")]
    Network {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error(
        "Failed to fetch order details. If this problem persists, please contact the organizer directly."
    )]
    HttpStatus { status: StatusCode, body: String },
    #[error("Malformed order details: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug)]
pub struct PaymentDetailsClient {
    endpoint: TransactionDetailsEndpoint,
}

impl PaymentDetailsClient {
    pub fn new(endpoint: TransactionDetailsEndpoint) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &TransactionDetailsEndpoint {
        &self.endpoint
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            endpoint: self.endpoint.with_timeout(timeout),
        }
    }

    /// Fetches the details for `sender`, or sender-independent details when `None`.
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(name = "ethpay.details.fetch", skip(self), err)
    )]
    pub async fn fetch(&self, sender: Option<Address>) -> Result<PaymentDetails, DetailsClientError> {
        let mut request = self.endpoint.get();
        if let Some(sender) = sender {
            request = request.query(&[("sender_address", sender.to_checksum(None))]);
        }
        let response = request
            .send()
            .await
            .map_err(|source| DetailsClientError::Network {
                context: "GET transaction details",
                source,
            })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| DetailsClientError::Network {
                context: "Failed to read transaction details body",
                source,
            })?;
        if !status.is_success() {
            tracing::warn!(%status, body = %body, "Transaction details endpoint returned an error");
            return Err(DetailsClientError::HttpStatus { status, body });
        }
        serde_json::from_str(&body).map_err(|source| DetailsClientError::Parse { source })
    }
}

impl TryFrom<&str> for PaymentDetailsClient {
    type Error = DetailsClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Ok(Self::new(TransactionDetailsEndpoint::try_from(value)?))
    }
}
