use async_trait::async_trait;
use ethpay_types::proof::SubmissionForm;
use http::StatusCode;

use crate::endpoint::TransactionDetailsEndpoint;

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("{context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Backend answered HTTP {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
}

/// Hands a proof of payment to the order backend.
#[async_trait]
pub trait ProofSubmitter: Send + Sync {
    async fn submit(&self, form: &SubmissionForm) -> Result<(), SubmitError>;
}

/// `POST <transaction-details-url>` with a form-encoded body.
#[derive(Clone, Debug)]
pub struct HttpProofSubmitter {
    endpoint: TransactionDetailsEndpoint,
    csrf_token: Option<String>,
}

impl HttpProofSubmitter {
    pub const CSRF_FIELD: &'static str = "csrfmiddlewaretoken";

    pub fn new(endpoint: TransactionDetailsEndpoint) -> Self {
        Self {
            endpoint,
            csrf_token: None,
        }
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }
}

#[async_trait]
impl ProofSubmitter for HttpProofSubmitter {
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(
            name = "ethpay.proof.submit",
            skip_all,
            fields(transaction_hash = %form.transaction_hash),
            err
        )
    )]
    async fn submit(&self, form: &SubmissionForm) -> Result<(), SubmitError> {
        let mut fields = form.fields();
        if let Some(token) = &self.csrf_token {
            fields.push((Self::CSRF_FIELD, token.clone()));
        }
        let response = self
            .endpoint
            .post()
            .form(&fields)
            .send()
            .await
            .map_err(|source| SubmitError::Http {
                context: "POST transaction details",
                source,
            })?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response
            .text()
            .await
            .map_err(|source| SubmitError::Http {
                context: "Failed to read submission response body",
                source,
            })?;
        Err(SubmitError::HttpStatus { status, body })
    }
}
