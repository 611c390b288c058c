//! The order backend's transaction-details endpoint.
//!
//! One URL serves both directions of the checkout contract: `GET` returns the
//! [`PaymentDetails`](ethpay_types::details::PaymentDetails) for a sender, `POST` accepts the
//! proof of payment. [`TransactionDetailsEndpoint`] owns that URL together with the shared
//! reqwest client and the per-request options (headers, timeout) both directions use.
//!
//! ```rust
//! use ethpay_checkout::endpoint::TransactionDetailsEndpoint;
//! use std::time::Duration;
//!
//! let endpoint = TransactionDetailsEndpoint::try_from("https://shop.example/order/abc/transaction_details/")
//!     .unwrap()
//!     .with_timeout(Duration::from_secs(10));
//! ```

use http::HeaderMap;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use url::Url;

#[derive(Debug, thiserror::Error)]
#[error("Invalid transaction details URL {url:?}: {source}")]
pub struct EndpointUrlError {
    url: String,
    #[source]
    source: url::ParseError,
}

#[derive(Clone, Debug)]
pub struct TransactionDetailsEndpoint {
    url: Url,
    client: Client,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl TransactionDetailsEndpoint {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            client: Client::new(),
            headers: HeaderMap::new(),
            timeout: None,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Attaches custom headers to all future requests.
    pub fn with_headers(&self, headers: HeaderMap) -> Self {
        let mut this = self.clone();
        this.headers = headers;
        this
    }

    /// Sets a timeout for all future requests.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut this = self.clone();
        this.timeout = Some(timeout);
        this
    }

    pub(crate) fn get(&self) -> RequestBuilder {
        self.prepare(self.client.get(self.url.clone()))
    }

    pub(crate) fn post(&self) -> RequestBuilder {
        self.prepare(self.client.post(self.url.clone()))
    }

    fn prepare(&self, mut req: RequestBuilder) -> RequestBuilder {
        for (key, value) in self.headers.iter() {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        req
    }
}

impl TryFrom<&str> for TransactionDetailsEndpoint {
    type Error = EndpointUrlError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let url = Url::parse(value).map_err(|source| EndpointUrlError {
            url: value.to_string(),
            source,
        })?;
        Ok(Self::new(url))
    }
}

impl TryFrom<String> for TransactionDetailsEndpoint {
    type Error = EndpointUrlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TransactionDetailsEndpoint::try_from(value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_url_verbatim() {
        let endpoint =
            TransactionDetailsEndpoint::try_from("https://shop.example/o/abc/transaction_details/")
                .unwrap();
        assert_eq!(
            endpoint.url().as_str(),
            "https://shop.example/o/abc/transaction_details/"
        );
        assert!(endpoint.timeout().is_none());
    }

    #[tokio::test]
    async fn test_headers_and_timeout_apply_to_requests() {
        use wiremock::matchers::{header, method};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("x-shop-key", "k-123"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-shop-key", "k-123".parse().unwrap());
        let endpoint = TransactionDetailsEndpoint::try_from(server.uri())
            .unwrap()
            .with_headers(headers)
            .with_timeout(Duration::from_secs(3));
        assert_eq!(endpoint.timeout(), Some(Duration::from_secs(3)));

        let response = endpoint.get().send().await.unwrap();
        assert_eq!(response.status(), 204);
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = TransactionDetailsEndpoint::try_from("not a url").unwrap_err();
        assert!(err.to_string().contains("not a url"));
    }
}
