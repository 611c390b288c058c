//! Composition of the hosted checkout URL.
//!
//! The hosted page reads its parameters from the fragment of a pay link, so parameters are
//! appended by plain string concatenation (`base + "&name=" + value`) rather than through a
//! URL builder, which would move them into a query string. Values are encoded the way
//! `encodeURIComponent` does it.

use ethpay_types::details::PaymentDetails;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use url::Url;

use crate::iframe::IframeError;

/// Everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )` is escaped.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_uri_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

/// Shown by the hosted page when it is opened outside of the checkout's iframe.
pub const DEFAULT_REQUIRE_IN_IFRAME_ERROR: &str =
    "Standalone page detected. Please use the \"Click here to pay\" pop-up in Pretix";
pub const DEFAULT_CLICK_TO_CLOSE_LABEL: &str = "Return to Ticket Shop";

/// Operator settings for the hosted checkout.
///
/// Sender authentication (with EIP-1271 verification) and the native token transfer proxy
/// are on unless turned off: the backend's verifier can only match ETH payments sent through
/// the proxy. String settings are left out of the URL when set to `null`.
///
/// ```json
/// {
///   "pay_link": "#/pay?c=CAESFAKY9DyfOhjyGFXhFQ8MYSKlcMAh",
///   "parent_window_origin": "https://shop.example",
///   "click_to_close_label": "Return to shop"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct IframeSettings {
    /// Full base URL; takes precedence over `pay_link`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Path and fragment appended to `https://<interface domain>/`.
    #[serde(default)]
    pub pay_link: Option<String>,
    /// Origin of the page embedding the iframe. A browser host knows its own; the console
    /// host has none unless configured.
    #[serde(default)]
    pub parent_window_origin: Option<String>,
    #[serde(default = "default_require_in_iframe_error")]
    pub require_in_iframe_error: Option<String>,
    #[serde(default = "enabled")]
    pub authenticate_sender_address: bool,
    #[serde(default = "enabled")]
    pub verify_eip1271_signature: bool,
    #[serde(default = "default_click_to_close_label")]
    pub click_to_close_label: Option<String>,
    #[serde(default = "enabled")]
    pub require_native_token_transfer_proxy: bool,
}

fn enabled() -> bool {
    true
}

fn default_require_in_iframe_error() -> Option<String> {
    Some(DEFAULT_REQUIRE_IN_IFRAME_ERROR.to_string())
}

fn default_click_to_close_label() -> Option<String> {
    Some(DEFAULT_CLICK_TO_CLOSE_LABEL.to_string())
}

impl Default for IframeSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            pay_link: None,
            parent_window_origin: None,
            require_in_iframe_error: default_require_in_iframe_error(),
            authenticate_sender_address: true,
            verify_eip1271_signature: true,
            click_to_close_label: default_click_to_close_label(),
            require_native_token_transfer_proxy: true,
        }
    }
}

impl IframeSettings {
    fn base_url(&self, details: &PaymentDetails) -> Result<String, IframeError> {
        if let Some(base_url) = &self.base_url {
            return Ok(base_url.clone());
        }
        let pay_link = self.pay_link.as_deref().ok_or(IframeError::NotConfigured)?;
        let domain = details
            .interface_domain
            .as_deref()
            .filter(|domain| !domain.is_empty())
            .ok_or(IframeError::MissingInterfaceDomain)?;
        Ok(format!(
            "https://{}/{}",
            domain.trim_end_matches('/'),
            pay_link.trim_start_matches('/')
        ))
    }

    /// Combines these settings with an order's details.
    pub fn checkout_params(&self, details: &PaymentDetails) -> Result<IframeCheckoutParams, IframeError> {
        let usd_per_eth = details
            .usd_per_eth
            .clone()
            .ok_or(IframeError::MissingExchangeRate)?;
        Ok(IframeCheckoutParams {
            base_url: self.base_url(details)?,
            receiver_address: details.recipient_address.to_string(),
            amount: details.amount.clone(),
            currency: details.primary_currency.clone(),
            usd_per_eth,
            require_in_iframe_or_error_with: self.require_in_iframe_error.clone(),
            iframe_parent_window_origin: self.parent_window_origin.clone(),
            authenticate_sender_address: self.authenticate_sender_address.then_some(
                SenderAuthentication {
                    verify_eip1271_signature: self.verify_eip1271_signature,
                },
            ),
            click_to_close_iframe_label: self.click_to_close_label.clone(),
            require_native_token_transfer_proxy: self.require_native_token_transfer_proxy,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderAuthentication {
    /// Also accept smart contract wallet signatures checked with EIP-1271.
    pub verify_eip1271_signature: bool,
}

/// Parameters of one hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IframeCheckoutParams {
    pub base_url: String,
    pub receiver_address: String,
    pub amount: String,
    pub currency: String,
    pub usd_per_eth: String,
    pub require_in_iframe_or_error_with: Option<String>,
    pub iframe_parent_window_origin: Option<String>,
    pub authenticate_sender_address: Option<SenderAuthentication>,
    pub click_to_close_iframe_label: Option<String>,
    pub require_native_token_transfer_proxy: bool,
}

impl IframeCheckoutParams {
    pub fn to_url(&self) -> String {
        let mut url = self.base_url.clone();
        let mut push = |name: &str, value: &str| {
            url.push('&');
            url.push_str(name);
            url.push('=');
            url.push_str(&encode_uri_component(value));
        };
        push("receiverAddress", &self.receiver_address);
        push("amount", &self.amount);
        push("currency", &self.currency);
        push("usdPerEth", &self.usd_per_eth);
        if let Some(message) = &self.require_in_iframe_or_error_with {
            push("requireInIframeOrErrorWith", message);
        }
        if let Some(origin) = &self.iframe_parent_window_origin {
            push("iframeParentWindowOrigin", origin);
        }
        if let Some(auth) = self.authenticate_sender_address {
            push("authenticateSenderAddress", "1");
            if auth.verify_eip1271_signature {
                push("verifyEip1271Signature", "1");
            }
        }
        if let Some(label) = &self.click_to_close_iframe_label {
            push("clickToCloseIframeLabel", label);
        }
        if self.require_native_token_transfer_proxy {
            push("requireNativeTokenTransferProxy", "1");
        }
        url
    }

    /// Origin every message from the iframe must carry, e.g. `https://3cities.xyz`.
    pub fn origin(&self) -> Result<String, IframeError> {
        let url = Url::parse(&self.base_url).map_err(|source| IframeError::InvalidBaseUrl {
            url: self.base_url.clone(),
            source,
        })?;
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(IframeError::OpaqueOrigin(self.base_url.clone()));
        }
        Ok(origin.ascii_serialization())
    }
}
