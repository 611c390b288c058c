//! Order payment parameters served by the backend's transaction-details endpoint.

use serde::{Deserialize, Serialize};

use crate::chain::{ChecksummedAddress, Eip155ChainId};
use crate::util::{decimal_text, optional_decimal_text};

/// Response of `GET <transaction-details-url>?sender_address=<address>`.
///
/// Amount and recipient are bound to the sender address that was queried, so a fresh
/// copy is fetched on every payment attempt and never reused after the wallet switches
/// account or chain.
///
/// ```json
/// {
///   "recipient_address": "0x67406f6F75F3Bb2bA0DeDdf2676D3bA6F55C700F",
///   "amount": "1000000000000000000",
///   "chain_id": 10,
///   "erc20_contract_address": null,
///   "message": "Sign to confirm you own this address",
///   "is_signature_submitted": false,
///   "primary_currency": "USD",
///   "usd_per_eth": "4012.56",
///   "3cities_interface_domain": "3cities.xyz"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub recipient_address: ChecksummedAddress,
    /// Amount due. For native transfers this is in wei; for ERC-20 transfers it is in
    /// whole token units and is scaled by the token's decimals before sending.
    #[serde(with = "decimal_text")]
    pub amount: String,
    pub chain_id: Eip155ChainId,
    #[serde(default)]
    pub erc20_contract_address: Option<ChecksummedAddress>,
    pub message: String,
    #[serde(default)]
    pub is_signature_submitted: bool,
    #[serde(default = "default_primary_currency")]
    pub primary_currency: String,
    #[serde(default, with = "optional_decimal_text", skip_serializing_if = "Option::is_none")]
    pub usd_per_eth: Option<String>,
    #[serde(
        rename = "3cities_interface_domain",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub interface_domain: Option<String>,
}

impl PaymentDetails {
    /// True when payment should go through an ERC-20 `transfer` rather than a native value transfer.
    pub fn is_token_payment(&self) -> bool {
        self.erc20_contract_address.is_some()
    }
}

fn default_primary_currency() -> String {
    "ETH".to_string()
}
