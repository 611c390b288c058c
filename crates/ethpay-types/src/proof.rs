//! Proof of payment and the form body it is submitted as.
//!
//! A [`TransactionProof`] is produced exactly once per successful payment attempt, either
//! from the direct wallet flow (personal_sign + transfer) or from the hosted iframe's
//! `TransactionSigned` event. It is converted into a [`SubmissionForm`] for the backend.
//! Optional fields that were never provided are left out of the form entirely: the
//! backend treats "absent" and "empty" differently.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::chain::Eip155ChainId;

/// The message whose signature proves ownership of the sender address.
///
/// The backend treats it as an opaque blob. Structured messages coming from the iframe are
/// kept as the raw JSON text they arrived in, so the bytes submitted are the bytes signed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignedMessage {
    /// A plain text message signed with `personal_sign`.
    Text(String),
    /// A structured (CAIP-222 style) message, verbatim.
    Json(Box<RawValue>),
}

impl SignedMessage {
    /// The blob sent to the backend as the `message` form field.
    pub fn blob(&self) -> &str {
        match self {
            SignedMessage::Text(text) => text,
            SignedMessage::Json(raw) => raw.get(),
        }
    }
}

impl PartialEq for SignedMessage {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SignedMessage::Text(a), SignedMessage::Text(b)) => a == b,
            (SignedMessage::Json(a), SignedMessage::Json(b)) => a.get() == b.get(),
            _ => false,
        }
    }
}

/// What was paid: token identity and amount, as reported by whoever sent the transaction.
///
/// The hosted checkout reports these for convenience only and may leave any of them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl TokenMetadata {
    /// Ether paid with a native value transfer; `amount` is in wei.
    pub fn native_ether(amount: impl Into<String>) -> Self {
        Self {
            ticker: Some("ETH".to_string()),
            name: Some("Ether".to_string()),
            amount: Some(amount.into()),
            decimals: Some(18),
            contract_address: None,
            currency: None,
        }
    }
}

/// Evidence of payment for one order.
///
/// Only the transaction hash and chain are always known. The ownership signature and the
/// message it covers are absent when the hosted checkout was not asked to authenticate the
/// sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionProof {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_message: Option<SignedMessage>,
    pub transaction_hash: String,
    pub chain_id: Eip155ChainId,
    pub token: TokenMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_testnet: Option<bool>,
}

impl TransactionProof {
    pub fn to_form(&self) -> SubmissionForm {
        SubmissionForm {
            sender_address: self.sender_address.clone(),
            signature: self.signature.clone(),
            message: self.signed_message.as_ref().map(|m| m.blob().to_string()),
            transaction_hash: self.transaction_hash.clone(),
            chain_id: self.chain_id.inner(),
            token_ticker: self.token.ticker.clone(),
            token_name: self.token.name.clone(),
            token_amount: self.token.amount.clone(),
            token_decimals: self.token.decimals,
            receipt_url: self.receipt_url.clone(),
            token_currency: self.token.currency.clone(),
            token_contract_address: self.token.contract_address.clone(),
            chain_name: self.chain_name.clone(),
            is_testnet: self.is_testnet,
        }
    }
}

/// Body of `POST <transaction-details-url>`.
///
/// Serializes to JSON with the same camelCase keys that [`SubmissionForm::fields`] yields
/// for the form encoding; the JSON form is what a user is asked to forward to support
/// when delivery fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub transaction_hash: String,
    pub chain_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_ticker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_decimals: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_contract_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_testnet: Option<bool>,
}

impl SubmissionForm {
    /// Ordered form fields; absent values produce no entry at all.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let fields = [
            ("senderAddress", self.sender_address.clone()),
            ("signature", self.signature.clone()),
            ("message", self.message.clone()),
            ("transactionHash", Some(self.transaction_hash.clone())),
            ("chainId", Some(self.chain_id.to_string())),
            ("tokenTicker", self.token_ticker.clone()),
            ("tokenName", self.token_name.clone()),
            ("tokenAmount", self.token_amount.clone()),
            ("tokenDecimals", self.token_decimals.map(|d| d.to_string())),
            ("receiptUrl", self.receipt_url.clone()),
            ("tokenCurrency", self.token_currency.clone()),
            ("tokenContractAddress", self.token_contract_address.clone()),
            ("chainName", self.chain_name.clone()),
            ("isTestnet", self.is_testnet.map(|b| b.to_string())),
        ];
        fields
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect()
    }

    /// Compact JSON rendering, used verbatim in the "details were lost" message.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self.fields()))
    }
}
