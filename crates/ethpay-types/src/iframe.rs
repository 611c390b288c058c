//! Events posted by the hosted payment iframe to its parent window.
//!
//! Every message is a JSON object carrying a `kind` discriminator:
//!
//! ```json
//! {"kind": "Checkout"}
//! {"kind": "CloseIframe"}
//! {
//!   "kind": "TransactionSigned",
//!   "caip222StyleSignature": "0x…",
//!   "caip222StyleMessageThatWasSigned": {"senderAddress": "0x…", "...": "..."},
//!   "transactionHash": "0x…",
//!   "chainId": 10,
//!   "tokenTicker": "ETH",
//!   "tokenName": "Ether",
//!   "tokenAmount": "1000000000000000",
//!   "tokenDecimals": 18
//! }
//! ```
//!
//! Only `transactionHash` and `chainId` are always present. The CAIP-222 signature pair is
//! sent when the page was asked to authenticate the sender; the token fields are a
//! convenience for the order's admin and any of them may be missing.
//!
//! Decoding is done in two steps (read `kind`, then the body) so that unknown kinds are
//! reported as [`IframeEvent::Unknown`] instead of failing.

use serde::Deserialize;
use serde_json::value::RawValue;

use crate::chain::Eip155ChainId;
use crate::proof::{SignedMessage, TokenMetadata, TransactionProof};
use crate::util::optional_decimal_text;

/// Payload of a `TransactionSigned` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSigned {
    /// `0x…` for an ordinary signature, `eip1271-chainId-<n>` for a smart contract wallet
    /// verified through `isValidSignature`.
    #[serde(default)]
    pub caip222_style_signature: Option<String>,
    #[serde(default)]
    pub caip222_style_message_that_was_signed: Option<Box<RawValue>>,
    pub transaction_hash: String,
    pub chain_id: Eip155ChainId,
    #[serde(default)]
    pub token_ticker: Option<String>,
    #[serde(default)]
    pub token_name: Option<String>,
    #[serde(default, with = "optional_decimal_text")]
    pub token_amount: Option<String>,
    #[serde(default)]
    pub token_decimals: Option<u8>,
    #[serde(default)]
    pub receipt_url: Option<String>,
    #[serde(default)]
    pub token_currency: Option<String>,
    #[serde(default)]
    pub token_contract_address: Option<String>,
    #[serde(default)]
    pub chain_name: Option<String>,
    #[serde(default)]
    pub is_testnet: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnershipMessage {
    #[serde(default)]
    sender_address: Option<String>,
}

impl TransactionSigned {
    /// `senderAddress` of the signed ownership message, if there is one and it names it.
    pub fn sender_address(&self) -> Option<String> {
        let raw = self.caip222_style_message_that_was_signed.as_ref()?;
        serde_json::from_str::<OwnershipMessage>(raw.get())
            .ok()?
            .sender_address
    }
}

impl From<TransactionSigned> for TransactionProof {
    fn from(event: TransactionSigned) -> Self {
        let sender_address = event.sender_address();
        TransactionProof {
            sender_address,
            signature: event.caip222_style_signature,
            signed_message: event
                .caip222_style_message_that_was_signed
                .map(SignedMessage::Json),
            transaction_hash: event.transaction_hash,
            chain_id: event.chain_id,
            token: TokenMetadata {
                ticker: event.token_ticker,
                name: event.token_name,
                amount: event.token_amount,
                decimals: event.token_decimals,
                contract_address: event.token_contract_address,
                currency: event.token_currency,
            },
            receipt_url: event.receipt_url,
            chain_name: event.chain_name,
            is_testnet: event.is_testnet,
        }
    }
}

/// A decoded iframe message.
#[derive(Debug, Clone)]
pub enum IframeEvent {
    TransactionSigned(Box<TransactionSigned>),
    CloseIframe,
    /// Informational; the parent takes no action.
    Checkout,
    Unknown(String),
}

#[derive(Debug, thiserror::Error)]
pub enum IframeDecodeError {
    #[error("Iframe message is not an object with a string `kind`: {0}")]
    NotAnEvent(#[source] serde_json::Error),
    #[error("Malformed iframe event body: {0}")]
    MalformedBody(#[source] serde_json::Error),
    /// A payment was reported but its event could not be read; the raw message is all
    /// there is to go on.
    #[error("Unreadable TransactionSigned event for transaction {transaction_hash}: {source}")]
    UnreadableTransaction {
        transaction_hash: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct Envelope {
    kind: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HashOnly {
    transaction_hash: String,
}

impl IframeEvent {
    pub const TRANSACTION_SIGNED: &'static str = "TransactionSigned";
    pub const CLOSE_IFRAME: &'static str = "CloseIframe";
    pub const CHECKOUT: &'static str = "Checkout";

    /// Decodes the JSON text of a message's `data`.
    pub fn decode(data: &str) -> Result<Self, IframeDecodeError> {
        let envelope: Envelope =
            serde_json::from_str(data).map_err(IframeDecodeError::NotAnEvent)?;
        let event = match envelope.kind.as_str() {
            Self::TRANSACTION_SIGNED => {
                let body: TransactionSigned = serde_json::from_str(data).map_err(|source| {
                    match serde_json::from_str::<HashOnly>(data) {
                        Ok(hash) => IframeDecodeError::UnreadableTransaction {
                            transaction_hash: hash.transaction_hash,
                            source,
                        },
                        Err(_) => IframeDecodeError::MalformedBody(source),
                    }
                })?;
                IframeEvent::TransactionSigned(Box::new(body))
            }
            Self::CLOSE_IFRAME => IframeEvent::CloseIframe,
            Self::CHECKOUT => IframeEvent::Checkout,
            _ => IframeEvent::Unknown(envelope.kind),
        };
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNED: &str = r#"{
        "kind": "TransactionSigned",
        "caip222StyleSignature": "0x1234",
        "caip222StyleMessageThatWasSigned": {"senderAddress":"0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045","statement":"pay"},
        "transactionHash": "0xfeed",
        "chainId": 10,
        "tokenTicker": "ETH",
        "tokenName": "Ether",
        "tokenAmount": "1000",
        "tokenDecimals": 18,
        "chainName": "OP Mainnet",
        "isTestnet": false
    }"#;

    #[test]
    fn test_decode_kinds() {
        assert!(matches!(
            IframeEvent::decode(r#"{"kind":"CloseIframe"}"#).unwrap(),
            IframeEvent::CloseIframe
        ));
        assert!(matches!(
            IframeEvent::decode(r#"{"kind":"Checkout","extra":1}"#).unwrap(),
            IframeEvent::Checkout
        ));
        assert!(matches!(
            IframeEvent::decode(r#"{"kind":"Resize"}"#).unwrap(),
            IframeEvent::Unknown(kind) if kind == "Resize"
        ));
        assert!(IframeEvent::decode(r#""just a string""#).is_err());
        assert!(IframeEvent::decode(r#"{"no_kind":true}"#).is_err());
    }

    fn decode_signed(json: &str) -> TransactionSigned {
        match IframeEvent::decode(json).unwrap() {
            IframeEvent::TransactionSigned(event) => *event,
            other => panic!("expected TransactionSigned, got {other:?}"),
        }
    }

    fn without(keys: &[&str]) -> String {
        let mut value: serde_json::Value = serde_json::from_str(SIGNED).unwrap();
        let object = value.as_object_mut().unwrap();
        for key in keys {
            object.remove(*key);
        }
        value.to_string()
    }

    #[test]
    fn test_transaction_signed_to_proof() {
        let proof = TransactionProof::from(decode_signed(SIGNED));
        assert_eq!(
            proof.sender_address.as_deref(),
            Some("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045")
        );
        assert_eq!(proof.signature.as_deref(), Some("0x1234"));
        assert_eq!(proof.chain_id, Eip155ChainId::new(10));
        assert_eq!(
            proof.signed_message.as_ref().map(SignedMessage::blob),
            Some(r#"{"senderAddress":"0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045","statement":"pay"}"#)
        );

        let fields = proof.to_form().fields();
        let keys: Vec<&str> = fields.iter().map(|(k, _)| *k).collect();
        assert!(keys.contains(&"chainName"));
        assert!(keys.contains(&"isTestnet"));
        assert!(!keys.contains(&"receiptUrl"));
        assert!(!keys.contains(&"tokenCurrency"));
        assert!(!keys.contains(&"tokenContractAddress"));
        assert!(fields.contains(&("tokenAmount", "1000".to_string())));
    }

    #[test]
    fn test_missing_token_name_still_yields_proof() {
        let proof = TransactionProof::from(decode_signed(&without(&["tokenName"])));
        assert_eq!(proof.transaction_hash, "0xfeed");
        assert_eq!(proof.token.name, None);
        assert_eq!(proof.token.ticker.as_deref(), Some("ETH"));

        let fields = proof.to_form().fields();
        assert!(!fields.iter().any(|(k, _)| *k == "tokenName"));
        assert!(fields.contains(&("tokenTicker", "ETH".to_string())));
    }

    #[test]
    fn test_unauthenticated_event_yields_proof_without_signature() {
        let json = without(&[
            "caip222StyleSignature",
            "caip222StyleMessageThatWasSigned",
        ]);
        let proof = TransactionProof::from(decode_signed(&json));
        assert_eq!(proof.sender_address, None);
        assert_eq!(proof.signature, None);
        assert_eq!(proof.signed_message, None);

        let keys: Vec<&str> = proof.to_form().fields().iter().map(|(k, _)| *k).collect();
        assert!(!keys.contains(&"senderAddress"));
        assert!(!keys.contains(&"signature"));
        assert!(!keys.contains(&"message"));
        assert!(keys.contains(&"transactionHash"));
        assert!(keys.contains(&"chainId"));
    }

    #[test]
    fn test_message_without_sender_address_is_kept() {
        let event = decode_signed(&SIGNED.replace("senderAddress", "owner"));
        let proof = TransactionProof::from(event);
        assert_eq!(proof.sender_address, None);
        assert!(proof.signed_message.unwrap().blob().contains("\"owner\""));
    }

    #[test]
    fn test_unreadable_event_keeps_transaction_hash() {
        let json = SIGNED.replace("\"chainId\": 10", "\"chainId\": \"optimism\"");
        match IframeEvent::decode(&json) {
            Err(IframeDecodeError::UnreadableTransaction {
                transaction_hash, ..
            }) => assert_eq!(transaction_hash, "0xfeed"),
            other => panic!("expected an unreadable transaction, got {other:?}"),
        }

        let json = without(&["transactionHash"]);
        assert!(matches!(
            IframeEvent::decode(&json),
            Err(IframeDecodeError::MalformedBody(_))
        ));
    }
}
