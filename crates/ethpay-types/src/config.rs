//! Environment variable resolution for configuration values.
//!
//! Checkout configuration carries secrets (a wallet key, the backend CSRF token) that
//! should not be written into the config file itself. Any value wrapped in
//! [`LiteralOrEnv`] may instead name an environment variable:
//!
//! ```json
//! {
//!   "transaction_details_url": "https://shop.example/order/abc/transaction_details/",
//!   "csrf_token": "$CHECKOUT_CSRF_TOKEN",
//!   "wallet": { "private_key": "${CHECKOUT_PRIVATE_KEY}" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::Deref;
use std::str::FromStr;

/// A configuration value given either literally or as `$VAR` / `${VAR}`.
///
/// The reference is resolved once, during deserialization, and the result is parsed
/// into `T` through its [`FromStr`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Returns the variable name if `s` is written as `$VAR` or `${VAR}`.
fn env_var_name(s: &str) -> Option<&str> {
    if let Some(braced) = s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        return (!braced.is_empty()).then_some(braced);
    }
    let bare = s.strip_prefix('$')?;
    let valid = !bare.is_empty() && bare.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(bare)
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let resolved = match env_var_name(&raw) {
            Some(name) => std::env::var(name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{name}' not found (referenced as '{raw}')"
                ))
            })?,
            None => raw,
        };
        resolved
            .parse::<T>()
            .map(LiteralOrEnv)
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {e}")))
    }
}

impl<T> Serialize for LiteralOrEnv<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}
