//! Serde helpers shared by the wire types.

/// Deserializes a JSON string or number into its decimal text.
///
/// Amounts and exchange rates reach us either quoted (`"4012.56"`) or bare (`4012.56`),
/// depending on the backend serializer. Both are kept as text so that no precision is
/// lost before the value is forwarded.
pub mod decimal_text {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    pub fn serialize<S>(value: &str, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        })
    }
}

/// [`decimal_text`] for fields that may be absent or `null`.
pub mod optional_decimal_text {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_str(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapped(#[serde(with = "super::decimal_text")] String);

        Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|w| w.0))
    }
}
