//! Miscellaneous utils
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub(crate) mod pass;

const KEY_LENGTH: usize = 32;
const TEMP_PASSWORD_LENGTH: usize = 14;

/// Pair of keys intended for use in redis and bearer tokens
pub(crate) struct RKeys {
    /// Key without prefix
    pub(crate) base_key: String,
    /// Key with prefix
    pub(crate) prefixed_key: String,
}

impl RKeys {
    /// Generate a random alphanumeric key `KEY_LENGTH` long and return its' `(raw, prefixed)` variations.
    pub(crate) fn generate(prefix: &'static str) -> Self {
        let base_key = random_alphanumeric(KEY_LENGTH);
        let prefixed_key = format!("{}{}", prefix, base_key);
        Self {
            base_key,
            prefixed_key,
        }
    }

    /// Rebuild the redis key for a key handed back by a client.
    pub(crate) fn prefixed(prefix: &'static str, base_key: &str) -> String {
        format!("{}{}", prefix, base_key)
    }
}

/// A one-off password for admin-created accounts and resets.
pub(crate) fn temporary_password() -> String {
    random_alphanumeric(TEMP_PASSWORD_LENGTH)
}

fn random_alphanumeric(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Deserialize an optional integer that clients may send as a number or a numeric string.
/// Anything else reads as absent.
pub(crate) fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float.trunc() as i64))
            .and_then(|int| i32::try_from(int).ok()),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    })
}
