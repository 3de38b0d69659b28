use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::BASE64_URL;
use crate::services::IdentityError;

/// A stored claim. Tokens built in process keep dates as `Timestamp` until
/// serialized; tokens parsed off the wire hold them as Unix seconds.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimValue {
    Json(Value),
    Timestamp(DateTime<Utc>),
}

impl ClaimValue {
    /// The JSON written on the wire; dates become Unix seconds.
    pub fn to_wire(&self) -> Value {
        match self {
            ClaimValue::Json(value) => value.clone(),
            ClaimValue::Timestamp(at) => Value::from(at.timestamp()),
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            ClaimValue::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

impl From<Value> for ClaimValue {
    fn from(value: Value) -> Self {
        ClaimValue::Json(value)
    }
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        ClaimValue::Json(Value::from(value))
    }
}

impl From<String> for ClaimValue {
    fn from(value: String) -> Self {
        ClaimValue::Json(Value::from(value))
    }
}

impl From<i64> for ClaimValue {
    fn from(value: i64) -> Self {
        ClaimValue::Json(Value::from(value))
    }
}

impl From<bool> for ClaimValue {
    fn from(value: bool) -> Self {
        ClaimValue::Json(Value::from(value))
    }
}

impl From<Vec<String>> for ClaimValue {
    fn from(value: Vec<String>) -> Self {
        ClaimValue::Json(Value::from(value))
    }
}

impl From<DateTime<Utc>> for ClaimValue {
    fn from(value: DateTime<Utc>) -> Self {
        ClaimValue::Timestamp(value)
    }
}

/// Types a stored claim can be read as.
pub trait FromClaim: Sized {
    fn from_claim(value: &ClaimValue) -> Option<Self>;
}

impl FromClaim for String {
    fn from_claim(value: &ClaimValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromClaim for i64 {
    fn from_claim(value: &ClaimValue) -> Option<Self> {
        match value {
            ClaimValue::Json(v) => v.as_i64(),
            ClaimValue::Timestamp(at) => Some(at.timestamp()),
        }
    }
}

impl FromClaim for bool {
    fn from_claim(value: &ClaimValue) -> Option<Self> {
        match value {
            ClaimValue::Json(v) => v.as_bool(),
            ClaimValue::Timestamp(_) => None,
        }
    }
}

impl FromClaim for DateTime<Utc> {
    fn from_claim(value: &ClaimValue) -> Option<Self> {
        match value {
            ClaimValue::Timestamp(at) => Some(*at),
            ClaimValue::Json(v) => v.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        }
    }
}

impl FromClaim for Vec<String> {
    fn from_claim(value: &ClaimValue) -> Option<Self> {
        match value {
            ClaimValue::Json(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => None,
        }
    }
}

impl FromClaim for Value {
    fn from_claim(value: &ClaimValue) -> Option<Self> {
        Some(value.to_wire())
    }
}

/// Ordered, string keyed claim bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JwtSegment {
    claims: Vec<(String, ClaimValue)>,
}

impl JwtSegment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a claim, keeping its position when it already exists.
    pub fn set(&mut self, key: &str, value: impl Into<ClaimValue>) {
        let value = value.into();
        match self.claims.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.claims.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<ClaimValue> {
        let index = self.claims.iter().position(|(k, _)| k == key)?;
        Some(self.claims.remove(index).1)
    }

    pub fn get(&self, key: &str) -> Option<&ClaimValue> {
        self.claims.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.claims.iter().map(|(k, _)| k.as_str())
    }

    pub fn get_optional_entry<T: FromClaim>(&self, key: &str) -> Result<Option<T>, IdentityError> {
        match self.get(key) {
            None | Some(ClaimValue::Json(Value::Null)) => Ok(None),
            Some(value) => T::from_claim(value)
                .map(Some)
                .ok_or_else(|| IdentityError::InvalidClaim(key.to_string())),
        }
    }

    pub fn get_required_entry<T: FromClaim>(&self, key: &str) -> Result<T, IdentityError> {
        self.get_optional_entry(key)?
            .ok_or_else(|| IdentityError::MissingClaim(key.to_string()))
    }

    /// Decodes a raw string claim into a richer type. The stored claim is
    /// left untouched.
    pub fn get_optional_entry_format<T, F>(
        &self,
        key: &str,
        formatter: F,
    ) -> Result<Option<T>, IdentityError>
    where
        F: FnOnce(&str) -> Result<T, IdentityError>,
    {
        self.get_optional_entry::<String>(key)?
            .map(|raw| formatter(&raw))
            .transpose()
    }

    pub fn get_required_entry_format<T, F>(&self, key: &str, formatter: F) -> Result<T, IdentityError>
    where
        F: FnOnce(&str) -> Result<T, IdentityError>,
    {
        self.get_optional_entry_format(key, formatter)?
            .ok_or_else(|| IdentityError::MissingClaim(key.to_string()))
    }

    pub fn to_json_value(&self) -> Value {
        let map: Map<String, Value> = self
            .claims
            .iter()
            .map(|(k, v)| (k.clone(), v.to_wire()))
            .collect();
        Value::Object(map)
    }

    pub fn to_serialized_json(&self) -> Result<String, IdentityError> {
        serde_json::to_string(&self.to_json_value())
            .map_err(|e| IdentityError::Internal(anyhow::anyhow!("Failed to serialize claims: {}", e)))
    }

    pub fn to_base64_encoded(&self) -> Result<String, IdentityError> {
        Ok(BASE64_URL.encode(self.to_serialized_json()?))
    }

    pub fn from_serialized_json(json: &[u8]) -> Result<Self, IdentityError> {
        match serde_json::from_slice::<Value>(json) {
            Ok(Value::Object(map)) => Ok(Self {
                claims: map
                    .into_iter()
                    .map(|(k, v)| (k, ClaimValue::Json(v)))
                    .collect(),
            }),
            Ok(_) => Err(IdentityError::MalformedJwt(
                "JWT segment is not a JSON object".to_string(),
            )),
            Err(e) => Err(IdentityError::MalformedJwt(format!(
                "JWT segment is not valid JSON: {}",
                e
            ))),
        }
    }

    pub fn from_base64_encoded(encoded: &str) -> Result<Self, IdentityError> {
        let json = BASE64_URL
            .decode(encoded)
            .map_err(|e| IdentityError::MalformedJwt(format!("JWT segment is not base64url: {}", e)))?;
        Self::from_serialized_json(&json)
    }
}
