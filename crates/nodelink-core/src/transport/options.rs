//! Low-level transport options
//!
//! Options are keyed by a closed [`OptionKey`] set so overrides coming from
//! configuration can be merged with the per-request defaults by key.

use std::collections::BTreeMap;
use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Transport option identifiers understood by every [`MultiHandle`](super::MultiHandle)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKey {
    /// Connect timeout in milliseconds
    ConnectTimeoutMs,
    /// Total transfer timeout in milliseconds
    TimeoutMs,
    /// Authentication scheme (`basic`, `digest`, `ntlm`, `any`)
    HttpAuth,
    /// `username:password` credential string
    UserPwd,
    /// Force a plain GET without request body
    HttpGet,
    /// Do not fetch a response body
    NoBody,
    /// Method sent on the wire when it is not a plain GET/POST
    CustomRequest,
    /// Capture status line and headers in front of the body
    ShowHeader,
    FollowLocation,
    Verbose,
    SslVerifyPeer,
    SslVerifyHost,
    Proxy,
    UserAgent,
    TcpKeepalive,
}

impl OptionKey {
    /// Keys that describe the request shape and are always re-applied after
    /// caller overrides are merged
    pub fn is_request_shape(&self) -> bool {
        matches!(
            self,
            OptionKey::HttpGet | OptionKey::NoBody | OptionKey::CustomRequest | OptionKey::ShowHeader
        )
    }
}

/// Value of a single transport option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Flag(bool),
    Number(i64),
    Text(String),
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Flag(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Number(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

impl From<Duration> for OptionValue {
    fn from(value: Duration) -> Self {
        OptionValue::Number(i64::try_from(value.as_millis()).unwrap_or(i64::MAX))
    }
}

/// Ordered map of transport options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportOptions(BTreeMap<OptionKey, OptionValue>);

impl TransportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, returning the previous value
    pub fn insert(&mut self, key: OptionKey, value: impl Into<OptionValue>) -> Option<OptionValue> {
        self.0.insert(key, value.into())
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, key: OptionKey, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: OptionKey) -> Option<&OptionValue> {
        self.0.get(&key)
    }

    pub fn remove(&mut self, key: OptionKey) -> Option<OptionValue> {
        self.0.remove(&key)
    }

    pub fn contains(&self, key: OptionKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (OptionKey, &OptionValue)> {
        self.0.iter().map(|(key, value)| (*key, value))
    }

    /// Union with `other`; keys present in `other` win
    pub fn merge(&mut self, other: &TransportOptions) {
        for (key, value) in other.iter() {
            self.0.insert(key, value.clone());
        }
    }

    /// Boolean option, accepting `0`/`1` numbers as well
    pub fn flag(&self, key: OptionKey) -> Option<bool> {
        match self.get(key)? {
            OptionValue::Flag(value) => Some(*value),
            OptionValue::Number(value) => Some(*value != 0),
            OptionValue::Text(_) => None,
        }
    }

    /// Millisecond option as a duration; negative values are rejected
    pub fn millis(&self, key: OptionKey) -> Option<Duration> {
        match self.get(key)? {
            OptionValue::Number(value) if *value >= 0 => Some(Duration::from_millis(*value as u64)),
            _ => None,
        }
    }

    pub fn text(&self, key: OptionKey) -> Option<&str> {
        match self.get(key)? {
            OptionValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl FromIterator<(OptionKey, OptionValue)> for TransportOptions {
    fn from_iter<I: IntoIterator<Item = (OptionKey, OptionValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
