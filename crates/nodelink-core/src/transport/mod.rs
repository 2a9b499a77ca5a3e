//! Multiplexing transport abstraction
//!
//! A [`MultiHandle`] tracks any number of registered transfers and advances
//! them when asked to. It is owned outside of a connection (by whatever pool
//! hands connections out) and shared as a [`SharedMultiHandle`]. A connection
//! only ever registers one transfer at a time on it.
//!
//! Two implementations ship with the crate:
//! - [`ScriptedMulti`], an in-memory double that replays scripted responses
//! - `CurlMulti` (feature `curl`), backed by a libcurl multi handle

pub mod options;
pub mod scripted;
#[cfg(feature = "curl")]
pub mod curl;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::Method;

pub use options::{OptionKey, OptionValue, TransportOptions};
pub use scripted::{ScriptedMulti, ScriptedResponse, TransferLog};
#[cfg(feature = "curl")]
pub use self::curl::CurlMulti;

/// Multiplexing handle shared between connections
pub type SharedMultiHandle = Arc<Mutex<dyn MultiHandle + Send>>;

/// Wrap a handle so it can be handed to connections
pub fn shared<M>(multi: M) -> SharedMultiHandle
where
    M: MultiHandle + Send + 'static,
{
    Arc::new(Mutex::new(multi))
}

/// Identifier of a transfer registered on a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransferToken(u64);

impl TransferToken {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransferToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A fully assembled request, ready to be registered on a handle
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// Absolute target URL including the query string
    pub url: String,
    /// Method sent on the wire
    pub method: Method,
    pub body: Option<Vec<u8>>,
    /// Header name/value pairs
    pub headers: Vec<(String, String)>,
    pub options: TransportOptions,
}

impl TransportRequest {
    /// Headers rendered as `Name: value` lines
    pub fn header_lines(&self) -> Vec<String> {
        self.headers
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect()
    }
}

/// Result of one `perform` step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformStatus {
    /// More work is immediately available; call `perform` again without waiting
    pub call_again: bool,
    /// Transfers still running on the handle
    pub running: u32,
}

/// Result of a bounded readiness wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Number of descriptors that became ready
    Ready(u32),
    /// The wait returned without any descriptor becoming ready even though
    /// transfers are pending
    NothingReady,
}

/// Transport-level outcome of a finished transfer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// `0` when the transfer succeeded at the transport level
    pub error_code: i32,
    /// Empty when the transfer succeeded at the transport level
    pub error_message: String,
}

impl Completion {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failed(error_code: i32, error_message: impl Into<String>) -> Self {
        Self {
            error_code,
            error_message: error_message.into(),
        }
    }
}

/// Metadata reported by the transport for a finished transfer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferInfo {
    /// HTTP status code, `0` when no response was received
    pub status: u16,
    /// Total elapsed time of the transfer
    pub total_time: Duration,
    /// Any further transport-reported fields
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

/// Data handed back when a transfer is removed from the handle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferOutput {
    /// Captured response bytes (status line and headers included when
    /// header capture was requested)
    pub body: Vec<u8>,
    pub info: TransferInfo,
}

/// Failure reported by a handle operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("multi handle {operation} failed ({code}): {message}")]
pub struct HandleError {
    pub operation: &'static str,
    pub code: i32,
    pub message: String,
}

impl HandleError {
    pub fn new(operation: &'static str, code: i32, message: impl Into<String>) -> Self {
        Self {
            operation,
            code,
            message: message.into(),
        }
    }
}

impl From<HandleError> for crate::Error {
    fn from(err: HandleError) -> Self {
        crate::Error::Transport {
            code: err.code,
            message: err.to_string(),
        }
    }
}

/// Non-blocking, poll-driven multiplexing transport
pub trait MultiHandle {
    /// Register a transfer
    fn add(&mut self, request: TransportRequest) -> Result<TransferToken, HandleError>;

    /// Advance every registered transfer as far as possible without blocking
    fn perform(&mut self) -> Result<PerformStatus, HandleError>;

    /// Block until a descriptor is ready or `timeout` elapses
    fn wait(&mut self, timeout: Duration) -> Result<WaitOutcome, HandleError>;

    /// Take the finished notification for `token`, if it has finished
    fn take_completion(&mut self, token: TransferToken) -> Option<Completion>;

    /// Deregister `token`, handing back whatever it captured
    fn remove(&mut self, token: TransferToken) -> Result<TransferOutput, HandleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lines() {
        let request = TransportRequest {
            url: "http://localhost:9200/".to_string(),
            method: Method::Get,
            body: None,
            headers: vec![("Authorization".to_string(), "Basic dTpw".to_string())],
            options: TransportOptions::new(),
        };
        assert_eq!(request.header_lines(), vec!["Authorization: Basic dTpw".to_string()]);
    }

    #[test]
    fn test_handle_error_into_transport_failure() {
        let err: crate::Error = HandleError::new("perform", 3, "bad easy handle").into();
        match err {
            crate::Error::Transport { code, message } => {
                assert_eq!(code, 3);
                assert!(message.contains("perform"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
