//! Request lifecycle observation
//!
//! Connections report every finished request and every construction failure
//! to a [`RequestObserver`]. The default [`TracingObserver`] turns them into
//! structured `tracing` events; installing a subscriber is up to the caller.

use std::time::Duration;
use crate::error::{Error, Severity};
use crate::http::Method;

/// Everything known about a request once it finished
#[derive(Debug, Clone, Copy)]
pub struct RequestRecord<'a> {
    /// Method the caller asked for (not the wire method)
    pub method: Method,
    pub uri: &'a str,
    pub request_body: Option<&'a str>,
    pub status: u16,
    pub response_body: &'a str,
    pub elapsed: Duration,
    /// Empty unless the transport failed
    pub transport_error: &'a str,
}

/// Receives request lifecycle events
pub trait RequestObserver: Send + Sync {
    /// Called before a response is handed back to the caller
    fn on_success(&self, _record: &RequestRecord<'_>) {}

    /// Called before a failure is handed back to the caller
    fn on_failure(&self, _record: &RequestRecord<'_>, _error: &Error) {}

    /// Called before a construction error is handed back to the caller
    fn on_construction_failure(&self, _error: &Error) {}
}

/// Observer emitting `tracing` events under the `nodelink::request` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RequestObserver for TracingObserver {
    fn on_success(&self, record: &RequestRecord<'_>) {
        tracing::info!(
            target: "nodelink::request",
            method = %record.method,
            uri = record.uri,
            status = record.status,
            elapsed_ms = record.elapsed.as_millis() as u64,
            "Request success"
        );
        tracing::debug!(
            target: "nodelink::request",
            method = %record.method,
            uri = record.uri,
            body = record.request_body.unwrap_or_default(),
            response = record.response_body,
            "Request body"
        );
    }

    fn on_failure(&self, record: &RequestRecord<'_>, error: &Error) {
        let severity = match error {
            Error::Http { kind, .. } if kind.is_client_error() => Severity::Warning,
            _ => Severity::Error,
        };
        match severity {
            Severity::Warning => tracing::warn!(
                target: "nodelink::request",
                severity = %severity,
                method = %record.method,
                uri = record.uri,
                status = record.status,
                elapsed_ms = record.elapsed.as_millis() as u64,
                response = record.response_body,
                transport_error = record.transport_error,
                error = %error,
                "Request failure"
            ),
            _ => tracing::error!(
                target: "nodelink::request",
                severity = %severity,
                method = %record.method,
                uri = record.uri,
                status = record.status,
                elapsed_ms = record.elapsed.as_millis() as u64,
                response = record.response_body,
                transport_error = record.transport_error,
                error = %error,
                "Request failure"
            ),
        }
    }

    fn on_construction_failure(&self, error: &Error) {
        tracing::error!(
            target: "nodelink::connection",
            severity = %Severity::Critical,
            error = %error,
            "Connection construction failed"
        );
    }
}
