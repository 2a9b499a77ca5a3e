//! Poll-driven execution of a single request
//!
//! The executor registers one transfer on the shared handle and drives the
//! handle until that transfer reports completion:
//!
//! 1. call `perform` while it asks to be called again, without sleeping
//! 2. collect the completion notice for our transfer, if there is one
//! 3. otherwise block in `wait` for at most [`WAIT_TIMEOUT`]; when the wait
//!    comes back with nothing ready, back off for [`IDLE_BACKOFF`]
//!
//! The overall duration is bounded by the timeouts configured on the request
//! itself, not by this loop. Registration is held by a guard so the transfer
//! is removed from the handle exactly once on every exit path.

use std::sync::{MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use crate::transport::{
    MultiHandle, PerformStatus, SharedMultiHandle, TransferInfo, TransferOutput, TransferToken,
    TransportRequest, WaitOutcome,
};
use crate::Result;

/// Upper bound of a single readiness wait
pub const WAIT_TIMEOUT: Duration = Duration::from_millis(500);

/// Pause after a wait that returned with nothing ready, so the loop does not spin
pub const IDLE_BACKOFF: Duration = Duration::from_micros(100);

/// Polling knobs; the defaults suit libcurl on Linux
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    pub wait_timeout: Duration,
    /// Zero disables the backoff
    pub idle_backoff: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            wait_timeout: WAIT_TIMEOUT,
            idle_backoff: IDLE_BACKOFF,
        }
    }
}

/// Raw outcome of one executed request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestResult {
    pub body: Vec<u8>,
    /// `0` when the transport succeeded
    pub error_code: i32,
    /// Empty when the transport succeeded
    pub error_message: String,
    pub info: TransferInfo,
}

impl RequestResult {
    pub fn is_transport_failure(&self) -> bool {
        !self.error_message.is_empty()
    }
}

/// Drives one request to completion on a shared handle
pub struct PollingExecutor<'a> {
    multi: &'a SharedMultiHandle,
    config: PollingConfig,
}

impl<'a> PollingExecutor<'a> {
    pub fn new(multi: &'a SharedMultiHandle, config: PollingConfig) -> Self {
        Self { multi, config }
    }

    /// Register `request`, poll until it completes and deregister it
    pub fn execute(&self, request: TransportRequest) -> Result<RequestResult> {
        let token = lock_handle(self.multi).add(request)?;
        let mut registration = Registration {
            multi: self.multi,
            token,
            released: false,
        };
        tracing::trace!(target: "nodelink::executor", transfer = %token, "Transfer registered");

        loop {
            let status = self.drive()?;

            let completion = lock_handle(self.multi).take_completion(token);
            if let Some(completion) = completion {
                let output = registration.release()?;
                tracing::trace!(
                    target: "nodelink::executor",
                    transfer = %token,
                    error_code = completion.error_code,
                    "Transfer finished"
                );
                return Ok(RequestResult {
                    body: output.body,
                    error_code: completion.error_code,
                    error_message: completion.error_message,
                    info: output.info,
                });
            }

            if status.running == 0 {
                return Err(crate::Error::Transport {
                    code: -1,
                    message: format!("Transfer {} stopped without reporting completion", token),
                });
            }

            let outcome = lock_handle(self.multi).wait(self.config.wait_timeout)?;
            if outcome == WaitOutcome::NothingReady && !self.config.idle_backoff.is_zero() {
                thread::sleep(self.config.idle_backoff);
            }
        }
    }

    /// Call `perform` until it stops asking to be called again
    fn drive(&self) -> Result<PerformStatus> {
        loop {
            let status = lock_handle(self.multi).perform()?;
            if !status.call_again {
                return Ok(status);
            }
        }
    }
}

/// Keeps a transfer registered until released or dropped
struct Registration<'a> {
    multi: &'a SharedMultiHandle,
    token: TransferToken,
    released: bool,
}

impl Registration<'_> {
    fn release(&mut self) -> Result<TransferOutput> {
        self.released = true;
        Ok(lock_handle(self.multi).remove(self.token)?)
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = lock_handle(self.multi).remove(self.token) {
            log::warn!("Failed to deregister transfer {}: {}", self.token, e);
        }
    }
}

/// A panic while the handle was locked leaves it usable for deregistration
fn lock_handle(multi: &SharedMultiHandle) -> MutexGuard<'_, dyn MultiHandle + Send + 'static> {
    multi.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
        log::warn!("Multiplexing handle lock was poisoned; continuing");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use crate::http::Method;
    use crate::transport::{
        HandleError, OptionKey, ScriptedMulti, ScriptedResponse, TransportOptions,
    };

    fn request() -> TransportRequest {
        TransportRequest {
            url: "http://localhost:9200/".to_string(),
            method: Method::Get,
            body: None,
            headers: Vec::new(),
            options: TransportOptions::new().with(OptionKey::ShowHeader, true),
        }
    }

    fn run(multi: ScriptedMulti) -> (Result<RequestResult>, Arc<Mutex<ScriptedMulti>>) {
        let scripted = Arc::new(Mutex::new(multi));
        let shared: SharedMultiHandle = scripted.clone();
        let result = PollingExecutor::new(&shared, PollingConfig::default()).execute(request());
        (result, scripted)
    }

    #[test]
    fn test_immediate_completion() {
        let (result, scripted) = run(ScriptedMulti::new().respond(ScriptedResponse::status(200).body("{}")));
        let result = result.unwrap();

        assert_eq!(result.info.status, 200);
        assert!(!result.is_transport_failure());
        assert!(String::from_utf8(result.body).unwrap().ends_with("{}"));

        let multi = scripted.lock().unwrap();
        assert_eq!(multi.log().perform_calls, 1);
        assert_eq!(multi.log().wait_calls, 0);
        assert_eq!(multi.log().outstanding(), 0);
    }

    #[test]
    fn test_call_again_rounds_do_not_wait() {
        let (result, scripted) = run(
            ScriptedMulti::new().respond(ScriptedResponse::status(200).call_again_rounds(3)),
        );
        assert!(result.is_ok());

        let multi = scripted.lock().unwrap();
        assert_eq!(multi.log().perform_calls, 4);
        assert_eq!(multi.log().wait_calls, 0);
    }

    #[test]
    fn test_pending_transfer_waits_between_rounds() {
        let (result, scripted) = run(
            ScriptedMulti::new()
                .respond(ScriptedResponse::status(201).pending_rounds(2))
                .wait_outcome(WaitOutcome::NothingReady),
        );
        assert_eq!(result.unwrap().info.status, 201);

        let multi = scripted.lock().unwrap();
        assert_eq!(multi.log().perform_calls, 3);
        assert_eq!(multi.log().wait_calls, 2);
        assert_eq!(multi.log().outstanding(), 0);
    }

    #[test]
    fn test_transport_error_is_returned_as_result() {
        let (result, scripted) = run(
            ScriptedMulti::new().respond(ScriptedResponse::transport_error(7, "Failed to connect")),
        );
        let result = result.unwrap();

        assert!(result.is_transport_failure());
        assert_eq!(result.error_code, 7);
        assert_eq!(result.error_message, "Failed to connect");
        assert_eq!(scripted.lock().unwrap().log().outstanding(), 0);
    }

    #[test]
    fn test_perform_failure_aborts_and_deregisters() {
        let (result, scripted) = run(
            ScriptedMulti::new()
                .respond(ScriptedResponse::status(200))
                .fail_next_perform(HandleError::new("perform", 3, "bad handle")),
        );

        assert!(matches!(result, Err(crate::Error::Transport { code: 3, .. })));

        let multi = scripted.lock().unwrap();
        assert_eq!(multi.log().perform_calls, 1);
        assert_eq!(multi.log().added.len(), 1);
        assert_eq!(multi.log().removals_of(multi.log().added[0]), 1);
    }

    #[test]
    fn test_lost_completion_fails_and_deregisters() {
        let (result, scripted) = run(
            ScriptedMulti::new()
                .respond(ScriptedResponse::status(200))
                .lose_completions(),
        );

        assert!(matches!(result, Err(crate::Error::Transport { code: -1, .. })));
        assert_eq!(scripted.lock().unwrap().log().outstanding(), 0);
    }

    #[test]
    fn test_add_failure_registers_nothing() {
        let (result, scripted) = run(ScriptedMulti::new());
        assert!(matches!(result, Err(crate::Error::Transport { .. })));
        assert!(scripted.lock().unwrap().log().removed.is_empty());
    }

    #[test]
    fn test_default_polling_config() {
        let config = PollingConfig::default();
        assert_eq!(config.wait_timeout, Duration::from_millis(500));
        assert_eq!(config.idle_backoff, Duration::from_micros(100));
    }
}
