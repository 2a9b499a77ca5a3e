//! In-memory [`MultiHandle`] that replays scripted responses
//!
//! Each registered transfer consumes the next scripted response. The
//! response controls how many `perform` rounds report "call again", how many
//! rounds the transfer stays pending, and what the transfer finally returns.
//! Everything the handle sees is recorded in a [`TransferLog`] so callers can
//! assert on registration symmetry and on the exact request that was sent.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use serde_json::Value;

use super::{
    Completion, HandleError, MultiHandle, OptionKey, PerformStatus, TransferInfo, TransferOutput,
    TransferToken, TransportRequest, WaitOutcome,
};

/// One scripted transfer result
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub error_code: i32,
    pub error_message: String,
    pub total_time: Duration,
    /// Interim status blocks (e.g. `100 Continue`) emitted before the final one
    pub interim: Vec<u16>,
    /// `perform` rounds reporting "call again" before the transfer progresses
    pub call_again_rounds: u32,
    /// `perform` rounds the transfer stays running before it finishes
    pub pending_rounds: u32,
}

impl ScriptedResponse {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: String::new(),
            error_code: 0,
            error_message: String::new(),
            total_time: Duration::from_millis(3),
            interim: Vec::new(),
            call_again_rounds: 0,
            pending_rounds: 0,
        }
    }

    /// A transfer that fails before any response is received
    pub fn transport_error(code: i32, message: impl Into<String>) -> Self {
        Self {
            status: 0,
            headers: Vec::new(),
            error_code: code,
            error_message: message.into(),
            ..Self::status(0)
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Report a status code alongside a transport error
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn interim(mut self, status: u16) -> Self {
        self.interim.push(status);
        self
    }

    pub fn total_time(mut self, total_time: Duration) -> Self {
        self.total_time = total_time;
        self
    }

    pub fn call_again_rounds(mut self, rounds: u32) -> Self {
        self.call_again_rounds = rounds;
        self
    }

    pub fn pending_rounds(mut self, rounds: u32) -> Self {
        self.pending_rounds = rounds;
        self
    }

    fn render(&self, request: &TransportRequest) -> Vec<u8> {
        if !self.error_message.is_empty() {
            return Vec::new();
        }
        let mut raw = String::new();
        if request.options.flag(OptionKey::ShowHeader).unwrap_or(false) {
            for status in &self.interim {
                raw.push_str(&format!("HTTP/1.1 {} {}\r\n\r\n", status, reason_phrase(*status)));
            }
            raw.push_str(&format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status)));
            for (name, value) in &self.headers {
                raw.push_str(&format!("{}: {}\r\n", name, value));
            }
            raw.push_str("\r\n");
        }
        if !request.options.flag(OptionKey::NoBody).unwrap_or(false) {
            raw.push_str(&self.body);
        }
        raw.into_bytes()
    }
}

/// Everything a [`ScriptedMulti`] was asked to do
#[derive(Debug, Clone, Default)]
pub struct TransferLog {
    /// Requests in registration order
    pub requests: Vec<TransportRequest>,
    pub added: Vec<TransferToken>,
    pub removed: Vec<TransferToken>,
    pub perform_calls: u32,
    pub wait_calls: u32,
}

impl TransferLog {
    /// Registrations not yet matched by a removal
    pub fn outstanding(&self) -> usize {
        self.added
            .iter()
            .filter(|token| !self.removed.contains(token))
            .count()
    }

    /// Number of times `token` was removed
    pub fn removals_of(&self, token: TransferToken) -> usize {
        self.removed.iter().filter(|removed| **removed == token).count()
    }
}

#[derive(Debug)]
struct ActiveTransfer {
    request: TransportRequest,
    response: ScriptedResponse,
    call_again_left: u32,
    pending_left: u32,
    finished: bool,
}

/// Scripted multiplexing handle
#[derive(Debug, Default)]
pub struct ScriptedMulti {
    script: VecDeque<ScriptedResponse>,
    active: BTreeMap<TransferToken, ActiveTransfer>,
    completions: BTreeMap<TransferToken, Completion>,
    next_token: u64,
    wait_outcome: Option<WaitOutcome>,
    perform_failure: Option<HandleError>,
    lose_completions: bool,
    log: TransferLog,
}

impl ScriptedMulti {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next registered transfer
    pub fn respond(mut self, response: ScriptedResponse) -> Self {
        self.script.push_back(response);
        self
    }

    /// Outcome every `wait` call reports; defaults to `Ready(1)`
    pub fn wait_outcome(mut self, outcome: WaitOutcome) -> Self {
        self.wait_outcome = Some(outcome);
        self
    }

    /// Make the next `perform` call fail
    pub fn fail_next_perform(mut self, error: HandleError) -> Self {
        self.perform_failure = Some(error);
        self
    }

    /// Finish transfers without ever posting a completion notification
    pub fn lose_completions(mut self) -> Self {
        self.lose_completions = true;
        self
    }

    pub fn log(&self) -> &TransferLog {
        &self.log
    }

    /// Responses still waiting to be consumed
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl MultiHandle for ScriptedMulti {
    fn add(&mut self, request: TransportRequest) -> Result<TransferToken, HandleError> {
        let response = self
            .script
            .pop_front()
            .ok_or_else(|| HandleError::new("add", -1, "no scripted response left"))?;

        self.next_token += 1;
        let token = TransferToken::new(self.next_token);
        self.log.requests.push(request.clone());
        self.log.added.push(token);
        self.active.insert(
            token,
            ActiveTransfer {
                request,
                call_again_left: response.call_again_rounds,
                pending_left: response.pending_rounds,
                response,
                finished: false,
            },
        );
        Ok(token)
    }

    fn perform(&mut self) -> Result<PerformStatus, HandleError> {
        self.log.perform_calls += 1;
        if let Some(error) = self.perform_failure.take() {
            return Err(error);
        }

        let mut call_again = false;
        for (token, transfer) in self.active.iter_mut().filter(|(_, t)| !t.finished) {
            if transfer.call_again_left > 0 {
                transfer.call_again_left -= 1;
                call_again = true;
            } else if transfer.pending_left > 0 {
                transfer.pending_left -= 1;
            } else {
                transfer.finished = true;
                if !self.lose_completions {
                    self.completions.insert(
                        *token,
                        Completion::failed(
                            transfer.response.error_code,
                            transfer.response.error_message.clone(),
                        ),
                    );
                }
            }
        }

        let running = self.active.values().filter(|t| !t.finished).count() as u32;
        Ok(PerformStatus { call_again, running })
    }

    fn wait(&mut self, _timeout: Duration) -> Result<WaitOutcome, HandleError> {
        self.log.wait_calls += 1;
        Ok(self.wait_outcome.unwrap_or(WaitOutcome::Ready(1)))
    }

    fn take_completion(&mut self, token: TransferToken) -> Option<Completion> {
        self.completions.remove(&token)
    }

    fn remove(&mut self, token: TransferToken) -> Result<TransferOutput, HandleError> {
        let transfer = self
            .active
            .remove(&token)
            .ok_or_else(|| HandleError::new("remove", -1, format!("unknown transfer {}", token)))?;
        self.completions.remove(&token);
        self.log.removed.push(token);

        let mut extra = BTreeMap::new();
        extra.insert("url".to_string(), Value::String(transfer.request.url.clone()));
        extra.insert(
            "method".to_string(),
            Value::String(transfer.request.method.as_str().to_string()),
        );

        Ok(TransferOutput {
            body: transfer.response.render(&transfer.request),
            info: TransferInfo {
                status: transfer.response.status,
                total_time: transfer.response.total_time,
                extra,
            },
        })
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
