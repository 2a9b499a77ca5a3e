//! libcurl multi-handle transport

use std::collections::HashMap;
use std::time::Duration;
use ::curl::easy::{Auth, Easy2, Handler, List, WriteError};
use ::curl::multi::{Easy2Handle, Multi};
use serde_json::Value;

use super::{
    Completion, HandleError, MultiHandle, OptionKey, PerformStatus, TransferInfo, TransferOutput,
    TransferToken, TransportOptions, TransportRequest, WaitOutcome,
};
use crate::config::AuthScheme;
use crate::http::Method;

/// Buffers everything libcurl writes for one transfer
#[derive(Debug, Default)]
struct Collector(Vec<u8>);

impl Handler for Collector {
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        self.0.extend_from_slice(data);
        Ok(data.len())
    }
}

/// [`MultiHandle`] backed by a libcurl multi handle
pub struct CurlMulti {
    multi: Multi,
    transfers: HashMap<TransferToken, Easy2Handle<Collector>>,
    completions: HashMap<TransferToken, Completion>,
    next_id: u64,
}

// SAFETY: libcurl handles may move between threads as long as they are never
// used concurrently; every access goes through `&mut self`.
unsafe impl Send for CurlMulti {}

impl CurlMulti {
    pub fn new() -> Self {
        Self {
            multi: Multi::new(),
            transfers: HashMap::new(),
            completions: HashMap::new(),
            next_id: 0,
        }
    }

    /// Move finished-transfer notices from libcurl into `completions`
    fn collect_messages(&mut self) {
        let transfers = &self.transfers;
        let completions = &mut self.completions;
        self.multi.messages(|message| {
            let Ok(id) = message.token() else { return };
            let token = TransferToken::new(id as u64);
            let Some(handle) = transfers.get(&token) else { return };
            if let Some(result) = message.result_for2(handle) {
                let completion = match result {
                    Ok(()) => Completion::ok(),
                    Err(e) => Completion::failed(
                        e.code() as i32,
                        e.extra_description().unwrap_or(e.description()).to_string(),
                    ),
                };
                completions.insert(token, completion);
            }
        });
    }
}

impl Default for CurlMulti {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiHandle for CurlMulti {
    fn add(&mut self, request: TransportRequest) -> Result<TransferToken, HandleError> {
        let easy = configure(&request).map_err(|e| easy_error("add", e))?;
        let mut handle = self
            .multi
            .add2(easy)
            .map_err(|e| HandleError::new("add", e.code() as i32, e.description()))?;

        self.next_id += 1;
        let token = TransferToken::new(self.next_id);
        handle
            .set_token(self.next_id as usize)
            .map_err(|e| easy_error("add", e))?;
        self.transfers.insert(token, handle);
        Ok(token)
    }

    fn perform(&mut self) -> Result<PerformStatus, HandleError> {
        let running = self
            .multi
            .perform()
            .map_err(|e| HandleError::new("perform", e.code() as i32, e.description()))?;
        self.collect_messages();
        // Modern libcurl never asks to be called again straight away
        Ok(PerformStatus {
            call_again: false,
            running,
        })
    }

    fn wait(&mut self, timeout: Duration) -> Result<WaitOutcome, HandleError> {
        let ready = self
            .multi
            .wait(&mut [], timeout)
            .map_err(|e| HandleError::new("wait", e.code() as i32, e.description()))?;
        Ok(match ready {
            0 => WaitOutcome::NothingReady,
            n => WaitOutcome::Ready(n),
        })
    }

    fn take_completion(&mut self, token: TransferToken) -> Option<Completion> {
        self.completions.remove(&token)
    }

    fn remove(&mut self, token: TransferToken) -> Result<TransferOutput, HandleError> {
        self.completions.remove(&token);
        let handle = self
            .transfers
            .remove(&token)
            .ok_or_else(|| HandleError::new("remove", -1, format!("unknown transfer {}", token)))?;
        let mut easy = self
            .multi
            .remove2(handle)
            .map_err(|e| HandleError::new("remove", e.code() as i32, e.description()))?;

        let mut info = TransferInfo {
            status: easy.response_code().map(|code| code as u16).unwrap_or(0),
            total_time: easy.total_time().unwrap_or_default(),
            extra: Default::default(),
        };
        if let Ok(Some(url)) = easy.effective_url() {
            info.extra.insert("url".to_string(), Value::from(url));
        }
        if let Ok(Some(ip)) = easy.primary_ip() {
            info.extra.insert("primary_ip".to_string(), Value::from(ip));
        }

        Ok(TransferOutput {
            body: std::mem::take(&mut easy.get_mut().0),
            info,
        })
    }
}

fn easy_error(operation: &'static str, e: ::curl::Error) -> HandleError {
    HandleError::new(operation, e.code() as i32, e.description())
}

fn configure(request: &TransportRequest) -> Result<Easy2<Collector>, ::curl::Error> {
    let mut easy = Easy2::new(Collector::default());
    easy.url(&request.url)?;

    let mut headers = List::new();
    for line in request.header_lines() {
        headers.append(&line)?;
    }
    easy.http_headers(headers)?;

    let options = &request.options;
    if options.flag(OptionKey::HttpGet) == Some(true) {
        easy.get(true)?;
    }
    if options.flag(OptionKey::NoBody) == Some(true) {
        easy.nobody(true)?;
    }
    if let Some(method) = options.text(OptionKey::CustomRequest) {
        easy.custom_request(method)?;
    }
    if request.method == Method::Post {
        easy.post(true)?;
    }
    if let Some(body) = &request.body {
        easy.post_fields_copy(body)?;
    }

    apply_options(&mut easy, options)?;
    Ok(easy)
}

fn apply_options(easy: &mut Easy2<Collector>, options: &TransportOptions) -> Result<(), ::curl::Error> {
    if let Some(show) = options.flag(OptionKey::ShowHeader) {
        easy.show_header(show)?;
    }
    if let Some(timeout) = options.millis(OptionKey::ConnectTimeoutMs) {
        easy.connect_timeout(timeout)?;
    }
    if let Some(timeout) = options.millis(OptionKey::TimeoutMs) {
        easy.timeout(timeout)?;
    }
    if let Some(scheme) = options.text(OptionKey::HttpAuth).and_then(AuthScheme::from_option) {
        easy.http_auth(&auth_for(scheme))?;
    }
    if let Some((user, password)) = options
        .text(OptionKey::UserPwd)
        .and_then(|pair| pair.split_once(':'))
    {
        easy.username(user)?;
        easy.password(password)?;
    }
    if let Some(follow) = options.flag(OptionKey::FollowLocation) {
        easy.follow_location(follow)?;
    }
    if let Some(verbose) = options.flag(OptionKey::Verbose) {
        easy.verbose(verbose)?;
    }
    if let Some(verify) = options.flag(OptionKey::SslVerifyPeer) {
        easy.ssl_verify_peer(verify)?;
    }
    if let Some(verify) = options.flag(OptionKey::SslVerifyHost) {
        easy.ssl_verify_host(verify)?;
    }
    if let Some(proxy) = options.text(OptionKey::Proxy) {
        easy.proxy(proxy)?;
    }
    if let Some(agent) = options.text(OptionKey::UserAgent) {
        easy.useragent(agent)?;
    }
    if let Some(keepalive) = options.flag(OptionKey::TcpKeepalive) {
        easy.tcp_keepalive(keepalive)?;
    }
    Ok(())
}

fn auth_for(scheme: AuthScheme) -> Auth {
    let mut auth = Auth::new();
    match scheme {
        AuthScheme::Basic => auth.basic(true),
        AuthScheme::Digest => auth.digest(true),
        AuthScheme::Ntlm => auth.ntlm(true),
        AuthScheme::Any => auth.basic(true).digest(true).ntlm(true),
    };
    auth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_transfer_cannot_be_removed() {
        let mut multi = CurlMulti::new();
        let err = multi.remove(TransferToken::new(42)).unwrap_err();
        assert_eq!(err.operation, "remove");
        assert_eq!(err.code, -1);
    }

    #[test]
    fn test_nothing_registered_means_nothing_running() {
        let mut multi = CurlMulti::new();
        assert_eq!(multi.perform().unwrap().running, 0);
        assert!(multi.take_completion(TransferToken::new(1)).is_none());
    }
}
