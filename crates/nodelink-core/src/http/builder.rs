//! HTTP request builder for node requests
//!
//! Turns a method, path, query parameters and optional body into a
//! [`TransportRequest`] carrying the per-request defaults, the connection's
//! transport options, any per-call overrides and the request-shape options
//! the method demands.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::form_urlencoded;
use crate::transport::{OptionKey, TransportOptions, TransportRequest};
use crate::Result;

/// Connect timeout applied to every request unless overridden
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Total transfer timeout applied to every request unless overridden
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(1000);

/// Query parameters appended to the request path
pub type QueryParams = BTreeMap<String, String>;

/// HTTP methods a connection issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = crate::Error;

    fn from_str(method_str: &str) -> Result<Self> {
        match method_str.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            _ => Err(crate::Error::HttpRequest {
                message: format!("Unsupported HTTP method: {}", method_str),
            }),
        }
    }
}

/// Builder for requests against one node
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: String,
    headers: BTreeMap<String, String>,
    options: TransportOptions,
}

impl RequestBuilder {
    /// Create a builder for `base_url` (scheme, host and port, no trailing slash)
    pub fn new(
        base_url: impl Into<String>,
        headers: BTreeMap<String, String>,
        options: TransportOptions,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            headers,
            options,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Base URL plus path, followed by the form-encoded query when present
    pub fn build_uri(&self, path: &str, params: Option<&QueryParams>) -> String {
        let mut uri = self.base_url.clone();
        if !path.starts_with('/') {
            uri.push('/');
        }
        uri.push_str(path);

        if let Some(params) = params.filter(|p| !p.is_empty()) {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params.iter())
                .finish();
            uri.push('?');
            uri.push_str(&query);
        }
        uri
    }

    /// Assemble the transport request
    ///
    /// A GET carrying a non-empty body goes out as a POST with that body.
    pub fn build_request(
        &self,
        method: Method,
        path: &str,
        params: Option<&QueryParams>,
        body: Option<&str>,
        overrides: Option<&TransportOptions>,
    ) -> TransportRequest {
        let body = body.filter(|b| !b.is_empty());

        let mut options = Self::default_options();
        options.merge(&self.options);
        if let Some(overrides) = overrides {
            options.merge(overrides);
        }

        let wire_method = match (method, body) {
            (Method::Get, Some(_)) => Method::Post,
            (method, _) => method,
        };
        Self::apply_request_shape(&mut options, wire_method);

        TransportRequest {
            url: self.build_uri(path, params),
            method: wire_method,
            body: body.map(|b| b.as_bytes().to_vec()),
            headers: self
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            options,
        }
    }

    fn default_options() -> TransportOptions {
        TransportOptions::new()
            .with(OptionKey::ConnectTimeoutMs, CONNECT_TIMEOUT)
            .with(OptionKey::TimeoutMs, REQUEST_TIMEOUT)
    }

    /// Overwrite whatever the caller set for the keys that decide the request shape
    fn apply_request_shape(options: &mut TransportOptions, wire_method: Method) {
        let shadowed: Vec<OptionKey> = options
            .iter()
            .map(|(key, _)| key)
            .filter(|key| key.is_request_shape())
            .collect();
        for key in shadowed {
            if options.remove(key).is_some() {
                log::debug!("Ignoring caller override for request-shape option {:?}", key);
            }
        }

        options.insert(OptionKey::ShowHeader, true);
        match wire_method {
            Method::Get => {
                options.insert(OptionKey::HttpGet, true);
            }
            Method::Head => {
                options.insert(OptionKey::NoBody, true);
            }
            Method::Put | Method::Delete => {
                options.insert(OptionKey::CustomRequest, wire_method.as_str());
            }
            Method::Post => {}
        }
    }
}
