//! Connection configuration
//!
//! Configuration arrives as a JSON-shaped map (the same keys a cluster
//! client passes per node): `host`, `port`, `connectionParams` and `auth`.

use std::fmt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
use crate::transport::TransportOptions;
use crate::Result;

/// Port used when the configuration does not name one
pub const DEFAULT_PORT: u16 = 9200;

/// Authentication scheme requested for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthScheme {
    Basic,
    Digest,
    #[serde(rename = "NTLM", alias = "Ntlm")]
    Ntlm,
    Any,
}

impl AuthScheme {
    /// Value of the `http_auth` transport option for this scheme
    pub fn as_option(&self) -> &'static str {
        match self {
            AuthScheme::Basic => "basic",
            AuthScheme::Digest => "digest",
            AuthScheme::Ntlm => "ntlm",
            AuthScheme::Any => "any",
        }
    }

    /// Inverse of [`as_option`](Self::as_option)
    pub fn from_option(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "basic" => Some(AuthScheme::Basic),
            "digest" => Some(AuthScheme::Digest),
            "ntlm" => Some(AuthScheme::Ntlm),
            "any" => Some(AuthScheme::Any),
            _ => None,
        }
    }
}

/// `[username, password, scheme]` credential tuple
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String, AuthScheme)", into = "(String, String, AuthScheme)")]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub scheme: AuthScheme,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>, scheme: AuthScheme) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            scheme,
        }
    }

    /// `username:password`
    pub fn user_pwd(&self) -> String {
        format!("{}:{}", self.username, self.password)
    }
}

impl From<(String, String, AuthScheme)> for Credentials {
    fn from((username, password, scheme): (String, String, AuthScheme)) -> Self {
        Self { username, password, scheme }
    }
}

impl From<Credentials> for (String, String, AuthScheme) {
    fn from(credentials: Credentials) -> Self {
        (credentials.username, credentials.password, credentials.scheme)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("scheme", &self.scheme)
            .finish()
    }
}

/// Configuration of a single node connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    /// Low-level transport overrides merged into every request
    #[serde(default, alias = "connectionParams")]
    pub connection_params: TransportOptions,
    #[serde(default)]
    pub auth: Option<Credentials>,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            connection_params: TransportOptions::new(),
            auth: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_connection_params(mut self, params: TransportOptions) -> Self {
        self.connection_params = params;
        self
    }

    pub fn with_auth(mut self, credentials: Credentials) -> Self {
        self.auth = Some(credentials);
        self
    }

    /// Parse a JSON-shaped configuration map
    pub fn from_value(value: Value) -> Result<Self> {
        let map = value.as_object().ok_or_else(|| crate::Error::Configuration {
            message: "Connection configuration must be a map".to_string(),
            source: None,
        })?;

        if !map.contains_key("host") {
            return Err(crate::Error::MissingConfigKey {
                key: "host".to_string(),
            });
        }

        serde_json::from_value(value).map_err(|e| crate::Error::Configuration {
            message: format!("Invalid connection configuration: {}", e),
            source: Some(anyhow::Error::from(e)),
        })
    }

    /// Configured port, or [`DEFAULT_PORT`]
    pub fn resolved_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Host name without scheme or trailing slash
    pub fn host_name(&self) -> &str {
        let host = self
            .host
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.host);
        host.trim_end_matches('/')
    }

    /// Scheme given in `host`, `http` when none
    pub fn scheme(&self) -> &str {
        self.host
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .unwrap_or("http")
    }

    /// `scheme://host:port`, validated
    pub fn base_url(&self) -> Result<String> {
        if self.host_name().is_empty() {
            return Err(crate::Error::Configuration {
                message: "Host must not be empty".to_string(),
                source: None,
            });
        }

        if self.host_name().contains(['/', '?', '#']) {
            return Err(crate::Error::Configuration {
                message: format!("Host must not carry a path, query or fragment: {}", self.host),
                source: None,
            });
        }

        let base = format!("{}://{}:{}", self.scheme(), self.host_name(), self.resolved_port());
        let parsed = Url::parse(&base).map_err(|e| crate::Error::Configuration {
            message: format!("Invalid node address: {}", base),
            source: Some(anyhow::Error::from(e)),
        })?;
        if parsed.path() != "/" || parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(crate::Error::Configuration {
                message: format!("Invalid node address: {}", base),
                source: None,
            });
        }
        Ok(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{OptionKey, OptionValue};
    use serde_json::json;

    #[test]
    fn test_from_value_full() {
        let config = ConnectionConfig::from_value(json!({
            "host": "search-1.internal",
            "port": 9201,
            "connectionParams": { "timeout_ms": 3000 },
            "auth": ["u", "p", "Digest"]
        }))
        .unwrap();

        assert_eq!(config.host, "search-1.internal");
        assert_eq!(config.resolved_port(), 9201);
        assert_eq!(config.connection_params.get(OptionKey::TimeoutMs), Some(&OptionValue::Number(3000)));
        assert_eq!(config.auth, Some(Credentials::new("u", "p", AuthScheme::Digest)));
    }

    #[test]
    fn test_default_port() {
        let config = ConnectionConfig::from_value(json!({ "host": "localhost" })).unwrap();
        assert_eq!(config.port, None);
        assert_eq!(config.resolved_port(), DEFAULT_PORT);
        assert_eq!(config.base_url().unwrap(), "http://localhost:9200");
    }

    #[test]
    fn test_missing_host() {
        let err = ConnectionConfig::from_value(json!({ "port": 9200 })).unwrap_err();
        assert!(matches!(err, crate::Error::MissingConfigKey { ref key } if key == "host"));
    }

    #[test]
    fn test_not_a_map() {
        let err = ConnectionConfig::from_value(json!(["localhost"])).unwrap_err();
        assert!(matches!(err, crate::Error::Configuration { .. }));
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let err = ConnectionConfig::from_value(json!({
            "host": "localhost",
            "auth": ["u", "p", "Kerberos"]
        }))
        .unwrap_err();
        assert!(matches!(err, crate::Error::Configuration { .. }));
    }

    #[test]
    fn test_ntlm_spellings() {
        let upper: Credentials = serde_json::from_value(json!(["u", "p", "NTLM"])).unwrap();
        let mixed: Credentials = serde_json::from_value(json!(["u", "p", "Ntlm"])).unwrap();
        assert_eq!(upper.scheme, AuthScheme::Ntlm);
        assert_eq!(mixed.scheme, AuthScheme::Ntlm);
    }

    #[test]
    fn test_base_url_keeps_scheme() {
        let config = ConnectionConfig::new("https://secure.example/").with_port(443);
        assert_eq!(config.host_name(), "secure.example");
        assert_eq!(config.base_url().unwrap(), "https://secure.example:443");
    }

    #[test]
    fn test_empty_host_rejected() {
        assert!(ConnectionConfig::new("").base_url().is_err());
    }

    #[test]
    fn test_host_with_path_rejected() {
        for host in ["localhost/es", "http://localhost/es", "localhost?pretty", "localhost#top"] {
            let err = ConnectionConfig::new(host).base_url().unwrap_err();
            assert!(matches!(err, crate::Error::Configuration { .. }), "{} was accepted", host);
        }
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials::new("admin", "hunter2", AuthScheme::Basic);
        let rendered = format!("{:?}", credentials);
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_scheme_option_round_trip() {
        for scheme in [AuthScheme::Basic, AuthScheme::Digest, AuthScheme::Ntlm, AuthScheme::Any] {
            assert_eq!(AuthScheme::from_option(scheme.as_option()), Some(scheme));
        }
    }
}
