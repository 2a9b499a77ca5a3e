//! Authentication handling for node connections
//!
//! Credentials are consumed once, when a connection is created:
//! - Basic: a pre-encoded `Authorization` header plus the transport flag
//! - Digest, NTLM, Any: only the transport flag, the transport negotiates
//!
//! Every scheme also gets the `user_pwd` transport option. The credential
//! tuple itself is stripped from the configuration afterwards.

use std::collections::BTreeMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crate::config::{AuthScheme, ConnectionConfig, Credentials};
use crate::transport::{OptionKey, TransportOptions};

/// Trait for scheme-specific credential handling
pub trait AuthHandler: Send + Sync {
    /// Apply authentication to headers and transport options
    fn apply_auth(&self, headers: &mut BTreeMap<String, String>, options: &mut TransportOptions);
}

/// Basic authentication, pre-encoded so backends that do not encode it still send it
#[derive(Debug, Clone)]
pub struct BasicAuth {
    credentials: Credentials,
}

impl BasicAuth {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// `Basic <base64(username:password)>`
    pub fn header_value(&self) -> String {
        format!("Basic {}", STANDARD.encode(self.credentials.user_pwd()))
    }
}

impl AuthHandler for BasicAuth {
    fn apply_auth(&self, headers: &mut BTreeMap<String, String>, options: &mut TransportOptions) {
        headers.insert("Authorization".to_string(), self.header_value());
        options.insert(OptionKey::HttpAuth, AuthScheme::Basic.as_option());
        options.insert(OptionKey::UserPwd, self.credentials.user_pwd());
    }
}

/// Schemes negotiated by the transport itself (Digest, NTLM, Any)
#[derive(Debug, Clone)]
pub struct NegotiatedAuth {
    credentials: Credentials,
}

impl NegotiatedAuth {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl AuthHandler for NegotiatedAuth {
    fn apply_auth(&self, _headers: &mut BTreeMap<String, String>, options: &mut TransportOptions) {
        options.insert(OptionKey::HttpAuth, self.credentials.scheme.as_option());
        options.insert(OptionKey::UserPwd, self.credentials.user_pwd());
    }
}

/// Factory for the handler matching the credential scheme
pub fn create_auth_handler(credentials: Credentials) -> Box<dyn AuthHandler> {
    match credentials.scheme {
        AuthScheme::Basic => Box::new(BasicAuth::new(credentials)),
        AuthScheme::Digest | AuthScheme::Ntlm | AuthScheme::Any => {
            Box::new(NegotiatedAuth::new(credentials))
        }
    }
}

/// Configuration after credentials were folded into transport options
#[derive(Debug, Clone, PartialEq)]
pub struct AuthTransform {
    /// Configuration with `auth` removed
    pub config: ConnectionConfig,
    /// Headers to send with every request
    pub headers: BTreeMap<String, String>,
}

/// Consume the credentials in `config`
pub fn transform_config(mut config: ConnectionConfig) -> AuthTransform {
    let mut headers = BTreeMap::new();
    if let Some(credentials) = config.auth.take() {
        create_auth_handler(credentials).apply_auth(&mut headers, &mut config.connection_params);
    }
    AuthTransform { config, headers }
}
