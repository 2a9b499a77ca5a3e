//! Successful responses handed back to callers

use serde::de::DeserializeOwned;
use crate::transport::TransferInfo;
use crate::Result;

/// A response that passed classification
///
/// Unclassified 4xx statuses are returned as responses too, so callers
/// should look at [`status`](Self::status) before trusting the body.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    /// Response body; always empty for HEAD requests
    pub text: String,
    pub headers: Vec<(String, String)>,
    pub info: TransferInfo,
}

impl Response {
    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 4xx status that the classifier let through
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// First header value matching `name`, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn response(status: u16, text: &str) -> Response {
        Response {
            status,
            text: text.to_string(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            info: TransferInfo::default(),
        }
    }

    #[test]
    fn test_status_helpers() {
        assert!(response(200, "").is_success());
        assert!(!response(304, "").is_success());
        assert!(response(429, "").is_client_error());
    }

    #[test]
    fn test_json_decoding() {
        let value: Value = response(200, "{\"found\":true}").json().unwrap();
        assert_eq!(value["found"], Value::Bool(true));

        let err = response(200, "not json").json::<Value>().unwrap_err();
        assert!(matches!(err, crate::Error::Json { .. }));
    }

    #[test]
    fn test_header_lookup() {
        assert_eq!(response(200, "").header("content-type"), Some("application/json"));
        assert_eq!(response(200, "").header("etag"), None);
    }
}
