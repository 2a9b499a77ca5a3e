//! Raw response parsing
//!
//! With header capture on, the transport hands back status line, headers and
//! body in one buffer. Interim blocks (`100 Continue`, auth challenges that
//! were answered on the same transfer, proxy `CONNECT` replies) precede the
//! final block; only the final one is kept.

/// Response split into status, headers and body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    /// Status from the final status line, if one was present
    pub status: Option<u16>,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ParsedResponse {
    /// First header value matching `name`, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Turns captured bytes into a [`ParsedResponse`]
pub trait ResponseParser: Send + Sync {
    /// `final_status` is the status the transport reported for the exchange,
    /// when it reported one
    fn parse(&self, raw: &[u8], final_status: Option<u16>) -> ParsedResponse;
}

/// Parser for HTTP/1.x style header blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpResponseParser;

impl ResponseParser for HttpResponseParser {
    fn parse(&self, raw: &[u8], final_status: Option<u16>) -> ParsedResponse {
        let text = String::from_utf8_lossy(raw);
        let mut rest: &str = &text;
        let mut parsed = ParsedResponse::default();

        while rest.starts_with("HTTP/") {
            let (block, remainder) = split_block(rest);
            let mut lines = block.lines();
            let (status, reason) = lines.next().map(parse_status_line).unwrap_or((None, String::new()));
            parsed.status = status;
            parsed.reason = reason;
            parsed.headers = lines
                .filter_map(|line| line.split_once(':'))
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .collect();
            rest = remainder;

            if is_final_block(parsed.status, &parsed.reason, final_status) {
                break;
            }
        }

        parsed.body = rest.to_string();
        parsed
    }
}

/// Whether a header block ends the header section
///
/// Interim blocks are 1xx replies, proxy tunnel replies and, when the
/// transport reported a different final status, challenges it answered on
/// the same transfer.
fn is_final_block(status: Option<u16>, reason: &str, final_status: Option<u16>) -> bool {
    let Some(status) = status else {
        return true;
    };
    if (100..200).contains(&status) {
        return final_status == Some(status);
    }
    if status == 200 && reason.eq_ignore_ascii_case("Connection established") && final_status.is_some() {
        return false;
    }
    final_status.map_or(true, |expected| expected == status)
}

/// Split off one header block, tolerating bare `\n` separators
fn split_block(text: &str) -> (&str, &str) {
    if let Some(index) = text.find("\r\n\r\n") {
        (&text[..index], &text[index + 4..])
    } else if let Some(index) = text.find("\n\n") {
        (&text[..index], &text[index + 2..])
    } else {
        (text, "")
    }
}

fn parse_status_line(line: &str) -> (Option<u16>, String) {
    let mut parts = line.trim_end().splitn(3, ' ');
    let _version = parts.next();
    let status = parts.next().and_then(|code| code.parse::<u16>().ok());
    let reason = parts.next().unwrap_or_default().to_string();
    (status, reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_response() {
        let raw = b"HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\nX-Opaque-Id: abc\r\n\r\n{\"error\":\"not found\"}";
        let parsed = HttpResponseParser.parse(raw, None);

        assert_eq!(parsed.status, Some(404));
        assert_eq!(parsed.reason, "Not Found");
        assert_eq!(parsed.header("content-type"), Some("application/json"));
        assert_eq!(parsed.header("X-Opaque-Id"), Some("abc"));
        assert_eq!(parsed.body, "{\"error\":\"not found\"}");
    }

    #[test]
    fn test_interim_blocks_are_skipped() {
        let raw = b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 201 Created\r\nLocation: /idx/_doc/1\r\n\r\n{\"result\":\"created\"}";
        let parsed = HttpResponseParser.parse(raw, None);

        assert_eq!(parsed.status, Some(201));
        assert_eq!(parsed.headers, vec![("Location".to_string(), "/idx/_doc/1".to_string())]);
        assert_eq!(parsed.body, "{\"result\":\"created\"}");
    }

    #[test]
    fn test_headers_without_body() {
        let parsed = HttpResponseParser.parse(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n", Some(200));
        assert_eq!(parsed.status, Some(200));
        assert_eq!(parsed.body, "");
    }

    #[test]
    fn test_body_without_status_line() {
        let parsed = HttpResponseParser.parse(b"{\"ok\":true}", None);
        assert_eq!(parsed.status, None);
        assert!(parsed.headers.is_empty());
        assert_eq!(parsed.body, "{\"ok\":true}");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(HttpResponseParser.parse(b"", None), ParsedResponse::default());
    }

    #[test]
    fn test_bare_newlines() {
        let parsed = HttpResponseParser.parse(b"HTTP/1.0 200 OK\nServer: test\n\nbody", None);
        assert_eq!(parsed.status, Some(200));
        assert_eq!(parsed.header("server"), Some("test"));
        assert_eq!(parsed.body, "body");
    }

    #[test]
    fn test_body_starting_with_status_line_is_kept() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nHTTP/1.1 is the protocol\n\nrest";

        for final_status in [Some(200), None] {
            let parsed = HttpResponseParser.parse(raw, final_status);
            assert_eq!(parsed.status, Some(200));
            assert_eq!(parsed.header("content-type"), Some("text/plain"));
            assert_eq!(parsed.body, "HTTP/1.1 is the protocol\n\nrest");
        }
    }

    #[test]
    fn test_answered_challenge_is_skipped() {
        let raw = b"HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Digest realm=\"es\"\r\n\r\nHTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{}";
        let parsed = HttpResponseParser.parse(raw, Some(200));

        assert_eq!(parsed.status, Some(200));
        assert_eq!(parsed.header("www-authenticate"), None);
        assert_eq!(parsed.body, "{}");
    }

    #[test]
    fn test_unanswered_challenge_is_final() {
        let raw = b"HTTP/1.1 401 Unauthorized\r\n\r\n{\"error\":\"security_exception\"}";
        let parsed = HttpResponseParser.parse(raw, Some(401));

        assert_eq!(parsed.status, Some(401));
        assert_eq!(parsed.body, "{\"error\":\"security_exception\"}");
    }

    #[test]
    fn test_proxy_tunnel_reply_is_skipped() {
        let raw = b"HTTP/1.1 200 Connection established\r\n\r\nHTTP/1.1 404 Not Found\r\n\r\n{}";
        let parsed = HttpResponseParser.parse(raw, Some(404));

        assert_eq!(parsed.status, Some(404));
        assert_eq!(parsed.body, "{}");
    }
}
