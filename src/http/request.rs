//! Parsed request metadata handed to an exchange context.
//!
//! Real request parsing belongs to the caller: it builds a [`RequestHead`]
//! and passes it to
//! [`ListenerContext::set_request`](crate::context::ListenerContext::set_request)
//! before any handler runs. [`RequestHead::parse`] is only the minimal
//! reader the bundled server uses: request line plus `Name: Value` lines,
//! no continuation lines, bodies ignored.

use http::{Method, Uri};

use crate::http::headers::Headers;

/// Method, target and headers of one request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub headers: Headers,
}

impl RequestHead {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: Headers::new(),
        }
    }

    /// Parse a raw request head (everything up to and including the blank line).
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(raw).ok()?;
        let mut lines = text.split("\r\n");

        let mut parts = lines.next()?.split(' ');
        let method = Method::from_bytes(parts.next()?.as_bytes()).ok()?;
        let uri: Uri = parts.next()?.parse().ok()?;
        let version = parts.next()?;
        if !version.starts_with("HTTP/1.") || parts.next().is_some() {
            return None;
        }

        let mut head = Self::new(method, uri);
        for line in lines.take_while(|line| !line.is_empty()) {
            let (name, value) = line.split_once(':')?;
            head.headers.insert(name.trim(), value.trim());
        }
        Some(head)
    }

    /// Builder-style header addition.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_line_and_headers() {
        let raw = b"GET /status?verbose=1 HTTP/1.1\r\nHost: example.com\r\nAccept: */*\r\n\r\n";
        let head = RequestHead::parse(raw).unwrap();

        assert_eq!(head.method, Method::GET);
        assert_eq!(head.uri.path(), "/status");
        assert_eq!(head.uri.query(), Some("verbose=1"));
        assert_eq!(head.headers.get("host"), Some("example.com"));
        assert_eq!(head.headers.len(), 2);
    }

    #[test]
    fn rejects_garbage() {
        assert!(RequestHead::parse(b"\r\n\r\n").is_none());
        assert!(RequestHead::parse(b"GET /\r\n\r\n").is_none());
        assert!(RequestHead::parse(b"GET / SPDY/3\r\n\r\n").is_none());
        assert!(RequestHead::parse(b"GET / HTTP/1.1\r\nno-colon\r\n\r\n").is_none());
        assert!(RequestHead::parse(&[0xff, 0xfe]).is_none());
    }
}
