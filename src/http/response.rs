//! Response preamble serialization.
//!
//! # Wire format
//! ```text
//! HTTP/1.1 <code> <reason>\r\n
//! <Name>: <Value>\r\n        (zero or more, insertion order)
//! \r\n
//! ```
//!
//! No body bytes are produced here.

use http::StatusCode;

use crate::context::ContextError;
use crate::http::headers::Headers;

pub const CONTENT_LENGTH: &str = "Content-Length";

/// Reason phrase written after the numeric code.
///
/// This is the registered phrase (`404 Not Found`). Codes without one, such
/// as 599, are written as `Unknown`.
pub fn reason_phrase(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown")
}

/// Build the status line and header block for `status`.
///
/// Fails without producing anything if a header cannot be written as-is.
pub fn preamble(status: StatusCode, headers: &Headers) -> Result<String, ContextError> {
    headers.validate()?;

    let mut lines = Vec::with_capacity(headers.len() + 2);
    lines.push(format!("HTTP/1.1 {} {}", status.as_u16(), reason_phrase(status)));
    for (name, value) in headers.iter() {
        lines.push(format!("{name}: {value}"));
    }
    lines.push("\r\n".to_string());

    Ok(lines.join("\r\n"))
}
