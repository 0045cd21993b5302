//! Insertion-ordered header map.
//!
//! Headers are serialized one `Name: Value` line per entry, in the order
//! they were first inserted. Names compare case-insensitively; inserting a
//! name that already exists replaces the value in place.
//!
//! A `Headers` value has a single owner at a time (the exchange context it
//! belongs to), so it carries no locking.

use crate::context::ContextError;

/// Ordered collection of header name/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header, returning the previous value if any.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(index) => Some(std::mem::replace(&mut self.entries[index].1, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Look up a header value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|index| self.entries[index].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Remove a header, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|index| self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Check every entry can be written to the wire as-is.
    ///
    /// Names must be non-empty RFC 9110 tokens; values must not contain
    /// CR, LF or NUL.
    pub fn validate(&self) -> Result<(), ContextError> {
        for (name, value) in &self.entries {
            if name.is_empty() {
                return Err(ContextError::MalformedHeader {
                    name: name.clone(),
                    reason: "empty header name",
                });
            }
            if !name.bytes().all(is_token_byte) {
                return Err(ContextError::MalformedHeader {
                    name: name.clone(),
                    reason: "header name is not a token",
                });
            }
            if value.bytes().any(|b| matches!(b, b'\r' | b'\n' | b'\0')) {
                return Err(ContextError::MalformedHeader {
                    name: name.clone(),
                    reason: "header value contains CR, LF or NUL",
                });
            }
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
        )
}
