//! Header records and their line-oriented file format
//!
//! A header record maps a lower-cased header name to the ordered list of
//! values seen for it. The HTTP status line has no name; it is kept under
//! `None` in memory and written under the reserved `null` token on disk.
//!
//! The file format is one `name=value` line per value. Decoding splits on the
//! first `=` only and silently drops lines that have no separator.

use std::collections::BTreeMap;

use crate::constants::{files, headers};

/// Ordered multi-valued header mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderRecord {
    entries: BTreeMap<Option<String>, Vec<String>>,
}

impl HeaderRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from network-layer headers
    ///
    /// Names are lower-cased. A `transfer-encoding: chunked` header is left
    /// out: replaying it from the cache would make a client expect chunk
    /// framing in the stored body.
    pub fn from_response<'a, I, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Option<&'a str>, V)>,
        V: IntoIterator<Item = String>,
    {
        let mut record = Self::new();
        for (name, values) in pairs {
            for value in values {
                record.append(name, value);
            }
        }

        let chunked = record
            .get(headers::TRANSFER_ENCODING)
            .is_some_and(|v| v.eq_ignore_ascii_case(headers::CHUNKED));
        if chunked {
            record.remove(headers::TRANSFER_ENCODING);
        }

        record
    }

    /// Append a value, lower-casing the name
    pub fn append(&mut self, name: Option<&str>, value: impl Into<String>) {
        let name = name.map(|n| n.to_ascii_lowercase());
        self.entries.entry(name).or_default().push(value.into());
    }

    /// Last value recorded for a header, if any
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).and_then(|values| values.last()).map(String::as_str)
    }

    /// All values recorded for a header, in arrival order
    pub fn get_all(&self, name: &str) -> Option<&[String]> {
        self.entries
            .get(&Some(name.to_ascii_lowercase()))
            .map(Vec::as_slice)
    }

    /// Values of the nameless status line header
    pub fn status_line(&self) -> Option<&[String]> {
        self.entries.get(&None).map(Vec::as_slice)
    }

    /// Remove a header entirely
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.entries.remove(&Some(name.to_ascii_lowercase()))
    }

    /// Iterate over names and their value lists
    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_deref(), values.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct header names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Serialize to the on-disk line format
    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        for (name, values) in &self.entries {
            let name = name.as_deref().unwrap_or(files::STATUS_LINE_TOKEN);
            for value in values {
                out.push_str(name);
                out.push(files::HEADER_SEPARATOR);
                out.push_str(value);
                out.push_str(files::LINE_TERMINATOR);
            }
        }
        out.into_bytes()
    }

    /// Parse the on-disk line format
    ///
    /// Lines without a separator are skipped. Invalid UTF-8 is replaced
    /// rather than rejected.
    pub fn decode(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        let mut record = Self::new();

        for line in text.lines() {
            let Some((name, value)) = line.split_once(files::HEADER_SEPARATOR) else {
                continue;
            };
            let name = (name != files::STATUS_LINE_TOKEN).then_some(name);
            record
                .entries
                .entry(name.map(str::to_string))
                .or_default()
                .push(value.to_string());
        }

        record
    }
}
