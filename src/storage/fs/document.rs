//! Memory document format
//!
//! ```text
//! ---
//! created_at: 2026-01-01T09:00:00Z
//! updated_at: 2026-01-02T10:30:00Z
//! tags:
//! - setup
//! source: user
//! expires_at: 2026-02-01T00:00:00Z
//! citations:
//! - README.md
//! ---
//! Install steps
//! ```
//!
//! The body after the closing delimiter is kept verbatim.

use crate::domain::memory::{Memory, MemoryMetadata, Tags};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DELIMITER: &str = "---";

/// Header fields as written on disk. Every field is optional so that legacy
/// or hand-edited documents can still be indexed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<String>,
}

impl From<&MemoryMetadata> for DocumentHeader {
    fn from(meta: &MemoryMetadata) -> Self {
        Self {
            created_at: Some(meta.created_at),
            updated_at: Some(meta.updated_at),
            tags: meta.tags.to_vec(),
            source: meta.source.clone(),
            expires_at: meta.expires_at,
            citations: meta.citations.clone(),
        }
    }
}

/// Split a document into raw header text and body
fn split(raw: &str) -> Option<(&str, &str)> {
    let rest = raw
        .strip_prefix("---\n")
        .or_else(|| raw.strip_prefix("---\r\n"))?;
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(|c| c == '\r' || c == '\n') == DELIMITER {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Parse only the header, returning it with the body
pub fn parse_header(raw: &str) -> std::result::Result<(DocumentHeader, &str), String> {
    let (header, body) =
        split(raw).ok_or_else(|| "missing '---' delimited metadata header".to_string())?;
    if header.trim().is_empty() {
        return Ok((DocumentHeader::default(), body));
    }
    let parsed: DocumentHeader =
        serde_yaml::from_str(header).map_err(|e| format!("invalid metadata header: {}", e))?;
    Ok((parsed, body))
}

/// Parse a full document into a validated memory. A legacy document without
/// `updated_at` is read as last updated at creation.
pub fn parse(raw: &str, file: &Path) -> Result<Memory> {
    let fail = |reason: String| Error::Parse {
        path: file.to_path_buf(),
        reason,
    };
    let (header, body) = parse_header(raw).map_err(fail)?;
    let created_at = header
        .created_at
        .ok_or_else(|| fail("metadata header has no created_at".to_string()))?;
    let tags = Tags::new(header.tags).map_err(|e| fail(e.to_string()))?;
    let metadata = MemoryMetadata {
        created_at,
        updated_at: header.updated_at.unwrap_or(created_at),
        tags,
        source: header.source,
        citations: header.citations,
        expires_at: header.expires_at,
    };
    Memory::new(body, metadata).map_err(|e| fail(e.to_string()))
}

/// Render a memory as a document
pub fn serialize(memory: &Memory) -> Result<String> {
    let header = serde_yaml::to_string(&DocumentHeader::from(memory.metadata()))?;
    Ok(format!(
        "{delim}\n{header}{delim}\n{body}",
        delim = DELIMITER,
        header = header,
        body = memory.content()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::memory::MemoryBuilder;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_roundtrip_full_metadata() {
        let memory = MemoryBuilder::new("Install steps\n\n1. cargo build\n")
            .tag("setup")
            .tag("docs")
            .source("cli")
            .citation("README.md")
            .citation("https://example.com/guide")
            .created_at(t0())
            .expires_at(Some(t0() + Duration::days(30)))
            .build()
            .unwrap();

        let rendered = serialize(&memory).unwrap();
        assert!(rendered.starts_with("---\n"));
        let back = parse(&rendered, Path::new("setup.md")).unwrap();
        assert_eq!(back, memory);
    }

    #[test]
    fn test_roundtrip_minimal_and_subsecond() {
        let created = t0() + Duration::nanoseconds(123_456_789);
        let memory = MemoryBuilder::new("").created_at(created).build().unwrap();
        let back = parse(&serialize(&memory).unwrap(), Path::new("x.md")).unwrap();
        assert_eq!(back, memory);
    }

    #[test]
    fn test_body_with_delimiter_lines_survives() {
        let memory = MemoryBuilder::new("before\n---\nafter")
            .created_at(t0())
            .build()
            .unwrap();
        let back = parse(&serialize(&memory).unwrap(), Path::new("x.md")).unwrap();
        assert_eq!(back.content(), "before\n---\nafter");
    }

    #[test]
    fn test_legacy_document_without_updated_at() {
        let raw = "---\ncreated_at: 2026-01-01T09:00:00Z\ntags: [a]\n---\nbody";
        let memory = parse(raw, Path::new("legacy.md")).unwrap();
        assert_eq!(memory.metadata().updated_at, t0());

        let (header, body) = parse_header(raw).unwrap();
        assert!(header.updated_at.is_none());
        assert_eq!(body, "body");
    }

    #[test]
    fn test_missing_header_is_parse_error() {
        let err = parse("just text", Path::new("/s/a.md")).unwrap_err();
        assert_eq!(err.code(), "PARSE_ERROR");
        assert!(err.to_string().contains("/s/a.md"));
    }

    #[test]
    fn test_crlf_header() {
        let raw = "---\r\ncreated_at: 2026-01-01T09:00:00Z\r\n---\r\nbody";
        let memory = parse(raw, Path::new("x.md")).unwrap();
        assert_eq!(memory.content(), "body");
    }
}
