//! Parsers for the plain-text output of `svn log`, `svn info` and `svn diff`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{LogEntryError, SvnError};
use crate::identity::IdentityMap;
use crate::models::Revision;

/// Kind of a node as reported by `svn info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Directory,
    File,
    Other,
}

/// The subset of `svn info` output the replay needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SvnInfo {
    pub url: Option<String>,
    pub revision: Option<i64>,
    pub node_kind: Option<NodeKind>,
}

impl SvnInfo {
    pub fn url(&self) -> Result<&str, SvnError> {
        self.url.as_deref().ok_or_else(|| SvnError::InfoFieldMissing {
            field: "URL".into(),
        })
    }

    pub fn revision(&self) -> Result<i64, SvnError> {
        self.revision.ok_or_else(|| SvnError::InfoFieldMissing {
            field: "Revision".into(),
        })
    }

    pub fn node_kind(&self) -> Result<NodeKind, SvnError> {
        self.node_kind.ok_or_else(|| SvnError::InfoFieldMissing {
            field: "Node Kind".into(),
        })
    }
}

/// Parse `svn info` text output. Only the first occurrence of each field is
/// used.
pub fn parse_svn_info(text: &str) -> SvnInfo {
    let mut info = SvnInfo::default();
    for line in text.lines() {
        if let Some(url) = line.strip_prefix("URL: ") {
            info.url.get_or_insert_with(|| url.trim().to_string());
        } else if let Some(rev) = line.strip_prefix("Revision: ") {
            if info.revision.is_none() {
                info.revision = rev.trim().parse::<i64>().ok();
            }
        } else if let Some(kind) = line.strip_prefix("Node Kind: ") {
            info.node_kind.get_or_insert(match kind.trim() {
                "directory" => NodeKind::Directory,
                "file" => NodeKind::File,
                _ => NodeKind::Other,
            });
        }
    }
    info
}

/// Whether the output of `svn diff -c N` touches the externals property
/// (`Added: svn:externals`, `Modified: ...`, `Deleted: ...`).
pub fn diff_touches_externals(diff: &str) -> bool {
    diff.contains(": svn:externals")
}

fn is_separator(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.chars().all(|c| c == '-')
}

/// Fields of an `svn log` header line:
/// `r1234 | jdoe | 2013-04-19 01:13:18 -0700 (Fri, 19 Apr 2013) | 3 lines`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogHeader<'a> {
    number: i64,
    author: String,
    timestamp: &'a str,
}

fn parse_log_header(line: &str) -> Option<LogHeader<'_>> {
    let fields: Vec<&str> = line.split(" | ").collect();
    if fields.len() < 4 {
        return None;
    }

    let number = fields[0].strip_prefix('r')?.parse::<i64>().ok()?;

    let line_count = fields[fields.len() - 1].trim();
    if !line_count.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let dated = fields[fields.len() - 2];
    let (timestamp, rest) = dated.split_once(" (")?;
    if !rest.trim_end().ends_with(')') || timestamp.trim().is_empty() {
        return None;
    }

    let author = fields[1..fields.len() - 2].join(" | ");
    if author.is_empty() {
        return None;
    }

    Some(LogHeader {
        number,
        author,
        timestamp: timestamp.trim(),
    })
}

/// Parse the text of exactly one `svn log` entry into a [`Revision`],
/// mapping the SVN author through `identities`.
pub fn parse_log_entry(text: &str, identities: &IdentityMap) -> Result<Revision, LogEntryError> {
    let lines: Vec<&str> = text.lines().collect();

    let start = lines.iter().position(|l| !is_separator(l));
    let end = lines.iter().rposition(|l| !is_separator(l));
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) => (s, e),
        _ => return Err(LogEntryError::Malformed(text.to_string())),
    };
    let lines = &lines[start..=end];

    let header_line = lines[0];
    let header = parse_log_header(header_line)
        .ok_or_else(|| LogEntryError::Malformed(header_line.to_string()))?;

    let mut body = &lines[1..];
    if body.first().map(|l| l.trim().is_empty()).unwrap_or(false) {
        body = &body[1..];
    }
    let message = body.join("\n");

    let identity = identities
        .lookup(&header.author)
        .ok_or_else(|| LogEntryError::UnknownAuthor {
            author: header.author.clone(),
            line: header_line.to_string(),
        })?;

    debug!(rev = header.number, author = %header.author, "parsed svn log entry");
    Ok(Revision {
        number: header.number,
        author: identity.to_string(),
        timestamp: header.timestamp.to_string(),
        message,
    })
}
