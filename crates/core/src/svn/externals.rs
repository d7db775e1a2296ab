//! `svn:externals` property parsing and resolution.
//!
//! The text handled here is what `svn propget svn:externals -R` prints for
//! a working copy: each property value is introduced by a directory header
//! `<dir> - <first definition>`, followed by further definitions one per
//! line. Within a definition the tokens may appear in any order (the pre-1.5
//! `dir -r N URL` layout and the 1.5+ `-r N URL@PEG dir` layout both work):
//!
//! - a token containing `://` is the source URL, optionally `URL@PEG`;
//! - `-rN` or `-r N` is the operative revision;
//! - anything else is the local path.
//!
//! Parsing is a pure, lazy iteration over the text ([`ExternalsParser`]).
//! Turning a definition into an [`ExternalReference`] needs one `svn info`
//! query to learn the node kind, done by [`resolve`].

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use super::parser::NodeKind;
use super::HistorySource;
use crate::errors::ExternalsError;
use crate::models::{ExternalKind, ExternalReference};

/// Immutable inputs the parser needs besides the property text.
#[derive(Debug, Clone, Copy)]
pub struct ExternalsContext<'a> {
    /// URL of the working copy whose property is parsed. Directory headers
    /// printed as URLs are made relative to it.
    pub base_url: &'a str,
    /// Root URL that stands in for every remote mirror.
    pub root_url: &'a str,
    /// Remote repository URLs mirrored at `root_url`.
    pub remotes: &'a [String],
    /// The revision being replayed; default for absent revisions.
    pub top_level_rev: i64,
}

/// A parsed definition with its URL mirrored and revisions default-filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalDefinition {
    pub local_path: PathBuf,
    pub url: String,
    pub operative_rev: i64,
    pub peg_rev: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'t> {
    Url { url: &'t str, peg: Option<i64> },
    Revision(i64),
    RevisionFlag,
    Path(&'t str),
}

fn parse_revision(s: &str) -> Result<i64, String> {
    s.parse::<i64>()
        .ok()
        .filter(|rev| *rev >= 0)
        .ok_or_else(|| format!("unsupported revision '{}'", s))
}

fn classify(token: &str) -> Result<Token<'_>, String> {
    if token.contains("://") {
        let token = match token.rsplit_once('@') {
            Some((url, peg)) if !peg.is_empty() && peg.chars().all(|c| c.is_ascii_digit()) => {
                return Ok(Token::Url {
                    url,
                    peg: Some(parse_revision(peg)?),
                });
            }
            // A bare trailing `@` escapes an `@` inside the URL.
            Some((url, "")) => url,
            _ => token,
        };
        return Ok(Token::Url {
            url: token,
            peg: None,
        });
    }
    if token == "-r" {
        return Ok(Token::RevisionFlag);
    }
    if let Some(rev) = token.strip_prefix("-r") {
        return Ok(Token::Revision(parse_revision(rev)?));
    }
    Ok(Token::Path(token))
}

/// Lazy iterator over the definitions in an externals property dump.
pub struct ExternalsParser<'a> {
    lines: std::str::Lines<'a>,
    ctx: ExternalsContext<'a>,
    /// Directory owning the definitions seen since the last header.
    current_dir: PathBuf,
}

impl<'a> ExternalsParser<'a> {
    pub fn new(text: &'a str, ctx: ExternalsContext<'a>) -> Self {
        Self {
            lines: text.lines(),
            ctx,
            current_dir: PathBuf::new(),
        }
    }

    /// Turn a header value into a path relative to the working copy.
    fn header_dir(&self, header: &str, line: &str) -> Result<PathBuf, ExternalsError> {
        let relative = if header.contains("://") {
            let base = self.ctx.base_url.trim_end_matches('/');
            header
                .strip_prefix(base)
                .filter(|rest| rest.is_empty() || rest.starts_with('/'))
                .ok_or_else(|| malformed(line, format!("directory '{}' is outside {}", header, base)))?
                .trim_start_matches('/')
        } else {
            header
        };
        if relative == "." {
            return Ok(PathBuf::new());
        }
        checked_relative(Path::new(relative)).map_err(|reason| malformed(line, reason))
    }

    fn parse_definition(&self, tokens: &[&str], line: &str) -> Result<ExternalDefinition, ExternalsError> {
        let mut url = None;
        let mut peg = None;
        let mut operative = None;
        let mut path = PathBuf::new();

        let mut iter = tokens.iter();
        while let Some(token) = iter.next() {
            match classify(token).map_err(|reason| malformed(line, reason))? {
                Token::Url { url: u, peg: p } => {
                    url = Some(u);
                    peg = p;
                }
                Token::Revision(rev) => operative = Some(rev),
                Token::RevisionFlag => {
                    let next = iter
                        .next()
                        .ok_or_else(|| malformed(line, "'-r' without a revision".into()))?;
                    operative = Some(parse_revision(next).map_err(|reason| malformed(line, reason))?);
                }
                Token::Path(segment) => path.push(segment.trim_start_matches('/')),
            }
        }

        let url = url.ok_or_else(|| malformed(line, "no source URL".into()))?;
        let path = checked_relative(&path).map_err(|reason| malformed(line, reason))?;
        if path.as_os_str().is_empty() {
            return Err(malformed(line, "no local path".into()));
        }

        let url = mirror_url(url, self.ctx.remotes, self.ctx.root_url);
        let peg_rev = peg.unwrap_or(self.ctx.top_level_rev);
        let operative_rev = operative.unwrap_or(peg_rev);

        Ok(ExternalDefinition {
            local_path: self.current_dir.join(path),
            url,
            operative_rev,
            peg_rev,
        })
    }
}

impl Iterator for ExternalsParser<'_> {
    type Item = Result<ExternalDefinition, ExternalsError>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(line) = self.lines.next() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }

            let definition = if tokens.len() >= 2 && tokens[1] == "-" {
                match self.header_dir(tokens[0], line) {
                    Ok(dir) => self.current_dir = dir,
                    Err(e) => return Some(Err(e)),
                }
                // A deleted external can leave a header with nothing after it.
                if tokens.len() == 2 {
                    continue;
                }
                &tokens[2..]
            } else {
                &tokens[..]
            };

            return Some(self.parse_definition(definition, line));
        }
        None
    }
}

fn malformed(line: &str, reason: String) -> ExternalsError {
    ExternalsError::Malformed {
        line: line.trim().to_string(),
        reason,
    }
}

/// Reject paths that would leave the working copy.
fn checked_relative(path: &Path) -> Result<PathBuf, String> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return Err(format!("path '{}' escapes the working copy", path.display())),
        }
    }
    Ok(out)
}

/// Replace a leading remote mirror prefix with the local root URL.
pub fn mirror_url(url: &str, remotes: &[String], root_url: &str) -> String {
    for remote in remotes {
        let remote = remote.trim_end_matches('/');
        if let Some(rest) = url.strip_prefix(remote) {
            if rest.is_empty() || rest.starts_with('/') {
                let mirrored = format!("{}{}", root_url.trim_end_matches('/'), rest);
                debug!(from = url, to = %mirrored, "using local mirror for external");
                return mirrored;
            }
        }
    }
    url.to_string()
}

/// Look up the node kind of a definition and produce the final reference.
///
/// A node that does not exist at the resolved revision yields
/// [`ExternalKind::Broken`] instead of an error.
pub async fn resolve<S: HistorySource>(
    source: &S,
    def: ExternalDefinition,
) -> Result<ExternalReference, ExternalsError> {
    let lookup = |err| ExternalsError::Lookup {
        url: def.url.clone(),
        rev: def.operative_rev,
        peg: def.peg_rev,
        source: err,
    };

    let kind = match source
        .url_info(&def.url, Some(def.operative_rev), Some(def.peg_rev))
        .await
    {
        Ok(info) => match info.node_kind().map_err(lookup)? {
            NodeKind::Directory => ExternalKind::Directory,
            NodeKind::File => ExternalKind::File,
            NodeKind::Other => {
                warn!(url = %def.url, "external has unknown node kind, treating as broken");
                ExternalKind::Broken
            }
        },
        Err(e) if e.is_missing_path() => {
            warn!(
                url = %def.url,
                rev = def.operative_rev,
                peg = def.peg_rev,
                "external can't be found at this location"
            );
            ExternalKind::Broken
        }
        Err(e) => return Err(lookup(e)),
    };

    Ok(ExternalReference {
        local_path: def.local_path,
        url: def.url,
        operative_rev: def.operative_rev,
        peg_rev: def.peg_rev,
        kind,
    })
}
