//! Route pattern compilation.
//!
//! # Responsibilities
//! - Normalize and join group prefixes with route sub-paths
//! - Split a pattern into literal, parameter and catch-all segments
//! - Reject malformed placeholders at registration time
//! - Match split request paths against a compiled pattern
//!
//! # Design Decisions
//! - Placeholders must start a segment: `/users/:id` is valid, `/users:id` is not
//! - Parameter names are unique per pattern, so captured params never collide
//! - A catch-all (`*name`) is only allowed as the final segment
//! - No percent-decoding: captured values are the raw path text

use std::sync::Arc;

use thiserror::Error;

use super::Params;

/// Errors raised while compiling a route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// The pattern violates placeholder placement or naming rules.
    #[error("malformed route pattern `{pattern}`: {reason}")]
    Malformed {
        pattern: String,
        reason: &'static str,
    },
}

impl PatternError {
    fn malformed(pattern: &str, reason: &'static str) -> Self {
        PatternError::Malformed {
            pattern: pattern.to_string(),
            reason,
        }
    }
}

/// A single compiled path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the request segment byte-for-byte.
    Literal(String),
    /// Matches any single non-empty segment, captured under the name.
    Param(Arc<str>),
    /// Matches the remainder of the path, captured under the name.
    CatchAll(Arc<str>),
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compile a pattern such as `/users/:id/items` or `/static/*path`.
    ///
    /// Duplicate and missing separators are normalized before compilation,
    /// so `users//:id` compiles the same as `/users/:id`.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let normalized = join("", raw);
        let mut segments = Vec::new();
        let mut names: Vec<Arc<str>> = Vec::new();

        for part in split_path(&normalized) {
            if segments.iter().any(|s| matches!(s, Segment::CatchAll(_))) {
                return Err(PatternError::malformed(
                    raw,
                    "catch-all must be the final segment",
                ));
            }

            let segment = match part.as_bytes()[0] {
                b':' | b'*' => {
                    let name = &part[1..];
                    if name.is_empty() {
                        return Err(PatternError::malformed(raw, "placeholder has no name"));
                    }
                    if name.contains([':', '*']) {
                        return Err(PatternError::malformed(
                            raw,
                            "placeholder must immediately follow a path separator",
                        ));
                    }
                    if names.iter().any(|n| n.as_ref() == name) {
                        return Err(PatternError::malformed(raw, "duplicate parameter name"));
                    }
                    let name: Arc<str> = Arc::from(name);
                    names.push(Arc::clone(&name));
                    if part.starts_with(':') {
                        Segment::Param(name)
                    } else {
                        Segment::CatchAll(name)
                    }
                }
                _ => {
                    if part.contains([':', '*']) {
                        return Err(PatternError::malformed(
                            raw,
                            "placeholder must immediately follow a path separator",
                        ));
                    }
                    Segment::Literal(part.to_string())
                }
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: normalized,
            segments,
        })
    }

    /// The normalized pattern text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments, counting a trailing catch-all as one.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn has_catch_all(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::CatchAll(_)))
    }

    /// Match already-split request segments, returning the captured params.
    ///
    /// `path` is the request path the segments were split from; a catch-all
    /// captures its remainder verbatim.
    pub fn matches(&self, parts: &[&str], path: &str) -> Option<Params> {
        if self.has_catch_all() {
            if parts.len() < self.segments.len() {
                return None;
            }
        } else if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = Params::new();
        for (index, (segment, part)) in self.segments.iter().zip(parts).enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.push(Arc::clone(name), (*part).to_string());
                }
                Segment::CatchAll(name) => {
                    params.push(Arc::clone(name), remainder(path, index).to_string());
                }
            }
        }
        Some(params)
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Join a prefix and a sub-path into a single normalized path.
///
/// The result always starts with `/`, never ends with one (except the root
/// itself) and never contains empty segments.
pub fn join(prefix: &str, path: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + path.len() + 1);
    for part in prefix.split('/').chain(path.split('/')) {
        if part.is_empty() {
            continue;
        }
        out.push('/');
        out.push_str(part);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Split a request path into segments.
///
/// The root path has zero segments; a trailing `/` yields a final empty
/// segment, which never matches a literal or a parameter.
pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    trimmed.split('/').filter(move |_| !trimmed.is_empty())
}

// Text after the first `skip` segments of `path`, without the leading '/'.
fn remainder(path: &str, skip: usize) -> &str {
    let mut rest = path.strip_prefix('/').unwrap_or(path);
    for _ in 0..skip {
        match rest.find('/') {
            Some(i) => rest = &rest[i + 1..],
            None => return "",
        }
    }
    rest
}
