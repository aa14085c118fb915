//! Path pattern compiler.
//!
//! Turns a route's path specification into a [`PathMatcher`]:
//!
//! | Spec                   | Kind          | Matches                                   |
//! |------------------------|---------------|-------------------------------------------|
//! | `/blah`                | exact         | `/blah`, `/blah/`, `//blah`               |
//! | `/blah*`               | prefix        | `/blah`, `/blahwibble`, `/blah/x/y`       |
//! | `/blah/:abc/:def`      | parameterised | `/blah/tim/julien` (`abc`, `def` captured)|
//! | regex `/(\d+)/x`       | regex         | `/12/x` (`param0 = 12`)                   |
//!
//! Matching always runs against the normalised request path produced by
//! [`normalize_path`].

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use super::core::ParamVec;
use crate::error::RouterError;

static PARAM_NAME: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("static parameter-name regex")
});

/// Compiled path predicate of a route.
#[derive(Debug, Clone)]
pub enum PathMatcher {
    /// Literal path; trailing `/` and repeated `/` are insignificant
    Exact { path: String },
    /// String prefix test (spec ended with `*`); not segment aware
    Prefix { prefix: String },
    /// `:name` segments captured by position, literal segments escaped
    Parameterized {
        spec: String,
        regex: Regex,
        names: Vec<Arc<str>>,
    },
    /// User regex matched against the whole normalised path
    Regex {
        regex: Regex,
        groups: Vec<(usize, Arc<str>)>,
    },
    /// Spec with an invalid parameter name; compiles but never matches
    Never { spec: String },
}

impl PathMatcher {
    /// Compile an exact, prefix or parameterised path specification.
    ///
    /// # Errors
    ///
    /// [`RouterError::InvalidPath`] if `spec` is empty or does not start with
    /// `/`; [`RouterError::DuplicateParameter`] if a `:name` repeats.
    pub fn compile(spec: &str) -> Result<Self, RouterError> {
        if !spec.starts_with('/') {
            return Err(RouterError::InvalidPath {
                path: spec.to_string(),
            });
        }

        if spec.contains(':') {
            return Ok(match path_to_regex(spec)? {
                Some((regex, names)) => PathMatcher::Parameterized {
                    spec: spec.to_string(),
                    regex,
                    names,
                },
                None => {
                    warn!(
                        path = %spec,
                        "Path contains an invalid parameter name; route will never match"
                    );
                    PathMatcher::Never {
                        spec: spec.to_string(),
                    }
                }
            });
        }

        Ok(match spec.strip_suffix('*') {
            Some(prefix) => PathMatcher::Prefix {
                prefix: collapse_slashes(prefix),
            },
            None => PathMatcher::Exact {
                path: strip_trailing_slash(&collapse_slashes(spec)).to_string(),
            },
        })
    }

    /// Compile a user-supplied regular expression.
    ///
    /// Positional groups are exposed as `param0`, `param1`, ...; named groups
    /// are additionally exposed under their own name.
    ///
    /// # Errors
    ///
    /// [`RouterError::InvalidRegex`] when the pattern does not compile.
    pub fn compile_regex(pattern: &str) -> Result<Self, RouterError> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            RouterError::InvalidRegex {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;

        let mut groups: Vec<(usize, Arc<str>)> = regex
            .capture_names()
            .enumerate()
            .skip(1)
            .filter_map(|(idx, name)| name.map(|n| (idx, Arc::from(n))))
            .collect();
        for idx in 1..regex.captures_len() {
            groups.push((idx, Arc::from(format!("param{}", idx - 1))));
        }

        Ok(PathMatcher::Regex { regex, groups })
    }

    /// Match a normalised request path, returning the captured parameters.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<ParamVec> {
        match self {
            PathMatcher::Exact { path: expected } => {
                (strip_trailing_slash(path) == expected).then(ParamVec::new)
            }
            PathMatcher::Prefix { prefix } => {
                let hit = path.starts_with(prefix.as_str())
                    || (prefix.len() > 1
                        && prefix.ends_with('/')
                        && path == strip_trailing_slash(prefix));
                hit.then(ParamVec::new)
            }
            PathMatcher::Parameterized { regex, names, .. } => {
                let caps = regex.captures(path)?;
                let mut params = ParamVec::new();
                for (idx, name) in names.iter().enumerate() {
                    if let Some(m) = caps.get(idx + 1) {
                        params.push((Arc::clone(name), decode_param(m.as_str())));
                    }
                }
                Some(params)
            }
            PathMatcher::Regex { regex, groups } => {
                let caps = regex.captures(path)?;
                let mut params = ParamVec::new();
                for (idx, name) in groups {
                    if let Some(m) = caps.get(*idx) {
                        params.push((Arc::clone(name), decode_param(m.as_str())));
                    }
                }
                Some(params)
            }
            PathMatcher::Never { .. } => None,
        }
    }

    /// The literal path for exact, prefix and parameterised specs.
    ///
    /// Prefix paths are returned without the trailing `*`; regex routes have
    /// no path.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            PathMatcher::Exact { path } => Some(path),
            PathMatcher::Prefix { prefix } => Some(prefix),
            PathMatcher::Parameterized { spec, .. } | PathMatcher::Never { spec } => Some(spec),
            PathMatcher::Regex { .. } => None,
        }
    }

    /// Human-readable description, used in logs and errors.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            PathMatcher::Exact { .. } => format!("exact {}", self.path().unwrap_or("/")),
            PathMatcher::Prefix { prefix } => format!("prefix {prefix}*"),
            PathMatcher::Parameterized { spec, .. } => format!("pattern {spec}"),
            PathMatcher::Regex { regex, .. } => format!("regex {}", regex.as_str()),
            PathMatcher::Never { spec } => format!("dead pattern {spec}"),
        }
    }
}

/// Convert a `:name` path spec into an anchored regex plus ordered names.
///
/// Returns `Ok(None)` when a parameter name is not an identifier.
fn path_to_regex(path: &str) -> Result<Option<(Regex, Vec<Arc<str>>)>, RouterError> {
    let collapsed = collapse_slashes(path);
    let (body, tail) = if let Some(body) = collapsed.strip_suffix("/*") {
        (body, "(?:/.*)?")
    } else if let Some(body) = collapsed.strip_suffix('*') {
        (body, ".*")
    } else {
        (strip_trailing_slash(&collapsed), "/?")
    };

    let mut pattern = String::with_capacity(body.len() + 16);
    pattern.push('^');
    let mut names: Vec<Arc<str>> = Vec::with_capacity(body.matches(':').count());
    let mut dead = false;

    for segment in body.split('/').filter(|s| !s.is_empty()) {
        pattern.push('/');
        match segment.strip_prefix(':') {
            Some(name) => {
                if !PARAM_NAME.is_match(name) {
                    dead = true;
                    continue;
                }
                if names.iter().any(|n| n.as_ref() == name) {
                    return Err(RouterError::DuplicateParameter {
                        name: name.to_string(),
                        path: path.to_string(),
                    });
                }
                pattern.push_str("([^/]+)");
                names.push(Arc::from(name));
            }
            None => pattern.push_str(&regex::escape(segment)),
        }
    }

    if dead {
        return Ok(None);
    }
    if names.is_empty() && pattern.len() == 1 {
        pattern.push('/');
    }
    pattern.push_str(tail);
    pattern.push('$');

    let regex = Regex::new(&pattern).map_err(|e| RouterError::InvalidRegex {
        pattern: pattern.clone(),
        reason: e.to_string(),
    })?;
    Ok(Some((regex, names)))
}

fn decode_param(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut last_slash = false;
    for ch in path.chars() {
        if ch == '/' {
            if !last_slash {
                out.push(ch);
            }
            last_slash = true;
        } else {
            out.push(ch);
            last_slash = false;
        }
    }
    out
}

fn strip_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// Normalise a raw request path.
///
/// Guarantees a leading `/`, decodes percent-encoded unreserved characters,
/// removes `.` and `..` segments (RFC 3986 §5.2.4) and collapses repeated
/// `/`. A trailing `/` is kept; route matching treats it as insignificant.
#[must_use]
pub fn normalize_path(raw: &str) -> String {
    if raw.is_empty() {
        return "/".to_string();
    }
    let decoded = decode_unreserved(raw);

    let mut segments: Vec<&str> = Vec::new();
    let mut trailing = false;
    for segment in decoded.split('/') {
        trailing = matches!(segment, "" | "." | "..");
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut out = String::with_capacity(decoded.len() + 1);
    out.push('/');
    out.push_str(&segments.join("/"));
    if trailing && !segments.is_empty() {
        out.push('/');
    }
    out
}

fn decode_unreserved(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = String::with_capacity(raw.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%'
            && idx + 2 < bytes.len()
            && bytes[idx + 1].is_ascii_hexdigit()
            && bytes[idx + 2].is_ascii_hexdigit()
        {
            let hex = &raw[idx + 1..idx + 3];
            if let Ok(byte) = u8::from_str_radix(hex, 16) {
                if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
                    out.push(char::from(byte));
                    idx += 3;
                    continue;
                }
                out.push('%');
                out.push_str(&hex.to_ascii_uppercase());
                idx += 3;
                continue;
            }
        }
        // Multi-byte characters are copied whole.
        let ch_len = raw[idx..].chars().next().map_or(1, char::len_utf8);
        out.push_str(&raw[idx..idx + ch_len]);
        idx += ch_len;
    }
    out
}
