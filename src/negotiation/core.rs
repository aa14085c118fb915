use smallvec::SmallVec;
use tracing::debug;

/// A parsed media range such as `text/html;level=1;q=0.7`.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaType {
    component: String,
    subcomponent: String,
    raw: String,
    weight: f32,
    params: SmallVec<[(String, Option<String>); 2]>,
}

impl MediaType {
    /// Parse one header entry or one route declaration.
    ///
    /// Never fails: anything unparsable degrades to a wildcard component and
    /// a `q` that cannot be read keeps the default weight.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        let (head, rest) = match value.find(';') {
            Some(idx) => (value[..idx].trim(), Some(&value[idx + 1..])),
            None => (value, None),
        };

        let (component, subcomponent) = match head.find('/') {
            Some(idx) => (
                head[..idx].trim().to_ascii_lowercase(),
                head[idx + 1..].trim().to_ascii_lowercase(),
            ),
            None => ("*".to_string(), head.to_ascii_lowercase()),
        };

        let mut weight = 1.0_f32;
        let mut params = SmallVec::new();
        if let Some(rest) = rest {
            for part in split_header_values(rest, ';') {
                match part.split_once('=') {
                    Some((key, val)) => {
                        let key = key.trim();
                        let val = val.trim();
                        if key.eq_ignore_ascii_case("q") {
                            match val.parse::<f32>() {
                                Ok(q) if q.is_finite() => weight = q.clamp(0.0, 1.0),
                                _ => debug!(value = %val, "Unparsable q parameter ignored"),
                            }
                        } else {
                            params.push((key.to_ascii_lowercase(), Some(unquote(val))));
                        }
                    }
                    None => params.push((part.trim().to_ascii_lowercase(), None)),
                }
            }
        }

        Self {
            component,
            subcomponent,
            raw: head.to_string(),
            weight,
            params,
        }
    }

    /// Top-level type, lowercased; `*` for a wildcard or a bare token.
    #[must_use]
    pub fn component(&self) -> &str {
        &self.component
    }

    #[must_use]
    pub fn subcomponent(&self) -> &str {
        &self.subcomponent
    }

    /// The value as written, without parameters.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Quality value in `0.0..=1.0`.
    #[must_use]
    pub fn weight(&self) -> f32 {
        self.weight
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.as_deref())
    }

    /// Wildcard-aware comparison of type and subtype. Parameters are ignored.
    #[must_use]
    pub fn matches(&self, other: &MediaType) -> bool {
        part_matches(&self.component, &other.component)
            && part_matches(&self.subcomponent, &other.subcomponent)
    }
}

fn part_matches(a: &str, b: &str) -> bool {
    a == "*" || b == "*" || a == b
}

/// Split a header value on `sep`, honouring double-quoted strings and
/// dropping empty entries. Whitespace around each entry is trimmed.
#[must_use]
pub fn split_header_values(header: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quote = false;
    let mut escaped = false;
    let mut start = 0;

    for (idx, ch) in header.char_indices() {
        if ch == '"' && !escaped {
            in_quote = !in_quote;
        }
        escaped = ch == '\\' && !escaped;
        if ch == sep && !in_quote {
            let part = header[start..idx].trim();
            if !part.is_empty() {
                parts.push(part);
            }
            start = idx + ch.len_utf8();
        }
    }

    let tail = header[start..].trim();
    if !tail.is_empty() {
        parts.push(tail);
    }
    parts
}

fn unquote(value: &str) -> String {
    let inner = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Parse an `Accept` header into its entries, in header order.
#[must_use]
pub fn parse_accept(header: &str) -> Vec<MediaType> {
    split_header_values(header, ',')
        .into_iter()
        .map(MediaType::parse)
        .collect()
}

/// Pick the declared type the client prefers.
///
/// The highest-quality `Accept` entry matching any declared type wins; on a
/// tie the earlier `Accept` entry wins. Entries with `q=0` are refused. The
/// returned value is the first declared type matched by the winning entry.
#[must_use]
pub fn select_produced<'a>(accept: &[MediaType], produces: &'a [MediaType]) -> Option<&'a MediaType> {
    let mut best: Option<(f32, &'a MediaType)> = None;
    for accepted in accept {
        if accepted.weight <= 0.0 {
            continue;
        }
        let Some(declared) = produces.iter().find(|p| p.matches(accepted)) else {
            continue;
        };
        match best {
            Some((weight, _)) if weight >= accepted.weight => {}
            _ => best = Some((accepted.weight, declared)),
        }
    }
    best.map(|(_, declared)| declared)
}

/// Whether a request `Content-Type` satisfies a route's `consumes` list.
///
/// An empty list accepts anything; a missing header never satisfies a
/// non-empty list.
#[must_use]
pub fn consumes_match(content_type: Option<&str>, consumes: &[MediaType]) -> bool {
    if consumes.is_empty() {
        return true;
    }
    let Some(content_type) = content_type else {
        return false;
    };
    let content_type = MediaType::parse(content_type);
    consumes.iter().any(|c| c.matches(&content_type))
}

/// Result of evaluating a route's `produces` list against a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Negotiation {
    /// The route declares nothing to produce
    NotApplicable,
    /// The route can answer; this is the content type to write
    Selected(MediaType),
    /// Nothing the route produces is acceptable to the client
    Rejected,
}

impl Negotiation {
    /// Evaluate `produces` against the raw `Accept` header value.
    ///
    /// A request without an `Accept` header accepts anything, so the first
    /// declared type is selected.
    #[must_use]
    pub fn evaluate(accept: Option<&str>, produces: &[MediaType]) -> Self {
        if produces.is_empty() {
            return Negotiation::NotApplicable;
        }
        let accept = match accept {
            Some(value) if !value.trim().is_empty() => parse_accept(value),
            _ => {
                return produces
                    .first()
                    .map_or(Negotiation::Rejected, |m| Negotiation::Selected(m.clone()));
            }
        };
        match select_produced(&accept, produces) {
            Some(selected) => Negotiation::Selected(selected.clone()),
            None => Negotiation::Rejected,
        }
    }

    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Negotiation::Rejected)
    }
}
