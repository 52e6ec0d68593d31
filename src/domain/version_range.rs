//! npm-style version ranges stored in catalogs
//!
//! Handles range formats:
//! - Exact: `1.2.3`, `=1.2.3`
//! - Caret: `^1.2.3`
//! - Tilde: `~1.2.3`
//! - Comparison: `>=1.2.3`, `>1.2.3`, `<=1.2.3`, `<1.2.3`
//! - Wildcard: `*`, `1.x`, `1.2.*`, `1.2`
//! - Range: `>=1.0.0 <2.0.0`, `1.0.0 - 2.0.0`, `^1.0.0 || ^2.0.0`
//!
//! Ranges are translated to [`semver::VersionReq`] alternatives, so matching
//! follows semantic-version range rules including prerelease handling.

use crate::error::CatalogError;
use regex::Regex;
use semver::{Op, Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

// Single-comparator ranges, e.g. `^1.2.3`, `~1.2`, `>=v2`, `1.x`
static SIMPLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\^|~|>=|>|<=|<|=)?\s*v?(\d+(?:\.(?:\d+|[xX*])){0,2}(?:-[\w.]+)?(?:\+[\w.]+)?)$")
        .unwrap()
});

/// The shape of a stored range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeKind {
    /// Exact version (`1.2.3`, `=1.2.3`)
    Exact,
    /// Caret range (`^1.2.3`), compatible with the left-most non-zero component
    Caret,
    /// Tilde range (`~1.2.3`), compatible with the minor version
    Tilde,
    /// `>=1.2.3`
    GreaterOrEqual,
    /// `>1.2.3`
    Greater,
    /// `<=1.2.3`
    LessOrEqual,
    /// `<1.2.3`
    Less,
    /// Partial or wildcard version (`*`, `1.x`, `1.2`)
    Wildcard,
    /// Anything with several comparators or alternatives
    Range,
}

impl RangeKind {
    /// Operator kept in front of the version when the range is updated
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            RangeKind::Caret => Some("^"),
            RangeKind::Tilde => Some("~"),
            RangeKind::GreaterOrEqual => Some(">="),
            RangeKind::Greater => Some(">"),
            RangeKind::LessOrEqual => Some("<="),
            RangeKind::Less => Some("<"),
            RangeKind::Exact | RangeKind::Wildcard | RangeKind::Range => None,
        }
    }
}

/// A validated version range with its original string representation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRange {
    raw: String,
    kind: RangeKind,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Parse an npm-style range
    pub fn parse(raw: &str) -> Result<Self, CatalogError> {
        let trimmed = raw.trim();

        let mut alternatives = Vec::new();
        for alternative in trimmed.split("||") {
            let translated = translate_alternative(alternative.trim())
                .map_err(|message| CatalogError::invalid_range(raw, message))?;
            let req = VersionReq::parse(&translated)
                .map_err(|e| CatalogError::invalid_range(raw, e.to_string()))?;
            alternatives.push(req);
        }

        Ok(Self {
            raw: trimmed.to_string(),
            kind: classify(trimmed),
            alternatives,
        })
    }

    /// Raw range as written
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Shape of the range
    pub fn kind(&self) -> RangeKind {
        self.kind
    }

    /// True when the range accepts any version (`*`, `x`, empty)
    pub fn is_wildcard(&self) -> bool {
        self.alternatives.iter().any(|req| req.comparators.is_empty())
    }

    /// True when `version` satisfies any alternative; unparseable versions never match
    pub fn matches(&self, version: &str) -> bool {
        match parse_version(version) {
            Some(version) => self.matches_version(&version),
            None => false,
        }
    }

    /// True when `version` satisfies any alternative
    pub fn matches_version(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// Lower bound of the range, used as the "current" version when
    /// comparing against candidates. Missing components are zero-filled.
    pub fn base_version(&self) -> Option<Version> {
        let first = self.alternatives.first()?;
        let comparator = first
            .comparators
            .iter()
            .find(|c| !matches!(c.op, Op::Less | Op::LessEq))
            .or_else(|| first.comparators.first())?;

        Some(Version {
            major: comparator.major,
            minor: comparator.minor.unwrap_or(0),
            patch: comparator.patch.unwrap_or(0),
            pre: comparator.pre.clone(),
            build: semver::BuildMetadata::EMPTY,
        })
    }

    /// Operator prefix kept across updates
    pub fn prefix(&self) -> Option<&'static str> {
        self.kind.prefix()
    }

    /// Format a new version in the style of this range.
    ///
    /// `^4.17.0` → `^4.17.21`, `1.x` → `5.x`, `1.2` → `5.1`. Multi-comparator
    /// ranges collapse to a caret range on the new version.
    pub fn format_updated(&self, new_version: &str) -> String {
        match self.kind {
            RangeKind::Exact => new_version.to_string(),
            RangeKind::Wildcard => format_partial(&self.raw, new_version),
            RangeKind::Range => format!("^{}", new_version),
            kind => format!("{}{}", kind.prefix().unwrap_or_default(), new_version),
        }
    }
}

impl PartialEq for VersionRange {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for VersionRange {}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl TryFrom<String> for VersionRange {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionRange> for String {
    fn from(range: VersionRange) -> Self {
        range.raw
    }
}

/// Parse a concrete version, tolerating a leading `v`
pub fn parse_version(version: &str) -> Option<Version> {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).ok()
}

fn classify(trimmed: &str) -> RangeKind {
    if trimmed.is_empty() || matches!(trimmed, "*" | "x" | "X") {
        return RangeKind::Wildcard;
    }

    let Some(caps) = SIMPLE_RE.captures(trimmed) else {
        return RangeKind::Range;
    };
    let op = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let version = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let core = version.split(['-', '+']).next().unwrap_or(version);
    let partial = core.split('.').count() < 3 || core.split('.').any(is_wildcard_part);

    match op {
        "" | "=" if partial => RangeKind::Wildcard,
        "" | "=" => RangeKind::Exact,
        "^" => RangeKind::Caret,
        "~" => RangeKind::Tilde,
        ">=" => RangeKind::GreaterOrEqual,
        ">" => RangeKind::Greater,
        "<=" => RangeKind::LessOrEqual,
        _ => RangeKind::Less,
    }
}

/// Rewrite one `||` alternative in the comma-separated syntax `semver` parses
fn translate_alternative(alternative: &str) -> Result<String, String> {
    if alternative.is_empty() {
        return Ok("*".to_string());
    }

    if let Some((low, high)) = alternative.split_once(" - ") {
        let low = normalize_version(low.trim());
        let high = normalize_version(high.trim());
        return Ok(match (low, high) {
            (None, None) => "*".to_string(),
            (Some(low), None) => format!(">={}", low),
            (None, Some(high)) => format!("<={}", high),
            (Some(low), Some(high)) => format!(">={}, <={}", low, high),
        });
    }

    // Join operators separated from their version by whitespace (`>= 1.2.3`)
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op = String::new();
    for token in alternative.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '^' | '~')) {
            pending_op.push_str(token);
        } else {
            tokens.push(format!("{}{}", pending_op, token));
            pending_op.clear();
        }
    }
    if !pending_op.is_empty() {
        return Err(format!("dangling operator '{}'", pending_op));
    }

    let mut comparators = Vec::new();
    for token in tokens {
        let split = token
            .find(|c: char| !matches!(c, '<' | '>' | '=' | '^' | '~'))
            .unwrap_or(token.len());
        let (op, version) = token.split_at(split);
        let op = match op {
            "" | "=" => "=",
            "^" | "~" | ">=" | ">" | "<=" | "<" => op,
            other => return Err(format!("unknown operator '{}'", other)),
        };
        if let Some(version) = normalize_version(version) {
            comparators.push(format!("{}{}", op, version));
        }
    }

    if comparators.is_empty() {
        Ok("*".to_string())
    } else {
        Ok(comparators.join(", "))
    }
}

/// Strip a leading `v` and drop wildcard components (`1.x` → `1`).
/// `None` means the version places no constraint.
fn normalize_version(version: &str) -> Option<String> {
    let version = version.strip_prefix(['v', 'V']).unwrap_or(version);
    let parts: Vec<&str> = version
        .split('.')
        .take_while(|part| !is_wildcard_part(part))
        .collect();
    if parts.is_empty() || parts.iter().all(|p| p.is_empty()) {
        None
    } else {
        Some(parts.join("."))
    }
}

fn is_wildcard_part(part: &str) -> bool {
    matches!(part, "x" | "X" | "*")
}

/// Keep the precision of a partial range: `1.x` + `5.1.0` → `5.x`
fn format_partial(raw: &str, new_version: &str) -> String {
    let raw = raw.strip_prefix('=').unwrap_or(raw).trim_start_matches(['v', 'V']);
    let raw_parts: Vec<&str> = raw.split('.').collect();
    let fixed = raw_parts.iter().take_while(|p| !is_wildcard_part(p)).count();
    if fixed == 0 {
        return raw.to_string();
    }

    let core = new_version.split(['-', '+']).next().unwrap_or(new_version);
    let new_parts: Vec<&str> = core.split('.').take(fixed).collect();
    let mut formatted = new_parts.join(".");
    if let Some(wildcard) = raw_parts.get(fixed) {
        formatted.push('.');
        formatted.push_str(wildcard);
    }
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(raw: &str) -> VersionRange {
        VersionRange::parse(raw).unwrap()
    }

    #[test]
    fn test_parse_caret() {
        let r = range("^4.17.0");
        assert_eq!(r.kind(), RangeKind::Caret);
        assert_eq!(r.prefix(), Some("^"));
        assert!(r.matches("4.17.21"));
        assert!(r.matches("4.99.0"));
        assert!(!r.matches("5.0.0"));
        assert!(!r.matches("4.16.9"));
    }

    #[test]
    fn test_parse_caret_zero_major() {
        let r = range("^0.2.3");
        assert!(r.matches("0.2.9"));
        assert!(!r.matches("0.3.0"));
    }

    #[test]
    fn test_parse_tilde() {
        let r = range("~1.2.3");
        assert_eq!(r.kind(), RangeKind::Tilde);
        assert!(r.matches("1.2.9"));
        assert!(!r.matches("1.3.0"));
    }

    #[test]
    fn test_bare_version_is_exact() {
        let r = range("1.2.3");
        assert_eq!(r.kind(), RangeKind::Exact);
        assert!(r.matches("1.2.3"));
        assert!(!r.matches("1.2.4"));
    }

    #[test]
    fn test_comparisons() {
        assert!(range(">=1.2.3").matches("2.0.0"));
        assert!(!range(">1.2.3").matches("1.2.3"));
        assert!(range("<=1.2.3").matches("1.2.3"));
        assert!(!range("<1.2.3").matches("1.2.3"));
        assert_eq!(range(">= 1.2.3").kind(), RangeKind::GreaterOrEqual);
    }

    #[test]
    fn test_wildcards() {
        let any = range("*");
        assert!(any.is_wildcard());
        assert!(any.matches("0.0.1"));
        assert!(any.base_version().is_none());

        let major = range("1.x");
        assert_eq!(major.kind(), RangeKind::Wildcard);
        assert!(!major.is_wildcard());
        assert!(major.matches("1.9.0"));
        assert!(!major.matches("2.0.0"));

        let minor = range("1.2");
        assert_eq!(minor.kind(), RangeKind::Wildcard);
        assert!(minor.matches("1.2.7"));
        assert!(!minor.matches("1.3.0"));

        assert!(range("").is_wildcard());
    }

    #[test]
    fn test_compound_ranges() {
        let r = range(">=1.0.0 <2.0.0");
        assert_eq!(r.kind(), RangeKind::Range);
        assert!(r.matches("1.5.0"));
        assert!(!r.matches("2.0.0"));

        let hyphen = range("1.0.0 - 2.3.4");
        assert!(hyphen.matches("2.3.4"));
        assert!(!hyphen.matches("2.3.5"));

        let either = range("^1.0.0 || ^3.0.0");
        assert!(either.matches("1.4.0"));
        assert!(!either.matches("2.0.0"));
        assert!(either.matches("3.1.0"));
    }

    #[test]
    fn test_prerelease_matching() {
        let r = range("^1.2.3-beta.1");
        assert!(r.matches("1.2.3-beta.2"));
        assert!(r.matches("1.2.3"));
        assert!(!r.matches("1.3.0-beta.1"));
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(VersionRange::parse("latest").is_err());
        assert!(VersionRange::parse("not-a-range").is_err());
        assert!(VersionRange::parse(">=").is_err());
        assert!(VersionRange::parse("^1.2.3.4").is_err());
        assert!(VersionRange::parse("=>1.0.0").is_err());
    }

    #[test]
    fn test_unparseable_candidate_never_matches() {
        assert!(!range("*").matches("banana"));
        assert!(range("^1.0.0").matches("v1.2.0"));
    }

    #[test]
    fn test_base_version() {
        assert_eq!(range("^4.17.0").base_version(), Some(Version::new(4, 17, 0)));
        assert_eq!(range("~1.2").base_version(), Some(Version::new(1, 2, 0)));
        assert_eq!(range("<2.0.0 >=1.1.0").base_version(), Some(Version::new(1, 1, 0)));
        assert_eq!(
            range("1.0.0-rc.1").base_version().map(|v| v.to_string()),
            Some("1.0.0-rc.1".to_string())
        );
    }

    #[test]
    fn test_format_updated() {
        assert_eq!(range("^4.17.0").format_updated("4.17.21"), "^4.17.21");
        assert_eq!(range("~1.2.3").format_updated("1.2.9"), "~1.2.9");
        assert_eq!(range("1.2.3").format_updated("2.0.0"), "2.0.0");
        assert_eq!(range(">=1.0.0").format_updated("3.0.0"), ">=3.0.0");
        assert_eq!(range("1.x").format_updated("5.1.0"), "5.x");
        assert_eq!(range("1.2").format_updated("5.1.0"), "5.1");
        assert_eq!(range(">=1.0.0 <2.0.0").format_updated("2.1.0"), "^2.1.0");
    }

    #[test]
    fn test_serde_as_string() {
        let r: VersionRange = serde_json::from_str("\"^1.2.3\"").unwrap();
        assert_eq!(r.raw(), "^1.2.3");
        assert_eq!(serde_json::to_string(&r).unwrap(), "\"^1.2.3\"");
        assert!(serde_json::from_str::<VersionRange>("\"latest\"").is_err());
    }
}
