//! Module versions and version requirements
//!
//! Versions follow `major.minor[.patch][-prerelease][+build]`. Requirements are
//! one or more comma-separated comparators (`>=1.2, <2`), each using one of
//! `*`, `=`/`==`, `>=`, `>`, `<=`, `<`, `^` or `~`; a bare version means exact.
//! A comparator version may stop after `major` or `minor`, as in Cargo.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

/// Version or requirement parse failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version {input:?}: {reason}")]
pub struct VersionParseError {
    pub input: String,
    pub reason: &'static str,
}

impl VersionParseError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// Module version
///
/// Build metadata is kept for display but ignored by equality, hashing and
/// ordering, so `1.0+a` and `1.0.0` identify the same module version.
#[derive(Debug, Clone)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
    pub build: Option<String>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
            build: None,
        }
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    fn triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse_version(input, 2).map(|(version, _)| version)
    }
}

/// Parse a version with at least `min_parts` numeric components; missing
/// components are zero. Also returns how many components were written.
fn parse_version(input: &str, min_parts: usize) -> Result<(Version, usize), VersionParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(VersionParseError::new(input, "empty version"));
    }

    let (base, build) = match trimmed.split_once('+') {
        Some((base, build)) => (base, Some(build)),
        None => (trimmed, None),
    };
    let (numbers, pre) = match base.split_once('-') {
        Some((numbers, pre)) => (numbers, Some(pre)),
        None => (base, None),
    };

    let parts: Vec<&str> = numbers.split('.').collect();
    if parts.len() < min_parts || parts.len() > 3 {
        return Err(VersionParseError::new(
            input,
            "expected major.minor or major.minor.patch",
        ));
    }

    let mut nums = [0u64; 3];
    for (slot, part) in nums.iter_mut().zip(&parts) {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return Err(VersionParseError::new(input, "non-numeric component"));
        }
        *slot = part
            .parse()
            .map_err(|_| VersionParseError::new(input, "component out of range"))?;
    }

    let label_ok = |s: &str| {
        !s.is_empty()
            && s.split('.').all(|id| {
                !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            })
    };
    if let Some(pre) = pre {
        if !label_ok(pre) {
            return Err(VersionParseError::new(input, "invalid prerelease label"));
        }
    }
    if let Some(build) = build {
        if !label_ok(build) {
            return Err(VersionParseError::new(input, "invalid build metadata"));
        }
    }

    let version = Version {
        major: nums[0],
        minor: nums[1],
        patch: nums[2],
        pre: pre.map(str::to_string),
        build: build.map(str::to_string),
    };
    Ok((version, parts.len()))
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.triple() == other.triple() && self.pre == other.pre
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.triple().hash(state);
        self.pre.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.triple()
            .cmp(&other.triple())
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                // A prerelease sorts below its release
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Exact,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Caret,
    Tilde,
}

/// First release past the leading `depth` components of `v`
/// (`1.2.3` at depth 1 is `2.0.0`, at depth 2 `1.3.0`, at depth 3 `1.2.4`)
fn bumped(v: &Version, depth: usize) -> Version {
    match depth {
        1 => Version::new(v.major.saturating_add(1), 0, 0),
        2 => Version::new(v.major, v.minor.saturating_add(1), 0),
        _ => Version::new(v.major, v.minor, v.patch.saturating_add(1)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comparator {
    op: Op,
    version: Version,
    /// Numeric components written in the requirement, 1 to 3
    parts: usize,
}

impl Comparator {
    /// A partial version stands for the whole range it prefixes, so `=1` is
    /// `>=1.0.0, <2.0.0` and `^0.0` is `>=0.0.0, <0.1.0`.
    fn matches(&self, v: &Version) -> bool {
        let c = &self.version;
        let full = self.parts >= 3;
        match self.op {
            Op::Exact if full => v == c,
            Op::Exact => v >= c && *v < bumped(c, self.parts),
            Op::Greater if full => v > c,
            Op::Greater => *v >= bumped(c, self.parts),
            Op::GreaterEq => v >= c,
            Op::Less => v < c,
            Op::LessEq if full => v <= c,
            Op::LessEq => *v < bumped(c, self.parts),
            Op::Tilde => v >= c && *v < bumped(c, self.parts.min(2)),
            Op::Caret => v >= c && *v < bumped(c, self.caret_depth()),
        }
    }

    /// Components a caret requirement pins: up to the first non-zero one,
    /// or all written ones when they are all zero
    fn caret_depth(&self) -> usize {
        let c = &self.version;
        if c.major > 0 || self.parts == 1 {
            1
        } else if c.minor > 0 || self.parts == 2 {
            2
        } else {
            3
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            Op::Exact => "=",
            Op::Greater => ">",
            Op::GreaterEq => ">=",
            Op::Less => "<",
            Op::LessEq => "<=",
            Op::Caret => "^",
            Op::Tilde => "~",
        };
        let v = &self.version;
        write!(f, "{op}{}", v.major)?;
        if self.parts >= 2 {
            write!(f, ".{}", v.minor)?;
        }
        if self.parts >= 3 {
            write!(f, ".{}", v.patch)?;
        }
        if let Some(pre) = &v.pre {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

/// Version requirement of a dependency constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionReq {
    comparators: Vec<Comparator>,
}

impl VersionReq {
    /// Requirement satisfied by every version
    pub const STAR: VersionReq = VersionReq {
        comparators: Vec::new(),
    };

    /// Requirement matching exactly `version`
    pub fn exact(version: Version) -> Self {
        Self {
            comparators: vec![Comparator {
                op: Op::Exact,
                version,
                parts: 3,
            }],
        }
    }

    /// Whether `version` satisfies every comparator
    ///
    /// Prerelease versions only match when some comparator names a prerelease
    /// of the same `major.minor.patch`.
    pub fn matches(&self, version: &Version) -> bool {
        if !self.comparators.iter().all(|c| c.matches(version)) {
            return false;
        }
        if !version.is_prerelease() {
            return true;
        }
        self.comparators
            .iter()
            .any(|c| c.version.is_prerelease() && c.version.triple() == version.triple())
    }
}

impl FromStr for VersionReq {
    type Err = VersionParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionParseError::new(input, "empty requirement"));
        }
        if trimmed == "*" {
            return Ok(VersionReq::STAR);
        }

        let mut comparators = Vec::new();
        for part in trimmed.split(',') {
            let part = part.trim();
            let (op, rest) = if let Some(rest) = part.strip_prefix(">=") {
                (Op::GreaterEq, rest)
            } else if let Some(rest) = part.strip_prefix("<=") {
                (Op::LessEq, rest)
            } else if let Some(rest) = part.strip_prefix("==") {
                (Op::Exact, rest)
            } else if let Some(rest) = part.strip_prefix('=') {
                (Op::Exact, rest)
            } else if let Some(rest) = part.strip_prefix('>') {
                (Op::Greater, rest)
            } else if let Some(rest) = part.strip_prefix('<') {
                (Op::Less, rest)
            } else if let Some(rest) = part.strip_prefix('^') {
                (Op::Caret, rest)
            } else if let Some(rest) = part.strip_prefix('~') {
                (Op::Tilde, rest)
            } else {
                (Op::Exact, part)
            };

            // requirements may omit minor and patch (`<2`, `^1`)
            let (version, parts) = parse_version(rest, 1)
                .map_err(|e| VersionParseError::new(input, e.reason))?;
            comparators.push(Comparator { op, version, parts });
        }

        Ok(VersionReq { comparators })
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.comparators.is_empty() {
            return f.write_str("*");
        }
        let parts: Vec<String> = self.comparators.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(", "))
    }
}
