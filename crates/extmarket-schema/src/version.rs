//! Version parsing and comparison.
//!
//! Supports:
//! - Specifiers: `demo`, `demo@latest`, `demo@1.2.0`, `@scope/demo@beta`
//! - Greater-than between two published versions
//! - npm-style range matching (`^1.0.0`, `~1.2`, `1.x`, `>=1 <2`, `a - b`, `||`)

use std::cmp::Ordering;

use anyhow::{Result, bail};
use semver::{Version, VersionReq};

/// Parsed package specifier with optional version request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Package name, scope included.
    pub name: String,
    /// Requested version or tag; `None` means `latest`.
    pub version: Option<String>,
}

impl PackageSpec {
    /// Parse a package specifier like `demo` or `demo@1.2.0`. A leading `@`
    /// belongs to a scoped name, not to the version separator.
    pub fn parse(spec: &str) -> Result<Self> {
        let split_at = spec
            .char_indices()
            .skip(1)
            .find(|&(_, c)| c == '@')
            .map(|(i, _)| i);

        let Some(at) = split_at else {
            if spec.is_empty() || spec == "@" {
                bail!("Invalid package specifier: missing package name");
            }
            return Ok(Self {
                name: spec.to_string(),
                version: None,
            });
        };

        let (name, version) = (&spec[..at], &spec[at + 1..]);
        if name.is_empty() || name == "@" {
            bail!("Invalid package specifier: missing package name");
        }
        if version.is_empty() {
            bail!("Invalid package specifier: missing version after @");
        }

        // "latest" is the default request anyway
        let version = (version != "latest").then(|| version.to_string());

        Ok(Self {
            name: name.to_string(),
            version,
        })
    }

    /// Version request to hand to the install flow.
    pub fn request(&self) -> &str {
        self.version.as_deref().unwrap_or("latest")
    }

    /// Check if this specifier requests a specific version or tag
    pub fn is_pinned(&self) -> bool {
        self.version.is_some()
    }
}

fn parse_loose(v: &str) -> Option<Version> {
    let v = v.trim();
    let v = v.strip_prefix('=').unwrap_or(v);
    let v = v.strip_prefix('v').unwrap_or(v);
    Version::parse(v).ok()
}

/// Returns true if `candidate` has higher semver precedence than `current`.
///
/// Build metadata is ignored. Either side failing to parse means "not newer".
pub fn is_newer(current: &str, candidate: &str) -> bool {
    match (parse_loose(current), parse_loose(candidate)) {
        (Some(c), Some(n)) => n.cmp_precedence(&c) == Ordering::Greater,
        _ => false,
    }
}

/// Returns true if `version` satisfies the npm-style `range`.
///
/// Tags (`latest`, `beta`) and malformed ranges never match.
pub fn satisfies(version: &str, range: &str) -> bool {
    let Some(version) = parse_loose(version) else {
        return false;
    };
    range
        .split("||")
        .filter_map(convert_comparator_set)
        .any(|req| req.matches(&version))
}

/// Convert one npm comparator set (space separated, implicitly AND-ed) into
/// a `VersionReq`. A bare version means an exact match in npm but a caret
/// match in Cargo, so it gets an explicit `=`.
fn convert_comparator_set(set: &str) -> Option<VersionReq> {
    let tokens: Vec<&str> = set.split_whitespace().collect();
    if tokens.is_empty() {
        return Some(VersionReq::STAR);
    }

    let mut parts = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        // Hyphen range: `1.0.0 - 2.0.0`
        if tokens.get(i + 1) == Some(&"-") {
            let lo = tokens[i];
            let hi = tokens.get(i + 2)?;
            parts.push(format!(">={lo}"));
            parts.push(format!("<={hi}"));
            i += 3;
            continue;
        }

        let token = tokens[i];
        // `>= 1.0.0` with a detached operator
        if matches!(token, ">" | ">=" | "<" | "<=" | "=" | "^" | "~") {
            let operand = tokens.get(i + 1)?;
            parts.push(format!("{token}{operand}"));
            i += 2;
            continue;
        }

        parts.push(normalize_token(token)?);
        i += 1;
    }

    VersionReq::parse(&parts.join(", ")).ok()
}

fn normalize_token(token: &str) -> Option<String> {
    let token = token.strip_prefix('v').unwrap_or(token);
    let first = token.chars().next()?;
    if first.is_ascii_digit() {
        let is_wildcard = token.split('.').any(|p| matches!(p, "x" | "X" | "*"));
        if is_wildcard {
            Some(token.to_string())
        } else {
            Some(format!("={token}"))
        }
    } else if matches!(first, '>' | '<' | '=' | '^' | '~' | '*' | 'x' | 'X') {
        Some(token.replace("~>", "~"))
    } else {
        // A tag name, not a range
        None
    }
}
