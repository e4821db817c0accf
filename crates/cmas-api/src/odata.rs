// OData `$filter` construction and shell-style name patterns.
//
// The Admin Service has no wildcard operator, so `*`/`?` patterns are split
// into a `startswith()` prefilter for the server and an anchored regex that
// is applied to the returned rows.

use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::error::Error;

/// Quote a string literal for an OData expression (`'` is doubled).
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

// ── Filter ───────────────────────────────────────────────────────────

/// A `$filter` expression tree, rendered through `Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq { field: String, value: Literal },
    StartsWith { field: String, prefix: String },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Str(String),
    Num(i64),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<String>) -> Self {
        Self::Eq {
            field: field.to_owned(),
            value: Literal::Str(value.into()),
        }
    }

    pub fn eq_num(field: &str, value: impl Into<i64>) -> Self {
        Self::Eq {
            field: field.to_owned(),
            value: Literal::Num(value.into()),
        }
    }

    pub fn starts_with(field: &str, prefix: impl Into<String>) -> Self {
        Self::StartsWith {
            field: field.to_owned(),
            prefix: prefix.into(),
        }
    }

    /// Combine with `and`. Returns `None` when `parts` is empty.
    pub fn all(parts: Vec<Filter>) -> Option<Self> {
        Self::combine(parts, Self::And)
    }

    /// Combine with `or`. Returns `None` when `parts` is empty.
    pub fn any(parts: Vec<Filter>) -> Option<Self> {
        Self::combine(parts, Self::Or)
    }

    fn combine(mut parts: Vec<Filter>, wrap: fn(Vec<Filter>) -> Self) -> Option<Self> {
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(wrap(parts)),
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(_) | Self::Or(_) => write!(f, "({self})"),
            _ => write!(f, "{self}"),
        }
    }

    fn fmt_joined(parts: &[Filter], op: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                write!(f, " {op} ")?;
            }
            part.fmt_operand(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq {
                field,
                value: Literal::Str(s),
            } => write!(f, "{field} eq {}", quote(s)),
            Self::Eq {
                field,
                value: Literal::Num(n),
            } => write!(f, "{field} eq {n}"),
            Self::StartsWith { field, prefix } => {
                write!(f, "startswith({field},{})", quote(prefix))
            }
            Self::And(parts) => Self::fmt_joined(parts, "and", f),
            Self::Or(parts) => Self::fmt_joined(parts, "or", f),
        }
    }
}

// ── NamePattern ──────────────────────────────────────────────────────

/// A user-supplied name: either an exact name or a `*`/`?` wildcard.
#[derive(Debug, Clone)]
pub enum NamePattern {
    Exact(String),
    Wildcard {
        raw: String,
        prefix: String,
        regex: Regex,
    },
}

impl NamePattern {
    pub fn parse(input: &str) -> Result<Self, Error> {
        if !input.contains(['*', '?']) {
            return Ok(Self::Exact(input.to_owned()));
        }

        let prefix: String = input.chars().take_while(|c| !matches!(c, '*' | '?')).collect();
        let regex = RegexBuilder::new(&glob_to_regex(input))
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::InvalidPattern {
                pattern: input.to_owned(),
                reason: e.to_string(),
            })?;

        Ok(Self::Wildcard {
            raw: input.to_owned(),
            prefix,
            regex,
        })
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard { .. })
    }

    /// The text the user typed.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(name) => name,
            Self::Wildcard { raw, .. } => raw,
        }
    }

    /// Server-side filter for `field`. Wildcards without a literal prefix
    /// cannot be narrowed server-side and return `None`.
    pub fn server_filter(&self, field: &str) -> Option<Filter> {
        match self {
            Self::Exact(name) => Some(Filter::eq(field, name.clone())),
            Self::Wildcard { prefix, .. } if prefix.is_empty() => None,
            Self::Wildcard { prefix, .. } => Some(Filter::starts_with(field, prefix.clone())),
        }
    }

    /// Client-side match, case-insensitive like the WMI provider.
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Exact(name) => name.eq_ignore_ascii_case(candidate),
            Self::Wildcard { regex, .. } => regex.is_match(candidate),
        }
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translate a shell glob into an anchored regex source string.
pub fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    let mut literal = String::new();
    for c in glob.chars() {
        match c {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    out.push_str(&regex::escape(&literal));
    out.push('$');
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn plain_name_filter_is_exact() {
        let pattern = NamePattern::parse("All Workstations").unwrap();
        assert_eq!(
            pattern.server_filter("Name").unwrap().to_string(),
            "Name eq 'All Workstations'"
        );
    }

    #[test]
    fn quotes_are_doubled() {
        assert_eq!(
            Filter::eq("Name", "Bob's PCs").to_string(),
            "Name eq 'Bob''s PCs'"
        );
    }

    #[test]
    fn numeric_and_nested_filters() {
        let filter = Filter::all(vec![
            Filter::eq_num("ClientOperationId", 16_777_302),
            Filter::any(vec![
                Filter::eq("CollectionId", "SMS00001"),
                Filter::eq("ScriptName", "Get-Uptime"),
            ])
            .unwrap(),
        ])
        .unwrap();
        assert_eq!(
            filter.to_string(),
            "ClientOperationId eq 16777302 and (CollectionId eq 'SMS00001' or ScriptName eq 'Get-Uptime')"
        );
    }

    #[test]
    fn single_part_combination_is_unwrapped() {
        let filter = Filter::all(vec![Filter::eq("Name", "x")]).unwrap();
        assert_eq!(filter.to_string(), "Name eq 'x'");
        assert!(Filter::all(Vec::new()).is_none());
    }

    #[test]
    fn wildcard_translates_to_anchored_regex() {
        assert_eq!(glob_to_regex("TEST*"), "^TEST.*$");
        assert_eq!(glob_to_regex("A?B"), "^A.B$");
        let pattern = NamePattern::parse("TEST-*").unwrap();
        assert!(pattern.is_wildcard());
        assert_eq!(
            pattern.server_filter("Name").unwrap().to_string(),
            "startswith(Name,'TEST-')"
        );
    }

    #[test]
    fn wildcard_matches_same_set_as_glob() {
        let pattern = NamePattern::parse("TEST-*").unwrap();
        let samples = ["TEST-01", "TEST-", "test-lab", "XTEST-01", "TEST01", "PROD-TEST-1"];
        let matched: Vec<&str> = samples.iter().copied().filter(|s| pattern.matches(s)).collect();
        assert_eq!(matched, ["TEST-01", "TEST-", "test-lab"]);
    }

    #[test]
    fn question_mark_and_metacharacters() {
        let pattern = NamePattern::parse("PC?.corp (lab)*").unwrap();
        assert!(pattern.matches("PC1.corp (lab) east"));
        assert!(!pattern.matches("PC1xcorp (lab)"));
        assert!(!pattern.matches("PC12.corp (lab)"));
    }

    #[test]
    fn leading_wildcard_has_no_server_filter() {
        let pattern = NamePattern::parse("*-SQL").unwrap();
        assert!(pattern.server_filter("Name").is_none());
        assert!(pattern.matches("CM01-SQL"));
    }
}
