//! Safelist compilation and matching.
//!
//! Rules are compiled once at startup into a [`Matcher`]. Each rule belongs
//! to one [`Scope`]; a token is protected when any rule of the queried scope
//! matches it.
//!
//! | rule    | standard / deep        | greedy                 |
//! |---------|------------------------|------------------------|
//! | literal | `token == s`           | `token == s`           |
//! | prefix  | `token.starts_with(p)` | `token.starts_with(p)` |
//! | pattern | full-token match       | match anywhere         |

use std::fmt;

use regex::Regex;

use crate::config::{RuleEntry, SafelistConfig};
use crate::error::{CsstrimError, CsstrimResult};

/// How widely a safelist rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The simple selectors of an alternative.
    Standard,
    /// Any identifier inside the alternative, including pseudo-class arguments.
    Deep,
    /// Substrings of names and attribute values.
    Greedy,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::Standard, Scope::Deep, Scope::Greedy];

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Standard => "standard",
            Scope::Deep => "deep",
            Scope::Greedy => "greedy",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uncompiled rule body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    Literal(String),
    Prefix(String),
    /// Regular expression source.
    Pattern(String),
}

/// A safelist rule together with the scope it was declared in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafelistRule {
    pub kind: RuleKind,
    pub scope: Scope,
}

impl SafelistRule {
    pub fn literal(s: impl Into<String>, scope: Scope) -> Self {
        Self {
            kind: RuleKind::Literal(s.into()),
            scope,
        }
    }

    pub fn prefix(s: impl Into<String>, scope: Scope) -> Self {
        Self {
            kind: RuleKind::Prefix(s.into()),
            scope,
        }
    }

    pub fn pattern(s: impl Into<String>, scope: Scope) -> Self {
        Self {
            kind: RuleKind::Pattern(s.into()),
            scope,
        }
    }

    /// Convert a config entry. `"/re/"` strings become patterns.
    pub fn from_entry(entry: &RuleEntry, scope: Scope) -> Self {
        match entry {
            RuleEntry::Text(text) => match slash_delimited(text) {
                Some(src) => Self::pattern(src, scope),
                None => Self::literal(text.as_str(), scope),
            },
            RuleEntry::Literal { literal } => Self::literal(literal.as_str(), scope),
            RuleEntry::Prefix { prefix } => Self::prefix(prefix.as_str(), scope),
            RuleEntry::Pattern { pattern } => Self::pattern(pattern.as_str(), scope),
        }
    }
}

fn slash_delimited(text: &str) -> Option<&str> {
    if text.len() >= 2 && text.starts_with('/') && text.ends_with('/') {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

/// Flatten a configured safelist into rules, in standard, deep, greedy order.
pub fn rules_from_config(safelist: &SafelistConfig) -> Vec<SafelistRule> {
    let scoped = safelist.scoped();
    let mut rules = Vec::new();
    for (entries, scope) in [
        (&scoped.standard, Scope::Standard),
        (&scoped.deep, Scope::Deep),
        (&scoped.greedy, Scope::Greedy),
    ] {
        rules.extend(entries.iter().map(|e| SafelistRule::from_entry(e, scope)));
    }
    rules
}

/// Blocklist entries are matched like standard-scope safelist rules.
pub fn blocklist_rules(entries: &[RuleEntry]) -> Vec<SafelistRule> {
    entries
        .iter()
        .map(|e| SafelistRule::from_entry(e, Scope::Standard))
        .collect()
}

#[derive(Debug, Clone)]
enum CompiledRule {
    Literal(String),
    Prefix(String),
    Pattern { anywhere: Regex, full: Regex },
}

impl CompiledRule {
    fn matches(&self, token: &str, scope: Scope) -> bool {
        match (self, scope) {
            (CompiledRule::Literal(s), _) => token == s,
            (CompiledRule::Prefix(p), _) => token.starts_with(p.as_str()),
            (CompiledRule::Pattern { anywhere, .. }, Scope::Greedy) => anywhere.is_match(token),
            (CompiledRule::Pattern { full, .. }, _) => full.is_match(token),
        }
    }
}

/// Compiled safelist. Immutable after [`Matcher::compile`].
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    standard: Vec<CompiledRule>,
    deep: Vec<CompiledRule>,
    greedy: Vec<CompiledRule>,
}

impl Matcher {
    /// Compile all rules. Any malformed pattern fails the whole safelist.
    pub fn compile(rules: &[SafelistRule]) -> CsstrimResult<Self> {
        let mut matcher = Matcher::default();
        for rule in rules {
            let compiled = match &rule.kind {
                RuleKind::Literal(s) => CompiledRule::Literal(s.clone()),
                RuleKind::Prefix(p) => CompiledRule::Prefix(p.clone()),
                RuleKind::Pattern(src) => {
                    let anywhere = Regex::new(src).map_err(|e| {
                        CsstrimError::invalid_pattern(src.as_str(), rule.scope.as_str(), e.to_string())
                    })?;
                    let full = Regex::new(&format!("^(?:{})$", src)).map_err(|e| {
                        CsstrimError::invalid_pattern(src.as_str(), rule.scope.as_str(), e.to_string())
                    })?;
                    CompiledRule::Pattern { anywhere, full }
                }
            };
            matcher.rules_mut(rule.scope).push(compiled);
        }
        Ok(matcher)
    }

    fn rules(&self, scope: Scope) -> &[CompiledRule] {
        match scope {
            Scope::Standard => &self.standard,
            Scope::Deep => &self.deep,
            Scope::Greedy => &self.greedy,
        }
    }

    fn rules_mut(&mut self, scope: Scope) -> &mut Vec<CompiledRule> {
        match scope {
            Scope::Standard => &mut self.standard,
            Scope::Deep => &mut self.deep,
            Scope::Greedy => &mut self.greedy,
        }
    }

    /// True if any rule declared in `scope` matches `token`.
    pub fn is_protected(&self, token: &str, scope: Scope) -> bool {
        self.rules(scope).iter().any(|r| r.matches(token, scope))
    }

    /// Whether any rule was declared in `scope`.
    pub fn has_scope(&self, scope: Scope) -> bool {
        !self.rules(scope).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        Scope::ALL.iter().all(|&scope| !self.has_scope(scope))
    }
}
