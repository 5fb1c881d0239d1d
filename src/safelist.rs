//! Safelist: selectors that are kept no matter what the markup contains.

use crate::errors::{PurgeError, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// A safelist entry as written in configuration
///
/// ```yaml
/// safelist:
///   - active                  # exact name or selector
///   - prefix: "fa-"           # anything starting with fa-
///   - pattern: "^col-\\d+$"   # regular expression
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SafelistEntry {
    Exact(String),
    Prefix { prefix: String },
    Pattern { pattern: String },
}

impl SafelistEntry {
    /// Parse the command line form: `/re/` is a pattern, `name*` a prefix,
    /// anything else an exact entry.
    pub fn parse(text: &str) -> SafelistEntry {
        let text = text.trim();
        if text.len() >= 2 && text.starts_with('/') && text.ends_with('/') {
            SafelistEntry::Pattern {
                pattern: text[1..text.len() - 1].to_string(),
            }
        } else if let Some(prefix) = text.strip_suffix('*').filter(|p| !p.is_empty()) {
            SafelistEntry::Prefix {
                prefix: prefix.to_string(),
            }
        } else {
            SafelistEntry::Exact(text.to_string())
        }
    }
}

/// Compiled safelist entry
#[derive(Debug, Clone)]
pub enum SafelistPattern {
    Exact(String),
    Prefix(String),
    /// Built both ways so the list's case switch can change after entries are added
    Regex { sensitive: Regex, insensitive: Regex },
}

impl SafelistPattern {
    fn compile(entry: &SafelistEntry) -> Result<SafelistPattern> {
        let build = |pattern: &str, case_insensitive: bool| {
            RegexBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|source| PurgeError::SafelistPattern {
                    pattern: pattern.to_string(),
                    source,
                })
        };
        Ok(match entry {
            SafelistEntry::Exact(value) => SafelistPattern::Exact(value.clone()),
            SafelistEntry::Prefix { prefix } => SafelistPattern::Prefix(prefix.clone()),
            SafelistEntry::Pattern { pattern } => SafelistPattern::Regex {
                sensitive: build(pattern, false)?,
                insensitive: build(pattern, true)?,
            },
        })
    }

    /// `folded` is the lower-cased candidate, used when `case_insensitive`
    fn matches(&self, candidate: &str, folded: &str, case_insensitive: bool) -> bool {
        match self {
            SafelistPattern::Exact(value) if case_insensitive => folded == value.to_lowercase(),
            SafelistPattern::Exact(value) => candidate == value,
            SafelistPattern::Prefix(prefix) if case_insensitive => folded.starts_with(&prefix.to_lowercase()),
            SafelistPattern::Prefix(prefix) => candidate.starts_with(prefix.as_str()),
            SafelistPattern::Regex { insensitive, .. } if case_insensitive => insensitive.is_match(candidate),
            SafelistPattern::Regex { sensitive, .. } => sensitive.is_match(candidate),
        }
    }
}

/// Names and patterns that force selectors to be kept
///
/// Standard entries are checked against the whole selector text, which keeps
/// the selector outright, and against each class, id and type name in it,
/// which counts that one name as observed. Greedy entries are only checked
/// against names, and a single greedy match keeps the whole selector, so
/// `.modal .close` survives a greedy `modal` even if `close` never appears.
#[derive(Debug, Clone, Default)]
pub struct Safelist {
    standard: Vec<SafelistPattern>,
    greedy: Vec<SafelistPattern>,
    case_insensitive: bool,
}

impl Safelist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive safelists fold both entries and candidates when
    /// matching, so entries added before or after this call behave the same
    pub fn case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    /// Build a safelist from configuration entries
    pub fn from_entries(standard: &[SafelistEntry], greedy: &[SafelistEntry], case_insensitive: bool) -> Result<Self> {
        let mut safelist = Safelist::new().case_insensitive(case_insensitive);
        for entry in standard {
            safelist.add(entry)?;
        }
        for entry in greedy {
            safelist.add_greedy(entry)?;
        }
        Ok(safelist)
    }

    pub fn add(&mut self, entry: &SafelistEntry) -> Result<()> {
        let pattern = SafelistPattern::compile(entry)?;
        self.standard.push(pattern);
        Ok(())
    }

    pub fn add_greedy(&mut self, entry: &SafelistEntry) -> Result<()> {
        let pattern = SafelistPattern::compile(entry)?;
        self.greedy.push(pattern);
        Ok(())
    }

    pub fn with_exact(mut self, value: impl Into<String>) -> Result<Self> {
        self.add(&SafelistEntry::Exact(value.into()))?;
        Ok(self)
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Result<Self> {
        self.add(&SafelistEntry::Pattern { pattern: pattern.into() })?;
        Ok(self)
    }

    pub fn with_greedy_pattern(mut self, pattern: impl Into<String>) -> Result<Self> {
        self.add_greedy(&SafelistEntry::Pattern { pattern: pattern.into() })?;
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.standard.is_empty() && self.greedy.is_empty()
    }

    pub fn len(&self) -> usize {
        self.standard.len() + self.greedy.len()
    }

    /// Does a standard entry match the full selector text?
    pub fn matches_selector(&self, selector: &str) -> bool {
        self.any(&self.standard, selector.trim())
    }

    /// Does a standard entry match a class, id or type name?
    pub fn matches_name(&self, name: &str) -> bool {
        self.any(&self.standard, name)
    }

    /// Does a greedy entry match a class, id or type name?
    pub fn matches_greedy(&self, name: &str) -> bool {
        self.any(&self.greedy, name)
    }

    fn any(&self, patterns: &[SafelistPattern], candidate: &str) -> bool {
        if patterns.is_empty() {
            return false;
        }
        let folded = if self.case_insensitive {
            candidate.to_lowercase()
        } else {
            String::new()
        };
        patterns
            .iter()
            .any(|p| p.matches(candidate, &folded, self.case_insensitive))
    }
}
