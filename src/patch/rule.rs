// src/patch/rule.rs

//! Substitution rules
//!
//! A rule pairs a matcher with a replacement. Text rules match either a
//! literal string or a regex whose replacement may reference capture groups
//! (`$1`, `${name}`). Byte rules are literal only.

use crate::error::{Error, Result};
use regex::Regex;
use std::borrow::Cow;
use std::fmt;

/// A substitution applied to text resources
#[derive(Clone)]
pub enum TextRule {
    /// Replace every occurrence of `from` with `to`
    Literal { from: String, to: String },
    /// Replace every match of `regex`, expanding capture references in `replacement`
    Pattern { regex: Regex, replacement: String },
}

impl TextRule {
    /// Literal rule. An empty `from` never matches.
    pub fn literal(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Literal {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Pattern rule compiled from a regex string
    pub fn pattern(pattern: &str, replacement: impl Into<String>) -> Result<Self> {
        Ok(Self::Pattern {
            regex: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }

    /// Apply this rule to `input`, borrowing when nothing matched
    pub fn apply<'a>(&self, input: &'a str) -> Cow<'a, str> {
        match self {
            Self::Literal { from, to } => {
                if from.is_empty() || !input.contains(from.as_str()) {
                    Cow::Borrowed(input)
                } else {
                    Cow::Owned(input.replace(from.as_str(), to))
                }
            }
            Self::Pattern { regex, replacement } => {
                regex.replace_all(input, replacement.as_str())
            }
        }
    }
}

impl fmt::Debug for TextRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal { from, to } => write!(f, "Literal({:?} -> {:?})", from, to),
            Self::Pattern { regex, replacement } => {
                write!(f, "Pattern(/{}/ -> {:?})", regex.as_str(), replacement)
            }
        }
    }
}

/// A literal byte-sequence substitution for binary resources
///
/// Literal only. Binary containers record field lengths out of band, so
/// structural rewrites would desynchronize offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteRule {
    from: Vec<u8>,
    to: Vec<u8>,
}

impl ByteRule {
    /// Create a byte rule. The matched sequence must not be empty.
    pub fn new(from: impl Into<Vec<u8>>, to: impl Into<Vec<u8>>) -> Result<Self> {
        let from = from.into();
        if from.is_empty() {
            return Err(Error::invariant("byte rule with an empty match sequence"));
        }
        Ok(Self { from, to: to.into() })
    }

    /// Byte rule that refuses to change the length of what it replaces
    pub fn fixed_width(from: impl Into<Vec<u8>>, to: impl Into<Vec<u8>>) -> Result<Self> {
        let rule = Self::new(from, to)?;
        if rule.from.len() != rule.to.len() {
            return Err(Error::invariant(format!(
                "fixed-width replacement changes length: {} != {}",
                rule.from.len(),
                rule.to.len()
            )));
        }
        Ok(rule)
    }

    /// Apply to `input`, borrowing when nothing matched
    pub fn apply<'a>(&self, input: &'a [u8]) -> Cow<'a, [u8]> {
        let Some(first) = find(input, &self.from, 0) else {
            return Cow::Borrowed(input);
        };

        let mut output = Vec::with_capacity(input.len());
        let mut cursor = 0;
        let mut next = Some(first);
        while let Some(at) = next {
            output.extend_from_slice(&input[cursor..at]);
            output.extend_from_slice(&self.to);
            cursor = at + self.from.len();
            next = find(input, &self.from, cursor);
        }
        output.extend_from_slice(&input[cursor..]);
        Cow::Owned(output)
    }
}

/// Position of the first occurrence of `needle` at or after `start`
fn find(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if needle.is_empty() || start >= haystack.len() {
        return None;
    }
    haystack[start..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + start)
}
