use crate::error::PatternError;
use regex::Regex;
use std::{cell::RefCell, collections::HashMap};

///
/// LIKE pattern compiler
///
/// Translates SQL-LIKE wildcard patterns to anchored regexes:
/// `%` matches any run of characters (including empty), `_` matches
/// exactly one, and an optional escape character makes the following
/// character literal. Matching is case-sensitive.
///
/// A leading or trailing `%` removes the corresponding anchor instead
/// of emitting `.*`, so `%`-only boundaries stay open-ended without
/// dragging the regex engine through a wildcard scan.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum PatternToken {
    /// `%` — any run of characters.
    AnyRun,
    /// `_` — exactly one character.
    AnyOne,
    /// A literal character (wildcards included, when escaped).
    Literal(char),
}

// Split a pattern into wildcard/literal tokens, honoring the escape char.
fn tokenize(pattern: &str, escape: Option<char>) -> Result<Vec<PatternToken>, PatternError> {
    if let Some(esc) = escape
        && (esc == '%' || esc == '_')
    {
        return Err(PatternError::EscapeIsWildcard(esc));
    }

    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        if Some(c) == escape {
            let Some(escaped) = chars.next() else {
                return Err(PatternError::DanglingEscape);
            };
            tokens.push(PatternToken::Literal(escaped));
        } else if c == '%' {
            tokens.push(PatternToken::AnyRun);
        } else if c == '_' {
            tokens.push(PatternToken::AnyOne);
        } else {
            tokens.push(PatternToken::Literal(c));
        }
    }

    Ok(tokens)
}

/// Compile a LIKE pattern into a matcher.
///
/// An empty pattern accepts only the empty subject.
pub fn compile_like(pattern: &str, escape: Option<char>) -> Result<Regex, PatternError> {
    let tokens = tokenize(pattern, escape)?;

    if tokens.is_empty() {
        return Regex::new("^$").map_err(|e| PatternError::Compile(e.to_string()));
    }

    let last = tokens.len() - 1;
    let mut source = String::with_capacity(pattern.len() * 2 + 2);

    for (i, token) in tokens.iter().enumerate() {
        match token {
            PatternToken::AnyRun => {
                // Boundary wildcards drop the anchor entirely.
                if i != 0 && i != last {
                    source.push_str(".*");
                }
            }
            PatternToken::AnyOne => {
                if i == 0 {
                    source.push('^');
                }
                source.push('.');
                if i == last {
                    source.push('$');
                }
            }
            PatternToken::Literal(c) => {
                if i == 0 {
                    source.push('^');
                }
                source.push_str(&regex::escape(&c.to_string()));
                if i == last {
                    source.push('$');
                }
            }
        }
    }

    Regex::new(&source).map_err(|e| PatternError::Compile(e.to_string()))
}

///
/// PatternCache
///
/// Compiled matchers keyed by `(pattern, escape)`, owned by one
/// evaluation scope: one filter evaluated against many records compiles
/// each pattern once, and the cache dies with its owner instead of
/// leaking across unrelated trees.
///

#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: RefCell<HashMap<(String, Option<char>), Regex>>,
}

impl PatternCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the compiled matcher for `(pattern, escape)`, compiling on
    /// first use. `Regex` clones share the compiled program.
    pub fn get_or_compile(
        &self,
        pattern: &str,
        escape: Option<char>,
    ) -> Result<Regex, PatternError> {
        let key = (pattern.to_string(), escape);
        let mut compiled = self.compiled.borrow_mut();

        if let Some(regex) = compiled.get(&key) {
            return Ok(regex.clone());
        }

        let regex = compile_like(pattern, escape)?;
        compiled.insert(key, regex.clone());
        Ok(regex)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.compiled.borrow().len()
    }
}

///
/// TESTS
///
