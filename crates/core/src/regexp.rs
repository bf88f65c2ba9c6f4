use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::PluginError;
use crate::plugin::RegexpMatcher;

/// Compiled pattern cache shared by all tasks of one client.
///
/// Lookups take the read lock; a pattern is compiled once under the write
/// lock on first use.
#[derive(Debug, Default)]
pub struct PatternCache {
    patterns: RwLock<HashMap<String, Regex>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.patterns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn compiled(&self, pattern: &str) -> Result<Regex, PluginError> {
        if let Some(re) = self
            .patterns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pattern)
        {
            return Ok(re.clone());
        }

        let re = Regex::new(pattern).map_err(|e| PluginError::Pattern(e.to_string()))?;
        debug!(pattern, "Compiled pattern");
        self.patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pattern.to_string(), re.clone());
        Ok(re)
    }
}

/// Replace `\0`..`\9` with the corresponding capture group.
fn expand_template(template: &str, caps: &Captures<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(group) = chars.peek().and_then(|d| d.to_digit(10)) {
                chars.next();
                if let Some(m) = caps.get(group as usize) {
                    out.push_str(m.as_str());
                }
                continue;
            }
        }
        out.push(c);
    }
    out
}

impl RegexpMatcher for PatternCache {
    fn matches(
        &self,
        value: &str,
        pattern: &str,
        output_template: Option<&str>,
    ) -> Result<Option<String>, PluginError> {
        let re = self.compiled(pattern)?;
        let Some(caps) = re.captures(value) else {
            return Ok(None);
        };
        Ok(Some(match output_template {
            Some(template) => expand_template(template, &caps),
            None => value.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_without_template_returns_value() {
        let cache = PatternCache::new();
        let out = cache.matches("error: disk full", "^error", None).unwrap();
        assert_eq!(out.as_deref(), Some("error: disk full"));
        assert_eq!(cache.matches("ok", "^error", None).unwrap(), None);
    }

    #[test]
    fn template_groups_are_expanded() {
        let cache = PatternCache::new();
        let out = cache
            .matches("user=alice id=42", r"user=(\w+) id=(\d+)", Some(r"\2:\1 \9\x"))
            .unwrap();
        assert_eq!(out.as_deref(), Some(r"42:alice \x"));
    }

    #[test]
    fn patterns_are_compiled_once() {
        let cache = PatternCache::new();
        cache.matches("a", "a+", None).unwrap();
        cache.matches("aa", "a+", None).unwrap();
        cache.matches("b", "b", None).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let cache = PatternCache::new();
        let err = cache.matches("x", "(", None).unwrap_err();
        assert!(matches!(err, PluginError::Pattern(_)));
        assert!(cache.is_empty());
    }
}
