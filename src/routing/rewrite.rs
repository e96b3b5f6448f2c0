//! Outbound path rewriting.

use regex::Regex;

/// Regex rewrite with `${group}` replacement syntax.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pattern: Regex,
    replacement: String,
}

impl RewriteRule {
    pub fn new(pattern: &str, replacement: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.to_string(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Rewrite a path (no query string). The result always starts with `/`.
    pub fn apply(&self, path: &str) -> String {
        let rewritten = self.pattern.replace_all(path, self.replacement.as_str());
        if rewritten.starts_with('/') {
            rewritten.into_owned()
        } else {
            format!("/{rewritten}")
        }
    }
}
