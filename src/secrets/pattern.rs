//! Secret detection by environment variable name.

use std::sync::LazyLock;

use regex::Regex;

/// A pattern that identifies secret environment variables.
#[derive(Debug, Clone)]
pub struct SecretPattern {
    /// Name of this pattern (for debugging).
    pub name: String,
    /// Regex matched against environment variable names.
    pub env_pattern: Regex,
}

/// Built-in patterns as (name, regex).
pub const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    ("aws_access_key_id", r"(?i)^AWS_ACCESS_KEY(_ID)?$"),
    ("aws_secret_access_key", r"(?i)^.*SECRET_ACCESS_KEY$"),
    ("api_key", r"(?i)^.*_?(API_?KEY|APIKEY)$"),
    ("secret", r"(?i)^.*_?(SECRET|SECRET_KEY)$"),
    ("token", r"(?i)^.*_?(TOKEN|ACCESS_TOKEN|AUTH_TOKEN|SESSION_TOKEN)$"),
    ("password", r"(?i)^.*_?(PASSWORD|PASSWD|PWD)$"),
    ("private_key", r"(?i)^.*_?PRIVATE_KEY$"),
];

static BUILTINS: LazyLock<Vec<SecretPattern>> = LazyLock::new(|| {
    BUILTIN_PATTERNS
        .iter()
        .filter_map(|(name, pattern)| {
            Regex::new(pattern).ok().map(|env_pattern| SecretPattern {
                name: name.to_string(),
                env_pattern,
            })
        })
        .collect()
});

/// Matches environment variable names against secret patterns.
///
/// # Example
///
/// ```
/// use bakery::secrets::SecretMatcher;
///
/// let matcher = SecretMatcher::with_builtins();
///
/// assert!(matcher.is_secret("AWS_SECRET_ACCESS_KEY"));
/// assert!(matcher.is_secret("AWS_SESSION_TOKEN"));
/// assert!(!matcher.is_secret("AWS_REGION"));
/// ```
#[derive(Debug, Clone)]
pub struct SecretMatcher {
    patterns: Vec<SecretPattern>,
}

impl SecretMatcher {
    /// Create a matcher with built-in patterns.
    pub fn with_builtins() -> Self {
        Self {
            patterns: BUILTINS.clone(),
        }
    }

    /// Create a matcher with custom patterns.
    pub fn new(patterns: Vec<SecretPattern>) -> Self {
        Self { patterns }
    }

    /// Built-in patterns plus exact matches for `custom_names`.
    pub fn with_builtins_and_custom(custom_names: &[String]) -> Self {
        let mut matcher = Self::with_builtins();

        for name in custom_names {
            if let Ok(pattern) = Regex::new(&format!("^{}$", regex::escape(name))) {
                matcher.add_pattern(SecretPattern {
                    name: format!("custom:{}", name),
                    env_pattern: pattern,
                });
            }
        }

        matcher
    }

    /// Add a pattern.
    pub fn add_pattern(&mut self, pattern: SecretPattern) {
        self.patterns.push(pattern);
    }

    /// Whether `env_name` matches any pattern.
    pub fn is_secret(&self, env_name: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.env_pattern.is_match(env_name))
    }

    /// Names from `env_names` that match a pattern.
    pub fn find_secrets<'a>(&self, env_names: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
        env_names.filter(|name| self.is_secret(name)).collect()
    }

    /// Number of patterns.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

impl Default for SecretMatcher {
    fn default() -> Self {
        Self::with_builtins()
    }
}
