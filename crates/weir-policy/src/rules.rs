//! Compiled rule sets.

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// An immutable triple of compiled path-glob pattern lists.
///
/// Matching uses shell-glob semantics (`*`, `?`, `[...]`), case-sensitive,
/// with `*` matching across `/` so that `*/admin/*` covers arbitrarily deep
/// admin paths. Lists are scanned linearly; a rule set is an existential
/// match, so order within a list does not matter.
#[derive(Debug, Clone)]
pub struct RuleSet {
    allow: Vec<Pattern>,
    protect: Vec<Pattern>,
    superuser: Vec<Pattern>,
}

impl RuleSet {
    /// Compile a rule set from pattern strings.
    pub fn new<A, P, S>(allow: &[A], protect: &[P], superuser: &[S]) -> Result<Self, RuleError>
    where
        A: AsRef<str>,
        P: AsRef<str>,
        S: AsRef<str>,
    {
        Ok(Self {
            allow: compile(allow)?,
            protect: compile(protect)?,
            superuser: compile(superuser)?,
        })
    }

    /// A rule set with no patterns at all. Evaluates to open policy.
    pub fn empty() -> Self {
        Self {
            allow: Vec::new(),
            protect: Vec::new(),
            superuser: Vec::new(),
        }
    }

    /// Does any `allow` pattern match this path?
    pub fn allows(&self, path: &str) -> bool {
        matches_any(&self.allow, path)
    }

    /// Does any `protect` pattern match this path?
    pub fn protects(&self, path: &str) -> bool {
        matches_any(&self.protect, path)
    }

    /// Does any `superuser` pattern match this path?
    pub fn requires_superuser(&self, path: &str) -> bool {
        matches_any(&self.superuser, path)
    }
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Pattern>, RuleError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p.as_ref()).map_err(|source| RuleError::InvalidPattern {
                pattern: p.as_ref().to_string(),
                source,
            })
        })
        .collect()
}

fn matches_any(patterns: &[Pattern], path: &str) -> bool {
    patterns.iter().any(|p| p.matches(path))
}

/// Serializable form of a rule set, as it appears in configuration files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSetConfig {
    pub allow: Vec<String>,
    pub protect: Vec<String>,
    pub superuser: Vec<String>,
}

impl TryFrom<RuleSetConfig> for RuleSet {
    type Error = RuleError;

    fn try_from(config: RuleSetConfig) -> Result<Self, Self::Error> {
        RuleSet::new(&config.allow, &config.protect, &config.superuser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: &[&str] = &[];

    #[test]
    fn test_star_matches_across_separators() {
        let rules = RuleSet::new(NONE, NONE, &["*/admin/*"]).unwrap();
        assert!(rules.requires_superuser("/api/admin/users"));
        assert!(rules.requires_superuser("/a/admin/b/c"));
        assert!(!rules.requires_superuser("/api/administrators"));
    }

    #[test]
    fn test_literal_pattern_is_exact() {
        let rules = RuleSet::new(&["auth/client"], NONE, NONE).unwrap();
        assert!(rules.allows("auth/client"));
        assert!(!rules.allows("/auth/client"));
        assert!(!rules.allows("auth/client/extra"));
    }

    #[test]
    fn test_question_mark_and_class() {
        let rules = RuleSet::new(&["/v?/status", "/v[12]/info"], NONE, NONE).unwrap();
        assert!(rules.allows("/v1/status"));
        assert!(rules.allows("/v2/info"));
        assert!(!rules.allows("/v10/status"));
        assert!(!rules.allows("/v3/info"));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let rules = RuleSet::new(NONE, &["/Admin/*"], NONE).unwrap();
        assert!(rules.protects("/Admin/users"));
        assert!(!rules.protects("/admin/users"));
    }

    #[test]
    fn test_config_round_trip() {
        let config: RuleSetConfig = serde_json::from_str(
            r#"{"allow": ["/health"], "protect": ["*"], "superuser": ["*/admin/*"]}"#,
        )
        .unwrap();
        let rules = RuleSet::try_from(config).unwrap();
        assert!(rules.allows("/health"));
        assert!(rules.protects("/anything"));
        assert!(rules.requires_superuser("/api/admin/users"));
    }

    #[test]
    fn test_config_defaults_to_empty_lists() {
        let config: RuleSetConfig = serde_json::from_str("{}").unwrap();
        let rules = RuleSet::try_from(config).unwrap();
        assert!(!rules.allows("/anything"));
        assert!(!rules.protects("/anything"));
        assert!(!rules.requires_superuser("/anything"));
    }
}
