//! Top-level [`Config`] and its `validate()` pass.
//!
//! Every tunable named in the interface spec (bug threshold, execution and
//! iteration budgets, search weights, synonyms, credential ring, sandbox
//! allowlist) lives here as a config field with a documented default, so the
//! running system can be reconfigured without a recompile. `validate()`
//! never panics; it collects graded [`ConfigIssue`]s and lets the caller
//! decide whether warnings are acceptable.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

/// One named signal weight in the search scoring function. Kept as a vector
/// of pairs (rather than a fixed struct) so operators can retune without a
/// schema change; `SearchConfig::weight` resolves the lookup with the
/// documented defaults as a fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchWeights {
    #[serde(default = "SearchWeights::default_exact_name")]
    pub exact_name: f64,
    #[serde(default = "SearchWeights::default_name_substring")]
    pub name_substring: f64,
    #[serde(default = "SearchWeights::default_token_jaccard")]
    pub token_jaccard: f64,
    #[serde(default = "SearchWeights::default_fuzzy_name")]
    pub fuzzy_name: f64,
    #[serde(default = "SearchWeights::default_description_hit")]
    pub description_hit: f64,
    #[serde(default = "SearchWeights::default_tag_hit")]
    pub tag_hit: f64,
    #[serde(default = "SearchWeights::default_category_hit")]
    pub category_hit: f64,
    #[serde(default = "SearchWeights::default_synonym_expansion")]
    pub synonym_expansion: f64,
    #[serde(default = "SearchWeights::default_popularity_boost")]
    pub popularity_boost: f64,
}

impl SearchWeights {
    fn default_exact_name() -> f64 {
        0.35
    }
    fn default_name_substring() -> f64 {
        0.15
    }
    fn default_token_jaccard() -> f64 {
        0.20
    }
    fn default_fuzzy_name() -> f64 {
        0.10
    }
    fn default_description_hit() -> f64 {
        0.08
    }
    fn default_tag_hit() -> f64 {
        0.07
    }
    fn default_category_hit() -> f64 {
        0.03
    }
    fn default_synonym_expansion() -> f64 {
        0.02
    }
    fn default_popularity_boost() -> f64 {
        0.05
    }

    /// Sum of the non-popularity signal weights; should be close to 1.0.
    pub fn signal_sum(&self) -> f64 {
        self.exact_name
            + self.name_substring
            + self.token_jaccard
            + self.fuzzy_name
            + self.description_hit
            + self.tag_hit
            + self.category_hit
            + self.synonym_expansion
    }
}

impl Default for SearchWeights {
    fn default() -> Self {
        SearchWeights {
            exact_name: Self::default_exact_name(),
            name_substring: Self::default_name_substring(),
            token_jaccard: Self::default_token_jaccard(),
            fuzzy_name: Self::default_fuzzy_name(),
            description_hit: Self::default_description_hit(),
            tag_hit: Self::default_tag_hit(),
            category_hit: Self::default_category_hit(),
            synonym_expansion: Self::default_synonym_expansion(),
            popularity_boost: Self::default_popularity_boost(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "SearchConfig::default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub weights: SearchWeights,
    /// token -> alternate tokens, folded into the query before jaccard scoring.
    #[serde(default)]
    pub synonyms: HashMap<String, Vec<String>>,
}

impl SearchConfig {
    fn default_threshold() -> f64 {
        0.3
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            threshold: Self::default_threshold(),
            weights: SearchWeights::default(),
            synonyms: HashMap::new(),
        }
    }
}

/// How a credential's API key is resolved. Mirrors the precedence used
/// elsewhere in this codebase: an inline value takes priority over an
/// environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    ApiKey { key: String },
    Env { var: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub id: String,
    pub base_url: String,
    #[serde(default)]
    pub model: Option<String>,
    pub auth: AuthMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub credentials: Vec<CredentialConfig>,
    #[serde(default = "OracleConfig::default_rate_per_minute")]
    pub rate_per_minute: u32,
    #[serde(default = "OracleConfig::default_max_attempts")]
    pub max_attempts_per_credential: u32,
}

impl OracleConfig {
    fn default_rate_per_minute() -> u32 {
        60
    }
    fn default_max_attempts() -> u32 {
        5
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            credentials: Vec::new(),
            rate_per_minute: Self::default_rate_per_minute(),
            max_attempts_per_credential: Self::default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "SandboxConfig::default_allowed_imports")]
    pub allowed_imports: Vec<String>,
    #[serde(default = "SandboxConfig::default_t_exec_secs")]
    pub t_exec_secs: u64,
    #[serde(default = "SandboxConfig::default_max_chain_depth")]
    pub max_chain_depth: u32,
}

impl SandboxConfig {
    fn default_allowed_imports() -> Vec<String> {
        vec!["json".into(), "datetime".into(), "http".into(), "math".into()]
    }
    fn default_t_exec_secs() -> u64 {
        10
    }
    fn default_max_chain_depth() -> u32 {
        4
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        SandboxConfig {
            allowed_imports: Self::default_allowed_imports(),
            t_exec_secs: Self::default_t_exec_secs(),
            max_chain_depth: Self::default_max_chain_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "AgentConfig::default_bug_threshold")]
    pub bug_threshold: u32,
    #[serde(default = "AgentConfig::default_iter_max")]
    pub iter_max: u32,
    #[serde(default = "AgentConfig::default_t_max_secs")]
    pub t_max_secs: u64,
}

impl AgentConfig {
    fn default_bug_threshold() -> u32 {
        3
    }
    fn default_iter_max() -> u32 {
        8
    }
    fn default_t_max_secs() -> u64 {
        120
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            bug_threshold: Self::default_bug_threshold(),
            iter_max: Self::default_iter_max(),
            t_max_secs: Self::default_t_max_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub cors_permissive: bool,
}

impl ServerConfig {
    fn default_host() -> String {
        "127.0.0.1".into()
    }
    fn default_port() -> u16 {
        8080
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: Self::default_host(),
            port: Self::default_port(),
            cors_permissive: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "StoreConfig::default_ledger_path")]
    pub ledger_path: String,
}

impl StoreConfig {
    fn default_ledger_path() -> String {
        "./data/tools.jsonl".into()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig { ledger_path: Self::default_ledger_path() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Validates cross-field and range constraints that serde defaults can't
    /// express. Never panics; collects every issue rather than stopping at
    /// the first one.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let mut err = |field: &str, message: String| {
            issues.push(ConfigIssue { severity: Severity::Error, field: field.into(), message })
        };
        let mut warn = |field: &str, message: String| {
            issues.push(ConfigIssue { severity: Severity::Warning, field: field.into(), message })
        };

        if self.server.port == 0 {
            err("server.port", "must not be 0".into());
        }
        if self.server.host.trim().is_empty() {
            err("server.host", "must not be empty".into());
        }
        if self.store.ledger_path.trim().is_empty() {
            err("store.ledger_path", "must not be empty".into());
        }

        if self.agent.iter_max == 0 {
            err("agent.iter_max", "must be at least 1".into());
        }
        if self.agent.t_max_secs == 0 {
            err("agent.t_max_secs", "must be at least 1".into());
        }
        if self.agent.bug_threshold == 0 {
            err("agent.bug_threshold", "must be at least 1".into());
        }

        if !(0.0..=1.0).contains(&self.search.threshold) {
            err("search.threshold", "must be within [0, 1]".into());
        }
        let sum = self.search.weights.signal_sum();
        if (sum - 1.0).abs() > 0.05 {
            warn("search.weights", format!("signal weights sum to {sum:.3}, expected close to 1.0"));
        }

        if self.sandbox.allowed_imports.is_empty() {
            warn("sandbox.allowed_imports", "empty allowlist; sandboxed tools will have no imports".into());
        }
        if self.sandbox.t_exec_secs == 0 {
            err("sandbox.t_exec_secs", "must be at least 1".into());
        }
        if self.sandbox.max_chain_depth == 0 {
            err("sandbox.max_chain_depth", "must be at least 1".into());
        }

        if self.oracle.credentials.is_empty() {
            warn("oracle.credentials", "no LLM credentials configured".into());
        }
        for (i, cred) in self.oracle.credentials.iter().enumerate() {
            if cred.id.trim().is_empty() {
                err(&format!("oracle.credentials[{i}].id"), "must not be empty".into());
            }
            if !(cred.base_url.starts_with("http://") || cred.base_url.starts_with("https://")) {
                err(&format!("oracle.credentials[{i}].base_url"), "must start with http:// or https://".into());
            }
            if let AuthMode::Env { var } = &cred.auth {
                if var.trim().is_empty() {
                    err(&format!("oracle.credentials[{i}].auth.var"), "must not be empty".into());
                }
            }
        }
        if self.oracle.rate_per_minute == 0 {
            err("oracle.rate_per_minute", "must be at least 1".into());
        }

        issues
    }

    pub fn has_errors(issues: &[ConfigIssue]) -> bool {
        issues.iter().any(|i| i.severity == Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut c = Config::default();
        c.oracle.credentials.push(CredentialConfig {
            id: "primary".into(),
            base_url: "https://api.example.com/v1".into(),
            model: Some("gpt-4o-mini".into()),
            auth: AuthMode::Env { var: "FORGE_ORACLE_KEY".into() },
        });
        c
    }

    fn find_issue<'a>(issues: &'a [ConfigIssue], field: &str) -> Option<&'a ConfigIssue> {
        issues.iter().find(|i| i.field == field)
    }

    #[test]
    fn default_config_has_no_error_issues_besides_missing_credentials() {
        let issues = Config::default().validate();
        assert!(!Config::has_errors(&issues));
    }

    #[test]
    fn valid_config_has_no_issues_at_all() {
        let issues = valid_config().validate();
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[test]
    fn zero_port_is_an_error() {
        let mut c = valid_config();
        c.server.port = 0;
        assert!(find_issue(&c.validate(), "server.port").is_some());
    }

    #[test]
    fn empty_credential_list_is_a_warning_not_an_error() {
        let c = Config::default();
        let issues = c.validate();
        let issue = find_issue(&issues, "oracle.credentials").unwrap();
        assert_eq!(issue.severity, Severity::Warning);
        assert!(!Config::has_errors(&issues));
    }

    #[test]
    fn credential_with_bad_base_url_is_an_error() {
        let mut c = valid_config();
        c.oracle.credentials[0].base_url = "ftp://bad".into();
        let issues = c.validate();
        assert!(Config::has_errors(&issues));
    }

    #[test]
    fn threshold_out_of_range_is_an_error() {
        let mut c = valid_config();
        c.search.threshold = 1.5;
        assert!(find_issue(&c.validate(), "search.threshold").is_some());
    }

    #[test]
    fn skewed_weights_warn_but_do_not_fail() {
        let mut c = valid_config();
        c.search.weights.exact_name = 5.0;
        let issues = c.validate();
        let issue = find_issue(&issues, "search.weights").unwrap();
        assert_eq!(issue.severity, Severity::Warning);
    }

    #[test]
    fn zero_iter_max_is_an_error() {
        let mut c = valid_config();
        c.agent.iter_max = 0;
        assert!(Config::has_errors(&c.validate()));
    }

    #[test]
    fn display_format_matches_tag_field_message() {
        let issue = ConfigIssue { severity: Severity::Error, field: "x".into(), message: "bad".into() };
        assert_eq!(issue.to_string(), "[ERROR] x: bad");
    }

    #[test]
    fn parses_from_toml() {
        let toml_src = r#"
            [server]
            port = 9090

            [[oracle.credentials]]
            id = "primary"
            base_url = "https://api.example.com/v1"
            auth = { env = { var = "FORGE_ORACLE_KEY" } }
        "#;
        let c = Config::from_toml_str(toml_src).expect("parses");
        assert_eq!(c.server.port, 9090);
        assert_eq!(c.oracle.credentials.len(), 1);
    }
}
