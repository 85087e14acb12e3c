//! The [`Tool`] entity and its supporting types.
//!
//! A tool is a named, parameterized unit of code stored in the tool store
//! and executed by the sandbox. This module only models the entity and its
//! invariants; storage and execution live in their own crates.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of entries kept in a tool's [`Tool::bug_log`].
pub const BUG_LOG_CAP: usize = 32;

/// Declared type of a single tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

/// One declared parameter of a tool's `run` entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

/// A single recorded failure, kept in [`Tool::bug_log`] as a bounded ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugEntry {
    pub at: DateTime<Utc>,
    pub error_kind: String,
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
}

/// The central entity: a named, executable, searchable tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub parameters: Vec<ParameterSpec>,
    pub code: String,
    pub is_active: bool,
    pub is_bugged: bool,
    pub bug_count: u32,
    pub bug_log: Vec<BugEntry>,
    pub execution_count: u64,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a new tool. `id`/timestamps/analytics are
/// assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub parameters: Vec<ParameterSpec>,
    pub code: String,
}

/// Partial update accepted by `update`. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Option<String>>,
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default)]
    pub parameters: Option<Vec<ParameterSpec>>,
    #[serde(default)]
    pub code: Option<String>,
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, enforced on both tool names and parameter names.
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Tool {
    /// Builds a fresh tool record from a spec, stamping identity and timestamps.
    pub fn new(spec: ToolSpec) -> Self {
        let now = Utc::now();
        Tool {
            id: Uuid::new_v4(),
            name: spec.name,
            description: spec.description,
            category: spec.category,
            tags: spec.tags,
            parameters: spec.parameters,
            code: spec.code,
            is_active: true,
            is_bugged: false,
            bug_count: 0,
            bug_log: Vec::new(),
            execution_count: 0,
            last_executed_at: None,
            last_error_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Duplicate parameter names, an invalid tool name, or an invalid
    /// parameter name.
    pub fn validate_spec(spec: &ToolSpec) -> Result<(), String> {
        if !is_valid_identifier(&spec.name) {
            return Err(format!("tool name '{}' is not a valid identifier", spec.name));
        }
        if spec.description.trim().is_empty() {
            return Err("description must not be empty".into());
        }
        if spec.code.trim().is_empty() {
            return Err("code must not be empty".into());
        }
        let mut seen = BTreeSet::new();
        for p in &spec.parameters {
            if !is_valid_identifier(&p.name) {
                return Err(format!("parameter name '{}' is not a valid identifier", p.name));
            }
            if !seen.insert(p.name.clone()) {
                return Err(format!("duplicate parameter name '{}'", p.name));
            }
        }
        Ok(())
    }

    /// Appends a bug, trimming the ring and flipping `is_bugged` at `threshold`.
    pub fn record_bug(&mut self, entry: BugEntry, threshold: u32) {
        self.bug_count = self.bug_count.saturating_add(1);
        self.last_error_at = Some(entry.at);
        self.bug_log.push(entry);
        if self.bug_log.len() > BUG_LOG_CAP {
            let excess = self.bug_log.len() - BUG_LOG_CAP;
            self.bug_log.drain(0..excess);
        }
        if self.bug_count >= threshold {
            self.is_bugged = true;
        }
        self.updated_at = Utc::now();
    }

    pub fn clear_bugs(&mut self) {
        self.bug_count = 0;
        self.bug_log.clear();
        self.is_bugged = false;
        self.updated_at = Utc::now();
    }

    pub fn record_execution(&mut self) {
        self.execution_count = self.execution_count.saturating_add(1);
        self.last_executed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ToolSpec {
        ToolSpec {
            name: "add".into(),
            description: "adds two numbers".into(),
            category: Some("math".into()),
            tags: BTreeSet::new(),
            parameters: vec![ParameterSpec {
                name: "a".into(),
                kind: ParameterType::Number,
                required: true,
                description: String::new(),
            }],
            code: "fn run(a) { a }".into(),
        }
    }

    #[test]
    fn valid_identifier_accepts_underscore_prefix() {
        assert!(is_valid_identifier("_foo"));
        assert!(is_valid_identifier("foo_bar2"));
    }

    #[test]
    fn valid_identifier_rejects_leading_digit() {
        assert!(!is_valid_identifier("2foo"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("foo-bar"));
    }

    #[test]
    fn validate_spec_rejects_duplicate_parameter_names() {
        let mut s = spec();
        s.parameters.push(ParameterSpec {
            name: "a".into(),
            kind: ParameterType::Number,
            required: false,
            description: String::new(),
        });
        assert!(Tool::validate_spec(&s).is_err());
    }

    #[test]
    fn validate_spec_rejects_bad_name() {
        let mut s = spec();
        s.name = "1bad".into();
        assert!(Tool::validate_spec(&s).is_err());
    }

    #[test]
    fn validate_spec_accepts_well_formed_spec() {
        assert!(Tool::validate_spec(&spec()).is_ok());
    }

    #[test]
    fn record_bug_flips_is_bugged_at_threshold() {
        let mut t = Tool::new(spec());
        for _ in 0..2 {
            t.record_bug(
                BugEntry {
                    at: Utc::now(),
                    error_kind: "RuntimeError".into(),
                    message: "boom".into(),
                    stack: None,
                },
                3,
            );
        }
        assert!(!t.is_bugged);
        t.record_bug(
            BugEntry {
                at: Utc::now(),
                error_kind: "RuntimeError".into(),
                message: "boom".into(),
                stack: None,
            },
            3,
        );
        assert!(t.is_bugged);
        assert_eq!(t.bug_count, 3);
    }

    #[test]
    fn clear_bugs_resets_state() {
        let mut t = Tool::new(spec());
        t.record_bug(
            BugEntry {
                at: Utc::now(),
                error_kind: "RuntimeError".into(),
                message: "boom".into(),
                stack: None,
            },
            1,
        );
        assert!(t.is_bugged);
        t.clear_bugs();
        assert!(!t.is_bugged);
        assert_eq!(t.bug_count, 0);
        assert!(t.bug_log.is_empty());
    }

    #[test]
    fn bug_log_ring_is_capped() {
        let mut t = Tool::new(spec());
        for _ in 0..(BUG_LOG_CAP + 10) {
            t.record_bug(
                BugEntry {
                    at: Utc::now(),
                    error_kind: "RuntimeError".into(),
                    message: "boom".into(),
                    stack: None,
                },
                u32::MAX,
            );
        }
        assert_eq!(t.bug_log.len(), BUG_LOG_CAP);
    }

    #[test]
    fn record_execution_increments_counter() {
        let mut t = Tool::new(spec());
        t.record_execution();
        t.record_execution();
        assert_eq!(t.execution_count, 2);
        assert!(t.last_executed_at.is_some());
    }
}
