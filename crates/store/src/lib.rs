//! The tool store: a durable catalog of [`forge_domain::Tool`]s plus the
//! weighted lexical search over them.
//!
//! Mutations serialize through a single [`parking_lot::RwLock`]-guarded
//! index backed by a [`ledger::Ledger`], the same `Arc<RwLock<HashMap<..>>>`
//! shape used for in-memory registries elsewhere in this codebase, with the
//! ledger standing in for durability.

mod ledger;
pub mod search;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use forge_domain::config::SearchConfig;
use forge_domain::tool::BugEntry;
use forge_domain::{Error, Result, Tool, ToolPatch, ToolSpec};
use parking_lot::RwLock;
use uuid::Uuid;

pub use search::Hit;

struct Index {
    by_id: HashMap<Uuid, Tool>,
    name_to_id: HashMap<String, Uuid>,
}

impl Index {
    fn from_map(by_id: HashMap<Uuid, Tool>) -> Self {
        let name_to_id = by_id.iter().map(|(id, t)| (t.name.clone(), *id)).collect();
        Index { by_id, name_to_id }
    }
}

/// Durable, search-backed catalog of tools. Cheap to clone (an `Arc` inside).
#[derive(Clone)]
pub struct ToolStore {
    inner: Arc<RwLock<Index>>,
    ledger: Arc<parking_lot::Mutex<ledger::Ledger>>,
}

impl ToolStore {
    /// Opens the ledger at `path`, replaying it into memory.
    pub fn open(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let (ledger, tools) = ledger::Ledger::open(path)?;
        Ok(ToolStore {
            inner: Arc::new(RwLock::new(Index::from_map(tools))),
            ledger: Arc::new(parking_lot::Mutex::new(ledger)),
        })
    }

    pub fn list(&self, active_only: bool, exclude_bugged: bool, category: Option<&str>) -> Vec<Tool> {
        let idx = self.inner.read();
        let mut tools: Vec<Tool> = idx
            .by_id
            .values()
            .filter(|t| !active_only || t.is_active)
            .filter(|t| !exclude_bugged || !t.is_bugged)
            .filter(|t| category.map(|c| t.category.as_deref() == Some(c)).unwrap_or(true))
            .cloned()
            .collect();
        tools.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.name.cmp(&b.name)));
        tools
    }

    pub fn get_by_id(&self, id: Uuid) -> Result<Tool> {
        self.inner
            .read()
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Tool> {
        let idx = self.inner.read();
        let id = idx.name_to_id.get(name).ok_or_else(|| Error::NotFound(name.to_string()))?;
        Ok(idx.by_id.get(id).expect("name_to_id is kept in sync").clone())
    }

    /// Resolves either a UUID string or a bare tool name to a tool.
    pub fn resolve(&self, id_or_name: &str) -> Result<Tool> {
        if let Ok(id) = Uuid::parse_str(id_or_name) {
            if let Ok(t) = self.get_by_id(id) {
                return Ok(t);
            }
        }
        self.get_by_name(id_or_name)
    }

    pub fn create(&self, spec: ToolSpec) -> Result<Tool> {
        Tool::validate_spec(&spec).map_err(Error::Validation)?;
        let mut idx = self.inner.write();
        if idx.name_to_id.contains_key(&spec.name) {
            return Err(Error::NameConflict(spec.name));
        }
        let tool = Tool::new(spec);
        self.persist_snapshot(&tool)?;
        idx.name_to_id.insert(tool.name.clone(), tool.id);
        idx.by_id.insert(tool.id, tool.clone());
        Ok(tool)
    }

    pub fn update(&self, id: Uuid, patch: ToolPatch) -> Result<Tool> {
        let mut idx = self.inner.write();
        let mut tool = idx.by_id.get(&id).cloned().ok_or_else(|| Error::NotFound(id.to_string()))?;

        if let Some(new_name) = &patch.name {
            if new_name != &tool.name {
                if idx.name_to_id.contains_key(new_name) {
                    return Err(Error::NameConflict(new_name.clone()));
                }
            }
        }

        if let Some(name) = patch.name {
            idx.name_to_id.remove(&tool.name);
            tool.name = name;
            idx.name_to_id.insert(tool.name.clone(), tool.id);
        }
        if let Some(description) = patch.description {
            tool.description = description;
        }
        if let Some(category) = patch.category {
            tool.category = category;
        }
        if let Some(tags) = patch.tags {
            tool.tags = tags;
        }
        if let Some(parameters) = patch.parameters {
            tool.parameters = parameters;
        }
        if let Some(code) = patch.code {
            tool.code = code;
        }
        tool.updated_at = Utc::now();

        self.persist_snapshot(&tool)?;
        idx.by_id.insert(tool.id, tool.clone());
        Ok(tool)
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        let mut idx = self.inner.write();
        if let Some(tool) = idx.by_id.remove(&id) {
            idx.name_to_id.remove(&tool.name);
            self.ledger.lock().append_tombstone(id).map_err(|e| Error::Storage(e.to_string()))?;
        }
        Ok(())
    }

    pub fn report_bug(&self, id: Uuid, error_kind: &str, message: &str, stack: Option<String>, threshold: u32) -> Result<Tool> {
        let mut idx = self.inner.write();
        let mut tool = idx.by_id.get(&id).cloned().ok_or_else(|| Error::NotFound(id.to_string()))?;
        tool.record_bug(
            BugEntry { at: Utc::now(), error_kind: error_kind.into(), message: message.into(), stack },
            threshold,
        );
        self.persist_snapshot(&tool)?;
        idx.by_id.insert(tool.id, tool.clone());
        Ok(tool)
    }

    pub fn clear_bugs(&self, id: Uuid) -> Result<Tool> {
        let mut idx = self.inner.write();
        let mut tool = idx.by_id.get(&id).cloned().ok_or_else(|| Error::NotFound(id.to_string()))?;
        tool.clear_bugs();
        self.persist_snapshot(&tool)?;
        idx.by_id.insert(tool.id, tool.clone());
        Ok(tool)
    }

    pub fn deactivate(&self, id: Uuid) -> Result<Tool> {
        let mut idx = self.inner.write();
        let mut tool = idx.by_id.get(&id).cloned().ok_or_else(|| Error::NotFound(id.to_string()))?;
        tool.is_active = false;
        tool.updated_at = Utc::now();
        self.persist_snapshot(&tool)?;
        idx.by_id.insert(tool.id, tool.clone());
        Ok(tool)
    }

    pub fn record_execution(&self, id: Uuid) -> Result<()> {
        let mut idx = self.inner.write();
        let tool = idx.by_id.get_mut(&id).ok_or_else(|| Error::NotFound(id.to_string()))?;
        tool.record_execution();
        let snapshot = tool.clone();
        self.persist_snapshot(&snapshot)
    }

    pub fn bugged(&self) -> Vec<Tool> {
        self.inner.read().by_id.values().filter(|t| t.is_bugged).cloned().collect()
    }

    pub fn search(&self, query: &str, limit: usize, cfg: &SearchConfig, exclude_bugged: bool) -> Vec<Hit> {
        let idx = self.inner.read();
        let mut local_cfg = cfg.clone();
        if local_cfg.threshold == 0.0 {
            local_cfg.threshold = SearchConfig::default().threshold;
        }
        let candidates = idx
            .by_id
            .values()
            .filter(|t| t.is_active)
            .filter(|t| !exclude_bugged || !t.is_bugged);
        search::rank(query, candidates, &local_cfg, limit)
    }

    fn persist_snapshot(&self, tool: &Tool) -> Result<()> {
        self.ledger.lock().append_snapshot(tool).map_err(|e| Error::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_domain::tool::{ParameterSpec, ParameterType};
    use std::collections::BTreeSet;

    fn store() -> ToolStore {
        let dir = tempfile::tempdir().unwrap();
        ToolStore::open(dir.path().join("tools.jsonl")).unwrap()
    }

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.into(),
            description: format!("does {name}"),
            category: None,
            tags: BTreeSet::new(),
            parameters: vec![ParameterSpec { name: "a".into(), kind: ParameterType::Number, required: true, description: String::new() }],
            code: "fn run(a) { a }".into(),
        }
    }

    #[test]
    fn create_then_get_by_id_and_name_round_trip() {
        let store = store();
        let created = store.create(spec("add")).unwrap();
        assert_eq!(store.get_by_id(created.id).unwrap().name, "add");
        assert_eq!(store.get_by_name("add").unwrap().id, created.id);
    }

    #[test]
    fn create_rejects_duplicate_name() {
        let store = store();
        store.create(spec("add")).unwrap();
        let err = store.create(spec("add")).unwrap_err();
        assert!(matches!(err, Error::NameConflict(_)));
    }

    #[test]
    fn delete_is_idempotent() {
        let store = store();
        let created = store.create(spec("add")).unwrap();
        store.delete(created.id).unwrap();
        store.delete(created.id).unwrap();
        assert!(matches!(store.get_by_id(created.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn report_bug_flips_is_bugged_and_excludes_from_search_and_list() {
        let store = store();
        let created = store.create(spec("div")).unwrap();
        for _ in 0..3 {
            store.report_bug(created.id, "RuntimeError", "boom", None, 3).unwrap();
        }
        let tool = store.get_by_id(created.id).unwrap();
        assert!(tool.is_bugged);
        assert!(store.list(true, true, None).is_empty());
        let hits = store.search("div", 10, &SearchConfig::default(), true);
        assert!(hits.is_empty());
    }

    #[test]
    fn clear_bugs_restores_visibility() {
        let store = store();
        let created = store.create(spec("div")).unwrap();
        store.report_bug(created.id, "RuntimeError", "boom", None, 1).unwrap();
        assert!(store.get_by_id(created.id).unwrap().is_bugged);
        store.clear_bugs(created.id).unwrap();
        assert!(!store.get_by_id(created.id).unwrap().is_bugged);
        assert_eq!(store.list(true, true, None).len(), 1);
    }

    #[test]
    fn update_rejects_rename_to_existing_name() {
        let store = store();
        store.create(spec("add")).unwrap();
        let sub = store.create(spec("subtract")).unwrap();
        let patch = ToolPatch { name: Some("add".into()), ..Default::default() };
        assert!(matches!(store.update(sub.id, patch), Err(Error::NameConflict(_))));
    }

    #[test]
    fn record_execution_increments_and_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.jsonl");
        let created = {
            let store = ToolStore::open(&path).unwrap();
            store.create(spec("add")).unwrap()
        };
        let store = ToolStore::open(&path).unwrap();
        store.record_execution(created.id).unwrap();
        store.record_execution(created.id).unwrap();
        let reloaded = ToolStore::open(&path).unwrap();
        assert_eq!(reloaded.get_by_id(created.id).unwrap().execution_count, 2);
    }

    #[test]
    fn resolve_accepts_either_id_or_name() {
        let store = store();
        let created = store.create(spec("add")).unwrap();
        assert_eq!(store.resolve(&created.id.to_string()).unwrap().id, created.id);
        assert_eq!(store.resolve("add").unwrap().id, created.id);
    }
}
