//! Append-friendly JSON-lines persistence for the tool catalog.
//!
//! Each line is either a full tool record (a snapshot, written on create)
//! or a `{"id": ..., "tombstone": true}` marker (written on delete). At
//! startup the ledger is replayed in order to rebuild the in-memory index;
//! later snapshots for the same id override earlier ones, and a tombstone
//! removes the record. This keeps storage human-inspectable and avoids
//! pulling in an embedded database this codebase doesn't otherwise use.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use forge_domain::Tool;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum LedgerLine {
    Tombstone { id: Uuid, tombstone: bool },
    Snapshot(Box<Tool>),
}

pub struct Ledger {
    path: PathBuf,
    file: File,
}

impl Ledger {
    /// Opens (creating if absent) the ledger file and replays it into an
    /// id-indexed map, applying snapshots and tombstones in file order.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<(Self, HashMap<Uuid, Tool>)> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tools = HashMap::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<LedgerLine>(&line) {
                    Ok(LedgerLine::Snapshot(tool)) => {
                        tools.insert(tool.id, *tool);
                    }
                    Ok(LedgerLine::Tombstone { id, .. }) => {
                        tools.remove(&id);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unreadable ledger line");
                    }
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok((Ledger { path, file }, tools))
    }

    pub fn append_snapshot(&mut self, tool: &Tool) -> std::io::Result<()> {
        let line = serde_json::to_string(tool).expect("Tool serializes");
        writeln!(self.file, "{line}")?;
        self.file.flush()
    }

    pub fn append_tombstone(&mut self, id: Uuid) -> std::io::Result<()> {
        let line = serde_json::to_string(&LedgerLine::Tombstone { id, tombstone: true }).expect("serializes");
        writeln!(self.file, "{line}")?;
        self.file.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
