//! Durable tool storage.
//!
//! Layout: `<root>/<category>/<name>.lua` for code, plus a JSON
//! side-index at `<root>/index.json` carrying each tool's spec and
//! creation time. The side-index is the source of truth for what
//! exists; orphaned code files are ignored at load and reported.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::tools::{ToolOrigin, ToolSpec};

const INDEX_FILE: &str = "index.json";

/// Side-index record for one stored tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(flatten)]
    pub spec: ToolSpec,
    /// Provenance at store time.
    pub origin: ToolOrigin,
    /// Code file path relative to the storage root.
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
}

/// A tool loaded back from storage.
#[derive(Debug, Clone)]
pub struct StoredTool {
    pub spec: ToolSpec,
    pub code: String,
    pub origin: ToolOrigin,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SideIndex {
    tools: BTreeMap<String, StoredRecord>,
}

/// Filesystem-backed tool store.
pub struct ToolStore {
    root: PathBuf,
}

impl ToolStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StorageError::Io {
            path: root.display().to_string(),
            source: e,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn code_path(&self, category: &str, name: &str) -> PathBuf {
        self.root.join(category).join(format!("{}.lua", name))
    }

    fn read_index(&self) -> Result<SideIndex, StorageError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(SideIndex::default());
        }
        let raw = fs::read_to_string(&path).map_err(|e| StorageError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&raw).map_err(|e| StorageError::CorruptIndex(e.to_string()))
    }

    fn write_index(&self, index: &SideIndex) -> Result<(), StorageError> {
        let path = self.index_path();
        let raw = serde_json::to_string_pretty(index)
            .map_err(|e| StorageError::CorruptIndex(e.to_string()))?;
        // Write-and-rename so a crash never leaves a half-written index.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(|e| StorageError::Io {
            path: tmp.display().to_string(),
            source: e,
        })?;
        fs::rename(&tmp, &path).map_err(|e| StorageError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Persist a tool's code and side-index record.
    ///
    /// If the code file lands but the index write fails, the error
    /// reports exactly which step completed so the caller can surface
    /// the inconsistency instead of guessing.
    pub fn store(
        &self,
        spec: &ToolSpec,
        code: &str,
        origin: ToolOrigin,
    ) -> Result<StoredRecord, StorageError> {
        let dir = self.root.join(&spec.category);
        fs::create_dir_all(&dir).map_err(|e| StorageError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;

        let code_path = self.code_path(&spec.category, &spec.name);
        fs::write(&code_path, code).map_err(|e| StorageError::Io {
            path: code_path.display().to_string(),
            source: e,
        })?;

        let record = StoredRecord {
            spec: spec.clone(),
            origin,
            storage_path: format!("{}/{}.lua", spec.category, spec.name),
            created_at: Utc::now(),
        };

        let mut index = self.read_index().map_err(|e| StorageError::Partial {
            name: spec.name.clone(),
            completed: "code file".to_string(),
            failed: "index read".to_string(),
            reason: e.to_string(),
        })?;
        index.tools.insert(spec.name.clone(), record.clone());
        self.write_index(&index).map_err(|e| StorageError::Partial {
            name: spec.name.clone(),
            completed: "code file".to_string(),
            failed: "index write".to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(name = %spec.name, category = %spec.category, "tool stored");
        Ok(record)
    }

    /// Whether a tool exists in the side-index.
    pub fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.read_index()?.tools.contains_key(name))
    }

    /// Load one tool by name.
    pub fn load(&self, name: &str) -> Result<StoredTool, StorageError> {
        let index = self.read_index()?;
        let record = index
            .tools
            .get(name)
            .ok_or_else(|| StorageError::NotFound {
                name: name.to_string(),
            })?;
        let code_path = self.code_path(&record.spec.category, name);
        let code = fs::read_to_string(&code_path).map_err(|e| StorageError::Io {
            path: code_path.display().to_string(),
            source: e,
        })?;
        Ok(StoredTool {
            spec: record.spec.clone(),
            code,
            origin: record.origin,
            created_at: record.created_at,
        })
    }

    /// Load every stored tool.
    ///
    /// A record whose code file is unreadable is skipped with a warning
    /// rather than failing the whole load; a session with most of its
    /// tools beats no session.
    pub fn load_all(&self) -> Result<Vec<StoredTool>, StorageError> {
        let index = self.read_index()?;
        let mut tools = Vec::with_capacity(index.tools.len());
        for (name, record) in &index.tools {
            let code_path = self.code_path(&record.spec.category, name);
            match fs::read_to_string(&code_path) {
                Ok(code) => tools.push(StoredTool {
                    spec: record.spec.clone(),
                    code,
                    origin: record.origin,
                    created_at: record.created_at,
                }),
                Err(e) => {
                    tracing::warn!(
                        name = %name,
                        path = %code_path.display(),
                        "skipping stored tool with unreadable code: {}",
                        e
                    );
                }
            }
        }
        Ok(tools)
    }

    /// Delete a tool's code file and side-index record.
    pub fn delete(&self, name: &str) -> Result<(), StorageError> {
        let mut index = self.read_index()?;
        let record = index
            .tools
            .remove(name)
            .ok_or_else(|| StorageError::NotFound {
                name: name.to_string(),
            })?;

        self.write_index(&index)?;

        let code_path = self.code_path(&record.spec.category, name);
        match fs::remove_file(&code_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                // Index entry is already gone; report the leftover file.
                return Err(StorageError::Partial {
                    name: name.to_string(),
                    completed: "index removal".to_string(),
                    failed: "code file removal".to_string(),
                    reason: e.to_string(),
                });
            }
        }

        tracing::info!(name = %name, "tool deleted from storage");
        Ok(())
    }

    /// Names of every stored tool, sorted.
    pub fn list(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.read_index()?.tools.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolParam;
    use pretty_assertions::assert_eq;

    fn spec(name: &str, category: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: format!("{} description", name),
            category: category.to_string(),
            return_type: "number".to_string(),
            tags: Vec::new(),
            params: vec![ToolParam {
                name: "x".to_string(),
                description: "input".to_string(),
                param_type: "number".to_string(),
                required: true,
            }],
        }
    }

    fn put(store: &ToolStore, spec: &ToolSpec, code: &str) -> StoredRecord {
        store.store(spec, code, ToolOrigin::Generated).unwrap()
    }

    #[test]
    fn store_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ToolStore::new(dir.path()).unwrap();

        put(&store, &spec("double", "math"), "function double(p) return p.x * 2 end");

        let loaded = store.load("double").unwrap();
        assert_eq!(loaded.spec.category, "math");
        assert!(loaded.code.contains("p.x * 2"));
        assert!(dir.path().join("math/double.lua").exists());
    }

    #[test]
    fn record_carries_origin_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = ToolStore::new(dir.path()).unwrap();

        let record = put(&store, &spec("double", "math"), "function double(p) return p.x * 2 end");
        assert_eq!(record.origin, ToolOrigin::Generated);
        assert_eq!(record.storage_path, "math/double.lua");

        // Provenance survives a fresh store over the same directory.
        let reopened = ToolStore::new(dir.path()).unwrap();
        let loaded = reopened.load("double").unwrap();
        assert_eq!(loaded.origin, ToolOrigin::Generated);
    }

    #[test]
    fn load_all_returns_every_tool() {
        let dir = tempfile::tempdir().unwrap();
        let store = ToolStore::new(dir.path()).unwrap();

        put(&store, &spec("a", "cat1"), "function a(p) return 1 end");
        put(&store, &spec("b", "cat2"), "function b(p) return 2 end");

        let tools = store.load_all().unwrap();
        assert_eq!(tools.len(), 2);
    }

    #[test]
    fn load_all_skips_missing_code_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ToolStore::new(dir.path()).unwrap();

        put(&store, &spec("a", "cat"), "function a(p) return 1 end");
        put(&store, &spec("b", "cat"), "function b(p) return 2 end");
        fs::remove_file(dir.path().join("cat/a.lua")).unwrap();

        let tools = store.load_all().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].spec.name, "b");
    }

    #[test]
    fn delete_removes_file_and_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = ToolStore::new(dir.path()).unwrap();

        put(&store, &spec("gone", "cat"), "function gone(p) return 0 end");
        store.delete("gone").unwrap();

        assert!(!store.exists("gone").unwrap());
        assert!(!dir.path().join("cat/gone.lua").exists());
    }

    #[test]
    fn delete_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ToolStore::new(dir.path()).unwrap();
        assert!(matches!(
            store.delete("ghost"),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn corrupt_index_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = ToolStore::new(dir.path()).unwrap();
        fs::write(dir.path().join(INDEX_FILE), "{not json").unwrap();

        assert!(matches!(
            store.load_all(),
            Err(StorageError::CorruptIndex(_))
        ));
    }

    #[test]
    fn store_overwrites_existing_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = ToolStore::new(dir.path()).unwrap();

        put(&store, &spec("t", "cat"), "function t(p) return 1 end");
        put(&store, &spec("t", "cat"), "function t(p) return 2 end");

        assert_eq!(store.list().unwrap().len(), 1);
        assert!(store.load("t").unwrap().code.contains("return 2"));
    }
}
