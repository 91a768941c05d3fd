//! Session-scoped persistence of grid settings.
//!
//! Every slice of state lives under its own `<tableKey>_<slice>` key so two
//! grids never collide and a corrupt slice never takes the others down.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use crate::data::pagination::PaginationState;
use crate::data::sort::SortSpec;
use crate::services::data_source::FormValues;

/// String key/value storage that lives as long as one browsing session
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store. Clones share the same map, which models a page reload
/// inside one session.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Store backed by one JSON file per session id. Reopening the same id
/// restores its state; a new id starts empty.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileSessionStore {
    pub fn open(dir: &Path, session_id: &str) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating session directory {}", dir.display()))?;
        let path = dir.join(format!("{session_id}.json"));

        let entries = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(target: "persistence", "Discarding unreadable session file {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        debug!(target: "persistence", "Opened session store {}", path.display());
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete session files in `dir` untouched for longer than `max_age`.
    /// The session named `keep` survives whatever its age. Returns how many
    /// files were removed.
    pub fn prune_stale(dir: &Path, max_age: Duration, keep: &str) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in fs::read_dir(dir)
            .with_context(|| format!("reading session directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if path.file_stem().and_then(|s| s.to_str()) == Some(keep) {
                continue;
            }

            let age = fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok());
            if age.is_some_and(|age| age > max_age) {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(target: "persistence", "Could not remove {}: {}", path.display(), e),
                }
            }
        }

        if removed > 0 {
            info!(target: "persistence", "Pruned {} stale session files", removed);
        }
        Ok(removed)
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json)
            .with_context(|| format!("writing session file {}", self.path.display()))
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// Everything a grid restores at start-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSettings {
    pub search: String,
    pub sort: SortSpec,
    pub page_size: usize,
    pub current_page: usize,
    pub form_values: Option<FormValues>,
}

impl PersistedSettings {
    pub fn defaults(page_size: usize) -> Self {
        Self {
            search: String::new(),
            sort: SortSpec::new(),
            page_size: page_size.max(1),
            current_page: 0,
            form_values: None,
        }
    }

    pub fn pagination(&self) -> PaginationState {
        PaginationState {
            page_size: self.page_size,
            current_page: self.current_page,
        }
    }
}

const SEARCH: &str = "search";
const SORT: &str = "sort";
const PER_PAGE: &str = "perPage";
const CURRENT_PAGE: &str = "currentPage";
const FORM_DATA: &str = "formData";

/// Reads and writes one grid's settings under its table key
#[derive(Clone)]
pub struct GridStatePersistence {
    store: Arc<dyn SessionStore>,
    table_key: String,
}

impl GridStatePersistence {
    pub fn new(store: Arc<dyn SessionStore>, table_key: impl Into<String>) -> Self {
        Self {
            store,
            table_key: table_key.into(),
        }
    }

    fn key(&self, slice: &str) -> String {
        format!("{}_{}", self.table_key, slice)
    }

    fn write(&self, slice: &str, value: &str) {
        let key = self.key(slice);
        if let Err(e) = self.store.set(&key, value) {
            warn!(target: "persistence", "Failed to persist {}: {:#}", key, e);
        }
    }

    fn read_json<T: DeserializeOwned>(&self, slice: &str) -> Option<T> {
        let key = self.key(slice);
        let raw = self.store.get(&key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(target: "persistence", "Ignoring malformed {}: {}", key, e);
                None
            }
        }
    }

    fn read_usize(&self, slice: &str) -> Option<usize> {
        let key = self.key(slice);
        let raw = self.store.get(&key)?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(target: "persistence", "Ignoring malformed {}: {}", key, e);
                None
            }
        }
    }

    /// Restore all slices, each falling back to its default on its own
    pub fn load(&self, default_page_size: usize) -> PersistedSettings {
        let defaults = PersistedSettings::defaults(default_page_size);

        let settings = PersistedSettings {
            search: self.store.get(&self.key(SEARCH)).unwrap_or_default(),
            sort: self
                .read_json::<SortSpec>(SORT)
                .map(|spec| SortSpec::from_keys(spec.keys().to_vec()))
                .unwrap_or(defaults.sort),
            page_size: self
                .read_usize(PER_PAGE)
                .filter(|&size| size > 0)
                .unwrap_or(defaults.page_size),
            current_page: self.read_usize(CURRENT_PAGE).unwrap_or(defaults.current_page),
            form_values: self.read_json::<FormValues>(FORM_DATA),
        };

        debug!(target: "persistence", "Restored {}: {:?}", self.table_key, settings);
        settings
    }

    pub fn save(&self, settings: &PersistedSettings) {
        self.save_search(&settings.search);
        self.save_sort(&settings.sort);
        self.save_page_size(settings.page_size);
        self.save_current_page(settings.current_page);
        if let Some(form) = &settings.form_values {
            self.save_form_values(form);
        }
    }

    pub fn save_search(&self, search: &str) {
        self.write(SEARCH, search);
    }

    pub fn save_sort(&self, sort: &SortSpec) {
        match serde_json::to_string(sort) {
            Ok(json) => self.write(SORT, &json),
            Err(e) => warn!(target: "persistence", "Failed to encode sort: {}", e),
        }
    }

    pub fn save_page_size(&self, page_size: usize) {
        self.write(PER_PAGE, &page_size.to_string());
    }

    pub fn save_current_page(&self, current_page: usize) {
        self.write(CURRENT_PAGE, &current_page.to_string());
    }

    pub fn save_form_values(&self, form: &FormValues) {
        match serde_json::to_string(form) {
            Ok(json) => self.write(FORM_DATA, &json),
            Err(e) => warn!(target: "persistence", "Failed to encode form data: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sort::{SortDirection, SortKey};

    fn persistence(store: &MemorySessionStore, key: &str) -> GridStatePersistence {
        GridStatePersistence::new(Arc::new(store.clone()), key)
    }

    #[test]
    fn test_empty_store_gives_defaults() {
        let store = MemorySessionStore::new();
        let settings = persistence(&store, "users").load(25);
        assert_eq!(settings, PersistedSettings::defaults(25));
    }

    #[test]
    fn test_save_then_load_in_same_session() {
        let store = MemorySessionStore::new();
        let mut form = FormValues::new();
        form.insert("role".to_string(), "admin".to_string());
        let settings = PersistedSettings {
            search: "ali".to_string(),
            sort: SortSpec::new().toggle("name").toggle("name"),
            page_size: 50,
            current_page: 3,
            form_values: Some(form),
        };

        persistence(&store, "users").save(&settings);
        // A "reload" gets a fresh handle on the same store
        assert_eq!(persistence(&store, "users").load(10), settings);
    }

    #[test]
    fn test_layout_uses_namespaced_keys() {
        let store = MemorySessionStore::new();
        let p = persistence(&store, "flags");
        p.save_sort(&SortSpec::new().toggle("name"));
        p.save_page_size(25);
        p.save_current_page(2);
        p.save_search("x");

        assert_eq!(
            store.keys(),
            vec!["flags_currentPage", "flags_perPage", "flags_search", "flags_sort"]
        );
        assert_eq!(
            store.get("flags_sort").as_deref(),
            Some(r#"[{"property":"name","direction":"asc"}]"#)
        );
        assert_eq!(store.get("flags_perPage").as_deref(), Some("25"));
    }

    #[test]
    fn test_instances_do_not_collide() {
        let store = MemorySessionStore::new();
        persistence(&store, "users").save_search("alice");
        persistence(&store, "roles").save_search("admin");

        assert_eq!(persistence(&store, "users").load(10).search, "alice");
        assert_eq!(persistence(&store, "roles").load(10).search, "admin");
    }

    #[test]
    fn test_malformed_slice_only_resets_itself() {
        let store = MemorySessionStore::new();
        store.set("users_sort", "{not json").unwrap();
        store.set("users_perPage", "abc").unwrap();
        store.set("users_currentPage", "4").unwrap();
        store.set("users_search", "bob").unwrap();

        let settings = persistence(&store, "users").load(10);
        assert!(settings.sort.is_empty());
        assert_eq!(settings.page_size, 10);
        assert_eq!(settings.current_page, 4);
        assert_eq!(settings.search, "bob");
    }

    #[test]
    fn test_zero_page_size_is_rejected() {
        let store = MemorySessionStore::new();
        store.set("users_perPage", "0").unwrap();
        assert_eq!(persistence(&store, "users").load(10).page_size, 10);
    }

    #[test]
    fn test_restored_sort_drops_duplicate_properties() {
        let store = MemorySessionStore::new();
        store
            .set(
                "users_sort",
                r#"[{"property":"name","direction":"desc"},{"property":"name","direction":"asc"}]"#,
            )
            .unwrap();
        let settings = persistence(&store, "users").load(10);
        assert_eq!(
            settings.sort.keys(),
            &[SortKey::new("name", SortDirection::Desc)]
        );
    }

    #[test]
    fn test_file_store_survives_reopen_but_not_new_session() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileSessionStore::open(dir.path(), "session-a").unwrap();
            store.set("users_search", "carol").unwrap();
        }

        let reopened = FileSessionStore::open(dir.path(), "session-a").unwrap();
        assert_eq!(reopened.get("users_search").as_deref(), Some("carol"));

        let fresh = FileSessionStore::open(dir.path(), "session-b").unwrap();
        assert_eq!(fresh.get("users_search"), None);
    }

    #[test]
    fn test_prune_removes_only_old_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let ten_days_ago = SystemTime::now() - Duration::from_secs(10 * 24 * 60 * 60);
        for name in ["old.json", "kept.json", "notes.txt"] {
            let file = fs::File::create(dir.path().join(name)).unwrap();
            file.set_modified(ten_days_ago).unwrap();
        }
        FileSessionStore::open(dir.path(), "fresh")
            .unwrap()
            .set("k", "v")
            .unwrap();

        let week = Duration::from_secs(7 * 24 * 60 * 60);
        let removed = FileSessionStore::prune_stale(dir.path(), week, "kept").unwrap();

        assert_eq!(removed, 1);
        assert!(!dir.path().join("old.json").exists());
        assert!(dir.path().join("kept.json").exists());
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join("fresh.json").exists());
    }

    #[test]
    fn test_file_store_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "not json").unwrap();
        let store = FileSessionStore::open(dir.path(), "broken").unwrap();
        assert_eq!(store.get("anything"), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }
}
