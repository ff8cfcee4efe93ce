//! Script content, search paths and directory scanning
//!
//! The catalog is the source of truth for what each script key currently
//! means: its kind, where it came from, its bytes and the generation stamp
//! derived from them. Pools are keyed by the same [`ScriptKey`] and compare
//! generations against the entries kept here.

use crate::error::PathError;
use dashmap::DashMap;
use instance_pool::{Generation, ScriptKey};
use parking_lot::RwLock;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Subdirectory of the system root holding vendored modules
pub const VENDOR_DIR: &str = "external";

/// How a script is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// Lua source executed in a restricted interpreter
    Lua,
    /// Compiled Lua C module loaded through `require`
    Native,
}

impl ScriptKind {
    /// File extension without the dot
    pub fn extension(self) -> &'static str {
        match self {
            ScriptKind::Lua => "lua",
            ScriptKind::Native => "so",
        }
    }

    /// Kind for a file extension, if it names a script
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "lua" => Some(ScriptKind::Lua),
            "so" => Some(ScriptKind::Native),
            _ => None,
        }
    }

    /// Kind for a path's extension
    pub fn of_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Where a catalog entry's content came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOrigin {
    /// Registered directly with its content
    Inline,
    /// Read from a file under one of the search roots
    File(PathBuf),
}

/// One registered script
#[derive(Debug, Clone)]
pub struct ScriptEntry {
    /// Script key
    pub key: ScriptKey,
    /// How the script is loaded
    pub kind: ScriptKind,
    /// Where the content came from
    pub origin: ScriptOrigin,
    /// Script bytes
    pub content: Arc<[u8]>,
    /// Stamp derived from `content`
    pub generation: Generation,
}

impl ScriptEntry {
    /// Entry for `content`, stamped with its content generation
    pub fn new(key: ScriptKey, kind: ScriptKind, origin: ScriptOrigin, content: Vec<u8>) -> Self {
        let generation = Generation::of_content(&content);
        Self {
            key,
            kind,
            origin,
            content: content.into(),
            generation,
        }
    }

    fn is_file(&self) -> bool {
        matches!(self.origin, ScriptOrigin::File(_))
    }
}

/// The system and user script roots.
///
/// The user root shadows the system root; vendored modules live under
/// `<system>/external`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPaths {
    /// Scripts shipped with the server
    pub system: PathBuf,
    /// Scripts registered by users
    pub user: PathBuf,
}

impl SearchPaths {
    /// Roots for `system` and `user`
    pub fn new(system: impl Into<PathBuf>, user: impl Into<PathBuf>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    fn templates(&self, ext: &str) -> String {
        let vendor = self.system.join(VENDOR_DIR);
        [&self.user, &self.system, &vendor]
            .iter()
            .map(|root| format!("{}/?.{}", root.display(), ext))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Value for `package.path`
    pub fn package_path(&self) -> String {
        self.templates(ScriptKind::Lua.extension())
    }

    /// Value for `package.cpath`
    pub fn package_cpath(&self) -> String {
        self.templates(ScriptKind::Native.extension())
    }

    /// Check that both roots are set and can be opened
    pub fn verify(&self) -> Result<(), PathError> {
        for (role, path) in [("system", &self.system), ("user", &self.user)] {
            if path.as_os_str().is_empty() {
                return Err(PathError::Unset { role });
            }
            fs::read_dir(path).map_err(|source| PathError::Unopenable {
                role,
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Script file for `key`, user root first
    pub fn locate(&self, key: &ScriptKey) -> Option<(PathBuf, ScriptKind)> {
        for root in [&self.user, &self.system] {
            if root.as_os_str().is_empty() {
                continue;
            }
            for kind in [ScriptKind::Lua, ScriptKind::Native] {
                let path = root.join(format!("{}.{}", key, kind.extension()));
                if path.is_file() {
                    return Some((path, kind));
                }
            }
        }
        None
    }
}

/// Changes applied by [`ScriptCatalog::scan`]
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Entries whose generation is new or changed
    pub changed: Vec<Arc<ScriptEntry>>,
    /// Entries found with unchanged content
    pub unchanged: usize,
    /// File-origin keys whose files are gone
    pub removed: Vec<ScriptKey>,
}

/// Thread-safe map from script key to its current entry.
pub struct ScriptCatalog {
    entries: DashMap<ScriptKey, Arc<ScriptEntry>>,
    paths: RwLock<SearchPaths>,
}

impl ScriptCatalog {
    /// Empty catalog over `paths`
    pub fn new(paths: SearchPaths) -> Self {
        Self {
            entries: DashMap::new(),
            paths: RwLock::new(paths),
        }
    }

    /// Current search roots
    pub fn paths(&self) -> SearchPaths {
        self.paths.read().clone()
    }

    /// Replace the search roots and forget every entry
    pub fn set_paths(&self, paths: SearchPaths) {
        *self.paths.write() = paths;
        self.entries.clear();
    }

    /// Entry for `key`, if registered
    pub fn get(&self, key: &ScriptKey) -> Option<Arc<ScriptEntry>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Register or replace `key` with inline Lua source
    pub fn insert_inline(&self, key: ScriptKey, content: Vec<u8>) -> Arc<ScriptEntry> {
        let entry = ScriptEntry::new(key, ScriptKind::Lua, ScriptOrigin::Inline, content);
        self.insert(entry)
    }

    fn insert(&self, entry: ScriptEntry) -> Arc<ScriptEntry> {
        let entry = Arc::new(entry);
        info!(
            key = %entry.key,
            generation = %entry.generation,
            kind = ?entry.kind,
            "script registered"
        );
        self.entries.insert(entry.key.clone(), Arc::clone(&entry));
        entry
    }

    /// Read `key` from disk and register it.
    ///
    /// Returns `Ok(None)` when no root holds a script for `key`.
    pub fn load_file(&self, key: &ScriptKey) -> io::Result<Option<Arc<ScriptEntry>>> {
        let Some((path, kind)) = self.paths().locate(key) else {
            return Ok(None);
        };
        let content = fs::read(&path)?;
        let entry = ScriptEntry::new(key.clone(), kind, ScriptOrigin::File(path), content);
        Ok(Some(self.insert(entry)))
    }

    /// Entry for `key`, reading it from disk on first use
    pub fn resolve(&self, key: &ScriptKey) -> io::Result<Option<Arc<ScriptEntry>>> {
        match self.get(key) {
            Some(entry) => Ok(Some(entry)),
            None => self.load_file(key),
        }
    }

    /// Forget `key`; returns the removed entry
    pub fn remove(&self, key: &ScriptKey) -> Option<Arc<ScriptEntry>> {
        let removed = self.entries.remove(key).map(|(_, entry)| entry);
        if removed.is_some() {
            info!(%key, "script unregistered");
        }
        removed
    }

    /// Registered keys
    pub fn keys(&self) -> Vec<ScriptKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-read both roots.
    ///
    /// The system root is walked first so user files shadow it. Entries
    /// that came from files no longer present are dropped; inline entries
    /// are kept.
    pub fn scan(&self) -> io::Result<ScanReport> {
        let paths = self.paths();
        let mut found: Vec<(ScriptKey, PathBuf, ScriptKind)> = Vec::new();
        for root in [&paths.system, &paths.user] {
            if root.as_os_str().is_empty() {
                continue;
            }
            for (key, path, kind) in scripts_in(root)? {
                found.retain(|(existing, _, _)| *existing != key);
                found.push((key, path, kind));
            }
        }

        let mut report = ScanReport::default();
        for (key, path, kind) in found.iter().cloned() {
            let content = fs::read(&path)?;
            let entry = ScriptEntry::new(key.clone(), kind, ScriptOrigin::File(path), content);
            let unchanged = self
                .get(&key)
                .is_some_and(|current| current.generation == entry.generation);
            if unchanged {
                report.unchanged += 1;
            } else {
                report.changed.push(self.insert(entry));
            }
        }

        for key in self.keys() {
            let gone = !found.iter().any(|(k, _, _)| *k == key);
            if gone && self.get(&key).is_some_and(|entry| entry.is_file()) {
                self.remove(&key);
                report.removed.push(key);
            }
        }

        info!(
            changed = report.changed.len(),
            unchanged = report.unchanged,
            removed = report.removed.len(),
            "script directories scanned"
        );
        Ok(report)
    }
}

/// Script files directly under `root`
fn scripts_in(root: &Path) -> io::Result<Vec<(ScriptKey, PathBuf, ScriptKind)>> {
    let mut scripts = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        let Some(kind) = ScriptKind::of_path(&path) else {
            continue;
        };
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match ScriptKey::from_file_name(name) {
            Ok(key) => scripts.push((key, path, kind)),
            Err(err) => debug!(path = %path.display(), error = %err, "skipping script file"),
        }
    }
    Ok(scripts)
}
