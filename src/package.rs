//! Resolution of `import` names to first-party OPN packages.
//!
//! A package is a directory `<root>/<name>/` holding an `index.prisma`
//! source file and an optional `<name>.opn` JSON metadata sidecar. Names
//! that match no package fall back to a plain host import, so resolution
//! never fails at transpile time.

use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const INDEX_FILE: &str = "index.prisma";
pub const PROJECT_IMPORT_DIR: &str = "opn.import";
pub const METADATA_EXTENSION: &str = "opn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportResolution {
    /// The package's index source, to be lowered in place.
    Inline { package: String, source: String },
    /// No package matched; emit a host import of the literal name.
    Host(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub entry: Option<String>,
    #[serde(default)]
    pub dependencies: IndexMap<String, String>,
}

/// Searches package roots in order and caches every lookup, hit or miss,
/// for the lifetime of the loader.
///
/// The cache sits behind a mutex, so a single loader can be shared through
/// an `Arc` by concurrent transpile calls. Roots must be registered before
/// the loader is shared; adding a root does not revisit cached misses.
#[derive(Debug)]
pub struct PackageLoader {
    roots: Vec<PathBuf>,
    cache: Mutex<HashMap<String, Option<PathBuf>>>,
}

impl PackageLoader {
    /// Loader over the project-local `opn.import` folder and the user-level
    /// `~/.opn/packages` directory.
    pub fn new() -> Self {
        Self::with_roots(Self::default_roots())
    }

    pub fn with_roots(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut loader = Self {
            roots: Vec::new(),
            cache: Mutex::new(HashMap::new()),
        };
        for root in roots {
            loader.add_search_path(root);
        }
        loader
    }

    pub fn default_roots() -> Vec<PathBuf> {
        let mut roots = Vec::new();
        if let Ok(cwd) = env::current_dir() {
            roots.push(cwd.join(PROJECT_IMPORT_DIR));
        }
        if let Some(home) = env::var_os("HOME").or_else(|| env::var_os("USERPROFILE")) {
            roots.push(PathBuf::from(home).join(".opn").join("packages"));
        }
        roots
    }

    /// Appends a root after the existing ones. Duplicates are ignored.
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.roots.contains(&path) {
            self.roots.push(path);
        }
    }

    pub fn search_roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn find_package(&self, name: &str) -> Option<PathBuf> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.get(name) {
            return cached.clone();
        }
        let found = if is_package_name(name) {
            self.roots
                .iter()
                .map(|root| root.join(name))
                .find(|dir| dir.join(INDEX_FILE).is_file())
        } else {
            None
        };
        match &found {
            Some(dir) => debug!(package = name, path = %dir.display(), "package located"),
            None => debug!(package = name, "no package found"),
        }
        cache.insert(name.to_string(), found.clone());
        found
    }

    pub fn load_package_source(&self, name: &str) -> Option<String> {
        let dir = self.find_package(name)?;
        let index = dir.join(INDEX_FILE);
        match fs::read_to_string(&index) {
            Ok(source) => Some(source),
            Err(err) => {
                warn!(package = name, path = %index.display(), error = %err, "failed to read package index");
                None
            }
        }
    }

    /// Reads the `<name>.opn` sidecar. Missing or malformed metadata is `None`.
    pub fn metadata(&self, name: &str) -> Option<PackageMetadata> {
        let dir = self.find_package(name)?;
        read_metadata(&dir, name)
    }

    pub fn resolve_import(&self, name: &str) -> ImportResolution {
        match self.load_package_source(name) {
            Some(source) => {
                info!(package = name, "inlining OPN package");
                ImportResolution::Inline {
                    package: name.to_string(),
                    source,
                }
            }
            None => ImportResolution::Host(name.to_string()),
        }
    }
}

impl Default for PackageLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_metadata(dir: &Path, name: &str) -> Option<PackageMetadata> {
    let path = dir.join(format!("{name}.{METADATA_EXTENSION}"));
    let text = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&text) {
        Ok(metadata) => Some(metadata),
        Err(err) => {
            warn!(package = name, path = %path.display(), error = %err, "malformed package metadata");
            None
        }
    }
}

fn is_package_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_alphanumeric() || ch == '_')
}
