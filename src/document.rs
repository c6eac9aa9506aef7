//! # Documents and the Working Tree
//!
//! A [`Document`] is the model being synchronized. The synchronization
//! process never touches git objects for it directly: it asks the document to
//! export itself as flat files into the repository's working tree, and to
//! reload itself from those files after a merge.
//!
//! [`YamlDocument`] is the implementation used by the CLI. Its model file is
//! a YAML mapping of objects:
//!
//! ```yaml
//! objects:
//!   view-1:
//!     name: Overview
//!     refs: [actor-1, app-1]
//!   actor-1:
//!     name: Customer
//! ```
//!
//! Each object is exported to `model/<id>.yaml`. On reload, an object that is
//! referenced but missing from the working tree (for example because a merge
//! deleted it on one side while the other side still uses it) is restored
//! from the previous model and listed in a [`RestoredObjects`] report.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::defaults::OBJECTS_DIR;
use crate::error::{Error, Result};

/// A model that can be written to and read from a working tree
pub trait Document: Send {
    /// Serialize the document's current state into `working_dir`.
    fn export_to_working_tree(&self, working_dir: &Path) -> Result<()>;

    /// Replace the document's state with what `working_dir` holds.
    fn reload_from_working_tree(&self, working_dir: &Path) -> Result<RestoredObjects>;
}

/// Objects the reload had to put back, in restore order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoredObjects {
    entries: Vec<String>,
}

impl RestoredObjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Display for RestoredObjects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", entry)?;
        }
        Ok(())
    }
}

/// One object of a YAML model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelObject {
    /// Ids of the objects this one depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<String>,
    /// Every other field, kept as-is.
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_yaml::Value>,
}

/// In-memory form of a YAML model file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub objects: BTreeMap<String, ModelObject>,
}

fn object_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("object id pattern is valid"))
}

/// Whether `id` can be used as an object file name
pub fn is_valid_object_id(id: &str) -> bool {
    object_id_pattern().is_match(id) && id != "." && id != ".."
}

/// A model stored as a single YAML file, exported as one file per object
#[derive(Debug, Clone)]
pub struct YamlDocument {
    path: PathBuf,
}

impl YamlDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the model file. A missing file is an empty model.
    pub fn load(&self) -> Result<Model> {
        if !self.path.exists() {
            return Ok(Model::default());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Model::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Write the model file.
    pub fn save(&self, model: &Model) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_yaml::to_string(model)?)?;
        Ok(())
    }

    fn object_file(objects_dir: &Path, id: &str) -> PathBuf {
        objects_dir.join(format!("{}.yaml", id))
    }

    fn write_object(objects_dir: &Path, id: &str, object: &ModelObject) -> Result<()> {
        fs::write(Self::object_file(objects_dir, id), serde_yaml::to_string(object)?)?;
        Ok(())
    }

    /// Object files currently in the working tree, keyed by id.
    fn object_files(objects_dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
        let mut files = BTreeMap::new();
        if !objects_dir.exists() {
            return Ok(files);
        }

        for entry in WalkDir::new(objects_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| Error::Reload {
                message: e.to_string(),
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "yaml") {
                continue;
            }
            if let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) {
                files.insert(id.to_string(), path.to_path_buf());
            }
        }
        Ok(files)
    }
}

impl Document for YamlDocument {
    fn export_to_working_tree(&self, working_dir: &Path) -> Result<()> {
        let model = self.load().map_err(|e| Error::Export {
            message: format!("cannot read {}: {}", self.path.display(), e.root_message()),
        })?;

        if let Some(bad) = model.objects.keys().find(|id| !is_valid_object_id(id)) {
            return Err(Error::Export {
                message: format!("object id '{}' cannot be used as a file name", bad),
            });
        }

        let objects_dir = working_dir.join(OBJECTS_DIR);
        fs::create_dir_all(&objects_dir)?;

        for (id, path) in Self::object_files(&objects_dir)? {
            if !model.objects.contains_key(&id) {
                log::debug!("Removing stale object file {}", path.display());
                fs::remove_file(path)?;
            }
        }

        for (id, object) in &model.objects {
            Self::write_object(&objects_dir, id, object)?;
        }

        log::debug!(
            "Exported {} object(s) to {}",
            model.objects.len(),
            objects_dir.display()
        );
        Ok(())
    }

    fn reload_from_working_tree(&self, working_dir: &Path) -> Result<RestoredObjects> {
        let previous = self.load().map_err(|e| Error::Reload {
            message: format!("cannot read {}: {}", self.path.display(), e.root_message()),
        })?;
        let objects_dir = working_dir.join(OBJECTS_DIR);

        let mut loaded = Model::default();
        for (id, path) in Self::object_files(&objects_dir)? {
            let content = fs::read_to_string(&path)?;
            let object: ModelObject = serde_yaml::from_str(&content).map_err(|e| Error::Reload {
                message: format!("{}: {}", path.display(), e),
            })?;
            loaded.objects.insert(id, object);
        }

        // Restore referenced objects that the working tree lost, transitively
        let mut restored = RestoredObjects::new();
        let mut pending: Vec<String> = loaded
            .objects
            .values()
            .flat_map(|object| object.refs.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        while let Some(id) = pending.pop() {
            if loaded.objects.contains_key(&id) || !is_valid_object_id(&id) {
                continue;
            }
            let Some(object) = previous.objects.get(&id) else {
                log::warn!("Object '{}' is referenced but exists nowhere", id);
                continue;
            };

            fs::create_dir_all(&objects_dir)?;
            Self::write_object(&objects_dir, &id, object)?;
            pending.extend(object.refs.iter().cloned());
            loaded.objects.insert(id.clone(), object.clone());

            let label = object
                .fields
                .get("name")
                .and_then(|name| name.as_str())
                .map(|name| format!("{} ({})", name, id))
                .unwrap_or_else(|| id.clone());
            restored.push(label);
        }

        self.save(&loaded).map_err(|e| Error::Reload {
            message: format!("cannot write {}: {}", self.path.display(), e.root_message()),
        })?;
        Ok(restored)
    }
}
