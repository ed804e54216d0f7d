//! Content-key ↔ identifier map and where it is kept between conversions
//!
//! A map is loaded in full before a conversion and written back in full
//! only after the conversion succeeds.

use crate::errors::RepositoryError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Bidirectional map between content keys and Lychee identifiers
///
/// Serialized as a flat `key → id` object; the reverse index is rebuilt
/// on load.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct IdentityMap {
    by_key: BTreeMap<String, String>,
    by_id: BTreeMap<String, String>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key ↔ id`, dropping any older pairing of either side
    pub fn insert(&mut self, key: impl Into<String>, id: impl Into<String>) {
        let key = key.into();
        let id = id.into();
        if let Some(old_id) = self.by_key.remove(&key) {
            self.by_id.remove(&old_id);
        }
        if let Some(old_key) = self.by_id.remove(&id) {
            self.by_key.remove(&old_key);
        }
        self.by_key.insert(key.clone(), id.clone());
        self.by_id.insert(id, key);
    }

    pub fn id_for(&self, key: &str) -> Option<&str> {
        self.by_key.get(key).map(String::as_str)
    }

    pub fn key_for(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_key.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<BTreeMap<String, String>> for IdentityMap {
    fn from(entries: BTreeMap<String, String>) -> Self {
        let mut map = IdentityMap::new();
        for (key, id) in entries {
            map.insert(key, id);
        }
        map
    }
}

impl From<IdentityMap> for BTreeMap<String, String> {
    fn from(map: IdentityMap) -> Self {
        map.by_key
    }
}

/// Persistent store of identity maps, one per section
pub trait IdentityRepository {
    /// The stored map for `section`, or an empty map if none exists
    fn load(&mut self, section: &str) -> Result<IdentityMap, RepositoryError>;

    /// Replace the stored map for `section`
    fn commit(&mut self, section: &str, map: &IdentityMap) -> Result<(), RepositoryError>;
}

/// In-memory store, for hosts that persist maps themselves and for tests
#[derive(Debug, Default, Clone)]
pub struct MemoryRepository {
    maps: HashMap<String, IdentityMap>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, section: &str) -> Option<&IdentityMap> {
        self.maps.get(section)
    }
}

impl IdentityRepository for MemoryRepository {
    fn load(&mut self, section: &str) -> Result<IdentityMap, RepositoryError> {
        Ok(self.maps.get(section).cloned().unwrap_or_default())
    }

    fn commit(&mut self, section: &str, map: &IdentityMap) -> Result<(), RepositoryError> {
        self.maps.insert(section.to_string(), map.clone());
        Ok(())
    }
}

/// One JSON file per section under a root directory
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    root: PathBuf,
}

impl JsonFileRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding the map for `section`
    pub fn path_for(&self, section: &str) -> PathBuf {
        let file_stem: String = section
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{}.json", file_stem))
    }
}

impl IdentityRepository for JsonFileRepository {
    fn load(&mut self, section: &str) -> Result<IdentityMap, RepositoryError> {
        let path = self.path_for(section);
        if !path.exists() {
            log::debug!("No identity map at {}; starting empty", path.display());
            return Ok(IdentityMap::new());
        }
        let text = fs::read_to_string(&path)?;
        let map: IdentityMap = serde_json::from_str(&text)?;
        log::debug!("Loaded {} identities from {}", map.len(), path.display());
        Ok(map)
    }

    fn commit(&mut self, section: &str, map: &IdentityMap) -> Result<(), RepositoryError> {
        fs::create_dir_all(&self.root)?;
        let path = self.path_for(section);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_string_pretty(map)?)?;
        fs::rename(&staging, &path)?;
        log::debug!("Committed {} identities to {}", map.len(), path.display());
        Ok(())
    }
}
