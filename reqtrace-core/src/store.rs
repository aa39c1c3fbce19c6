//! Typed registry file persistence
//!
//! Each entity collection lives in its own YAML document. Saves go
//! through a temp-file-then-rename sequence so an interrupted write
//! leaves the prior committed file intact.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Handles loading and atomically saving one registry collection
pub struct RegistryFile<T> {
    file_path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> RegistryFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Creates a new RegistryFile for the given path
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            _marker: PhantomData,
        }
    }

    /// Returns the path to the registry file
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Loads the collection, defaulting to an empty schema-versioned
    /// collection when the file does not exist yet
    pub fn load(&self) -> Result<T> {
        if !self.file_path.exists() {
            return Ok(T::default());
        }

        let content = fs::read_to_string(&self.file_path)?;
        let value = serde_yaml::from_str(&content)?;
        Ok(value)
    }

    /// Saves the collection atomically: write to a temp file in the
    /// same directory, then rename into place
    pub fn save(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(value)?;

        let mut tmp_path = self.file_path.clone();
        let mut file_name = tmp_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        file_name.push(".tmp");
        tmp_path.set_file_name(file_name);

        fs::write(&tmp_path, yaml)?;
        fs::rename(&tmp_path, &self.file_path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Need, NeedStatus, NeedsFile, SCHEMA_VERSION};
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample_need(id: &str) -> Need {
        Need {
            id: id.to_string(),
            statement: "The operator needs status visibility".to_string(),
            stakeholder: "operator".to_string(),
            block: "monitoring".to_string(),
            status: NeedStatus::Approved,
            rationale: None,
            provenance: Vec::new(),
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn test_load_missing_file_returns_empty_default() {
        let dir = TempDir::new().unwrap();
        let file: RegistryFile<NeedsFile> = RegistryFile::new(dir.path().join("needs.yaml"));

        let loaded = file.load().unwrap();
        assert_eq!(loaded.schema_version, SCHEMA_VERSION);
        assert!(loaded.needs.is_empty());
        // Loading must not create the file
        assert!(!file.path().exists());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let file: RegistryFile<NeedsFile> = RegistryFile::new(dir.path().join("needs.yaml"));

        let mut store = NeedsFile::default();
        store.needs.push(sample_need("NEED-001"));
        file.save(&store).unwrap();

        let loaded = file.load().unwrap();
        assert_eq!(loaded.needs.len(), 1);
        assert_eq!(loaded.needs[0].id, "NEED-001");
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let file: RegistryFile<NeedsFile> = RegistryFile::new(dir.path().join("needs.yaml"));
        file.save(&NeedsFile::default()).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(entries, vec!["needs.yaml".to_string()]);
    }

    #[test]
    fn test_save_overwrites_previous_content() {
        let dir = TempDir::new().unwrap();
        let file: RegistryFile<NeedsFile> = RegistryFile::new(dir.path().join("needs.yaml"));

        let mut store = NeedsFile::default();
        store.needs.push(sample_need("NEED-001"));
        file.save(&store).unwrap();

        store.needs.push(sample_need("NEED-002"));
        file.save(&store).unwrap();

        let loaded = file.load().unwrap();
        assert_eq!(loaded.needs.len(), 2);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("needs.yaml");
        std::fs::write(&path, "schema_version: 1\nneeds: []\nextra_field: 1\n").unwrap();

        let file: RegistryFile<NeedsFile> = RegistryFile::new(&path);
        assert!(file.load().is_err());
    }
}
