//! Workspace root and registry file layout
//!
//! A workspace is a directory holding one YAML document per entity
//! collection plus the session state document. Every operation re-reads
//! from disk; nothing is cached across invocations.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::{BlocksFile, NeedsFile, RequirementsFile, SourcesFile, TraceLinksFile};
use crate::session::{SessionState, StatusCounts};
use crate::store::RegistryFile;

pub const NEEDS_FILE: &str = "needs.yaml";
pub const REQUIREMENTS_FILE: &str = "requirements.yaml";
pub const SOURCES_FILE: &str = "sources.yaml";
pub const TRACE_LINKS_FILE: &str = "trace_links.yaml";
pub const BLOCKS_FILE: &str = "blocks.yaml";
pub const SESSION_FILE: &str = "session_state.yaml";

/// A registry workspace rooted at a directory
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Creates a workspace handle for the given root directory
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn needs(&self) -> RegistryFile<NeedsFile> {
        RegistryFile::new(self.root.join(NEEDS_FILE))
    }

    pub fn requirements(&self) -> RegistryFile<RequirementsFile> {
        RegistryFile::new(self.root.join(REQUIREMENTS_FILE))
    }

    pub fn sources(&self) -> RegistryFile<SourcesFile> {
        RegistryFile::new(self.root.join(SOURCES_FILE))
    }

    pub fn links(&self) -> RegistryFile<TraceLinksFile> {
        RegistryFile::new(self.root.join(TRACE_LINKS_FILE))
    }

    pub fn blocks(&self) -> RegistryFile<BlocksFile> {
        RegistryFile::new(self.root.join(BLOCKS_FILE))
    }

    pub fn session(&self) -> RegistryFile<SessionState> {
        RegistryFile::new(self.root.join(SESSION_FILE))
    }

    /// Re-derives the session's cached status counts from the
    /// registries and persists the session document. Called after
    /// every mutating operation so the cache can never drift from
    /// ground truth.
    pub fn refresh_counts(&self) -> Result<()> {
        let needs = self.needs().load()?;
        let requirements = self.requirements().load()?;
        let sources = self.sources().load()?;
        let links = self.links().load()?;

        let mut session = self.session().load()?;
        session.counts = StatusCounts::derive(&needs, &requirements, &sources, &links);
        self.session().save(&session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_workspace_loads_empty_collections() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());

        assert!(ws.needs().load().unwrap().needs.is_empty());
        assert!(ws.requirements().load().unwrap().requirements.is_empty());
        assert!(ws.links().load().unwrap().links.is_empty());
        assert_eq!(ws.session().load().unwrap().phase, "elicitation");
    }

    #[test]
    fn test_refresh_counts_reflects_registries() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());

        ws.add_need("The operator needs alerts", "operator", "monitoring", &[])
            .unwrap();

        let session = ws.session().load().unwrap();
        assert_eq!(session.counts.needs.get("approved"), Some(&1));
    }
}
