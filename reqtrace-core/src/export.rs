//! Read-only export of the registries
//!
//! Produces a single JSON document combining every collection, for
//! downstream document assembly and interchange tooling that consumes
//! the registries read-only.

use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::models::{Need, Requirement, Source, SubBlock, TraceLink, SCHEMA_VERSION};
use crate::workspace::Workspace;

#[derive(Debug, Serialize)]
pub struct ExportDocument {
    pub schema_version: u32,
    pub needs: Vec<Need>,
    pub requirements: Vec<Requirement>,
    pub sources: Vec<Source>,
    pub links: Vec<TraceLink>,
    pub blocks: Vec<SubBlock>,
}

impl Workspace {
    /// Assembles the combined export document from the registries
    pub fn export_document(&self) -> Result<ExportDocument> {
        Ok(ExportDocument {
            schema_version: SCHEMA_VERSION,
            needs: self.needs().load()?.needs,
            requirements: self.requirements().load()?.requirements,
            sources: self.sources().load()?.sources,
            links: self.links().load()?.links,
            blocks: self.blocks().load()?.blocks,
        })
    }

    /// Exports all registries to a pretty-printed JSON file
    pub fn export_json(&self, output_path: &Path) -> Result<()> {
        let document = self.export_document()?;
        let json = serde_json::to_string_pretty(&document)?;
        fs::write(output_path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, RequirementType};
    use tempfile::TempDir;

    #[test]
    fn test_export_includes_withdrawn_for_audit() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        let req = ws
            .add_requirement("The system shall log errors", RequirementType::Functional, Priority::Medium, "core")
            .unwrap();
        ws.withdraw_requirement(&req.id, "superseded").unwrap();

        let doc = ws.export_document().unwrap();
        assert_eq!(doc.requirements.len(), 1);
    }

    #[test]
    fn test_export_json_writes_file() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        ws.add_need("The operator needs alerts", "operator", "core", &[]).unwrap();

        let out = dir.path().join("export.json");
        ws.export_json(&out).unwrap();

        let content = std::fs::read_to_string(&out).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["needs"].as_array().unwrap().len(), 1);
    }
}
