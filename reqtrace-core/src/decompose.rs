//! Decomposition and allocation
//!
//! Decomposition operates only on frozen baselines: a block may be
//! decomposed into sub-blocks only once every one of its live
//! requirements is baselined, and never past the maximum nesting
//! depth. Allocation records which sub-block carries each baselined
//! requirement via allocated_to links.

use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::models::{LinkType, RequirementStatus, SubBlock};
use crate::workspace::Workspace;

/// Maximum decomposition depth; decomposing a block already at this
/// level is rejected
pub const MAX_DEPTH: u32 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct BaselineReport {
    pub block: String,
    pub ready: bool,
    pub not_baselined: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocationReport {
    pub block: String,
    pub total_baselined: usize,
    pub allocated: usize,
    pub coverage_pct: f64,
    pub unallocated: Vec<String>,
}

impl Workspace {
    /// Reports whether every live requirement of a block is baselined
    pub fn validate_baseline(&self, block: &str) -> Result<BaselineReport> {
        let file = self.requirements().load()?;

        let mut total = 0;
        let mut not_baselined = Vec::new();
        for req in file.live().filter(|r| r.block == block) {
            total += 1;
            if req.status != RequirementStatus::Baselined {
                not_baselined.push(req.id.clone());
            }
        }

        Ok(BaselineReport {
            block: block.to_string(),
            ready: total > 0 && not_baselined.is_empty(),
            not_baselined,
        })
    }

    /// The decomposition level of a block: 0 unless it was registered
    /// as a sub-block
    pub fn block_level(&self, block: &str) -> Result<u32> {
        let file = self.blocks().load()?;
        Ok(file.get(block).map(|b| b.level).unwrap_or(0))
    }

    /// Registers named sub-blocks under a baselined parent block,
    /// one level deeper than the parent
    pub fn register_sub_blocks(&self, parent: &str, names: &[String]) -> Result<Vec<SubBlock>> {
        if names.is_empty() {
            return Err(CoreError::validation(
                "at least one sub-block name is required",
            ));
        }

        let parent_level = self.block_level(parent)?;
        if parent_level >= MAX_DEPTH {
            return Err(CoreError::validation(format!(
                "block '{}' is already at the maximum decomposition depth ({})",
                parent, MAX_DEPTH
            )));
        }

        let report = self.validate_baseline(parent)?;
        if !report.ready {
            return Err(CoreError::validation(format!(
                "block '{}' cannot be decomposed: requirements not baselined: {}",
                parent,
                if report.not_baselined.is_empty() {
                    "no requirements in block".to_string()
                } else {
                    report.not_baselined.join(", ")
                }
            )));
        }

        let mut file = self.blocks().load()?;
        for name in names {
            if name.trim().is_empty() {
                return Err(CoreError::validation("sub-block name must not be empty"));
            }
            if file.get(name).is_some() {
                return Err(CoreError::validation(format!(
                    "sub-block '{}' is already registered",
                    name
                )));
            }
        }

        let level = parent_level + 1;
        let mut registered = Vec::with_capacity(names.len());
        for name in names {
            let sub = SubBlock {
                name: name.clone(),
                level,
                parent_block: parent.to_string(),
            };
            file.blocks.push(sub.clone());
            registered.push(sub);
        }

        self.blocks().save(&file)?;
        Ok(registered)
    }

    /// Allocates a baselined requirement to a registered sub-block via
    /// an allocated_to link. Idempotent on duplicates; returns whether
    /// a new edge was created.
    pub fn allocate(&self, req_id: &str, sub_block: &str, rationale: &str) -> Result<bool> {
        if rationale.trim().is_empty() {
            return Err(CoreError::validation(
                "a rationale is required to allocate a requirement",
            ));
        }

        let requirements = self.requirements().load()?;
        let req = requirements
            .get(req_id)
            .ok_or_else(|| CoreError::not_found("requirement", req_id))?;
        if req.status != RequirementStatus::Baselined {
            return Err(CoreError::validation(format!(
                "requirement {} is {}, only baselined requirements may be allocated",
                req_id, req.status
            )));
        }

        let blocks = self.blocks().load()?;
        if blocks.get(sub_block).is_none() {
            return Err(CoreError::integrity(format!(
                "sub-block '{}' is not registered",
                sub_block
            )));
        }

        self.link(req_id, sub_block, LinkType::AllocatedTo, rationale)
    }

    /// Fraction of a block's baselined requirements carrying at least
    /// one allocated_to edge, plus the unallocated IDs
    pub fn allocation_coverage(&self, block: &str) -> Result<AllocationReport> {
        let requirements = self.requirements().load()?;
        let links = self.links().load()?;

        let mut total = 0;
        let mut allocated = 0;
        let mut unallocated = Vec::new();
        for req in requirements
            .live()
            .filter(|r| r.block == block && r.status == RequirementStatus::Baselined)
        {
            total += 1;
            let has_allocation = links
                .links
                .iter()
                .any(|l| l.link_type == LinkType::AllocatedTo && l.source_id == req.id);
            if has_allocation {
                allocated += 1;
            } else {
                unallocated.push(req.id.clone());
            }
        }

        let coverage_pct = if total == 0 {
            0.0
        } else {
            allocated as f64 / total as f64 * 100.0
        };

        Ok(AllocationReport {
            block: block.to_string(),
            total_baselined: total,
            allocated,
            coverage_pct,
            unallocated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, RequirementType};
    use tempfile::TempDir;

    fn baselined_block(ws: &Workspace, block: &str) -> String {
        let need = ws
            .add_need(
                &format!("A need for {}", block),
                "operator",
                block,
                &[],
            )
            .unwrap();
        let req = ws
            .add_requirement(
                &format!("The {} block shall operate", block),
                RequirementType::Functional,
                Priority::Medium,
                block,
            )
            .unwrap();
        ws.register_requirement(&req.id, &need.id).unwrap();
        ws.baseline_requirement(&req.id).unwrap();
        req.id
    }

    fn workspace() -> (TempDir, Workspace) {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        (dir, ws)
    }

    #[test]
    fn test_validate_baseline_reports_drafts() {
        let (_dir, ws) = workspace();
        let req = ws
            .add_requirement("The core shall operate", RequirementType::Functional, Priority::Medium, "core")
            .unwrap();

        let report = ws.validate_baseline("core").unwrap();
        assert!(!report.ready);
        assert_eq!(report.not_baselined, vec![req.id]);
    }

    #[test]
    fn test_decompose_requires_baseline() {
        let (_dir, ws) = workspace();
        ws.add_requirement("The core shall operate", RequirementType::Functional, Priority::Medium, "core")
            .unwrap();

        let result = ws.register_sub_blocks("core", &["core-a".to_string(), "core-b".to_string()]);
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_decompose_baselined_block() {
        let (_dir, ws) = workspace();
        baselined_block(&ws, "core");

        let subs = ws
            .register_sub_blocks("core", &["core-a".to_string(), "core-b".to_string()])
            .unwrap();
        assert_eq!(subs.len(), 2);
        assert!(subs.iter().all(|s| s.level == 1 && s.parent_block == "core"));
        assert_eq!(ws.block_level("core-a").unwrap(), 1);
    }

    #[test]
    fn test_max_depth_rejected() {
        let (_dir, ws) = workspace();
        baselined_block(&ws, "l0");
        ws.register_sub_blocks("l0", &["l1".to_string()]).unwrap();
        baselined_block(&ws, "l1");
        ws.register_sub_blocks("l1", &["l2".to_string()]).unwrap();
        baselined_block(&ws, "l2");
        ws.register_sub_blocks("l2", &["l3".to_string()]).unwrap();
        baselined_block(&ws, "l3");

        // l3 sits at depth 3; decomposing it is rejected
        assert_eq!(ws.block_level("l3").unwrap(), 3);
        let result = ws.register_sub_blocks("l3", &["l4".to_string()]);
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_allocate_requires_baselined_requirement() {
        let (_dir, ws) = workspace();
        baselined_block(&ws, "core");
        ws.register_sub_blocks("core", &["core-a".to_string()]).unwrap();

        let draft = ws
            .add_requirement("The core shall also do this", RequirementType::Functional, Priority::Low, "core")
            .unwrap();
        let result = ws.allocate(&draft.id, "core-a", "fits core-a scope");
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_allocate_is_idempotent() {
        let (_dir, ws) = workspace();
        let req_id = baselined_block(&ws, "core");
        ws.register_sub_blocks("core", &["core-a".to_string()]).unwrap();

        assert!(ws.allocate(&req_id, "core-a", "fits core-a scope").unwrap());
        assert!(!ws.allocate(&req_id, "core-a", "fits core-a scope").unwrap());
        assert_eq!(ws.links().load().unwrap().links.len(), 1);
    }

    #[test]
    fn test_allocate_unregistered_sub_block_rejected() {
        let (_dir, ws) = workspace();
        let req_id = baselined_block(&ws, "core");
        let result = ws.allocate(&req_id, "core-z", "why");
        assert!(matches!(result, Err(CoreError::ReferentialIntegrity(_))));
    }

    #[test]
    fn test_allocation_coverage() {
        let (_dir, ws) = workspace();
        let allocated = baselined_block(&ws, "core");
        ws.register_sub_blocks("core", &["core-a".to_string()]).unwrap();

        // A second baselined requirement left unallocated
        let need = ws.add_need("Another core need", "operator", "core", &[]).unwrap();
        let other = ws
            .add_requirement("The core shall report health", RequirementType::Functional, Priority::Medium, "core")
            .unwrap();
        ws.register_requirement(&other.id, &need.id).unwrap();
        ws.baseline_requirement(&other.id).unwrap();

        ws.allocate(&allocated, "core-a", "fits core-a scope").unwrap();

        let report = ws.allocation_coverage("core").unwrap();
        assert_eq!(report.total_baselined, 2);
        assert_eq!(report.allocated, 1);
        assert_eq!(report.coverage_pct, 50.0);
        assert_eq!(report.unallocated, vec![other.id]);
    }

    #[test]
    fn test_allocation_coverage_empty_block() {
        let (_dir, ws) = workspace();
        let report = ws.allocation_coverage("ghost").unwrap();
        assert_eq!(report.total_baselined, 0);
        assert_eq!(report.coverage_pct, 0.0);
    }
}
