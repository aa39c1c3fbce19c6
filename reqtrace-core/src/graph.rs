//! Traceability graph
//!
//! Typed directed edges between registry entities, with referential
//! integrity checks at creation and coverage/orphan queries over the
//! live population. Edges are never deleted; withdrawn requirements'
//! edges simply stop counting.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;

use crate::error::{CoreError, Result};
use crate::models::{
    BlocksFile, EntityRef, LinkType, NeedsFile, RequirementsFile, ResolutionStatus, TraceLink,
};
use crate::workspace::Workspace;

/// Direction of a link query relative to the queried entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    Both,
}

impl Direction {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "forward" => Ok(Direction::Forward),
            "backward" => Ok(Direction::Backward),
            "both" => Ok(Direction::Both),
            other => Err(CoreError::validation(format!(
                "unknown direction '{}' (expected forward, backward, or both)",
                other
            ))),
        }
    }
}

/// Result of a coverage computation over approved needs
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub total_approved_needs: usize,
    pub covered_needs: usize,
    pub coverage_pct: f64,
    pub uncovered: Vec<String>,
}

/// Approved needs and live requirements with no derivation edge
#[derive(Debug, Clone, Serialize)]
pub struct OrphanReport {
    pub orphan_needs: Vec<String>,
    pub orphan_requirements: Vec<String>,
}

fn block_exists(
    name: &str,
    needs: &NeedsFile,
    requirements: &RequirementsFile,
    blocks: &BlocksFile,
) -> bool {
    blocks.get(name).is_some()
        || needs.needs.iter().any(|n| n.block == name)
        || requirements.requirements.iter().any(|r| r.block == name)
}

impl Workspace {
    fn check_endpoint(&self, id: &str) -> Result<()> {
        let entity = EntityRef::parse(id)?;
        let exists = match &entity {
            EntityRef::Need(_) => self.needs().load()?.get(id).is_some(),
            EntityRef::Requirement(_) => self.requirements().load()?.get(id).is_some(),
            EntityRef::Source(_) => self.sources().load()?.get(id).is_some(),
            EntityRef::Block(name) => {
                let needs = self.needs().load()?;
                let requirements = self.requirements().load()?;
                let blocks = self.blocks().load()?;
                block_exists(name, &needs, &requirements, &blocks)
            }
        };

        if exists {
            Ok(())
        } else {
            Err(CoreError::integrity(format!(
                "link endpoint {} does not exist",
                id
            )))
        }
    }

    /// Creates a typed link between two existing entities. An
    /// identical (source, target, type) triple is an idempotent no-op;
    /// returns whether a new edge was created.
    pub fn link(
        &self,
        source_id: &str,
        target_id: &str,
        link_type: LinkType,
        role: &str,
    ) -> Result<bool> {
        self.check_endpoint(source_id)?;
        self.check_endpoint(target_id)?;

        let mut file = self.links().load()?;
        if file.links.iter().any(|l| {
            l.source_id == source_id && l.target_id == target_id && l.link_type == link_type
        }) {
            return Ok(false);
        }

        let resolution_status = if link_type == LinkType::ConflictsWith {
            Some(ResolutionStatus::Open)
        } else {
            None
        };

        file.links.push(TraceLink {
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            link_type,
            role: role.to_string(),
            created_at: Utc::now(),
            resolution_status,
            resolution_rationale: None,
        });

        self.links().save(&file)?;
        self.refresh_counts()?;
        Ok(true)
    }

    /// Returns all links where the entity appears in the queried
    /// direction
    pub fn query_links(&self, entity_id: &str, direction: Direction) -> Result<Vec<TraceLink>> {
        let file = self.links().load()?;
        Ok(file
            .links
            .into_iter()
            .filter(|l| match direction {
                Direction::Forward => l.source_id == entity_id,
                Direction::Backward => l.target_id == entity_id,
                Direction::Both => l.source_id == entity_id || l.target_id == entity_id,
            })
            .collect())
    }

    /// Fraction of approved needs reachable by at least one
    /// derives_from edge from a non-withdrawn requirement
    pub fn coverage(&self) -> Result<CoverageReport> {
        let needs = self.needs().load()?;
        let requirements = self.requirements().load()?;
        let links = self.links().load()?;

        let live: HashSet<&str> = requirements.live().map(|r| r.id.as_str()).collect();

        let covered: HashSet<&str> = links
            .links
            .iter()
            .filter(|l| l.link_type == LinkType::DerivesFrom)
            .filter(|l| live.contains(l.source_id.as_str()))
            .map(|l| l.target_id.as_str())
            .collect();

        let mut covered_count = 0;
        let mut uncovered = Vec::new();
        let mut total = 0;
        for need in needs.approved() {
            total += 1;
            if covered.contains(need.id.as_str()) {
                covered_count += 1;
            } else {
                uncovered.push(need.id.clone());
            }
        }

        let coverage_pct = if total == 0 {
            0.0
        } else {
            covered_count as f64 / total as f64 * 100.0
        };

        Ok(CoverageReport {
            total_approved_needs: total,
            covered_needs: covered_count,
            coverage_pct,
            uncovered,
        })
    }

    /// Approved needs with no incoming live derives_from edge, and
    /// live requirements with no outgoing derives_from edge
    pub fn orphans(&self) -> Result<OrphanReport> {
        let needs = self.needs().load()?;
        let requirements = self.requirements().load()?;
        let links = self.links().load()?;

        let live: HashSet<&str> = requirements.live().map(|r| r.id.as_str()).collect();

        let derive_sources: HashSet<&str> = links
            .links
            .iter()
            .filter(|l| l.link_type == LinkType::DerivesFrom)
            .filter(|l| live.contains(l.source_id.as_str()))
            .map(|l| l.source_id.as_str())
            .collect();
        let derive_targets: HashSet<&str> = links
            .links
            .iter()
            .filter(|l| l.link_type == LinkType::DerivesFrom)
            .filter(|l| live.contains(l.source_id.as_str()))
            .map(|l| l.target_id.as_str())
            .collect();

        let orphan_needs = needs
            .approved()
            .filter(|n| !derive_targets.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();

        let orphan_requirements = requirements
            .live()
            .filter(|r| !derive_sources.contains(r.id.as_str()))
            .map(|r| r.id.clone())
            .collect();

        Ok(OrphanReport {
            orphan_needs,
            orphan_requirements,
        })
    }

    /// Marks a conflicts_with edge as resolved with a rationale
    pub fn resolve_conflict(
        &self,
        source_id: &str,
        target_id: &str,
        rationale: &str,
    ) -> Result<TraceLink> {
        if rationale.trim().is_empty() {
            return Err(CoreError::validation(
                "a rationale is required to resolve a conflict",
            ));
        }

        let mut file = self.links().load()?;
        let link = file
            .links
            .iter_mut()
            .find(|l| {
                l.source_id == source_id
                    && l.target_id == target_id
                    && l.link_type == LinkType::ConflictsWith
            })
            .ok_or_else(|| {
                CoreError::not_found(
                    "conflicts_with link",
                    format!("{} -> {}", source_id, target_id),
                )
            })?;

        link.resolution_status = Some(ResolutionStatus::Resolved);
        link.resolution_rationale = Some(rationale.to_string());
        let resolved = link.clone();

        self.links().save(&file)?;
        Ok(resolved)
    }
}
