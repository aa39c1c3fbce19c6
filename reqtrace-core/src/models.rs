use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CoreError, Result};

/// Current on-disk schema version for all registry files
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Represents the status of a stakeholder need
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NeedStatus {
    Approved,
    Deferred,
    Rejected,
}

impl fmt::Display for NeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeedStatus::Approved => write!(f, "approved"),
            NeedStatus::Deferred => write!(f, "deferred"),
            NeedStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Represents the lifecycle status of a requirement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequirementStatus {
    Draft,
    Registered,
    Baselined,
    Withdrawn,
}

impl fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementStatus::Draft => write!(f, "draft"),
            RequirementStatus::Registered => write!(f, "registered"),
            RequirementStatus::Baselined => write!(f, "baselined"),
            RequirementStatus::Withdrawn => write!(f, "withdrawn"),
        }
    }
}

/// Represents the type of a requirement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
    Functional,
    Performance,
    Interface,
    Constraint,
    Quality,
}

impl fmt::Display for RequirementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementType::Functional => write!(f, "functional"),
            RequirementType::Performance => write!(f, "performance"),
            RequirementType::Interface => write!(f, "interface"),
            RequirementType::Constraint => write!(f, "constraint"),
            RequirementType::Quality => write!(f, "quality"),
        }
    }
}

impl RequirementType {
    /// Parse a requirement type from a string
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "functional" => Ok(RequirementType::Functional),
            "performance" => Ok(RequirementType::Performance),
            "interface" => Ok(RequirementType::Interface),
            "constraint" => Ok(RequirementType::Constraint),
            "quality" => Ok(RequirementType::Quality),
            other => Err(CoreError::validation(format!(
                "unknown requirement type '{}' (expected functional, performance, interface, constraint, or quality)",
                other
            ))),
        }
    }
}

/// Represents the priority of a requirement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

impl Priority {
    /// Parse a priority from a string
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(CoreError::validation(format!(
                "unknown priority '{}' (expected high, medium, or low)",
                other
            ))),
        }
    }
}

/// The closed set of traceability link types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    DerivesFrom,
    VerifiedBy,
    Sources,
    InformedBy,
    AllocatedTo,
    ParentOf,
    ConflictsWith,
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkType::DerivesFrom => write!(f, "derives_from"),
            LinkType::VerifiedBy => write!(f, "verified_by"),
            LinkType::Sources => write!(f, "sources"),
            LinkType::InformedBy => write!(f, "informed_by"),
            LinkType::AllocatedTo => write!(f, "allocated_to"),
            LinkType::ParentOf => write!(f, "parent_of"),
            LinkType::ConflictsWith => write!(f, "conflicts_with"),
        }
    }
}

impl LinkType {
    /// Parse a link type from a string
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "derives_from" | "derives-from" => Ok(LinkType::DerivesFrom),
            "verified_by" | "verified-by" => Ok(LinkType::VerifiedBy),
            "sources" => Ok(LinkType::Sources),
            "informed_by" | "informed-by" => Ok(LinkType::InformedBy),
            "allocated_to" | "allocated-to" => Ok(LinkType::AllocatedTo),
            "parent_of" | "parent-of" => Ok(LinkType::ParentOf),
            "conflicts_with" | "conflicts-with" => Ok(LinkType::ConflictsWith),
            other => Err(CoreError::validation(format!(
                "unknown link type '{}'",
                other
            ))),
        }
    }
}

/// Resolution state carried only by `conflicts_with` links
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Open,
    Resolved,
}

/// A typed reference to an entity, parsed once at the boundary from a
/// prefixed ID. Anything without a recognized prefix is treated as a
/// block name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Need(u32),
    Requirement(u32),
    Source(u32),
    Block(String),
}

impl EntityRef {
    /// Parse a prefixed ID like `NEED-001` or `REQ-042`
    pub fn parse(id: &str) -> Result<Self> {
        if let Some(rest) = id.strip_prefix("NEED-") {
            return Self::number(id, rest).map(EntityRef::Need);
        }
        if let Some(rest) = id.strip_prefix("REQ-") {
            return Self::number(id, rest).map(EntityRef::Requirement);
        }
        if let Some(rest) = id.strip_prefix("SRC-") {
            return Self::number(id, rest).map(EntityRef::Source);
        }
        if id.trim().is_empty() {
            return Err(CoreError::validation("empty entity reference"));
        }
        Ok(EntityRef::Block(id.to_string()))
    }

    fn number(full: &str, suffix: &str) -> Result<u32> {
        suffix.parse::<u32>().map_err(|_| {
            CoreError::validation(format!("malformed entity ID '{}'", full))
        })
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Need(n) => write!(f, "NEED-{:03}", n),
            EntityRef::Requirement(n) => write!(f, "REQ-{:03}", n),
            EntityRef::Source(n) => write!(f, "SRC-{:03}", n),
            EntityRef::Block(name) => write!(f, "{}", name),
        }
    }
}

/// A stakeholder need statement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Need {
    /// Prefixed sequential identifier (e.g., "NEED-001")
    pub id: String,

    /// The need statement text
    pub statement: String,

    /// Stakeholder who owns the need
    pub stakeholder: String,

    /// Functional block the need originates from
    pub block: String,

    /// Current status of the need
    pub status: NeedStatus,

    /// Rationale, required for deferred/rejected needs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,

    /// References to external sources or assumptions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<String>,

    /// When the need was registered
    pub registered_at: DateTime<Utc>,
}

/// A derived, checkable requirement statement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Requirement {
    /// Prefixed sequential identifier (e.g., "REQ-001")
    pub id: String,

    /// The requirement statement text
    pub statement: String,

    /// Type of the requirement
    pub req_type: RequirementType,

    /// Priority level of the requirement
    pub priority: Priority,

    /// Current lifecycle status
    pub status: RequirementStatus,

    /// Parent need ID; empty while the requirement is a draft
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_need: Option<String>,

    /// Functional block the requirement belongs to
    pub block: String,

    /// Decomposition level (0 = top level)
    #[serde(default)]
    pub level: u32,

    /// Free-form extended metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// Open "to be determined" marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tbd: Option<String>,

    /// Open "to be resolved" marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tbr: Option<String>,

    /// Rationale, required for withdrawal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,

    /// ID of the requirement this one was split from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_from: Option<String>,

    /// When the requirement was created
    pub created_at: DateTime<Utc>,

    /// When the requirement was registered against its parent need
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,

    /// When the requirement was baselined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baselined_at: Option<DateTime<Utc>>,
}

impl Requirement {
    /// Whether the requirement participates in coverage and set analyses
    pub fn is_live(&self) -> bool {
        self.status != RequirementStatus::Withdrawn
    }
}

/// An external reference (document, research finding, standard)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Source {
    /// Prefixed sequential identifier (e.g., "SRC-001")
    pub id: String,

    /// Title of the source
    pub title: String,

    /// URL or locator
    pub url: String,

    /// Category tag (e.g., "standard", "research")
    pub category: String,

    /// Free-text research context
    #[serde(default)]
    pub research_context: String,

    /// Optional link back to an upstream artifact reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<String>,

    /// When the source was registered
    pub registered_at: DateTime<Utc>,
}

/// A directed, typed traceability edge between two entities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraceLink {
    /// Prefixed ID of the source entity
    pub source_id: String,

    /// Prefixed ID of the target entity
    pub target_id: String,

    /// Type of the relationship
    pub link_type: LinkType,

    /// Role tag describing the edge's purpose
    #[serde(default)]
    pub role: String,

    /// When the link was created
    pub created_at: DateTime<Utc>,

    /// Resolution state, present only on conflicts_with links
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_status: Option<ResolutionStatus>,

    /// Why the conflict was resolved, if it was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_rationale: Option<String>,
}

/// A named sub-block registered during decomposition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubBlock {
    /// Sub-block name
    pub name: String,

    /// Decomposition level (parent level + 1)
    pub level: u32,

    /// The block this sub-block decomposes
    pub parent_block: String,
}

/// Collection of all needs
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeedsFile {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub needs: Vec<Need>,
}

impl Default for NeedsFile {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            needs: Vec::new(),
        }
    }
}

/// Collection of all requirements
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequirementsFile {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
}

impl Default for RequirementsFile {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            requirements: Vec::new(),
        }
    }
}

/// Collection of all sources
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesFile {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl Default for SourcesFile {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            sources: Vec::new(),
        }
    }
}

/// Collection of all traceability links
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraceLinksFile {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub links: Vec<TraceLink>,
}

impl Default for TraceLinksFile {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            links: Vec::new(),
        }
    }
}

/// Collection of registered sub-blocks
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlocksFile {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub blocks: Vec<SubBlock>,
}

impl Default for BlocksFile {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            blocks: Vec::new(),
        }
    }
}

impl NeedsFile {
    pub fn get(&self, id: &str) -> Option<&Need> {
        self.needs.iter().find(|n| n.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Need> {
        self.needs.iter_mut().find(|n| n.id == id)
    }

    /// Needs that count toward coverage and validation
    pub fn approved(&self) -> impl Iterator<Item = &Need> {
        self.needs
            .iter()
            .filter(|n| n.status == NeedStatus::Approved)
    }
}

impl RequirementsFile {
    pub fn get(&self, id: &str) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Requirement> {
        self.requirements.iter_mut().find(|r| r.id == id)
    }

    /// Non-withdrawn requirements
    pub fn live(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter().filter(|r| r.is_live())
    }
}

impl SourcesFile {
    pub fn get(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }
}

impl BlocksFile {
    pub fn get(&self, name: &str) -> Option<&SubBlock> {
        self.blocks.iter().find(|b| b.name == name)
    }
}

/// Derives the next sequential ID for a prefix by scanning existing IDs
/// for the highest numeric suffix. Freed numbers are never reused.
pub fn next_id<'a>(prefix: &str, existing: impl Iterator<Item = &'a str>) -> String {
    let tag = format!("{}-", prefix);
    let max = existing
        .filter_map(|id| id.strip_prefix(&tag))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{}-{:03}", prefix, max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_id_empty() {
        let ids: Vec<&str> = vec![];
        assert_eq!(next_id("NEED", ids.into_iter()), "NEED-001");
    }

    #[test]
    fn test_next_id_increments_past_gaps() {
        let ids = ["REQ-001", "REQ-005", "REQ-003"];
        assert_eq!(next_id("REQ", ids.iter().copied()), "REQ-006");
    }

    #[test]
    fn test_next_id_ignores_other_prefixes() {
        let ids = ["NEED-009", "REQ-002"];
        assert_eq!(next_id("REQ", ids.iter().copied()), "REQ-003");
    }

    #[test]
    fn test_entity_ref_parse() {
        assert_eq!(EntityRef::parse("NEED-001").unwrap(), EntityRef::Need(1));
        assert_eq!(EntityRef::parse("REQ-042").unwrap(), EntityRef::Requirement(42));
        assert_eq!(EntityRef::parse("SRC-007").unwrap(), EntityRef::Source(7));
        assert_eq!(
            EntityRef::parse("propulsion").unwrap(),
            EntityRef::Block("propulsion".to_string())
        );
    }

    #[test]
    fn test_entity_ref_malformed_suffix() {
        assert!(EntityRef::parse("REQ-abc").is_err());
        assert!(EntityRef::parse("").is_err());
    }

    #[test]
    fn test_entity_ref_display_round_trip() {
        let r = EntityRef::parse("REQ-003").unwrap();
        assert_eq!(r.to_string(), "REQ-003");
    }

    #[test]
    fn test_link_type_parse() {
        assert_eq!(LinkType::parse("derives_from").unwrap(), LinkType::DerivesFrom);
        assert_eq!(LinkType::parse("verified-by").unwrap(), LinkType::VerifiedBy);
        assert!(LinkType::parse("depends_on").is_err());
    }
}
