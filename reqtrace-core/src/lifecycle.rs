//! Entity lifecycle engine
//!
//! Add/transition/split/update operations for needs, requirements, and
//! sources. Every mutating operation follows the same discipline: load
//! the registry, validate everything, mutate in memory, save
//! atomically, then re-derive the session's cached counts.

use chrono::Utc;
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::models::{
    next_id, Need, NeedStatus, Priority, Requirement, RequirementStatus, RequirementType, Source,
};
use crate::workspace::Workspace;

/// Fields that may never be written through the generic update path.
/// Status changes must go through the dedicated transition operations
/// so the audit trail is never bypassed.
const PROTECTED_FIELDS: &[&str] = &[
    "id",
    "status",
    "created_at",
    "registered_at",
    "baselined_at",
    "parent_need",
    "split_from",
];

fn require_rationale(rationale: &str, action: &str) -> Result<()> {
    if rationale.trim().is_empty() {
        return Err(CoreError::validation(format!(
            "a rationale is required to {}",
            action
        )));
    }
    Ok(())
}

impl Workspace {
    // ---- Needs ----------------------------------------------------

    /// Adds a new need in `approved` status.
    ///
    /// The (statement, stakeholder) pair must be unique, case
    /// insensitively, across every need ever recorded, including
    /// deferred and rejected ones.
    pub fn add_need(
        &self,
        statement: &str,
        stakeholder: &str,
        block: &str,
        provenance: &[String],
    ) -> Result<Need> {
        if statement.trim().is_empty() {
            return Err(CoreError::validation("need statement must not be empty"));
        }
        if stakeholder.trim().is_empty() {
            return Err(CoreError::validation("stakeholder must not be empty"));
        }

        let mut file = self.needs().load()?;

        let key = (statement.to_lowercase(), stakeholder.to_lowercase());
        if file.needs.iter().any(|n| {
            (n.statement.to_lowercase(), n.stakeholder.to_lowercase()) == key
        }) {
            return Err(CoreError::validation(format!(
                "a need with this statement already exists for stakeholder '{}'",
                stakeholder
            )));
        }

        let need = Need {
            id: next_id("NEED", file.needs.iter().map(|n| n.id.as_str())),
            statement: statement.to_string(),
            stakeholder: stakeholder.to_string(),
            block: block.to_string(),
            status: NeedStatus::Approved,
            rationale: None,
            provenance: provenance.to_vec(),
            registered_at: Utc::now(),
        };

        file.needs.push(need.clone());
        self.needs().save(&file)?;
        self.refresh_counts()?;
        Ok(need)
    }

    /// Moves an approved need to `deferred`
    pub fn defer_need(&self, id: &str, rationale: &str) -> Result<Need> {
        self.transition_need(id, NeedStatus::Deferred, rationale, "defer a need")
    }

    /// Moves an approved need to `rejected`
    pub fn reject_need(&self, id: &str, rationale: &str) -> Result<Need> {
        self.transition_need(id, NeedStatus::Rejected, rationale, "reject a need")
    }

    fn transition_need(
        &self,
        id: &str,
        to: NeedStatus,
        rationale: &str,
        action: &str,
    ) -> Result<Need> {
        require_rationale(rationale, action)?;

        let mut file = self.needs().load()?;
        let need = file
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("need", id))?;

        if need.status != NeedStatus::Approved {
            return Err(CoreError::InvalidTransition {
                id: id.to_string(),
                from: need.status.to_string(),
                to: to.to_string(),
            });
        }

        need.status = to;
        need.rationale = Some(rationale.to_string());
        let updated = need.clone();

        self.needs().save(&file)?;
        self.refresh_counts()?;
        Ok(updated)
    }

    /// Splits an approved need into multiple approved children.
    ///
    /// The original is rejected with a split rationale; the children
    /// inherit stakeholder, block, and provenance.
    pub fn split_need(&self, id: &str, statements: &[String]) -> Result<Vec<Need>> {
        if statements.len() < 2 {
            return Err(CoreError::validation(
                "splitting a need requires at least two replacement statements",
            ));
        }

        let mut file = self.needs().load()?;
        let parent = file
            .get(id)
            .ok_or_else(|| CoreError::not_found("need", id))?
            .clone();

        if parent.status != NeedStatus::Approved {
            return Err(CoreError::InvalidTransition {
                id: id.to_string(),
                from: parent.status.to_string(),
                to: "split".to_string(),
            });
        }

        // The uniqueness invariant applies to the children too
        for statement in statements {
            let key = (statement.to_lowercase(), parent.stakeholder.to_lowercase());
            if file.needs.iter().any(|n| {
                (n.statement.to_lowercase(), n.stakeholder.to_lowercase()) == key
            }) {
                return Err(CoreError::validation(format!(
                    "split child duplicates an existing need: '{}'",
                    statement
                )));
            }
        }

        let now = Utc::now();
        let mut children = Vec::with_capacity(statements.len());
        for statement in statements {
            let child = Need {
                id: next_id("NEED", file.needs.iter().map(|n| n.id.as_str())),
                statement: statement.clone(),
                stakeholder: parent.stakeholder.clone(),
                block: parent.block.clone(),
                status: NeedStatus::Approved,
                rationale: None,
                provenance: parent.provenance.clone(),
                registered_at: now,
            };
            file.needs.push(child.clone());
            children.push(child);
        }

        let child_ids: Vec<&str> = children.iter().map(|c| c.id.as_str()).collect();
        let original = file.get_mut(id).expect("parent checked above");
        original.status = NeedStatus::Rejected;
        original.rationale = Some(format!("split into {}", child_ids.join(", ")));

        self.needs().save(&file)?;
        self.refresh_counts()?;
        Ok(children)
    }

    pub fn get_need(&self, id: &str) -> Result<Need> {
        self.needs()
            .load()?
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("need", id))
    }

    pub fn list_needs(&self) -> Result<Vec<Need>> {
        Ok(self.needs().load()?.needs)
    }

    // ---- Requirements ---------------------------------------------

    /// Adds a new requirement as a draft, with no parent need
    pub fn add_requirement(
        &self,
        statement: &str,
        req_type: RequirementType,
        priority: Priority,
        block: &str,
    ) -> Result<Requirement> {
        if statement.trim().is_empty() {
            return Err(CoreError::validation(
                "requirement statement must not be empty",
            ));
        }

        let mut file = self.requirements().load()?;
        let req = Requirement {
            id: next_id("REQ", file.requirements.iter().map(|r| r.id.as_str())),
            statement: statement.to_string(),
            req_type,
            priority,
            status: RequirementStatus::Draft,
            parent_need: None,
            block: block.to_string(),
            level: 0,
            attributes: BTreeMap::new(),
            tbd: None,
            tbr: None,
            rationale: None,
            split_from: None,
            created_at: Utc::now(),
            registered_at: None,
            baselined_at: None,
        };

        file.requirements.push(req.clone());
        self.requirements().save(&file)?;
        self.refresh_counts()?;
        Ok(req)
    }

    /// Registers a draft requirement against an approved parent need
    pub fn register_requirement(&self, req_id: &str, need_id: &str) -> Result<Requirement> {
        let needs = self.needs().load()?;
        let mut file = self.requirements().load()?;

        let req = file
            .get(req_id)
            .ok_or_else(|| CoreError::not_found("requirement", req_id))?;

        if req.status != RequirementStatus::Draft {
            return Err(CoreError::InvalidTransition {
                id: req_id.to_string(),
                from: req.status.to_string(),
                to: RequirementStatus::Registered.to_string(),
            });
        }

        let need = needs.get(need_id).ok_or_else(|| {
            CoreError::integrity(format!(
                "parent need {} does not exist",
                need_id
            ))
        })?;
        if need.status != NeedStatus::Approved {
            return Err(CoreError::integrity(format!(
                "parent need {} is {}, only approved needs may be registered against",
                need_id, need.status
            )));
        }

        let req = file.get_mut(req_id).expect("existence checked above");
        req.parent_need = Some(need_id.to_string());
        req.status = RequirementStatus::Registered;
        req.registered_at = Some(Utc::now());
        let updated = req.clone();

        self.requirements().save(&file)?;
        self.refresh_counts()?;
        Ok(updated)
    }

    /// Freezes a registered requirement into the baseline
    pub fn baseline_requirement(&self, id: &str) -> Result<Requirement> {
        let mut file = self.requirements().load()?;
        let req = file
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("requirement", id))?;

        if req.status != RequirementStatus::Registered {
            return Err(CoreError::InvalidTransition {
                id: id.to_string(),
                from: req.status.to_string(),
                to: RequirementStatus::Baselined.to_string(),
            });
        }

        req.status = RequirementStatus::Baselined;
        req.baselined_at = Some(Utc::now());
        let updated = req.clone();

        self.requirements().save(&file)?;
        self.refresh_counts()?;
        Ok(updated)
    }

    /// Withdraws a requirement from any non-terminal state. The
    /// requirement is retained for audit but excluded from listings,
    /// coverage, and set analyses.
    pub fn withdraw_requirement(&self, id: &str, rationale: &str) -> Result<Requirement> {
        require_rationale(rationale, "withdraw a requirement")?;

        let mut file = self.requirements().load()?;
        let req = file
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("requirement", id))?;

        if req.status == RequirementStatus::Withdrawn {
            return Err(CoreError::InvalidTransition {
                id: id.to_string(),
                from: req.status.to_string(),
                to: RequirementStatus::Withdrawn.to_string(),
            });
        }

        req.status = RequirementStatus::Withdrawn;
        req.rationale = Some(rationale.to_string());
        let updated = req.clone();

        self.requirements().save(&file)?;
        self.refresh_counts()?;
        Ok(updated)
    }

    /// Splits a requirement: the parent is withdrawn with a split
    /// rationale and the replacement statements become new drafts
    /// inheriting type, priority, block, and level.
    pub fn split_requirement(&self, id: &str, statements: &[String]) -> Result<Vec<Requirement>> {
        if statements.len() < 2 {
            return Err(CoreError::validation(
                "splitting a requirement requires at least two replacement statements",
            ));
        }

        let mut file = self.requirements().load()?;
        let parent = file
            .get(id)
            .ok_or_else(|| CoreError::not_found("requirement", id))?
            .clone();

        if !parent.is_live() {
            return Err(CoreError::InvalidTransition {
                id: id.to_string(),
                from: parent.status.to_string(),
                to: "split".to_string(),
            });
        }

        let now = Utc::now();
        let mut children = Vec::with_capacity(statements.len());
        for statement in statements {
            let child = Requirement {
                id: next_id("REQ", file.requirements.iter().map(|r| r.id.as_str())),
                statement: statement.clone(),
                req_type: parent.req_type,
                priority: parent.priority,
                status: RequirementStatus::Draft,
                parent_need: None,
                block: parent.block.clone(),
                level: parent.level,
                attributes: BTreeMap::new(),
                tbd: None,
                tbr: None,
                rationale: None,
                split_from: Some(parent.id.clone()),
                created_at: now,
                registered_at: None,
                baselined_at: None,
            };
            file.requirements.push(child.clone());
            children.push(child);
        }

        let child_ids: Vec<&str> = children.iter().map(|c| c.id.as_str()).collect();
        let original = file.get_mut(id).expect("parent checked above");
        original.status = RequirementStatus::Withdrawn;
        original.rationale = Some(format!("split into {}", child_ids.join(", ")));

        self.requirements().save(&file)?;
        self.refresh_counts()?;
        Ok(children)
    }

    /// Updates a single field of a requirement. Protected fields are
    /// rejected; unknown field names land in the free-form attribute
    /// map.
    pub fn update_requirement(&self, id: &str, field: &str, value: &str) -> Result<Requirement> {
        if PROTECTED_FIELDS.contains(&field) {
            return Err(CoreError::validation(format!(
                "field '{}' is protected and only changes through its dedicated operation",
                field
            )));
        }

        let mut file = self.requirements().load()?;
        let req = file
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("requirement", id))?;

        match field {
            "statement" => {
                if value.trim().is_empty() {
                    return Err(CoreError::validation(
                        "requirement statement must not be empty",
                    ));
                }
                req.statement = value.to_string();
            }
            "type" => req.req_type = RequirementType::parse(value)?,
            "priority" => req.priority = Priority::parse(value)?,
            "block" => req.block = value.to_string(),
            "level" => {
                req.level = value.parse::<u32>().map_err(|_| {
                    CoreError::validation(format!("level must be a non-negative integer, got '{}'", value))
                })?;
            }
            "tbd" => req.tbd = non_empty(value),
            "tbr" => req.tbr = non_empty(value),
            "rationale" => req.rationale = non_empty(value),
            other => {
                req.attributes.insert(other.to_string(), value.to_string());
            }
        }

        let updated = req.clone();
        self.requirements().save(&file)?;
        self.refresh_counts()?;
        Ok(updated)
    }

    pub fn get_requirement(&self, id: &str) -> Result<Requirement> {
        self.requirements()
            .load()?
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("requirement", id))
    }

    /// Lists requirements; withdrawn ones are excluded unless asked for
    pub fn list_requirements(&self, include_withdrawn: bool) -> Result<Vec<Requirement>> {
        let file = self.requirements().load()?;
        Ok(file
            .requirements
            .into_iter()
            .filter(|r| include_withdrawn || r.is_live())
            .collect())
    }

    /// Filters requirements by status, type, and/or block. Withdrawn
    /// requirements only appear when explicitly queried by status.
    pub fn query_requirements(
        &self,
        status: Option<RequirementStatus>,
        req_type: Option<RequirementType>,
        block: Option<&str>,
    ) -> Result<Vec<Requirement>> {
        let file = self.requirements().load()?;
        Ok(file
            .requirements
            .into_iter()
            .filter(|r| match status {
                Some(s) => r.status == s,
                None => r.is_live(),
            })
            .filter(|r| req_type.map_or(true, |t| r.req_type == t))
            .filter(|r| block.map_or(true, |b| r.block == b))
            .collect())
    }

    // ---- Sources --------------------------------------------------

    /// Registers an external source reference
    pub fn add_source(
        &self,
        title: &str,
        url: &str,
        category: &str,
        research_context: &str,
        artifact_ref: Option<&str>,
    ) -> Result<Source> {
        if title.trim().is_empty() {
            return Err(CoreError::validation("source title must not be empty"));
        }

        let mut file = self.sources().load()?;
        let source = Source {
            id: next_id("SRC", file.sources.iter().map(|s| s.id.as_str())),
            title: title.to_string(),
            url: url.to_string(),
            category: category.to_string(),
            research_context: research_context.to_string(),
            artifact_ref: artifact_ref.map(|s| s.to_string()),
            registered_at: Utc::now(),
        };

        file.sources.push(source.clone());
        self.sources().save(&file)?;
        self.refresh_counts()?;
        Ok(source)
    }

    pub fn get_source(&self, id: &str) -> Result<Source> {
        self.sources()
            .load()?
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("source", id))
    }

    pub fn list_sources(&self) -> Result<Vec<Source>> {
        Ok(self.sources().load()?.sources)
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace() -> (TempDir, Workspace) {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        (dir, ws)
    }

    fn draft_req(ws: &Workspace, statement: &str, block: &str) -> Requirement {
        ws.add_requirement(statement, RequirementType::Functional, Priority::Medium, block)
            .unwrap()
    }

    #[test]
    fn test_need_ids_are_sequential() {
        let (_dir, ws) = workspace();
        let n1 = ws.add_need("First need", "operator", "core", &[]).unwrap();
        let n2 = ws.add_need("Second need", "operator", "core", &[]).unwrap();
        assert_eq!(n1.id, "NEED-001");
        assert_eq!(n2.id, "NEED-002");
    }

    #[test]
    fn test_duplicate_need_pair_rejected_case_insensitively() {
        let (_dir, ws) = workspace();
        ws.add_need("The operator needs alerts", "Operator", "core", &[])
            .unwrap();
        let result = ws.add_need("the operator NEEDS alerts", "operator", "core", &[]);
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_duplicate_check_includes_rejected_needs() {
        let (_dir, ws) = workspace();
        let need = ws.add_need("Obsolete need", "operator", "core", &[]).unwrap();
        ws.reject_need(&need.id, "no longer relevant").unwrap();

        // Re-entering the same statement is still rejected
        let result = ws.add_need("Obsolete need", "operator", "core", &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_defer_requires_rationale() {
        let (_dir, ws) = workspace();
        let need = ws.add_need("A need", "operator", "core", &[]).unwrap();
        assert!(matches!(
            ws.defer_need(&need.id, "  "),
            Err(CoreError::Validation(_))
        ));
        assert!(ws.defer_need(&need.id, "out of scope this cycle").is_ok());
    }

    #[test]
    fn test_defer_unknown_need_is_not_found() {
        let (_dir, ws) = workspace();
        assert!(matches!(
            ws.defer_need("NEED-999", "because"),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_split_need_rejects_original_and_approves_children() {
        let (_dir, ws) = workspace();
        let need = ws
            .add_need("Authenticate and authorize operators", "operator", "security", &["SRC-001".into()])
            .unwrap();

        let children = ws
            .split_need(
                &need.id,
                &[
                    "Authenticate operators".to_string(),
                    "Authorize operators".to_string(),
                ],
            )
            .unwrap();

        assert_eq!(children.len(), 2);
        for child in &children {
            assert_eq!(child.status, NeedStatus::Approved);
            assert_eq!(child.stakeholder, "operator");
            assert_eq!(child.block, "security");
            assert_eq!(child.provenance, vec!["SRC-001".to_string()]);
        }

        let original = ws.get_need(&need.id).unwrap();
        assert_eq!(original.status, NeedStatus::Rejected);
        assert!(original.rationale.unwrap().starts_with("split into"));
    }

    #[test]
    fn test_requirement_id_monotonic_across_withdrawals() {
        let (_dir, ws) = workspace();
        let r1 = draft_req(&ws, "The system shall log errors", "core");
        let r2 = draft_req(&ws, "The system shall report status", "core");
        ws.withdraw_requirement(&r2.id, "superseded").unwrap();

        let r3 = draft_req(&ws, "The system shall retry transfers", "core");
        assert_eq!(r1.id, "REQ-001");
        assert_eq!(r2.id, "REQ-002");
        // Withdrawn numbers are never reused
        assert_eq!(r3.id, "REQ-003");
    }

    #[test]
    fn test_register_against_missing_need_is_integrity_error() {
        let (_dir, ws) = workspace();
        let req = draft_req(&ws, "The system shall log errors", "core");

        let result = ws.register_requirement(&req.id, "NEED-404");
        assert!(matches!(result, Err(CoreError::ReferentialIntegrity(_))));

        // The requirement stays in draft
        let req = ws.get_requirement(&req.id).unwrap();
        assert_eq!(req.status, RequirementStatus::Draft);
        assert!(req.parent_need.is_none());
    }

    #[test]
    fn test_register_against_deferred_need_is_integrity_error() {
        let (_dir, ws) = workspace();
        let need = ws.add_need("A need", "operator", "core", &[]).unwrap();
        ws.defer_need(&need.id, "later").unwrap();
        let req = draft_req(&ws, "The system shall log errors", "core");

        let result = ws.register_requirement(&req.id, &need.id);
        assert!(matches!(result, Err(CoreError::ReferentialIntegrity(_))));
        assert_eq!(
            ws.get_requirement(&req.id).unwrap().status,
            RequirementStatus::Draft
        );
    }

    #[test]
    fn test_register_sets_parent_and_timestamp() {
        let (_dir, ws) = workspace();
        let need = ws.add_need("A need", "operator", "core", &[]).unwrap();
        let req = draft_req(&ws, "The system shall log errors", "core");

        let registered = ws.register_requirement(&req.id, &need.id).unwrap();
        assert_eq!(registered.status, RequirementStatus::Registered);
        assert_eq!(registered.parent_need.as_deref(), Some(need.id.as_str()));
        assert!(registered.registered_at.is_some());
    }

    #[test]
    fn test_baseline_requires_registered() {
        let (_dir, ws) = workspace();
        let req = draft_req(&ws, "The system shall log errors", "core");

        assert!(matches!(
            ws.baseline_requirement(&req.id),
            Err(CoreError::InvalidTransition { .. })
        ));

        let need = ws.add_need("A need", "operator", "core", &[]).unwrap();
        ws.register_requirement(&req.id, &need.id).unwrap();
        let baselined = ws.baseline_requirement(&req.id).unwrap();
        assert_eq!(baselined.status, RequirementStatus::Baselined);
        assert!(baselined.baselined_at.is_some());
    }

    #[test]
    fn test_withdraw_is_terminal() {
        let (_dir, ws) = workspace();
        let req = draft_req(&ws, "The system shall log errors", "core");
        ws.withdraw_requirement(&req.id, "not needed").unwrap();

        assert!(matches!(
            ws.withdraw_requirement(&req.id, "again"),
            Err(CoreError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_withdraw_reachable_from_baselined() {
        let (_dir, ws) = workspace();
        let need = ws.add_need("A need", "operator", "core", &[]).unwrap();
        let req = draft_req(&ws, "The system shall log errors", "core");
        ws.register_requirement(&req.id, &need.id).unwrap();
        ws.baseline_requirement(&req.id).unwrap();
        ws.link(&req.id, &need.id, crate::models::LinkType::DerivesFrom, "")
            .unwrap();

        let withdrawn = ws
            .withdraw_requirement(&req.id, "superseded by redesign")
            .unwrap();
        assert_eq!(withdrawn.status, RequirementStatus::Withdrawn);

        // Gone from the default listing, and its derivation no longer counts
        assert!(ws.list_requirements(false).unwrap().is_empty());
        let coverage = ws.coverage().unwrap();
        assert_eq!(coverage.covered_needs, 0);
        assert_eq!(coverage.uncovered, vec![need.id]);
    }

    #[test]
    fn test_split_requirement_atomicity() {
        let (_dir, ws) = workspace();
        let need = ws.add_need("A need", "operator", "comms", &[]).unwrap();
        let req = ws
            .add_requirement(
                "The system shall transmit and store telemetry",
                RequirementType::Performance,
                Priority::High,
                "comms",
            )
            .unwrap();
        ws.register_requirement(&req.id, &need.id).unwrap();

        let children = ws
            .split_requirement(
                &req.id,
                &[
                    "The system shall transmit telemetry".to_string(),
                    "The system shall store telemetry".to_string(),
                ],
            )
            .unwrap();

        assert_eq!(children.len(), 2);
        for child in &children {
            assert_eq!(child.status, RequirementStatus::Draft);
            assert_eq!(child.req_type, RequirementType::Performance);
            assert_eq!(child.priority, Priority::High);
            assert_eq!(child.block, "comms");
            assert_eq!(child.split_from.as_deref(), Some(req.id.as_str()));
        }

        let parent = ws.get_requirement(&req.id).unwrap();
        assert_eq!(parent.status, RequirementStatus::Withdrawn);
        assert!(parent.rationale.unwrap().starts_with("split into"));
    }

    #[test]
    fn test_update_rejects_protected_fields() {
        let (_dir, ws) = workspace();
        let req = draft_req(&ws, "The system shall log errors", "core");

        for field in ["id", "status", "registered_at", "parent_need"] {
            let result = ws.update_requirement(&req.id, field, "anything");
            assert!(
                matches!(result, Err(CoreError::Validation(_))),
                "field '{}' should be protected",
                field
            );
        }

        // Status unchanged after the rejected attempts
        assert_eq!(
            ws.get_requirement(&req.id).unwrap().status,
            RequirementStatus::Draft
        );
    }

    #[test]
    fn test_update_known_and_attribute_fields() {
        let (_dir, ws) = workspace();
        let req = draft_req(&ws, "The system shall log errors", "core");

        ws.update_requirement(&req.id, "priority", "high").unwrap();
        ws.update_requirement(&req.id, "tbd", "retention period").unwrap();
        let updated = ws.update_requirement(&req.id, "verification_method", "test").unwrap();

        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.tbd.as_deref(), Some("retention period"));
        assert_eq!(
            updated.attributes.get("verification_method").map(String::as_str),
            Some("test")
        );

        // Clearing a marker with an empty value
        let cleared = ws.update_requirement(&req.id, "tbd", "").unwrap();
        assert!(cleared.tbd.is_none());
    }

    #[test]
    fn test_list_excludes_withdrawn_by_default() {
        let (_dir, ws) = workspace();
        let r1 = draft_req(&ws, "The system shall log errors", "core");
        let _r2 = draft_req(&ws, "The system shall report status", "core");
        ws.withdraw_requirement(&r1.id, "superseded").unwrap();

        assert_eq!(ws.list_requirements(false).unwrap().len(), 1);
        assert_eq!(ws.list_requirements(true).unwrap().len(), 2);
    }

    #[test]
    fn test_query_by_status_type_block() {
        let (_dir, ws) = workspace();
        let _f = draft_req(&ws, "The system shall log errors", "core");
        let p = ws
            .add_requirement(
                "The system shall respond within 200 ms",
                RequirementType::Performance,
                Priority::High,
                "ui",
            )
            .unwrap();

        let hits = ws
            .query_requirements(None, Some(RequirementType::Performance), None)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, p.id);

        let hits = ws.query_requirements(None, None, Some("core")).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_counts_follow_mutations() {
        let (_dir, ws) = workspace();
        let need = ws.add_need("A need", "operator", "core", &[]).unwrap();
        let req = draft_req(&ws, "The system shall log errors", "core");
        ws.register_requirement(&req.id, &need.id).unwrap();

        let session = ws.session().load().unwrap();
        assert_eq!(session.counts.needs.get("approved"), Some(&1));
        assert_eq!(session.counts.requirements.get("registered"), Some(&1));
    }

    #[test]
    fn test_source_add_and_get() {
        let (_dir, ws) = workspace();
        let src = ws
            .add_source(
                "ECSS-E-ST-10-06C",
                "https://ecss.nl/standard/ecss-e-st-10-06c",
                "standard",
                "technical requirements specification guidance",
                None,
            )
            .unwrap();
        assert_eq!(src.id, "SRC-001");
        assert_eq!(ws.get_source("SRC-001").unwrap().title, "ECSS-E-ST-10-06C");
        assert!(matches!(
            ws.get_source("SRC-002"),
            Err(CoreError::NotFound { .. })
        ));
    }
}
