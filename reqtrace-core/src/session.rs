//! Workflow session state
//!
//! One document holding the current phase, the ordered gate set, cached
//! status counts, and position markers. The counts are a cache only;
//! they are re-derived from the registries on every mutating operation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::models::{
    NeedsFile, RequirementsFile, SourcesFile, TraceLinksFile, SCHEMA_VERSION,
};

/// The fixed, ordered set of workflow phases. Each phase has exactly
/// one completion gate of the same name.
pub const PHASES: &[&str] = &[
    "elicitation",
    "need_analysis",
    "requirement_definition",
    "registration",
    "baselining",
    "traceability",
    "decomposition",
];

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// A named completion gate. Gates advance monotonically: once passed,
/// a gate is never cleared except by reinitializing the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Gate {
    pub name: String,
    pub passed: bool,
}

/// Cached status breakdown of the entity collections
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StatusCounts {
    #[serde(default)]
    pub needs: BTreeMap<String, usize>,
    #[serde(default)]
    pub requirements: BTreeMap<String, usize>,
    #[serde(default)]
    pub sources: usize,
    #[serde(default)]
    pub links: usize,
}

impl StatusCounts {
    /// Re-derives the counts from the registries (the source of truth)
    pub fn derive(
        needs: &NeedsFile,
        requirements: &RequirementsFile,
        sources: &SourcesFile,
        links: &TraceLinksFile,
    ) -> Self {
        let mut need_counts: BTreeMap<String, usize> = BTreeMap::new();
        for need in &needs.needs {
            *need_counts.entry(need.status.to_string()).or_default() += 1;
        }

        let mut req_counts: BTreeMap<String, usize> = BTreeMap::new();
        for req in &requirements.requirements {
            *req_counts.entry(req.status.to_string()).or_default() += 1;
        }

        Self {
            needs: need_counts,
            requirements: req_counts,
            sources: sources.sources.len(),
            links: links.links.len(),
        }
    }
}

/// Position markers for an interrupted-and-resumed workflow
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Position {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_type_pass: Option<String>,
}

/// The session state document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SessionState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub phase: String,
    pub gates: Vec<Gate>,
    #[serde(default)]
    pub counts: StatusCounts,
    #[serde(default)]
    pub position: Position,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            phase: PHASES[0].to_string(),
            gates: PHASES
                .iter()
                .map(|name| Gate {
                    name: name.to_string(),
                    passed: false,
                })
                .collect(),
            counts: StatusCounts::default(),
            position: Position::default(),
        }
    }
}

impl SessionState {
    /// Moves the session to a named phase
    pub fn set_phase(&mut self, phase: &str) -> Result<()> {
        if !PHASES.contains(&phase) {
            return Err(CoreError::validation(format!(
                "unknown phase '{}' (expected one of: {})",
                phase,
                PHASES.join(", ")
            )));
        }
        self.phase = phase.to_string();
        Ok(())
    }

    /// Marks the gate for a phase as passed. Setting an already-passed
    /// gate is a no-op; there is no way to clear a gate short of
    /// reinitializing the whole session.
    pub fn set_gate(&mut self, phase: &str) -> Result<()> {
        match self.gates.iter_mut().find(|g| g.name == phase) {
            Some(gate) => {
                gate.passed = true;
                Ok(())
            }
            None => Err(CoreError::validation(format!(
                "unknown phase '{}' for gate (expected one of: {})",
                phase,
                PHASES.join(", ")
            ))),
        }
    }

    pub fn gate_passed(&self, phase: &str) -> bool {
        self.gates
            .iter()
            .any(|g| g.name == phase && g.passed)
    }

    /// Resets phase, gates, and position. Counts are rederived on the
    /// next mutation.
    pub fn reinitialize() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_gates_match_phases() {
        let session = SessionState::default();
        assert_eq!(session.gates.len(), PHASES.len());
        assert!(session.gates.iter().all(|g| !g.passed));
        assert_eq!(session.phase, "elicitation");
    }

    #[test]
    fn test_set_gate_unknown_phase_rejected() {
        let mut session = SessionState::default();
        let result = session.set_gate("verification");
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_set_gate_is_monotonic() {
        let mut session = SessionState::default();
        session.set_gate("elicitation").unwrap();
        assert!(session.gate_passed("elicitation"));

        // Setting again is a no-op, not an error
        session.set_gate("elicitation").unwrap();
        assert!(session.gate_passed("elicitation"));
    }

    #[test]
    fn test_set_phase_validates_name() {
        let mut session = SessionState::default();
        session.set_phase("baselining").unwrap();
        assert_eq!(session.phase, "baselining");
        assert!(session.set_phase("made_up").is_err());
    }

    #[test]
    fn test_reinitialize_clears_gates() {
        let mut session = SessionState::default();
        session.set_gate("elicitation").unwrap();
        session.set_phase("traceability").unwrap();

        let fresh = SessionState::reinitialize();
        assert!(!fresh.gate_passed("elicitation"));
        assert_eq!(fresh.phase, "elicitation");
    }
}
