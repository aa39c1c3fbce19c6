//! Set-level validation
//!
//! Cross-entity analyses over the live population (approved needs and
//! non-withdrawn requirements): duplicate detection, terminology
//! consistency, interface coverage, TBD/TBR reporting, and the INCOSE
//! set characteristics C10 through C15.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{CoreError, Result};
use crate::models::{LinkType, RequirementType, ResolutionStatus};
use crate::workspace::Workspace;

/// Similarity at or above this score is reported as an outright
/// duplicate rather than a near-duplicate
pub const DUPLICATE_THRESHOLD: f64 = 0.95;

/// Default near-duplicate reporting threshold
pub const DEFAULT_NEAR_THRESHOLD: f64 = 0.8;

/// Synonym groups checked for cross-block terminology drift
const TERMINOLOGY_GROUPS: &[&[&str]] = &[
    &["user", "users", "client", "clients", "operator", "operators"],
    &["error", "errors", "fault", "faults", "failure", "failures"],
    &["message", "messages", "notification", "notifications"],
    &["display", "show", "present"],
    &["verify", "validate", "confirm"],
];

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateVerdict {
    Duplicate,
    NearDuplicate,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateFinding {
    pub req_a: String,
    pub req_b: String,
    pub score: f64,
    pub verdict: DuplicateVerdict,
}

#[derive(Debug, Clone, Serialize)]
pub struct TerminologyFinding {
    pub variants: Vec<String>,
    pub blocks: Vec<String>,
}

/// A declared block relationship with no interface requirement naming
/// the counterpart block
#[derive(Debug, Clone, Serialize)]
pub struct InterfaceGap {
    pub from_block: String,
    pub to_block: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenMarker {
    pub requirement_id: String,
    pub marker: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CharacteristicStatus {
    Pass,
    Fail,
    RequiresReview,
}

#[derive(Debug, Clone, Serialize)]
pub struct Characteristic {
    pub code: &'static str,
    pub name: &'static str,
    pub status: CharacteristicStatus,
    pub details: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetValidationReport {
    pub characteristics: Vec<Characteristic>,
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect()
}

fn term_vector(text: &str) -> HashMap<String, f64> {
    let toks = tokens(text);
    let mut vector: HashMap<String, f64> = HashMap::new();
    for tok in &toks {
        *vector.entry(tok.clone()).or_default() += 1.0;
    }
    for pair in toks.windows(2) {
        *vector.entry(format!("{} {}", pair[0], pair[1])).or_default() += 1.0;
    }
    vector
}

/// Cosine similarity of combined unigram+bigram frequency vectors.
/// Symmetric; identical non-empty text scores 1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let va = term_vector(a);
    let vb = term_vector(b);
    if va.is_empty() || vb.is_empty() {
        return 0.0;
    }

    let dot: f64 = va
        .iter()
        .filter_map(|(term, wa)| vb.get(term).map(|wb| wa * wb))
        .sum();
    let norm_a: f64 = va.values().map(|w| w * w).sum::<f64>().sqrt();
    let norm_b: f64 = vb.values().map(|w| w * w).sum::<f64>().sqrt();

    dot / (norm_a * norm_b)
}

impl Workspace {
    /// Pairwise duplicate scan over live requirements belonging to
    /// different blocks. Same-block pairs are skipped: they are
    /// expected to be related. Quadratic in the live requirement
    /// count, which is fine at the hundreds scale this targets.
    pub fn check_duplicates(&self, threshold: f64) -> Result<Vec<DuplicateFinding>> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(CoreError::validation(format!(
                "duplicate threshold must be between 0 and 1, got {}",
                threshold
            )));
        }

        let file = self.requirements().load()?;
        let live: Vec<_> = file.live().collect();

        let mut findings = Vec::new();
        for (i, a) in live.iter().enumerate() {
            for b in live.iter().skip(i + 1) {
                if a.block == b.block {
                    continue;
                }
                let score = similarity(&a.statement, &b.statement);
                let verdict = if score >= DUPLICATE_THRESHOLD {
                    DuplicateVerdict::Duplicate
                } else if score >= threshold {
                    DuplicateVerdict::NearDuplicate
                } else {
                    continue;
                };
                findings.push(DuplicateFinding {
                    req_a: a.id.clone(),
                    req_b: b.id.clone(),
                    score,
                    verdict,
                });
            }
        }
        Ok(findings)
    }

    /// Flags synonym groups whose variants are spread across blocks
    pub fn check_terminology(&self) -> Result<Vec<TerminologyFinding>> {
        let file = self.requirements().load()?;

        let mut findings = Vec::new();
        for group in TERMINOLOGY_GROUPS {
            let mut seen: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
            for req in file.live() {
                let toks: BTreeSet<String> = tokens(&req.statement).into_iter().collect();
                for variant in *group {
                    if toks.contains(*variant) {
                        seen.entry(*variant).or_default().insert(req.block.clone());
                    }
                }
            }

            let blocks: BTreeSet<String> = seen.values().flatten().cloned().collect();
            if seen.len() >= 2 && blocks.len() >= 2 {
                findings.push(TerminologyFinding {
                    variants: seen.keys().map(|v| v.to_string()).collect(),
                    blocks: blocks.into_iter().collect(),
                });
            }
        }
        Ok(findings)
    }

    /// For each declared block-to-block relationship, checks that an
    /// interface-typed requirement of the first block names the second
    /// block in its statement
    pub fn check_interfaces(&self, relationships: &[(String, String)]) -> Result<Vec<InterfaceGap>> {
        let file = self.requirements().load()?;

        let mut gaps = Vec::new();
        for (from, to) in relationships {
            let covered = file.live().any(|r| {
                r.req_type == RequirementType::Interface
                    && r.block == *from
                    && r.statement.to_lowercase().contains(&to.to_lowercase())
            });
            if !covered {
                gaps.push(InterfaceGap {
                    from_block: from.clone(),
                    to_block: to.clone(),
                });
            }
        }
        Ok(gaps)
    }

    /// Open TBD and TBR markers over live requirements. A requirement
    /// carrying both markers yields two independent findings.
    pub fn check_tbd(&self) -> Result<Vec<OpenMarker>> {
        let file = self.requirements().load()?;

        let mut markers = Vec::new();
        for req in file.live() {
            if let Some(value) = &req.tbd {
                markers.push(OpenMarker {
                    requirement_id: req.id.clone(),
                    marker: "TBD",
                    value: value.clone(),
                });
            }
            if let Some(value) = &req.tbr {
                markers.push(OpenMarker {
                    requirement_id: req.id.clone(),
                    marker: "TBR",
                    value: value.clone(),
                });
            }
        }
        Ok(markers)
    }

    /// Evaluates the INCOSE set characteristics C10 through C15
    pub fn validate_set(&self) -> Result<SetValidationReport> {
        let needs = self.needs().load()?;
        let requirements = self.requirements().load()?;
        let links = self.links().load()?;

        let coverage = self.coverage()?;
        let terminology = self.check_terminology()?;

        let open_conflicts: Vec<String> = links
            .links
            .iter()
            .filter(|l| l.link_type == LinkType::ConflictsWith)
            .filter(|l| l.resolution_status == Some(ResolutionStatus::Open))
            .map(|l| format!("{} <-> {}", l.source_id, l.target_id))
            .collect();

        let approved: BTreeSet<&str> = needs.approved().map(|n| n.id.as_str()).collect();

        let mut unverifiable = Vec::new();
        let mut underived = Vec::new();
        for req in requirements.live() {
            let verified = links.links.iter().any(|l| {
                l.link_type == LinkType::VerifiedBy && l.source_id == req.id
            });
            if !verified {
                unverifiable.push(req.id.clone());
            }

            let derived = links.links.iter().any(|l| {
                l.link_type == LinkType::DerivesFrom
                    && l.source_id == req.id
                    && approved.contains(l.target_id.as_str())
            });
            if !derived {
                underived.push(req.id.clone());
            }
        }

        let characteristics = vec![
            pass_fail(
                "C10",
                "completeness",
                coverage.uncovered.is_empty(),
                format!("{} uncovered approved needs", coverage.uncovered.len()),
            ),
            pass_fail(
                "C11",
                "consistency",
                open_conflicts.is_empty(),
                format!("{} unresolved conflicts", open_conflicts.len()),
            ),
            Characteristic {
                code: "C12",
                name: "feasibility",
                status: CharacteristicStatus::RequiresReview,
                details: "feasibility is not deterministically computable; requires review".to_string(),
            },
            pass_fail(
                "C13",
                "comprehensibility",
                terminology.is_empty(),
                format!("{} terminology findings", terminology.len()),
            ),
            pass_fail(
                "C14",
                "validatability",
                unverifiable.is_empty(),
                format!("{} requirements without verified_by links", unverifiable.len()),
            ),
            pass_fail(
                "C15",
                "correctness",
                underived.is_empty(),
                format!(
                    "{} requirements not derived from an approved need",
                    underived.len()
                ),
            ),
        ];

        Ok(SetValidationReport { characteristics })
    }
}

fn pass_fail(code: &'static str, name: &'static str, ok: bool, details: String) -> Characteristic {
    Characteristic {
        code,
        name,
        status: if ok {
            CharacteristicStatus::Pass
        } else {
            CharacteristicStatus::Fail
        },
        details,
    }
}
