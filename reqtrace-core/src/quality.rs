//! Quality rule engine
//!
//! A deterministic, pattern-based battery of checks over requirement
//! text. Pure functions: no registry access, no persistent effect.
//! Every rule runs on every invocation; the battery never stops at the
//! first finding.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{CoreError, Result};

/// Severity of a quality finding
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single finding produced by one rule
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub code: &'static str,
    pub name: &'static str,
    pub severity: Severity,
    pub matched: String,
    pub offset: usize,
    pub suggestion: String,
}

/// Rule metadata, listable without running any text
#[derive(Debug, Clone, Serialize)]
pub struct RuleInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub severity: Severity,
    pub description: &'static str,
}

struct RuleMatch {
    offset: usize,
    matched: String,
}

struct Rule {
    code: &'static str,
    name: &'static str,
    severity: Severity,
    description: &'static str,
    suggestion: &'static str,
    run: fn(&str) -> Vec<RuleMatch>,
}

fn find_all(re: &Regex, text: &str) -> Vec<RuleMatch> {
    re.find_iter(text)
        .map(|m| RuleMatch {
            offset: m.start(),
            matched: m.as_str().to_string(),
        })
        .collect()
}

static VAGUE_TERMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(appropriate|adequate|user-friendly|flexible|efficient|reasonable|sufficient|robust|seamless|easy|simple|quickly|significant|minimal|timely|intuitive)\b",
    )
    .unwrap()
});

static ESCAPE_CLAUSES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(if possible|where feasible|as appropriate|if necessary|where practical|to the extent practical|as applicable|if needed)\b",
    )
    .unwrap()
});

static OPEN_ENDED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\betc\.?|\band so on\b|\band more\b|including but not limited to|\bsuch as\b")
        .unwrap()
});

static OBLIGATIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(shall|must|will|should)\b").unwrap());

static CONJUNCTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(and|or)\b").unwrap());

static PRONOUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(it|they|them|this|these|those)\b").unwrap());

static ABSOLUTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(all|always|never|every|none)\b|100%").unwrap());

static PASSIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:is|are|was|were|be|been|being)\s+(\w+(?:ed|en))\b").unwrap()
});

/// Adjectival participles that read as states, not passive verbs
const PASSIVE_ALLOW_LIST: &[&str] = &[
    "open", "closed", "enabled", "disabled", "required", "defined", "hidden", "given", "chosen",
    "proven", "broken", "fixed", "aligned", "automated", "even",
];

static PURPOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(in order to|for the purpose of|so that)\b").unwrap());

static PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());

static AND_OR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\band/or\b").unwrap());

static NEGATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(shall not|must not|will not|should not)\b").unwrap());

static NEGATION_BOUND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(unless|except|until)\b").unwrap());

static CAPABILITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(be able to|be capable of)\b").unwrap());

static TEMPORAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(before|after|until|while|during)\b").unwrap());

static UNITLESS_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d+(?:\.\d+)?\s*(?:-|–|\bto\b)\s*\d+(?:\.\d+)?(\s*[A-Za-z%°µ]+)?").unwrap()
});

static DOT_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.\d+").unwrap());

static COMMA_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+,\d+").unwrap());

fn run_vague(text: &str) -> Vec<RuleMatch> {
    find_all(&VAGUE_TERMS, text)
}

fn run_escape(text: &str) -> Vec<RuleMatch> {
    find_all(&ESCAPE_CLAUSES, text)
}

fn run_open_ended(text: &str) -> Vec<RuleMatch> {
    find_all(&OPEN_ENDED, text)
}

fn run_multiple_obligations(text: &str) -> Vec<RuleMatch> {
    let hits: Vec<_> = OBLIGATIONS.find_iter(text).collect();
    let mut matches = Vec::new();
    for pair in hits.windows(2) {
        let between = &text[pair[0].end()..pair[1].start()];
        if CONJUNCTION.is_match(between) {
            matches.push(RuleMatch {
                offset: pair[1].start(),
                matched: pair[1].as_str().to_string(),
            });
        }
    }
    matches
}

fn run_pronouns(text: &str) -> Vec<RuleMatch> {
    find_all(&PRONOUNS, text)
}

fn run_absolutes(text: &str) -> Vec<RuleMatch> {
    find_all(&ABSOLUTES, text)
}

fn run_passive(text: &str) -> Vec<RuleMatch> {
    PASSIVE
        .captures_iter(text)
        .filter(|caps| {
            let participle = caps.get(1).map(|m| m.as_str().to_lowercase());
            participle
                .map(|p| !PASSIVE_ALLOW_LIST.contains(&p.as_str()))
                .unwrap_or(false)
        })
        .map(|caps| {
            let whole = caps.get(0).expect("capture 0 always present");
            RuleMatch {
                offset: whole.start(),
                matched: whole.as_str().to_string(),
            }
        })
        .collect()
}

fn run_purpose(text: &str) -> Vec<RuleMatch> {
    find_all(&PURPOSE, text)
}

fn run_parenthetical(text: &str) -> Vec<RuleMatch> {
    find_all(&PARENTHETICAL, text)
}

fn run_and_or(text: &str) -> Vec<RuleMatch> {
    find_all(&AND_OR, text)
}

fn run_negation(text: &str) -> Vec<RuleMatch> {
    if NEGATION_BOUND.is_match(text) {
        return Vec::new();
    }
    find_all(&NEGATION, text)
}

fn run_capability(text: &str) -> Vec<RuleMatch> {
    find_all(&CAPABILITY, text)
}

fn run_temporal(text: &str) -> Vec<RuleMatch> {
    TEMPORAL
        .find_iter(text)
        .filter(|m| {
            // A nearby number counts as a measurable qualifier
            !text[m.end()..]
                .chars()
                .take(40)
                .any(|c| c.is_ascii_digit())
        })
        .map(|m| RuleMatch {
            offset: m.start(),
            matched: m.as_str().to_string(),
        })
        .collect()
}

fn run_unitless_range(text: &str) -> Vec<RuleMatch> {
    UNITLESS_RANGE
        .captures_iter(text)
        .filter(|caps| caps.get(1).is_none())
        .map(|caps| {
            let whole = caps.get(0).expect("capture 0 always present");
            RuleMatch {
                offset: whole.start(),
                matched: whole.as_str().to_string(),
            }
        })
        .collect()
}

fn run_mixed_decimals(text: &str) -> Vec<RuleMatch> {
    if !DOT_DECIMAL.is_match(text) {
        return Vec::new();
    }
    find_all(&COMMA_DECIMAL, text)
}

static RULES: &[Rule] = &[
    Rule {
        code: "Q001",
        name: "vague term",
        severity: Severity::Error,
        description: "Vague or ambiguous terms that cannot be verified",
        suggestion: "replace with a specific, measurable term",
        run: run_vague,
    },
    Rule {
        code: "Q002",
        name: "escape clause",
        severity: Severity::Error,
        description: "Escape clauses that make the obligation optional",
        suggestion: "remove the escape clause or state the governing condition explicitly",
        run: run_escape,
    },
    Rule {
        code: "Q003",
        name: "open-ended list",
        severity: Severity::Error,
        description: "Open-ended list qualifiers leave the scope unbounded",
        suggestion: "enumerate the complete list or reference a controlled definition",
        run: run_open_ended,
    },
    Rule {
        code: "Q004",
        name: "multiple obligations",
        severity: Severity::Warning,
        description: "More than one obligation verb joined by a conjunction",
        suggestion: "split into one requirement per obligation",
        run: run_multiple_obligations,
    },
    Rule {
        code: "Q005",
        name: "ambiguous pronoun",
        severity: Severity::Warning,
        description: "Backward-referencing pronouns with unclear referents",
        suggestion: "name the referenced entity explicitly",
        run: run_pronouns,
    },
    Rule {
        code: "Q006",
        name: "unqualified absolute",
        severity: Severity::Error,
        description: "Absolute or universal quantifiers that are rarely verifiable",
        suggestion: "qualify the quantifier with the governing conditions",
        run: run_absolutes,
    },
    Rule {
        code: "Q007",
        name: "passive voice",
        severity: Severity::Warning,
        description: "Passive constructions hide the acting entity",
        suggestion: "restate in active voice naming the acting entity",
        run: run_passive,
    },
    Rule {
        code: "Q008",
        name: "purpose phrase",
        severity: Severity::Warning,
        description: "Purpose justifications belong in the rationale, not the statement",
        suggestion: "move the justification into the rationale field",
        run: run_purpose,
    },
    Rule {
        code: "Q009",
        name: "parenthetical aside",
        severity: Severity::Warning,
        description: "Parenthetical asides carry normative text ambiguously",
        suggestion: "fold the parenthetical into the statement or an attribute",
        run: run_parenthetical,
    },
    Rule {
        code: "Q010",
        name: "and/or",
        severity: Severity::Error,
        description: "'and/or' is ambiguous about which combinations are required",
        suggestion: "state the required combinations explicitly",
        run: run_and_or,
    },
    Rule {
        code: "Q011",
        name: "bare negation",
        severity: Severity::Warning,
        description: "Negative obligations without a bounding condition",
        suggestion: "restate as a bounded positive obligation",
        run: run_negation,
    },
    Rule {
        code: "Q012",
        name: "superfluous capability",
        severity: Severity::Warning,
        description: "'be able to' phrasing weakens the obligation",
        suggestion: "state the obligation directly (\"shall <verb>\")",
        run: run_capability,
    },
    Rule {
        code: "Q013",
        name: "unqualified temporal dependency",
        severity: Severity::Warning,
        description: "Temporal keywords without a measurable qualifier",
        suggestion: "qualify the temporal dependency with a measurable condition",
        run: run_temporal,
    },
    Rule {
        code: "Q014",
        name: "range without units",
        severity: Severity::Error,
        description: "Numeric ranges whose bounds carry no units",
        suggestion: "attach units to both bounds of the range",
        run: run_unitless_range,
    },
    Rule {
        code: "Q015",
        name: "mixed decimal separators",
        severity: Severity::Error,
        description: "Dot and comma decimal conventions mixed in one statement",
        suggestion: "use one decimal separator convention throughout",
        run: run_mixed_decimals,
    },
];

fn findings_for(rule: &Rule, text: &str) -> Vec<Finding> {
    (rule.run)(text)
        .into_iter()
        .map(|m| Finding {
            code: rule.code,
            name: rule.name,
            severity: rule.severity,
            matched: m.matched,
            offset: m.offset,
            suggestion: rule.suggestion.to_string(),
        })
        .collect()
}

/// Runs the full rule battery over one statement. Findings are the
/// union over all rules, ordered by position in the text.
pub fn check_all(text: &str) -> Vec<Finding> {
    let mut findings: Vec<Finding> = RULES
        .iter()
        .flat_map(|rule| findings_for(rule, text))
        .collect();
    findings.sort_by(|a, b| a.offset.cmp(&b.offset).then(a.code.cmp(b.code)));
    findings
}

/// Runs a single named rule
pub fn check_rule(code: &str, text: &str) -> Result<Vec<Finding>> {
    let rule = RULES
        .iter()
        .find(|r| r.code.eq_ignore_ascii_case(code))
        .ok_or_else(|| CoreError::validation(format!("unknown rule code '{}'", code)))?;
    Ok(findings_for(rule, text))
}

/// Lists rule metadata without executing any text
pub fn rules() -> Vec<RuleInfo> {
    RULES
        .iter()
        .map(|r| RuleInfo {
            code: r.code,
            name: r.name,
            severity: r.severity,
            description: r.description,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(findings: &[Finding]) -> Vec<&'static str> {
        findings.iter().map(|f| f.code).collect()
    }

    #[test]
    fn test_passive_voice_fires_on_passive_statement() {
        let findings = check_rule("Q007", "Errors shall be logged by the system").unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].matched, "be logged");
    }

    #[test]
    fn test_passive_voice_silent_on_active_statement() {
        let findings = check_rule("Q007", "The system shall log errors").unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn test_passive_allow_list_suppresses_adjectival_participle() {
        let findings = check_rule("Q007", "The port shall be open for connections").unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn test_vague_terms_flagged() {
        let findings = check_rule("Q001", "The interface shall be user-friendly and efficient").unwrap();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, Severity::Error);
    }

    #[test]
    fn test_escape_clause_flagged() {
        let findings = check_rule("Q002", "The system shall compress data where feasible").unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].matched, "where feasible");
    }

    #[test]
    fn test_open_ended_list_flagged() {
        let findings = check_rule("Q003", "The system shall export CSV, JSON, etc.").unwrap();
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_multiple_obligations_flagged() {
        let findings = check_rule(
            "Q004",
            "The system shall log errors and shall notify the operator",
        )
        .unwrap();
        assert_eq!(findings.len(), 1);
        // The finding points at the second obligation verb
        assert_eq!(findings[0].matched.to_lowercase(), "shall");
    }

    #[test]
    fn test_single_obligation_not_flagged() {
        let findings = check_rule("Q004", "The system shall log errors").unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn test_ambiguous_pronoun_flagged() {
        let findings = check_rule("Q005", "The system shall parse the file and store it").unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].matched.to_lowercase(), "it");
    }

    #[test]
    fn test_explicit_referent_not_flagged() {
        assert!(check_rule("Q005", "The system shall store the record in the archive")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_purpose_phrase_flagged() {
        let findings = check_rule(
            "Q008",
            "The system shall encrypt data in order to protect privacy",
        )
        .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].matched, "in order to");
    }

    #[test]
    fn test_statement_without_purpose_phrase_not_flagged() {
        assert!(check_rule("Q008", "The system shall encrypt data at rest")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_and_or_flagged() {
        let findings = check_rule("Q010", "The system shall alert and/or log").unwrap();
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_bare_negation_flagged_unless_bounded() {
        assert_eq!(
            check_rule("Q011", "The system shall not drop packets").unwrap().len(),
            1
        );
        assert!(check_rule(
            "Q011",
            "The system shall not drop packets unless the buffer is full"
        )
        .unwrap()
        .is_empty());
    }

    #[test]
    fn test_capability_phrasing_flagged() {
        let findings = check_rule("Q012", "The operator shall be able to cancel a transfer").unwrap();
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_unqualified_temporal_flagged() {
        let findings = check_rule("Q013", "The system shall flush buffers before shutdown").unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].matched.to_lowercase(), "before");
    }

    #[test]
    fn test_temporal_with_nearby_number_not_flagged() {
        // The digit within the lookahead window qualifies the dependency
        assert!(check_rule(
            "Q013",
            "The system shall flush buffers after 5 seconds of inactivity"
        )
        .unwrap()
        .is_empty());
    }

    #[test]
    fn test_range_without_units_flagged() {
        assert_eq!(
            check_rule("Q014", "The voltage shall stay between 5 - 10").unwrap().len(),
            1
        );
        assert!(check_rule("Q014", "The voltage shall stay between 5 - 10 V")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_mixed_decimal_separators_flagged() {
        let findings = check_rule(
            "Q015",
            "The sensor shall sample at 1.5 Hz with drift below 0,2 Hz",
        )
        .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].matched, "0,2");
    }

    #[test]
    fn test_consistent_decimals_not_flagged() {
        assert!(check_rule("Q015", "The sensor shall sample at 1.5 Hz, drift below 0.2 Hz")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_check_all_is_exhaustive_and_ordered() {
        let text = "The system shall be robust and shall handle all faults quickly (see notes)";
        let findings = check_all(text);

        // Several distinct rules fire on this statement
        let found = codes(&findings);
        assert!(found.contains(&"Q001"));
        assert!(found.contains(&"Q004"));
        assert!(found.contains(&"Q006"));
        assert!(found.contains(&"Q009"));

        for pair in findings.windows(2) {
            assert!(pair[0].offset <= pair[1].offset);
        }
    }

    #[test]
    fn test_check_all_clean_statement() {
        let findings = check_all("The system shall authenticate users via username and password credentials");
        assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
    }

    #[test]
    fn test_check_rule_unknown_code() {
        assert!(check_rule("Q999", "anything").is_err());
    }

    #[test]
    fn test_rules_metadata_listing() {
        let infos = rules();
        assert_eq!(infos.len(), 15);
        assert!(infos.iter().any(|r| r.code == "Q007" && r.name == "passive voice"));
    }
}
