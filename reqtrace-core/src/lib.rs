pub mod decompose;
pub mod error;
pub mod export;
pub mod graph;
pub mod lifecycle;
pub mod models;
pub mod quality;
pub mod session;
pub mod store;
pub mod validator;
pub mod workspace;

// Re-export commonly used types
pub use decompose::{AllocationReport, BaselineReport, MAX_DEPTH};
pub use error::{CoreError, Result};
pub use export::ExportDocument;
pub use graph::{CoverageReport, Direction, OrphanReport};
pub use models::{
    next_id, EntityRef, LinkType, Need, NeedStatus, Priority, Requirement, RequirementStatus,
    RequirementType, ResolutionStatus, Source, SubBlock, TraceLink, SCHEMA_VERSION,
};
pub use quality::{check_all, check_rule, rules, Finding, RuleInfo, Severity};
pub use session::{Gate, Position, SessionState, StatusCounts, PHASES};
pub use store::RegistryFile;
pub use validator::{
    similarity, Characteristic, CharacteristicStatus, DuplicateFinding, DuplicateVerdict,
    InterfaceGap, OpenMarker, SetValidationReport, TerminologyFinding, DEFAULT_NEAR_THRESHOLD,
    DUPLICATE_THRESHOLD,
};
pub use workspace::Workspace;
