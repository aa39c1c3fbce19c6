use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Requirements registry and traceability engine")]
pub struct Cli {
    /// Workspace root directory holding the registry files
    #[clap(long, default_value = ".")]
    pub root: PathBuf,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum NeedCommand {
    /// Add a new approved need
    Add {
        /// The need statement
        #[clap(long)]
        statement: String,

        /// Stakeholder who owns the need
        #[clap(long)]
        stakeholder: String,

        /// Functional block the need originates from
        #[clap(long)]
        block: String,

        /// Provenance references (comma-separated)
        #[clap(long)]
        provenance: Option<String>,
    },

    /// List all needs
    List,

    /// Show details for a specific need
    Show {
        /// The ID of the need to show
        id: String,
    },

    /// Defer a need
    Defer {
        /// The ID of the need to defer
        id: String,

        /// Why the need is deferred
        #[clap(long)]
        rationale: String,
    },

    /// Reject a need
    Reject {
        /// The ID of the need to reject
        id: String,

        /// Why the need is rejected
        #[clap(long)]
        rationale: String,
    },

    /// Split a need into multiple replacement needs
    Split {
        /// The ID of the need to split
        id: String,

        /// Replacement statements (repeat --into per statement)
        #[clap(long = "into", required = true)]
        into: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReqCommand {
    /// Add a new draft requirement
    Add {
        /// The requirement statement
        #[clap(long)]
        statement: String,

        /// Type (functional, performance, interface, constraint, quality)
        #[clap(long)]
        r#type: String,

        /// Priority (high, medium, low)
        #[clap(long, default_value = "medium")]
        priority: String,

        /// Functional block the requirement belongs to
        #[clap(long)]
        block: String,
    },

    /// Register a draft requirement against an approved need
    Register {
        /// The ID of the requirement
        id: String,

        /// The ID of the parent need
        #[clap(long)]
        need: String,
    },

    /// Baseline a registered requirement
    Baseline {
        /// The ID of the requirement
        id: String,
    },

    /// Withdraw a requirement
    Withdraw {
        /// The ID of the requirement
        id: String,

        /// Why the requirement is withdrawn
        #[clap(long)]
        rationale: String,
    },

    /// Split a requirement into multiple new drafts
    Split {
        /// The ID of the requirement to split
        id: String,

        /// Replacement statements (repeat --into per statement)
        #[clap(long = "into", required = true)]
        into: Vec<String>,
    },

    /// Update a single field of a requirement
    Update {
        /// The ID of the requirement
        id: String,

        /// Field name (protected fields are rejected)
        #[clap(long)]
        field: String,

        /// New value; an empty value clears tbd/tbr/rationale
        #[clap(long, default_value = "")]
        value: String,
    },

    /// List requirements (withdrawn excluded unless --all)
    List {
        /// Include withdrawn requirements
        #[clap(long)]
        all: bool,
    },

    /// Query requirements by status, type, and/or block
    Query {
        /// Filter by status
        #[clap(long)]
        status: Option<String>,

        /// Filter by type
        #[clap(long)]
        r#type: Option<String>,

        /// Filter by block
        #[clap(long)]
        block: Option<String>,
    },

    /// Show details for a specific requirement
    Show {
        /// The ID of the requirement to show
        id: String,
    },

    /// Export all registries to a JSON file
    Export {
        /// Output file path
        #[clap(long, short = 'o', default_value = "export.json")]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum SourceCommand {
    /// Register an external source
    Add {
        /// Title of the source
        #[clap(long)]
        title: String,

        /// URL or locator
        #[clap(long, default_value = "")]
        url: String,

        /// Category tag
        #[clap(long, default_value = "reference")]
        category: String,

        /// Free-text research context
        #[clap(long, default_value = "")]
        context: String,

        /// Upstream artifact reference
        #[clap(long)]
        artifact_ref: Option<String>,
    },

    /// List all sources
    List,

    /// Show details for a specific source
    Show {
        /// The ID of the source to show
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum LinkCommand {
    /// Create a traceability link between two entities
    Add {
        /// Source entity ID
        #[clap(long)]
        from: String,

        /// Target entity ID
        #[clap(long)]
        to: String,

        /// Link type (derives_from, verified_by, sources, informed_by,
        /// allocated_to, parent_of, conflicts_with)
        #[clap(long)]
        r#type: String,

        /// Role tag for the edge
        #[clap(long, default_value = "")]
        role: String,
    },

    /// List links touching an entity
    List {
        /// Entity ID
        id: String,

        /// Direction (forward, backward, both)
        #[clap(long, default_value = "both")]
        direction: String,
    },

    /// Report derives_from coverage over approved needs
    Coverage,

    /// List approved needs and live requirements with no derivation edge
    Orphans,

    /// Resolve a conflicts_with link
    Resolve {
        /// Source entity ID of the conflict edge
        #[clap(long)]
        from: String,

        /// Target entity ID of the conflict edge
        #[clap(long)]
        to: String,

        /// Why the conflict is resolved
        #[clap(long)]
        rationale: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum QualityCommand {
    /// Run the full rule battery over a statement
    Check {
        /// The statement text to check
        text: String,
    },

    /// Run a single named rule over a statement
    CheckRule {
        /// Rule code (e.g., Q007)
        code: String,

        /// The statement text to check
        text: String,
    },

    /// List rule metadata without checking any text
    Rules,
}

#[derive(Subcommand, Debug)]
pub enum ValidateCommand {
    /// Evaluate the INCOSE set characteristics C10-C15
    All,

    /// Scan for cross-block duplicate requirements
    Duplicates {
        /// Near-duplicate reporting threshold
        #[clap(long, default_value_t = reqtrace_core::DEFAULT_NEAR_THRESHOLD)]
        threshold: f64,
    },

    /// Scan for terminology drift across blocks
    Terminology,

    /// Check interface coverage for declared block relationships
    Interfaces {
        /// Block relationships as FROM:TO pairs (repeatable)
        #[clap(long = "pair", required = true)]
        pairs: Vec<String>,
    },

    /// List approved needs without derived requirements
    Coverage,

    /// List open TBD/TBR markers
    Tbd,
}

#[derive(Subcommand, Debug)]
pub enum DecomposeCommand {
    /// Check that a block's requirements are all baselined
    ValidateBaseline {
        /// Block name
        block: String,
    },

    /// Register sub-blocks under a baselined parent block
    RegisterSubBlocks {
        /// Parent block name
        parent: String,

        /// Sub-block names (repeat --name per sub-block)
        #[clap(long = "name", required = true)]
        names: Vec<String>,
    },

    /// Allocate a baselined requirement to a sub-block
    Allocate {
        /// Requirement ID
        req: String,

        /// Sub-block name
        #[clap(long)]
        sub_block: String,

        /// Why the requirement belongs to this sub-block
        #[clap(long)]
        rationale: String,
    },

    /// Report allocation coverage for a block
    Coverage {
        /// Block name
        block: String,
    },

    /// Show the decomposition level of a block
    CheckLevel {
        /// Block name
        block: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Show the session state
    Show,

    /// Reinitialize the session (clears phase, gates, and position)
    Init,

    /// Move the session to a named phase
    SetPhase {
        /// Phase name
        phase: String,
    },

    /// Mark a phase gate as passed
    SetGate {
        /// Phase name
        phase: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Need management commands
    #[clap(subcommand)]
    Need(NeedCommand),

    /// Requirement management commands
    #[clap(subcommand)]
    Req(ReqCommand),

    /// Source management commands
    #[clap(subcommand)]
    Source(SourceCommand),

    /// Traceability link commands
    #[clap(subcommand)]
    Link(LinkCommand),

    /// Quality rule engine commands
    #[clap(subcommand)]
    Quality(QualityCommand),

    /// Set-level validation commands
    #[clap(subcommand)]
    Validate(ValidateCommand),

    /// Decomposition and allocation commands
    #[clap(subcommand)]
    Decompose(DecomposeCommand),

    /// Session state commands
    #[clap(subcommand)]
    Session(SessionCommand),
}
