mod cli;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use reqtrace_core::{
    check_all, check_rule, rules, CharacteristicStatus, Direction, LinkType, Need, Requirement,
    RequirementStatus, RequirementType, Severity, Workspace,
};

use crate::cli::{
    Cli, Command, DecomposeCommand, LinkCommand, NeedCommand, QualityCommand, ReqCommand,
    SessionCommand, SourceCommand, ValidateCommand,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let ws = Workspace::new(&cli.root);

    match &cli.command {
        Command::Need(cmd) => handle_need_command(&ws, cmd)?,
        Command::Req(cmd) => handle_req_command(&ws, cmd)?,
        Command::Source(cmd) => handle_source_command(&ws, cmd)?,
        Command::Link(cmd) => handle_link_command(&ws, cmd)?,
        Command::Quality(cmd) => handle_quality_command(cmd)?,
        Command::Validate(cmd) => handle_validate_command(&ws, cmd)?,
        Command::Decompose(cmd) => handle_decompose_command(&ws, cmd)?,
        Command::Session(cmd) => handle_session_command(&ws, cmd)?,
    }

    Ok(())
}

fn handle_need_command(ws: &Workspace, cmd: &NeedCommand) -> Result<()> {
    match cmd {
        NeedCommand::Add {
            statement,
            stakeholder,
            block,
            provenance,
        } => {
            let provenance: Vec<String> = provenance
                .as_deref()
                .unwrap_or("")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();

            let need = ws.add_need(statement, stakeholder, block, &provenance)?;
            println!("{} {}", "Added need".green(), need.id.green());
        }
        NeedCommand::List => {
            let needs = ws.list_needs()?;
            if needs.is_empty() {
                println!("No needs recorded");
            }
            for need in needs {
                print_need_row(&need);
            }
        }
        NeedCommand::Show { id } => {
            let need = ws.get_need(id)?;
            println!("{}: {}", "ID".bold(), need.id);
            println!("{}: {}", "Statement".bold(), need.statement);
            println!("{}: {}", "Stakeholder".bold(), need.stakeholder);
            println!("{}: {}", "Block".bold(), need.block);
            println!("{}: {}", "Status".bold(), need.status);
            if let Some(rationale) = &need.rationale {
                println!("{}: {}", "Rationale".bold(), rationale);
            }
            if !need.provenance.is_empty() {
                println!("{}: {}", "Provenance".bold(), need.provenance.join(", "));
            }
            println!("{}: {}", "Registered".bold(), need.registered_at.to_rfc3339());
        }
        NeedCommand::Defer { id, rationale } => {
            let need = ws.defer_need(id, rationale)?;
            println!("{} {} ({})", "Deferred".yellow(), need.id, rationale);
        }
        NeedCommand::Reject { id, rationale } => {
            let need = ws.reject_need(id, rationale)?;
            println!("{} {} ({})", "Rejected".red(), need.id, rationale);
        }
        NeedCommand::Split { id, into } => {
            let children = ws.split_need(id, into)?;
            let ids: Vec<&str> = children.iter().map(|c| c.id.as_str()).collect();
            println!("{} {} into {}", "Split".green(), id, ids.join(", "));
        }
    }
    Ok(())
}

fn handle_req_command(ws: &Workspace, cmd: &ReqCommand) -> Result<()> {
    match cmd {
        ReqCommand::Add {
            statement,
            r#type,
            priority,
            block,
        } => {
            let req_type = RequirementType::parse(r#type)?;
            let priority = reqtrace_core::Priority::parse(priority)?;
            let req = ws.add_requirement(statement, req_type, priority, block)?;
            println!("{} {}", "Added requirement".green(), req.id.green());
        }
        ReqCommand::Register { id, need } => {
            let req = ws.register_requirement(id, need)?;
            println!(
                "{} {} against {}",
                "Registered".green(),
                req.id,
                need
            );
        }
        ReqCommand::Baseline { id } => {
            let req = ws.baseline_requirement(id)?;
            println!("{} {}", "Baselined".green(), req.id);
        }
        ReqCommand::Withdraw { id, rationale } => {
            let req = ws.withdraw_requirement(id, rationale)?;
            println!("{} {} ({})", "Withdrawn".yellow(), req.id, rationale);
        }
        ReqCommand::Split { id, into } => {
            let children = ws.split_requirement(id, into)?;
            let ids: Vec<&str> = children.iter().map(|c| c.id.as_str()).collect();
            println!("{} {} into {}", "Split".green(), id, ids.join(", "));
        }
        ReqCommand::Update { id, field, value } => {
            let req = ws.update_requirement(id, field, value)?;
            println!("{} {} field '{}'", "Updated".green(), req.id, field);
        }
        ReqCommand::List { all } => {
            let reqs = ws.list_requirements(*all)?;
            if reqs.is_empty() {
                println!("No requirements recorded");
            }
            for req in reqs {
                print_req_row(&req);
            }
        }
        ReqCommand::Query {
            status,
            r#type,
            block,
        } => {
            let status = status
                .as_deref()
                .map(parse_req_status)
                .transpose()?;
            let req_type = r#type
                .as_deref()
                .map(RequirementType::parse)
                .transpose()?;
            let hits = ws.query_requirements(status, req_type, block.as_deref())?;
            for req in hits {
                print_req_row(&req);
            }
        }
        ReqCommand::Show { id } => {
            let req = ws.get_requirement(id)?;
            println!("{}: {}", "ID".bold(), req.id);
            println!("{}: {}", "Statement".bold(), req.statement);
            println!("{}: {}", "Type".bold(), req.req_type);
            println!("{}: {}", "Priority".bold(), req.priority);
            println!("{}: {}", "Status".bold(), req.status);
            println!("{}: {}", "Block".bold(), req.block);
            println!("{}: {}", "Level".bold(), req.level);
            if let Some(parent) = &req.parent_need {
                println!("{}: {}", "Parent need".bold(), parent);
            }
            if let Some(tbd) = &req.tbd {
                println!("{}: {}", "TBD".yellow(), tbd);
            }
            if let Some(tbr) = &req.tbr {
                println!("{}: {}", "TBR".yellow(), tbr);
            }
            if let Some(rationale) = &req.rationale {
                println!("{}: {}", "Rationale".bold(), rationale);
            }
            if let Some(split_from) = &req.split_from {
                println!("{}: {}", "Split from".bold(), split_from);
            }
            for (key, value) in &req.attributes {
                println!("{}: {}", key.bold(), value);
            }
        }
        ReqCommand::Export { output } => {
            ws.export_json(output)?;
            println!("{} {}", "Exported to".green(), output.display());
        }
    }
    Ok(())
}

fn handle_source_command(ws: &Workspace, cmd: &SourceCommand) -> Result<()> {
    match cmd {
        SourceCommand::Add {
            title,
            url,
            category,
            context,
            artifact_ref,
        } => {
            let source = ws.add_source(title, url, category, context, artifact_ref.as_deref())?;
            println!("{} {}", "Added source".green(), source.id.green());
        }
        SourceCommand::List => {
            for source in ws.list_sources()? {
                println!("{}  [{}] {}", source.id.cyan(), source.category, source.title);
            }
        }
        SourceCommand::Show { id } => {
            let source = ws.get_source(id)?;
            println!("{}: {}", "ID".bold(), source.id);
            println!("{}: {}", "Title".bold(), source.title);
            println!("{}: {}", "URL".bold(), source.url);
            println!("{}: {}", "Category".bold(), source.category);
            if !source.research_context.is_empty() {
                println!("{}: {}", "Context".bold(), source.research_context);
            }
            if let Some(artifact) = &source.artifact_ref {
                println!("{}: {}", "Artifact".bold(), artifact);
            }
        }
    }
    Ok(())
}

fn handle_link_command(ws: &Workspace, cmd: &LinkCommand) -> Result<()> {
    match cmd {
        LinkCommand::Add {
            from,
            to,
            r#type,
            role,
        } => {
            let link_type = LinkType::parse(r#type)?;
            let created = ws.link(from, to, link_type, role)?;
            if created {
                println!("{} {} -[{}]-> {}", "Linked".green(), from, link_type, to);
            } else {
                println!("Link {} -[{}]-> {} already exists", from, link_type, to);
            }
        }
        LinkCommand::List { id, direction } => {
            let direction = Direction::parse(direction)?;
            for link in ws.query_links(id, direction)? {
                println!(
                    "{} -[{}]-> {}{}",
                    link.source_id.cyan(),
                    link.link_type,
                    link.target_id.cyan(),
                    if link.role.is_empty() {
                        String::new()
                    } else {
                        format!("  ({})", link.role)
                    }
                );
            }
        }
        LinkCommand::Coverage => {
            let report = ws.coverage()?;
            println!(
                "Coverage: {}/{} approved needs ({:.1}%)",
                report.covered_needs, report.total_approved_needs, report.coverage_pct
            );
            for id in &report.uncovered {
                println!("  {} {}", "uncovered".red(), id);
            }
        }
        LinkCommand::Orphans => {
            let report = ws.orphans()?;
            for id in &report.orphan_needs {
                println!("{} {}", "orphan need".red(), id);
            }
            for id in &report.orphan_requirements {
                println!("{} {}", "orphan requirement".yellow(), id);
            }
            if report.orphan_needs.is_empty() && report.orphan_requirements.is_empty() {
                println!("{}", "No orphans".green());
            }
        }
        LinkCommand::Resolve {
            from,
            to,
            rationale,
        } => {
            ws.resolve_conflict(from, to, rationale)?;
            println!("{} conflict {} <-> {}", "Resolved".green(), from, to);
        }
    }
    Ok(())
}

fn handle_quality_command(cmd: &QualityCommand) -> Result<()> {
    match cmd {
        QualityCommand::Check { text } => {
            print_findings(&check_all(text));
        }
        QualityCommand::CheckRule { code, text } => {
            print_findings(&check_rule(code, text)?);
        }
        QualityCommand::Rules => {
            for rule in rules() {
                println!(
                    "{}  {:<8} {:<28} {}",
                    rule.code.cyan(),
                    rule.severity,
                    rule.name,
                    rule.description
                );
            }
        }
    }
    Ok(())
}

fn handle_validate_command(ws: &Workspace, cmd: &ValidateCommand) -> Result<()> {
    match cmd {
        ValidateCommand::All => {
            let report = ws.validate_set()?;
            for c in &report.characteristics {
                let status = match c.status {
                    CharacteristicStatus::Pass => "PASS".green(),
                    CharacteristicStatus::Fail => "FAIL".red(),
                    CharacteristicStatus::RequiresReview => "REVIEW".yellow(),
                };
                println!("{} {:<18} {}  {}", c.code.cyan(), c.name, status, c.details);
            }
        }
        ValidateCommand::Duplicates { threshold } => {
            let findings = ws.check_duplicates(*threshold)?;
            if findings.is_empty() {
                println!("{}", "No cross-block duplicates".green());
            }
            for f in findings {
                println!(
                    "{:?}: {} ~ {} (score {:.3})",
                    f.verdict, f.req_a, f.req_b, f.score
                );
            }
        }
        ValidateCommand::Terminology => {
            let findings = ws.check_terminology()?;
            if findings.is_empty() {
                println!("{}", "Terminology is consistent".green());
            }
            for f in findings {
                println!(
                    "variants [{}] spread across blocks [{}]",
                    f.variants.join(", "),
                    f.blocks.join(", ")
                );
            }
        }
        ValidateCommand::Interfaces { pairs } => {
            let mut relationships = Vec::with_capacity(pairs.len());
            for pair in pairs {
                let (from, to) = pair.split_once(':').ok_or_else(|| {
                    anyhow::anyhow!("expected FROM:TO pair, got '{}'", pair)
                })?;
                relationships.push((from.to_string(), to.to_string()));
            }
            let gaps = ws.check_interfaces(&relationships)?;
            if gaps.is_empty() {
                println!("{}", "All declared interfaces are covered".green());
            }
            for gap in gaps {
                println!(
                    "{} no interface requirement from '{}' naming '{}'",
                    "missing".red(),
                    gap.from_block,
                    gap.to_block
                );
            }
        }
        ValidateCommand::Coverage => {
            let report = ws.coverage()?;
            for id in &report.uncovered {
                println!("{} {}", "uncovered".red(), id);
            }
            println!(
                "{}/{} approved needs covered ({:.1}%)",
                report.covered_needs, report.total_approved_needs, report.coverage_pct
            );
        }
        ValidateCommand::Tbd => {
            let markers = ws.check_tbd()?;
            if markers.is_empty() {
                println!("{}", "No open TBD/TBR markers".green());
            }
            for m in markers {
                println!("{} {} {}: {}", m.requirement_id.cyan(), "open".yellow(), m.marker, m.value);
            }
        }
    }
    Ok(())
}

fn handle_decompose_command(ws: &Workspace, cmd: &DecomposeCommand) -> Result<()> {
    match cmd {
        DecomposeCommand::ValidateBaseline { block } => {
            let report = ws.validate_baseline(block)?;
            if report.ready {
                println!("{} block '{}' is ready for decomposition", "OK".green(), block);
            } else {
                println!(
                    "{} block '{}' is not ready: {}",
                    "NOT READY".red(),
                    block,
                    if report.not_baselined.is_empty() {
                        "no requirements in block".to_string()
                    } else {
                        report.not_baselined.join(", ")
                    }
                );
            }
        }
        DecomposeCommand::RegisterSubBlocks { parent, names } => {
            let subs = ws.register_sub_blocks(parent, names)?;
            for sub in subs {
                println!(
                    "{} '{}' (level {}) under '{}'",
                    "Registered".green(),
                    sub.name,
                    sub.level,
                    sub.parent_block
                );
            }
        }
        DecomposeCommand::Allocate {
            req,
            sub_block,
            rationale,
        } => {
            let created = ws.allocate(req, sub_block, rationale)?;
            if created {
                println!("{} {} to '{}'", "Allocated".green(), req, sub_block);
            } else {
                println!("{} is already allocated to '{}'", req, sub_block);
            }
        }
        DecomposeCommand::Coverage { block } => {
            let report = ws.allocation_coverage(block)?;
            println!(
                "Allocation: {}/{} baselined requirements ({:.1}%)",
                report.allocated, report.total_baselined, report.coverage_pct
            );
            for id in &report.unallocated {
                println!("  {} {}", "unallocated".red(), id);
            }
        }
        DecomposeCommand::CheckLevel { block } => {
            let level = ws.block_level(block)?;
            println!("Block '{}' is at decomposition level {}", block, level);
        }
    }
    Ok(())
}

fn handle_session_command(ws: &Workspace, cmd: &SessionCommand) -> Result<()> {
    match cmd {
        SessionCommand::Show => {
            // Refresh before showing so stale counts are never observed
            ws.refresh_counts()?;
            let session = ws.session().load()?;
            println!("{}: {}", "Phase".bold(), session.phase);
            for gate in &session.gates {
                let mark = if gate.passed { "passed".green() } else { "open".yellow() };
                println!("  gate {:<24} {}", gate.name, mark);
            }
            for (status, count) in &session.counts.needs {
                println!("  needs/{}: {}", status, count);
            }
            for (status, count) in &session.counts.requirements {
                println!("  requirements/{}: {}", status, count);
            }
            println!("  sources: {}", session.counts.sources);
            println!("  links: {}", session.counts.links);
            if let Some(block) = &session.position.current_block {
                println!("{}: {}", "Current block".bold(), block);
            }
            if let Some(pass) = &session.position.current_type_pass {
                println!("{}: {}", "Current type pass".bold(), pass);
            }
        }
        SessionCommand::Init => {
            let session = reqtrace_core::SessionState::reinitialize();
            ws.session().save(&session)?;
            ws.refresh_counts()?;
            println!("{}", "Session reinitialized".green());
        }
        SessionCommand::SetPhase { phase } => {
            let mut session = ws.session().load()?;
            session.set_phase(phase)?;
            ws.session().save(&session)?;
            println!("{} {}", "Phase set to".green(), phase);
        }
        SessionCommand::SetGate { phase } => {
            let mut session = ws.session().load()?;
            session.set_gate(phase)?;
            ws.session().save(&session)?;
            println!("{} gate '{}'", "Passed".green(), phase);
        }
    }
    Ok(())
}

fn parse_req_status(s: &str) -> Result<RequirementStatus> {
    match s.to_lowercase().as_str() {
        "draft" => Ok(RequirementStatus::Draft),
        "registered" => Ok(RequirementStatus::Registered),
        "baselined" => Ok(RequirementStatus::Baselined),
        "withdrawn" => Ok(RequirementStatus::Withdrawn),
        other => anyhow::bail!(
            "unknown status '{}' (expected draft, registered, baselined, or withdrawn)",
            other
        ),
    }
}

fn print_need_row(need: &Need) {
    println!(
        "{}  [{}] ({}) {}",
        need.id.cyan(),
        need.status,
        need.block,
        need.statement
    );
}

fn print_req_row(req: &Requirement) {
    println!(
        "{}  [{}/{}] ({}) {}",
        req.id.cyan(),
        req.status,
        req.req_type,
        req.block,
        req.statement
    );
}

fn print_findings(findings: &[reqtrace_core::Finding]) {
    if findings.is_empty() {
        println!("{}", "No findings".green());
        return;
    }
    for f in findings {
        let severity = match f.severity {
            Severity::Error => "error".red(),
            Severity::Warning => "warning".yellow(),
        };
        println!(
            "{} {} [{}] at {}: '{}'  -> {}",
            f.code.cyan(),
            severity,
            f.name,
            f.offset,
            f.matched,
            f.suggestion
        );
    }
}
