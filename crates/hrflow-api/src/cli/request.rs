//! Request CLI commands: create, submit, update, cancel, decide, show, list, awaiting.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color};
use console::style;

use hrflow_core::engine::CommandOutcome;
use hrflow_types::actor::Actor;
use hrflow_types::approval::{Decision, RecordDecisionRequest};
use hrflow_types::instance::{CreateInstanceRequest, InstanceId, InstanceStatus, WorkflowInstance};
use hrflow_types::template::TemplateId;

use super::display::{
    decision_cell, describe_transition, format_relative_time, format_status, new_table, plural,
    print_warnings, status_cell, step_status_cell,
};
use crate::state::AppState;

fn parse_payload(raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).context("payload is not valid JSON")
}

pub async fn create_request(
    state: &AppState,
    actor: &Actor,
    template: &str,
    payload: Option<&str>,
    payload_file: Option<&Path>,
    on_behalf_of: Option<String>,
    json: bool,
) -> Result<()> {
    let template_id: TemplateId = template.parse()?;
    let payload = match (payload, payload_file) {
        (Some(raw), _) => parse_payload(raw)?,
        (None, Some(path)) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            parse_payload(&raw)?
        }
        (None, None) => serde_json::json!({}),
    };

    let outcome = state
        .engine
        .create_instance(
            actor,
            CreateInstanceRequest {
                template_id,
                payload,
                requester_id: on_behalf_of,
            },
        )
        .await?;

    let headline = if outcome.instance.status == InstanceStatus::Draft {
        "Draft created. Submit it with 'hrflow request submit'"
    } else {
        "Request submitted for approval"
    };
    print_outcome(&outcome, headline, json)
}

pub async fn submit_request(state: &AppState, actor: &Actor, id: &str, json: bool) -> Result<()> {
    let id: InstanceId = id.parse()?;
    let outcome = state.engine.submit_instance(actor, &id).await?;
    print_outcome(&outcome, "Request submitted for approval", json)
}

pub async fn update_request(
    state: &AppState,
    actor: &Actor,
    id: &str,
    payload: &str,
    json: bool,
) -> Result<()> {
    let id: InstanceId = id.parse()?;
    let payload = parse_payload(payload)?;
    let instance = state.engine.update_draft(actor, &id, &payload).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&instance)?);
        return Ok(());
    }
    println!();
    println!("  {} Draft updated", style("✓").green().bold());
    println!();
    Ok(())
}

pub async fn cancel_request(
    state: &AppState,
    actor: &Actor,
    id: &str,
    reason: Option<&str>,
    json: bool,
) -> Result<()> {
    let id: InstanceId = id.parse()?;
    let outcome = state.engine.cancel_instance(actor, &id, reason).await?;
    print_outcome(&outcome, "Request cancelled", json)
}

pub async fn decide(
    state: &AppState,
    actor: &Actor,
    id: &str,
    decision: &str,
    step: String,
    comment: Option<String>,
    approver: Option<String>,
    json: bool,
) -> Result<()> {
    let id: InstanceId = id.parse()?;
    let decision: Decision = decision.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let request = RecordDecisionRequest {
        step_id: step,
        approver_id: approver,
        decision,
        comment,
    };
    let outcome = state.engine.record_decision(actor, &id, &request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!();
    if outcome.changed {
        println!(
            "  {} Recorded '{}' on step '{}' ({})",
            style("✓").green().bold(),
            outcome.record.decision,
            outcome.record.step_id,
            describe_transition(outcome.transition, &outcome.instance)
        );
    } else {
        println!(
            "  {} Same decision already recorded, nothing changed",
            style("i").blue().bold()
        );
    }
    println!(
        "  {}  {}",
        style("Status:").bold(),
        format_status(outcome.instance.status)
    );
    print_warnings(&outcome.warnings);
    println!();
    Ok(())
}

pub async fn show_request(state: &AppState, actor: &Actor, id: &str, json: bool) -> Result<()> {
    let id: InstanceId = id.parse()?;
    let detail = state.engine.get_instance_detail(actor, &id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let instance = &detail.instance;
    println!();
    println!(
        "  {} {}",
        style(&instance.template_name).cyan().bold(),
        style(format!("(rev {})", instance.template_revision)).dim()
    );
    println!();
    println!("  {}  {}", style("ID:").bold(), style(instance.id.to_string()).dim());
    println!("  {}  {}", style("Requester:").bold(), instance.requester_id);
    println!("  {}  {}", style("Status:").bold(), format_status(instance.status));
    if let Some(step) = instance.current_step().filter(|_| !instance.is_terminal()) {
        println!("  {}  {}", style("Active step:").bold(), step.name);
    }
    if let Some(reason) = &instance.cancel_reason {
        println!("  {}  {}", style("Cancel reason:").bold(), reason);
    }
    println!(
        "  {}  {}",
        style("Created:").bold(),
        format_relative_time(&instance.created_at)
    );
    println!(
        "  {}  {}",
        style("Payload:").bold(),
        serde_json::to_string(&instance.payload)?
    );
    println!();

    let mut steps = new_table(&["#", "Step", "Rule", "Status", "Approvers"]);
    for (view, snapshot) in detail.steps.iter().zip(&instance.steps) {
        steps.add_row(vec![
            Cell::new(view.order),
            Cell::new(&view.name).fg(Color::Cyan),
            Cell::new(snapshot.rule.to_string()),
            step_status_cell(view.status),
            Cell::new(view.approvers.join(", ")),
        ]);
    }
    println!("{steps}");

    if !detail.records.is_empty() {
        println!();
        let mut records = new_table(&["Step", "Approver", "Decision", "Comment", "When"]);
        for record in &detail.records {
            records.add_row(vec![
                Cell::new(&record.step_id),
                Cell::new(&record.approver_id),
                decision_cell(record.decision),
                Cell::new(record.comment.as_deref().unwrap_or("")),
                Cell::new(format_relative_time(&record.decided_at)).fg(Color::DarkGrey),
            ]);
        }
        println!("{records}");
    }
    println!();
    Ok(())
}

pub async fn list_requests(
    state: &AppState,
    actor: &Actor,
    requester: Option<String>,
    approver: Option<String>,
    status: Option<String>,
    json: bool,
) -> Result<()> {
    let instances = match approver {
        Some(approver) => {
            let status = status
                .map(|s| s.parse::<InstanceStatus>().map_err(|e| anyhow::anyhow!(e)))
                .transpose()?;
            state
                .engine
                .list_by_approver(actor, &approver, status)
                .await?
        }
        None => {
            let requester = requester.unwrap_or_else(|| actor.id.clone());
            state.engine.list_by_requester(actor, &requester).await?
        }
    };
    print_list(&instances, json)
}

pub async fn list_awaiting(
    state: &AppState,
    actor: &Actor,
    approver: Option<String>,
    json: bool,
) -> Result<()> {
    let approver = approver.unwrap_or_else(|| actor.id.clone());
    let instances = state.engine.list_awaiting_decision(actor, &approver).await?;
    if !json && instances.is_empty() {
        println!();
        println!(
            "  {} Nothing waiting on {}",
            style("✓").green().bold(),
            style(&approver).cyan()
        );
        println!();
        return Ok(());
    }
    print_list(&instances, json)
}

fn print_list(instances: &[WorkflowInstance], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(instances)?);
        return Ok(());
    }

    if instances.is_empty() {
        println!();
        println!("  {} No requests found", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = new_table(&["Template", "Requester", "Status", "Step", "Updated", "ID"]);
    for instance in instances {
        let step = match (instance.is_terminal(), instance.current_step()) {
            (false, Some(step)) => format!(
                "{}/{} {}",
                instance.current_step_index + 1,
                instance.steps.len(),
                step.name
            ),
            _ => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(&instance.template_name).fg(Color::Cyan),
            Cell::new(&instance.requester_id),
            status_cell(instance.status),
            Cell::new(step),
            Cell::new(format_relative_time(&instance.updated_at)).fg(Color::DarkGrey),
            Cell::new(instance.id.to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!("  {}", plural(instances.len(), "request"));
    println!();
    Ok(())
}

fn print_outcome(outcome: &CommandOutcome, headline: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    let instance = &outcome.instance;
    println!();
    println!("  {} {headline}", style("✓").green().bold());
    println!();
    println!("  {}  {}", style("ID:").bold(), style(instance.id.to_string()).dim());
    println!("  {}  {}", style("Template:").bold(), instance.template_name);
    println!("  {}  {}", style("Status:").bold(), format_status(instance.status));
    if instance.status == InstanceStatus::Pending {
        if let Some(step) = instance.current_step() {
            println!(
                "  {}  {} ({})",
                style("Waiting on:").bold(),
                step.name,
                step.approvers.join(", ")
            );
        }
    }
    print_warnings(&outcome.warnings);
    println!();
    Ok(())
}
