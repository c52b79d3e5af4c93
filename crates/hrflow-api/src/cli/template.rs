//! Template CLI commands: create, update, deactivate, list, show.

use std::path::Path;

use anyhow::Result;
use comfy_table::{Cell, Color};
use console::style;

use hrflow_core::registry::load_template_file;
use hrflow_core::repository::template::TemplateFilter;
use hrflow_types::actor::Actor;
use hrflow_types::template::{DomainType, TemplateId, UpdateTemplateRequest, WorkflowTemplate};

use super::display::{new_table, plural};
use crate::state::AppState;

/// Register a template from a YAML file.
///
/// ```bash
/// hrflow --actor root --role admin template create -f templates/expense.yaml
/// ```
pub async fn create_template(
    state: &AppState,
    actor: &Actor,
    file: &Path,
    json: bool,
) -> Result<()> {
    let request = load_template_file(file)?;
    let template = state.registry.create_template(actor, request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&template)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Template '{}' registered",
        style("✓").green().bold(),
        style(&template.name).cyan()
    );
    print_summary(&template);
    Ok(())
}

pub async fn update_template(
    state: &AppState,
    actor: &Actor,
    id: &str,
    file: Option<&Path>,
    mut patch: UpdateTemplateRequest,
    json: bool,
) -> Result<()> {
    let id: TemplateId = id.parse()?;
    if let Some(file) = file {
        let definition = load_template_file(file)?;
        patch = UpdateTemplateRequest {
            name: patch.name.or(Some(definition.name)),
            description: patch.description.or(definition.description),
            domain: Some(definition.domain),
            steps: Some(definition.steps),
            allow_drafts: patch.allow_drafts.or(definition.allow_drafts),
        };
    }

    let template = state.registry.update_template(actor, &id, patch).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&template)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Template '{}' updated to revision {}",
        style("✓").green().bold(),
        style(&template.name).cyan(),
        style(template.revision).bold()
    );
    print_summary(&template);
    Ok(())
}

pub async fn deactivate_template(
    state: &AppState,
    actor: &Actor,
    id: &str,
    json: bool,
) -> Result<()> {
    let id: TemplateId = id.parse()?;
    let template = state.registry.deactivate_template(actor, &id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&template)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Template '{}' deactivated. Running requests are unaffected.",
        style("✓").green().bold(),
        style(&template.name).cyan()
    );
    println!();
    Ok(())
}

pub async fn list_templates(
    state: &AppState,
    active_only: bool,
    domain: Option<String>,
    json: bool,
) -> Result<()> {
    let filter = TemplateFilter {
        active_only,
        domain: domain.map(DomainType::from),
    };
    let templates = state.registry.list_templates(&filter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&templates)?);
        return Ok(());
    }

    if templates.is_empty() {
        println!();
        println!(
            "  {} No templates found. Register one with: {}",
            style("i").blue().bold(),
            style("hrflow template create -f <file.yaml>").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = new_table(&["Name", "Domain", "Steps", "Rev", "Active", "ID"]);
    for t in &templates {
        let active = if t.active {
            Cell::new("● yes").fg(Color::Green)
        } else {
            Cell::new("○ no").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(&t.name).fg(Color::Cyan),
            Cell::new(t.domain.to_string()),
            Cell::new(t.steps.len()),
            Cell::new(t.revision),
            active,
            Cell::new(t.id.to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!("  {}", plural(templates.len(), "template"));
    println!();
    Ok(())
}

pub async fn show_template(state: &AppState, id: &str, json: bool) -> Result<()> {
    let id: TemplateId = id.parse()?;
    let template = state.registry.get_template(&id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&template)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style(&template.name).cyan().bold(),
        style(format!("(rev {})", template.revision)).dim()
    );
    if let Some(desc) = &template.description {
        println!("  {}", style(desc).dim());
    }
    print_summary(&template);
    Ok(())
}

fn print_summary(template: &WorkflowTemplate) {
    println!();
    println!("  {}  {}", style("ID:").bold(), style(template.id.to_string()).dim());
    println!("  {}  {}", style("Domain:").bold(), template.domain);
    println!(
        "  {}  {}",
        style("Drafts:").bold(),
        if template.allow_drafts { "allowed" } else { "no" }
    );
    println!();

    let mut table = new_table(&["#", "Step", "Rule", "Approvers"]);
    for step in &template.steps {
        let approvers = step
            .approvers
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            Cell::new(step.order),
            Cell::new(format!("{} ({})", step.name, step.id)).fg(Color::Cyan),
            Cell::new(step.rule.to_string()),
            Cell::new(approvers),
        ]);
    }
    println!("{table}");
    println!();
}
