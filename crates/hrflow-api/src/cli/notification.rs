//! Notification outbox CLI commands: list, ack.

use anyhow::{Result, bail};
use comfy_table::{Cell, Color};
use console::style;
use uuid::Uuid;

use hrflow_infra::sqlite::outbox::OutboxFilter;
use hrflow_types::actor::Actor;

use super::display::{format_relative_time, new_table, plural};
use crate::state::AppState;

pub async fn list_notifications(
    state: &AppState,
    actor: &Actor,
    recipient: Option<String>,
    include_delivered: bool,
    limit: Option<i64>,
    json: bool,
) -> Result<()> {
    let recipient = recipient.unwrap_or_else(|| actor.id.clone());
    if !actor.may_act_for(&recipient) {
        bail!("{} may not read notifications for {recipient}", actor.id);
    }

    let entries = state
        .outbox
        .list(&OutboxFilter {
            recipient_id: Some(recipient.clone()),
            include_delivered,
            limit,
        })
        .await?;

    if json {
        let events: Vec<_> = entries
            .iter()
            .map(|e| {
                let mut value = serde_json::to_value(&e.event)?;
                value["delivered"] = serde_json::json!(e.delivered);
                Ok(value)
            })
            .collect::<Result<_, serde_json::Error>>()?;
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!();
        println!(
            "  {} No notifications for {}",
            style("i").blue().bold(),
            style(&recipient).cyan()
        );
        println!();
        return Ok(());
    }

    let mut table = new_table(&["Kind", "Request", "When", "Delivered", "ID"]);
    for entry in &entries {
        let delivered = if entry.delivered {
            Cell::new("yes").fg(Color::DarkGrey)
        } else {
            Cell::new("no").fg(Color::Yellow)
        };
        table.add_row(vec![
            Cell::new(entry.event.kind.to_string()).fg(Color::Cyan),
            Cell::new(entry.event.instance_id.to_string()),
            Cell::new(format_relative_time(&entry.event.created_at)).fg(Color::DarkGrey),
            delivered,
            Cell::new(entry.event.id.to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!("  {}", plural(entries.len(), "notification"));
    println!();
    Ok(())
}

pub async fn ack_notifications(
    state: &AppState,
    actor: &Actor,
    ids: &[String],
    json: bool,
) -> Result<()> {
    if !actor.is_privileged() {
        bail!("only admin or system actors may acknowledge notifications");
    }
    let ids = ids
        .iter()
        .map(|id| id.parse::<Uuid>())
        .collect::<Result<Vec<_>, _>>()?;
    let acknowledged = state.outbox.mark_delivered(&ids).await?;

    if json {
        println!("{}", serde_json::json!({ "acknowledged": acknowledged }));
        return Ok(());
    }
    println!();
    println!(
        "  {} {} marked delivered",
        style("✓").green().bold(),
        plural(acknowledged as usize, "notification")
    );
    println!();
    Ok(())
}
