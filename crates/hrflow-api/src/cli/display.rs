//! Shared terminal formatting for CLI output.

use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use hrflow_types::approval::{Decision, StepStatus, Transition};
use hrflow_types::instance::{InstanceStatus, WorkflowInstance};

pub fn format_status(status: InstanceStatus) -> String {
    match status {
        InstanceStatus::Draft => format!("{}", style("◌ draft").dim()),
        InstanceStatus::Pending => format!("{}", style("● pending").yellow()),
        InstanceStatus::Approved => format!("{}", style("✓ approved").green()),
        InstanceStatus::Rejected => format!("{}", style("✗ rejected").red()),
        InstanceStatus::Cancelled => format!("{}", style("○ cancelled").dim()),
    }
}

pub fn status_cell(status: InstanceStatus) -> Cell {
    let cell = Cell::new(status.to_string());
    match status {
        InstanceStatus::Draft => cell.fg(Color::DarkGrey),
        InstanceStatus::Pending => cell.fg(Color::Yellow),
        InstanceStatus::Approved => cell.fg(Color::Green),
        InstanceStatus::Rejected => cell.fg(Color::Red),
        InstanceStatus::Cancelled => cell.fg(Color::DarkGrey),
    }
}

pub fn step_status_cell(status: StepStatus) -> Cell {
    let cell = Cell::new(status.to_string());
    match status {
        StepStatus::Pending => cell.fg(Color::Yellow),
        StepStatus::Approved => cell.fg(Color::Green),
        StepStatus::Rejected => cell.fg(Color::Red),
    }
}

pub fn decision_cell(decision: Decision) -> Cell {
    let cell = Cell::new(decision.to_string());
    match decision {
        Decision::Pending => cell.fg(Color::Yellow),
        Decision::Approved => cell.fg(Color::Green),
        Decision::Rejected => cell.fg(Color::Red),
    }
}

/// One-line description of what a command did to the instance.
pub fn describe_transition(transition: Transition, instance: &WorkflowInstance) -> String {
    match transition {
        Transition::None => "no change to the active step".to_string(),
        Transition::Advanced { to, .. } => match instance.steps.get(to) {
            Some(step) => format!("advanced to step '{}'", step.name),
            None => format!("advanced to step {to}"),
        },
        Transition::Approved => "request approved".to_string(),
        Transition::Rejected => "request rejected".to_string(),
    }
}

pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(*h).fg(Color::White))
            .collect::<Vec<_>>(),
    );
    table
}

pub fn format_relative_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let diff = chrono::Utc::now() - *dt;

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_days() < 1 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_days() < 30 {
        format!("{}d ago", diff.num_days())
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}

/// Print non-fatal warnings from a command outcome.
pub fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        println!("  {} {}", style("!").yellow().bold(), style(warning).yellow());
    }
}

pub fn plural(n: usize, word: &str) -> String {
    format!("{} {word}{}", style(n).bold(), if n == 1 { "" } else { "s" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn relative_time_buckets() {
        assert_eq!(format_relative_time(&Utc::now()), "just now");
        assert_eq!(
            format_relative_time(&(Utc::now() - Duration::minutes(5))),
            "5m ago"
        );
        assert_eq!(
            format_relative_time(&(Utc::now() - Duration::days(2))),
            "2d ago"
        );
    }
}
