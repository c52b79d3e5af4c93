//! CLI command definitions and dispatch for the `hrflow` binary.
//!
//! Uses clap derive macros for argument parsing. Commands are grouped by
//! resource (e.g., `hrflow template create`, `hrflow request decide`).
//! Every command that touches the engine runs as the actor given by
//! `--actor`/`--role` (or `HRFLOW_ACTOR`/`HRFLOW_ROLE`).

pub mod display;
pub mod notification;
pub mod request;
pub mod template;

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use clap_complete::Shell;

use hrflow_types::actor::{Actor, ActorRole};

/// Multi-step HR approval workflows.
#[derive(Parser)]
#[command(name = "hrflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Identity to act as.
    #[arg(long, global = true, env = "HRFLOW_ACTOR")]
    pub actor: Option<String>,

    /// Privilege of the acting identity (employee, admin, system).
    #[arg(long, global = true, env = "HRFLOW_ROLE", default_value = "employee")]
    pub role: String,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// The acting identity, required by every engine command.
    pub fn actor(&self) -> Result<Actor> {
        let id = self
            .actor
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("no actor given; pass --actor <id> or set HRFLOW_ACTOR"))?;
        let role = self.role.parse::<ActorRole>().map_err(|e| anyhow!(e))?;
        Ok(Actor::new(id, role))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage workflow templates (admin).
    #[command(alias = "tpl")]
    Template {
        #[command(subcommand)]
        action: TemplateCommand,
    },

    /// File, track and decide approval requests.
    #[command(alias = "req")]
    Request {
        #[command(subcommand)]
        action: RequestCommand,
    },

    /// Read and acknowledge the notification outbox.
    Notifications {
        #[command(subcommand)]
        action: NotificationCommand,
    },

    /// Start the REST API server.
    Serve {
        /// Port to listen on (defaults to `server.port` from config.toml).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to `server.host` from config.toml).
        #[arg(long)]
        host: Option<String>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum TemplateCommand {
    /// Register a template from a YAML definition.
    Create {
        /// Path to the YAML file.
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Update a template. Running instances keep their snapshot.
    Update {
        /// Template ID.
        id: String,

        /// YAML definition whose fields replace the stored ones.
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Whether new instances start as editable drafts.
        #[arg(long)]
        allow_drafts: Option<bool>,
    },

    /// Stop new instances from being created from a template.
    Deactivate {
        /// Template ID.
        id: String,
    },

    /// List templates.
    #[command(alias = "ls")]
    List {
        /// Only active templates.
        #[arg(long)]
        active: bool,

        /// Filter by domain (leave, expense, purchase, ...).
        #[arg(long)]
        domain: Option<String>,
    },

    /// Show a template's steps.
    Show {
        /// Template ID.
        id: String,
    },
}

#[derive(Subcommand)]
pub enum RequestCommand {
    /// Start a request from a template.
    Create {
        /// Template ID.
        #[arg(short, long)]
        template: String,

        /// Request payload as JSON.
        #[arg(long, conflicts_with = "payload_file")]
        payload: Option<String>,

        /// Read the payload from a JSON file.
        #[arg(long)]
        payload_file: Option<PathBuf>,

        /// File on behalf of another identity (admin/system only).
        #[arg(long)]
        on_behalf_of: Option<String>,
    },

    /// Submit a draft for approval.
    Submit {
        /// Request ID.
        id: String,
    },

    /// Replace the payload of a draft.
    Update {
        /// Request ID.
        id: String,

        /// New payload as JSON.
        #[arg(long)]
        payload: String,
    },

    /// Cancel a request that is not yet decided.
    Cancel {
        /// Request ID.
        id: String,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Record a decision on the active step.
    Decide {
        /// Request ID.
        id: String,

        /// approve, reject or pending.
        decision: String,

        /// Step ID the decision is for.
        #[arg(short, long)]
        step: String,

        #[arg(short, long)]
        comment: Option<String>,

        /// Decide on behalf of another approver (admin/system only).
        #[arg(long = "as")]
        approver: Option<String>,
    },

    /// Show a request with its steps and decisions.
    Show {
        /// Request ID.
        id: String,
    },

    /// List requests filed by or assigned to an identity.
    #[command(alias = "ls")]
    List {
        /// Requests filed by this identity (default: the actor).
        #[arg(long, conflicts_with = "approver")]
        requester: Option<String>,

        /// Requests where this identity is an approver.
        #[arg(long)]
        approver: Option<String>,

        /// Status filter for approver listings.
        #[arg(long, requires = "approver")]
        status: Option<String>,
    },

    /// Requests waiting on a decision from an approver.
    Awaiting {
        /// Approver identity (default: the actor).
        #[arg(long)]
        approver: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum NotificationCommand {
    /// List outbox notifications for a recipient.
    #[command(alias = "ls")]
    List {
        /// Recipient identity (default: the actor).
        #[arg(long)]
        recipient: Option<String>,

        /// Include already delivered notifications.
        #[arg(long)]
        all: bool,

        #[arg(long)]
        limit: Option<i64>,
    },

    /// Mark notifications delivered (admin/system only).
    Ack {
        /// Notification IDs.
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn decide_parses_flags() {
        let cli = Cli::try_parse_from([
            "hrflow", "--actor", "bob", "request", "decide", "abc", "approve", "--step",
            "manager", "-c", "ok",
        ])
        .unwrap();
        let Commands::Request {
            action:
                RequestCommand::Decide {
                    decision,
                    step,
                    comment,
                    approver,
                    ..
                },
        } = cli.command
        else {
            panic!("expected request decide");
        };
        assert_eq!(decision, "approve");
        assert_eq!(step, "manager");
        assert_eq!(comment.as_deref(), Some("ok"));
        assert!(approver.is_none());
    }

    #[test]
    fn actor_requires_id_and_valid_role() {
        let cli = Cli::try_parse_from(["hrflow", "--actor", "root", "--role", "admin", "template", "list"])
            .unwrap();
        assert!(cli.actor().unwrap().is_admin());

        let cli = Cli::try_parse_from(["hrflow", "--role", "boss", "template", "list"]).unwrap();
        assert!(cli.actor().is_err());
    }
}
