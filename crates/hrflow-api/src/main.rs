//! hrflow CLI and REST API entry point.
//!
//! Binary name: `hrflow`
//!
//! Parses CLI arguments, initializes database and services, then dispatches
//! to the appropriate command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, NotificationCommand, RequestCommand, TemplateCommand};
use hrflow_observe::tracing_setup::{LogOptions, init_tracing, shutdown_tracing};
use hrflow_types::template::UpdateTemplateRequest;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_options = LogOptions::from_verbosity(cli.verbose, cli.quiet);
    log_options.otel = cli.otel;
    init_tracing(&log_options).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "hrflow", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;
    let json = cli.json;

    match &cli.command {
        Commands::Template { action } => {
            let actor = cli.actor()?;
            match action {
                TemplateCommand::Create { file } => {
                    cli::template::create_template(&state, &actor, file, json).await?;
                }
                TemplateCommand::Update {
                    id,
                    file,
                    name,
                    description,
                    allow_drafts,
                } => {
                    let patch = UpdateTemplateRequest {
                        name: name.clone(),
                        description: description.clone(),
                        allow_drafts: *allow_drafts,
                        ..Default::default()
                    };
                    cli::template::update_template(
                        &state,
                        &actor,
                        id,
                        file.as_deref(),
                        patch,
                        json,
                    )
                    .await?;
                }
                TemplateCommand::Deactivate { id } => {
                    cli::template::deactivate_template(&state, &actor, id, json).await?;
                }
                TemplateCommand::List { active, domain } => {
                    cli::template::list_templates(&state, *active, domain.clone(), json).await?;
                }
                TemplateCommand::Show { id } => {
                    cli::template::show_template(&state, id, json).await?;
                }
            }
        }

        Commands::Request { action } => {
            let actor = cli.actor()?;
            match action {
                RequestCommand::Create {
                    template,
                    payload,
                    payload_file,
                    on_behalf_of,
                } => {
                    cli::request::create_request(
                        &state,
                        &actor,
                        template,
                        payload.as_deref(),
                        payload_file.as_deref(),
                        on_behalf_of.clone(),
                        json,
                    )
                    .await?;
                }
                RequestCommand::Submit { id } => {
                    cli::request::submit_request(&state, &actor, id, json).await?;
                }
                RequestCommand::Update { id, payload } => {
                    cli::request::update_request(&state, &actor, id, payload, json).await?;
                }
                RequestCommand::Cancel { id, reason } => {
                    cli::request::cancel_request(&state, &actor, id, reason.as_deref(), json)
                        .await?;
                }
                RequestCommand::Decide {
                    id,
                    decision,
                    step,
                    comment,
                    approver,
                } => {
                    cli::request::decide(
                        &state,
                        &actor,
                        id,
                        decision,
                        step.clone(),
                        comment.clone(),
                        approver.clone(),
                        json,
                    )
                    .await?;
                }
                RequestCommand::Show { id } => {
                    cli::request::show_request(&state, &actor, id, json).await?;
                }
                RequestCommand::List {
                    requester,
                    approver,
                    status,
                } => {
                    cli::request::list_requests(
                        &state,
                        &actor,
                        requester.clone(),
                        approver.clone(),
                        status.clone(),
                        json,
                    )
                    .await?;
                }
                RequestCommand::Awaiting { approver } => {
                    cli::request::list_awaiting(&state, &actor, approver.clone(), json).await?;
                }
            }
        }

        Commands::Notifications { action } => {
            let actor = cli.actor()?;
            match action {
                NotificationCommand::List {
                    recipient,
                    all,
                    limit,
                } => {
                    cli::notification::list_notifications(
                        &state,
                        &actor,
                        recipient.clone(),
                        *all,
                        *limit,
                        json,
                    )
                    .await?;
                }
                NotificationCommand::Ack { ids } => {
                    cli::notification::ack_notifications(&state, &actor, ids, json).await?;
                }
            }
        }

        Commands::Serve { port, host } => {
            // Ensure an API key exists, print it if new
            if let Some(api_key) = http::extractors::auth::ensure_api_key(&state.db_pool).await? {
                println!();
                println!(
                    "  {} API key generated (save this -- it won't be shown again):",
                    console::style("🔑").bold()
                );
                println!();
                println!("  {}", console::style(&api_key).yellow().bold());
                println!();
            }

            let host = host.clone().unwrap_or_else(|| state.config.server.host.clone());
            let port = port.unwrap_or(state.config.server.port);
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            println!(
                "  {} hrflow API listening on {}",
                console::style("⚡").bold(),
                console::style(format!("http://{addr}")).cyan()
            );
            println!("  {}", console::style("Press Ctrl+C to stop").dim());
            tracing::info!(%addr, "server started");

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            println!("\n  Server stopped.");
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
