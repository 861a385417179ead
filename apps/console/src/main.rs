mod commands;
mod config;
mod render;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    BroadcastNotifier, FetchOutcome, HttpTicketDirectory, Notification, PageSize,
    TicketWorkspace, TransitionOutcome, WorkspaceError, WorkspaceSettings,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
};
use tracing_subscriber::EnvFilter;

use crate::commands::{ConsoleCommand, HELP};

#[derive(Parser, Debug)]
struct Args {
    /// Ticket directory base url, e.g. http://127.0.0.1:5001/api/v1
    #[arg(long)]
    api_url: Option<String>,
    /// Rows per page, or "all"
    #[arg(long)]
    page_size: Option<PageSize>,
    #[arg(long)]
    log_filter: Option<String>,
}

enum Flow {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = config::load_settings();
    if let Some(url) = args.api_url {
        settings.api_base_url = url;
    }
    if let Some(size) = args.page_size {
        settings.default_page_size = size.normalized();
    }
    if let Some(filter) = args.log_filter {
        settings.log_filter = filter;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log_filter))
        .with_writer(std::io::stderr)
        .init();

    let directory = HttpTicketDirectory::new(&settings.api_base_url)
        .with_context(|| format!("invalid api url '{}'", settings.api_base_url))?;
    let notifier = Arc::new(BroadcastNotifier::default());
    tokio::spawn(forward_alerts(notifier.subscribe(), |line| println!("{line}")));

    let workspace = TicketWorkspace::new(
        Arc::new(directory),
        notifier,
        WorkspaceSettings {
            default_page_size: settings.default_page_size,
        },
    );
    tracing::info!(api = %settings.api_base_url, "ticket console started");

    workspace.initial_load().await;
    print_workspace(&workspace).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let command = match ConsoleCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(error) => {
                println!("{error}");
                continue;
            }
        };
        match dispatch(&workspace, command).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(error) => println!("{error}"),
        }
    }

    Ok(())
}

async fn dispatch(workspace: &TicketWorkspace, command: ConsoleCommand) -> Result<Flow, WorkspaceError> {
    tracing::debug!(command = ?command, "dispatching console command");
    match command {
        ConsoleCommand::List => {
            workspace.refresh_page().await;
            print_workspace(workspace).await;
        }
        ConsoleCommand::Filter(filter) => {
            workspace.apply_filter(filter).await;
            print_workspace(workspace).await;
        }
        ConsoleCommand::Reset => {
            workspace.reset_filter().await;
            print_workspace(workspace).await;
        }
        ConsoleCommand::Page(page) => {
            let page_size = workspace.snapshot().await.pagination.page_size();
            workspace.change_page(page.saturating_sub(1), page_size).await;
            print_workspace(workspace).await;
        }
        ConsoleCommand::Size(page_size) => {
            let page = workspace.snapshot().await.pagination.page();
            workspace.change_page(page, page_size).await;
            print_workspace(workspace).await;
        }
        ConsoleCommand::Act { action, ticket_id } => {
            let ticket = workspace.locate(&ticket_id).await?;
            workspace.request(ticket, action).await?;
            print_selection(workspace).await;
        }
        ConsoleCommand::Confirm => match workspace.confirm().await? {
            TransitionOutcome::Applied(_) => print_workspace(workspace).await,
            TransitionOutcome::Failed => {}
        },
        ConsoleCommand::Cancel => {
            workspace.cancel().await;
            print_workspace(workspace).await;
        }
        ConsoleCommand::Back => {
            workspace.close_details().await;
            print_workspace(workspace).await;
        }
        ConsoleCommand::Refresh => {
            if workspace.refresh_details().await == FetchOutcome::Stale {
                println!("no ticket is being inspected");
            } else {
                print_selection(workspace).await;
            }
        }
        ConsoleCommand::Counts => {
            if workspace.refresh_counts().await == FetchOutcome::Applied {
                println!("{}", render::chips(&workspace.snapshot().await));
            }
        }
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

/// Prints alerts as `[Severity] message` until the notifier goes away. Alerts
/// dropped while the printer lagged are skipped.
async fn forward_alerts(mut alerts: broadcast::Receiver<Notification>, mut sink: impl FnMut(String)) {
    loop {
        match alerts.recv().await {
            Ok(alert) => sink(format!("[{}] {}", alert.severity, alert.message)),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "alert printer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn print_workspace(workspace: &TicketWorkspace) {
    println!("{}", render::workspace(&workspace.snapshot().await));
}

async fn print_selection(workspace: &TicketWorkspace) {
    if let Some(view) = render::selection(&workspace.snapshot().await) {
        println!("{view}");
    }
}
