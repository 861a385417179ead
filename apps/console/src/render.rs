//! Plain-text views of a workspace snapshot.

use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};
use client_core::{Loadable, Selection, TicketAction, WorkspaceSnapshot};
use shared::{
    domain::TicketStatus,
    protocol::{Message, Ticket},
};

const CONTENT_WIDTH: usize = 48;

pub fn chips(snapshot: &WorkspaceSnapshot) -> String {
    TicketStatus::ALL
        .iter()
        .map(|status| format!("[{}]", snapshot.counts.label(*status)))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn workspace(snapshot: &WorkspaceSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", chips(snapshot));
    let _ = writeln!(out, "showing: {}", shown_statuses(snapshot));
    if !snapshot.filter.is_identity() {
        let _ = writeln!(out, "filter: {:?}", snapshot.filter);
    }

    match &snapshot.page {
        Loadable::Loading => {
            let _ = writeln!(out, "loading…");
        }
        Loadable::Ready(page) if page.tickets.is_empty() => {
            let _ = writeln!(out, "no tickets");
        }
        Loadable::Ready(page) => {
            let _ = writeln!(
                out,
                "{:<12} {:<8} {:<16} {:<16} {:<16} CONTENT",
                "ID", "STATUS", "AUTHOR", "CREATED", "CHANGED"
            );
            for ticket in &page.tickets {
                let _ = writeln!(out, "{}", row(ticket));
            }
        }
    }

    let pagination = snapshot.pagination;
    match snapshot.total_tickets() {
        Some(total) => {
            let _ = write!(
                out,
                "page {} of {} | {} tickets | {} per page",
                pagination.page() + 1,
                pagination.page_count(total),
                total,
                pagination.page_size()
            );
        }
        None => {
            let _ = write!(
                out,
                "page {} | {} per page",
                pagination.page() + 1,
                pagination.page_size()
            );
        }
    }
    out
}

/// The directory lists open and closed tickets unless a status is filtered.
fn shown_statuses(snapshot: &WorkspaceSnapshot) -> String {
    match snapshot.filter.status {
        Some(status) => status.to_string(),
        None => TicketStatus::DEFAULT_VIEW.map(TicketStatus::as_str).join(", "),
    }
}

fn row(ticket: &Ticket) -> String {
    format!(
        "{:<12} {:<8} {:<16} {:<16} {:<16} {}",
        ticket.id.as_str(),
        ticket.status.as_str(),
        ticket.author_name().unwrap_or("-"),
        local_time(&ticket.timestamp),
        local_time(&ticket.last_status_change()),
        truncate(ticket.content().unwrap_or(""), CONTENT_WIDTH),
    )
}

/// Details view or confirmation prompt for the current selection.
pub fn selection(snapshot: &WorkspaceSnapshot) -> Option<String> {
    match &snapshot.selection {
        Selection::Idle => None,
        Selection::PendingConfirmation { ticket, action } => Some(format!(
            "{action} ticket {}? type 'confirm' or 'cancel'",
            ticket.id
        )),
        Selection::Inspecting(ticket) => Some(details(ticket, snapshot.details.as_ref())),
    }
}

fn details(ticket: &Ticket, messages: Option<&Loadable<Vec<Message>>>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ticket {} ({})", ticket.id, ticket.status);
    let _ = writeln!(out, "  author:  {}", ticket.author_name().unwrap_or("-"));
    let _ = writeln!(out, "  created: {}", local_time(&ticket.timestamp));
    let _ = writeln!(out, "  changed: {}", local_time(&ticket.last_status_change()));
    if let Some(resolved_by) = &ticket.resolved_by {
        let _ = writeln!(out, "  resolved by: {resolved_by}");
    }
    if let Some(url) = ticket.msg.as_ref().map(|msg| msg.msg_url.as_str()) {
        let _ = writeln!(out, "  link:    {url}");
    }

    match messages {
        None | Some(Loadable::Loading) => {
            let _ = writeln!(out, "  loading…");
        }
        Some(Loadable::Ready(messages)) if messages.is_empty() => {
            let _ = writeln!(out, "  no context messages");
        }
        Some(Loadable::Ready(messages)) => {
            for message in messages {
                let _ = writeln!(
                    out,
                    "  {} {}: {}",
                    local_time(&message.timestamp),
                    message.author.name,
                    message.content
                );
            }
        }
    }

    let actions: Vec<String> = TicketAction::ALL
        .iter()
        .filter(|action| **action != TicketAction::Inspect && action.is_available_for(ticket.status))
        .map(|action| format!("{action} {}", ticket.id))
        .collect();
    if actions.is_empty() {
        let _ = write!(out, "actions: back");
    } else {
        let _ = write!(out, "actions: {} | back", actions.join(" | "));
    }
    out
}

fn local_time(value: &DateTime<Utc>) -> String {
    value
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

fn truncate(text: &str, width: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= width {
        return single_line;
    }
    let mut cut: String = single_line.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
