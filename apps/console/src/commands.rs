//! Console commands parsed from stdin lines.

use chrono::NaiveDate;
use client_core::{PageSize, TicketAction, TicketFilter};
use shared::domain::{TicketId, TicketStatus};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Filter(TicketFilter),
    Reset,
    /// One-based page number as typed.
    Page(u32),
    Size(PageSize),
    Act {
        action: TicketAction,
        ticket_id: TicketId,
    },
    Confirm,
    Cancel,
    Back,
    Refresh,
    Counts,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("invalid {field} '{value}'")]
    InvalidValue { field: &'static str, value: String },
    #[error("unknown filter key '{0}'")]
    UnknownFilterKey(String),
    #[error("filter needs at least one key=value pair")]
    EmptyFilter,
}

pub const HELP: &str = "\
commands:
  list                         reload the current page
  filter key=value ...         status, author, message, from, to (dates as YYYY-MM-DD)
  reset                        clear the filter
  page N                       go to page N
  size N|all                   change the page size
  inspect ID                   show a ticket and its context messages
  close ID | delete ID         stage a status change
  confirm | cancel             run or drop the staged change
  back                         leave the details view
  refresh                      reload the inspected ticket
  counts                       refresh the status counts
  help | quit";

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();

        let command = match head.to_ascii_lowercase().as_str() {
            "list" | "ls" => Self::List,
            "filter" => Self::Filter(parse_filter(&rest)?),
            "reset" => Self::Reset,
            "page" => {
                let raw = first(&rest, "page")?;
                match raw.parse::<u32>() {
                    Ok(page) if page > 0 => Self::Page(page),
                    _ => return Err(invalid("page", raw)),
                }
            }
            "size" => {
                let raw = first(&rest, "size")?;
                Self::Size(raw.parse().map_err(|_| invalid("page size", raw))?)
            }
            "inspect" | "show" => act(TicketAction::Inspect, &rest, "inspect")?,
            "close" => act(TicketAction::Close, &rest, "close")?,
            "delete" => act(TicketAction::Delete, &rest, "delete")?,
            "confirm" | "yes" => Self::Confirm,
            "cancel" | "no" => Self::Cancel,
            "back" => Self::Back,
            "refresh" => Self::Refresh,
            "counts" => Self::Counts,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn first<'a>(rest: &[&'a str], command: &'static str) -> Result<&'a str, CommandError> {
    rest.first()
        .copied()
        .ok_or(CommandError::MissingArgument(command))
}

fn invalid(field: &'static str, value: &str) -> CommandError {
    CommandError::InvalidValue {
        field,
        value: value.to_string(),
    }
}

fn act(
    action: TicketAction,
    rest: &[&str],
    command: &'static str,
) -> Result<ConsoleCommand, CommandError> {
    Ok(ConsoleCommand::Act {
        action,
        ticket_id: TicketId::new(first(rest, command)?),
    })
}

/// Words without `=` continue the previous value, so `message=refund please`
/// searches for "refund please".
fn parse_filter(words: &[&str]) -> Result<TicketFilter, CommandError> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for word in words {
        match word.split_once('=') {
            Some((key, value)) => pairs.push((key.to_ascii_lowercase(), value.to_string())),
            None => match pairs.last_mut() {
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(word);
                }
                None => return Err(CommandError::UnknownFilterKey(word.to_string())),
            },
        }
    }

    let mut filter = TicketFilter::identity();
    for (key, value) in pairs {
        match key.as_str() {
            "status" => {
                filter.status = Some(
                    value
                        .parse::<TicketStatus>()
                        .map_err(|_| invalid("status", &value))?,
                )
            }
            "author" => filter.author = Some(value),
            "message" | "msg" => filter.message = Some(value),
            "from" => filter.start_date = Some(parse_date("from", &value)?),
            "to" => filter.end_date = Some(parse_date("to", &value)?),
            _ => return Err(CommandError::UnknownFilterKey(key)),
        }
    }

    if filter.is_identity() {
        return Err(CommandError::EmptyFilter);
    }
    Ok(filter)
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, CommandError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid(field, value))
}
