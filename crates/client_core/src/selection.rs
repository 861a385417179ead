//! Ticket focus and the pending-confirmation state machine.

use std::fmt;

use shared::{domain::TicketStatus, protocol::Ticket};

use crate::error::SelectionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TicketAction {
    Inspect,
    Close,
    Delete,
}

impl TicketAction {
    pub const ALL: [TicketAction; 3] = [Self::Inspect, Self::Close, Self::Delete];

    /// Whether the action is offered for a ticket in `status`.
    pub fn is_available_for(self, status: TicketStatus) -> bool {
        match self {
            Self::Inspect => true,
            Self::Close => status == TicketStatus::Open,
            Self::Delete => status != TicketStatus::Removed,
        }
    }

    /// Status a confirmed action moves the ticket into.
    pub fn target_status(self) -> Option<TicketStatus> {
        match self {
            Self::Inspect => None,
            Self::Close => Some(TicketStatus::Closed),
            Self::Delete => Some(TicketStatus::Removed),
        }
    }

    pub fn requires_confirmation(self) -> bool {
        self.target_status().is_some()
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Inspect => "inspected",
            Self::Close => "closed",
            Self::Delete => "deleted",
        }
    }
}

impl fmt::Display for TicketAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inspect => "inspect",
            Self::Close => "close",
            Self::Delete => "delete",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Selection {
    #[default]
    Idle,
    Inspecting(Ticket),
    PendingConfirmation {
        ticket: Ticket,
        action: TicketAction,
    },
}

impl Selection {
    pub fn ticket(&self) -> Option<&Ticket> {
        match self {
            Self::Idle => None,
            Self::Inspecting(ticket) | Self::PendingConfirmation { ticket, .. } => Some(ticket),
        }
    }

    pub fn action(&self) -> Option<TicketAction> {
        match self {
            Self::Idle => None,
            Self::Inspecting(_) => Some(TicketAction::Inspect),
            Self::PendingConfirmation { action, .. } => Some(*action),
        }
    }

    /// A dialog or detail view is shown iff both a ticket and an action are set.
    pub fn dialog_visible(&self) -> bool {
        self.ticket().is_some() && self.action().is_some()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Enters `Inspecting` or `PendingConfirmation` from `Idle`. The ticket is
    /// not touched until the action is confirmed.
    pub fn request(&mut self, ticket: Ticket, action: TicketAction) -> Result<(), SelectionError> {
        if !self.is_idle() {
            return Err(SelectionError::Busy);
        }
        if !action.is_available_for(ticket.status) {
            return Err(SelectionError::ActionUnavailable {
                ticket_id: ticket.id,
                action,
                status: ticket.status,
            });
        }

        *self = match action {
            TicketAction::Inspect => Self::Inspecting(ticket),
            TicketAction::Close | TicketAction::Delete => {
                Self::PendingConfirmation { ticket, action }
            }
        };
        Ok(())
    }

    /// Takes the pending action and returns to `Idle` whatever its outcome.
    pub fn confirm(&mut self) -> Result<(Ticket, TicketAction), SelectionError> {
        match std::mem::take(self) {
            Self::PendingConfirmation { ticket, action } => Ok((ticket, action)),
            other => {
                *self = other;
                Err(SelectionError::NothingPending)
            }
        }
    }

    /// Leaves either state without side effects.
    pub fn cancel(&mut self) {
        *self = Self::Idle;
    }

    /// Closes the detail view; pending confirmations are left alone.
    pub fn close_details(&mut self) {
        if matches!(self, Self::Inspecting(_)) {
            *self = Self::Idle;
        }
    }
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;
