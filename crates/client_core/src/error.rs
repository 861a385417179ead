use shared::{
    domain::{TicketId, TicketStatus},
    error::ApiError,
};
use thiserror::Error;

use crate::selection::TicketAction;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("ticket directory unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("malformed directory response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid directory url: {0}")]
    Url(#[from] url::ParseError),
}

impl DirectoryError {
    /// One-line description suitable for a user-facing alert.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(api) => api.message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("{action} is not available for ticket {ticket_id} with status {status}")]
    ActionUnavailable {
        ticket_id: TicketId,
        action: TicketAction,
        status: TicketStatus,
    },
    #[error("another ticket action is already in progress")]
    Busy,
    #[error("no ticket action is awaiting confirmation")]
    NothingPending,
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}
