use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{AuthorId, ChannelId, MessageId, TicketId, TicketStatus},
    timestamp,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: AuthorId,
    pub name: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub discriminator: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_channel_id: Option<ChannelId>,
    #[serde(default)]
    pub community_server_id: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub has_attachment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_msg_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discussion_id: Option<String>,
    pub content: String,
    pub msg_url: String,
    pub author: Author,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub msg_id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<Message>,
    pub status: TicketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub ts_last_status_change: Option<DateTime<Utc>>,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub context_messages: Vec<MessageId>,
}

impl Ticket {
    /// Falls back to the creation time for tickets that never changed status.
    pub fn last_status_change(&self) -> DateTime<Utc> {
        self.ts_last_status_change.unwrap_or(self.timestamp)
    }

    pub fn author_name(&self) -> Option<&str> {
        self.msg.as_ref().map(|msg| msg.author.name.as_str())
    }

    pub fn content(&self) -> Option<&str> {
        self.msg.as_ref().map(|msg| msg.content.as_str())
    }
}

/// One page of a ticket listing together with the size of the whole result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketPage {
    #[serde(rename = "ticketCount")]
    pub ticket_count: u64,
    pub tickets: Vec<Ticket>,
}

/// Raw per-status totals keyed by the wire status name.
pub type StatusCounts = BTreeMap<String, u64>;
