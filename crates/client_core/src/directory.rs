//! Remote ticket directory: the trait the workspace talks to and its HTTP
//! implementation.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::TicketId,
    error::ApiError,
    protocol::{Message, StatusCounts, Ticket, TicketPage},
};
use tracing::debug;
use url::Url;

use crate::{error::DirectoryError, filter::TicketQuery};

#[async_trait]
pub trait TicketDirectory: Send + Sync {
    async fn list_tickets(&self, query: &TicketQuery) -> Result<TicketPage, DirectoryError>;
    async fn counts_by_status(&self) -> Result<StatusCounts, DirectoryError>;
    async fn get_ticket(&self, ticket_id: &TicketId) -> Result<Ticket, DirectoryError>;
    /// Context messages of a ticket, most recent first.
    async fn ticket_messages(&self, ticket_id: &TicketId) -> Result<Vec<Message>, DirectoryError>;
    /// Only valid for open tickets.
    async fn close_ticket(&self, ticket_id: &TicketId) -> Result<Ticket, DirectoryError>;
    async fn remove_ticket(&self, ticket_id: &TicketId) -> Result<Ticket, DirectoryError>;
}

/// Directory reached over the `/tickets` REST API.
pub struct HttpTicketDirectory {
    http: Client,
    tickets_url: Url,
}

impl HttpTicketDirectory {
    /// `base_url` is the API root, e.g. `http://127.0.0.1:5001/api/v1`.
    pub fn new(base_url: &str) -> Result<Self, DirectoryError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, DirectoryError> {
        let mut tickets_url = Url::parse(base_url.trim())?;
        tickets_url
            .path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push("tickets");
        Ok(Self { http, tickets_url })
    }

    /// Appends `segments` to the tickets root, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.tickets_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    fn ticket_url(&self, ticket_id: &TicketId) -> Url {
        self.endpoint(&[ticket_id.as_str()])
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, DirectoryError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::from_body(status.as_u16(), &body).into());
    }
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl TicketDirectory for HttpTicketDirectory {
    async fn list_tickets(&self, query: &TicketQuery) -> Result<TicketPage, DirectoryError> {
        let pairs = query.to_pairs();
        debug!(?pairs, "listing tickets");
        let response = self
            .http
            .get(self.endpoint(&[""]))
            .query(&pairs)
            .send()
            .await?;
        decode(response).await
    }

    async fn counts_by_status(&self) -> Result<StatusCounts, DirectoryError> {
        let response = self
            .http
            .get(self.endpoint(&["counts"]))
            .send()
            .await?;
        decode(response).await
    }

    async fn get_ticket(&self, ticket_id: &TicketId) -> Result<Ticket, DirectoryError> {
        let response = self.http.get(self.ticket_url(ticket_id)).send().await?;
        decode(response).await
    }

    async fn ticket_messages(&self, ticket_id: &TicketId) -> Result<Vec<Message>, DirectoryError> {
        let response = self
            .http
            .get(self.endpoint(&[ticket_id.as_str(), "messages"]))
            .send()
            .await?;
        decode(response).await
    }

    async fn close_ticket(&self, ticket_id: &TicketId) -> Result<Ticket, DirectoryError> {
        let response = self.http.put(self.ticket_url(ticket_id)).send().await?;
        decode(response).await
    }

    async fn remove_ticket(&self, ticket_id: &TicketId) -> Result<Ticket, DirectoryError> {
        let response = self.http.delete(self.ticket_url(ticket_id)).send().await?;
        decode(response).await
    }
}

#[cfg(test)]
#[path = "tests/directory_tests.rs"]
mod tests;
