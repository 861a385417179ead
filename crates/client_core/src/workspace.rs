//! Ticket workspace orchestration.
//!
//! `TicketWorkspace` owns the filter, pagination, counts and selection state
//! and sequences directory calls against them. Local state changes happen
//! under a single lock that is never held across a directory call, so each
//! handler is atomic with respect to the others. Page, counts and detail
//! fetches carry a generation tag; a response whose tag is no longer current
//! is dropped.

use std::sync::Arc;

use shared::{
    domain::TicketId,
    protocol::{Message, Ticket, TicketPage},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    counts::CountAggregate,
    directory::TicketDirectory,
    error::{DirectoryError, SelectionError, WorkspaceError},
    filter::{FilterState, TicketFilter, TicketQuery},
    notify::{Notification, Notifier, Severity},
    pagination::{PageSize, PaginationState, DEFAULT_PAGE_SIZE},
    selection::{Selection, TicketAction},
};

/// A remote value that is either still being fetched or known.
#[derive(Debug, Clone, PartialEq)]
pub enum Loadable<T> {
    Loading,
    Ready(T),
}

impl<T> Loadable<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Loading => None,
            Self::Ready(value) => Some(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceSettings {
    pub default_page_size: PageSize,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// How a fetch ended from the workspace's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// The directory call failed; the affected state was emptied.
    Failed,
    /// A newer request was issued before this one resolved.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(Ticket),
    Failed,
}

/// Ticket page fetch tagged with the generation it was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub generation: u64,
    pub query: TicketQuery,
}

/// Read-only copy of the workspace for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceSnapshot {
    pub filter: TicketFilter,
    pub pagination: PaginationState,
    pub counts: CountAggregate,
    pub page: Loadable<TicketPage>,
    pub selection: Selection,
    /// Context messages of the inspected ticket, when one is inspected.
    pub details: Option<Loadable<Vec<Message>>>,
}

impl WorkspaceSnapshot {
    pub fn visible_tickets(&self) -> Option<&[Ticket]> {
        self.page.ready().map(|page| page.tickets.as_slice())
    }

    pub fn total_tickets(&self) -> Option<u64> {
        self.page.ready().map(|page| page.ticket_count)
    }

    pub fn find_ticket(&self, ticket_id: &TicketId) -> Option<&Ticket> {
        self.visible_tickets()?
            .iter()
            .find(|ticket| &ticket.id == ticket_id)
    }
}

#[derive(Debug, Clone)]
struct WorkspaceState {
    filter: FilterState,
    pagination: PaginationState,
    counts: CountAggregate,
    page: Loadable<TicketPage>,
    selection: Selection,
    details: Option<Loadable<Vec<Message>>>,
    page_generation: u64,
    counts_generation: u64,
    details_generation: u64,
}

impl WorkspaceState {
    fn new(settings: WorkspaceSettings) -> Self {
        Self {
            filter: FilterState::default(),
            pagination: PaginationState::new(settings.default_page_size),
            counts: CountAggregate::zeroed(),
            page: Loadable::Loading,
            selection: Selection::Idle,
            details: None,
            page_generation: 0,
            counts_generation: 0,
            details_generation: 0,
        }
    }

    fn snapshot(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            filter: self.filter.current().clone(),
            pagination: self.pagination,
            counts: self.counts.clone(),
            page: self.page.clone(),
            selection: self.selection.clone(),
            details: self.details.clone(),
        }
    }

    fn apply_filter(&mut self, filter: TicketFilter) {
        self.filter.apply(filter);
        self.pagination.reset();
    }

    fn reset_filter(&mut self) {
        self.filter.reset();
        self.pagination.reset();
    }

    /// Supersedes any outstanding page fetch and marks the page unknown.
    fn begin_page_fetch(&mut self) -> PageRequest {
        self.page_generation += 1;
        self.page = Loadable::Loading;
        PageRequest {
            generation: self.page_generation,
            query: self
                .filter
                .current()
                .to_query(self.pagination.page(), self.pagination.page_size()),
        }
    }

    /// Returns `None` when the response belongs to a superseded request.
    fn complete_page_fetch(
        &mut self,
        generation: u64,
        result: Result<TicketPage, DirectoryError>,
    ) -> Option<Result<(), DirectoryError>> {
        if generation != self.page_generation {
            return None;
        }
        match result {
            Ok(page) => {
                self.page = Loadable::Ready(page);
                Some(Ok(()))
            }
            Err(error) => {
                self.page = Loadable::Ready(TicketPage::default());
                Some(Err(error))
            }
        }
    }

    fn begin_details_fetch(&mut self) -> u64 {
        self.details_generation += 1;
        self.details = Some(Loadable::Loading);
        self.details_generation
    }

    fn clear_details(&mut self) {
        self.details_generation += 1;
        self.details = None;
    }
}

pub struct TicketWorkspace {
    directory: Arc<dyn TicketDirectory>,
    notifier: Arc<dyn Notifier>,
    inner: Mutex<WorkspaceState>,
}

impl TicketWorkspace {
    pub fn new(
        directory: Arc<dyn TicketDirectory>,
        notifier: Arc<dyn Notifier>,
        settings: WorkspaceSettings,
    ) -> Self {
        Self {
            directory,
            notifier,
            inner: Mutex::new(WorkspaceState::new(settings)),
        }
    }

    pub async fn snapshot(&self) -> WorkspaceSnapshot {
        self.inner.lock().await.snapshot()
    }

    /// Seeds the counts and loads the first page concurrently. Each side
    /// fails on its own.
    pub async fn initial_load(&self) -> (FetchOutcome, FetchOutcome) {
        tokio::join!(self.refresh_counts(), self.refresh_page())
    }

    pub async fn apply_filter(&self, filter: TicketFilter) -> FetchOutcome {
        let request = {
            let mut guard = self.inner.lock().await;
            guard.apply_filter(filter);
            guard.begin_page_fetch()
        };
        self.fetch_page(request).await
    }

    pub async fn reset_filter(&self) -> FetchOutcome {
        let request = {
            let mut guard = self.inner.lock().await;
            guard.reset_filter();
            guard.begin_page_fetch()
        };
        self.fetch_page(request).await
    }

    pub async fn change_page(&self, page: u32, page_size: PageSize) -> FetchOutcome {
        let request = {
            let mut guard = self.inner.lock().await;
            guard.pagination.on_change(page, page_size);
            guard.begin_page_fetch()
        };
        self.fetch_page(request).await
    }

    /// Reloads the current page with the filter and pagination unchanged.
    pub async fn refresh_page(&self) -> FetchOutcome {
        let request = self.inner.lock().await.begin_page_fetch();
        self.fetch_page(request).await
    }

    async fn fetch_page(&self, request: PageRequest) -> FetchOutcome {
        debug!(generation = request.generation, query = ?request.query, "fetching ticket page");
        let result = self.directory.list_tickets(&request.query).await;
        let completion = self
            .inner
            .lock()
            .await
            .complete_page_fetch(request.generation, result);

        match completion {
            None => {
                debug!(generation = request.generation, "discarding stale ticket page");
                FetchOutcome::Stale
            }
            Some(Ok(())) => FetchOutcome::Applied,
            Some(Err(error)) => {
                warn!(generation = request.generation, %error, "ticket page fetch failed");
                self.notifier.error(format!(
                    "An error occurred while fetching tickets: {}",
                    error.user_message()
                ));
                FetchOutcome::Failed
            }
        }
    }

    /// Re-seeds the counts from the directory. On failure every count drops
    /// to zero.
    pub async fn refresh_counts(&self) -> FetchOutcome {
        let generation = {
            let mut guard = self.inner.lock().await;
            guard.counts_generation += 1;
            guard.counts_generation
        };

        let result = self.directory.counts_by_status().await;

        let mut guard = self.inner.lock().await;
        if generation != guard.counts_generation {
            debug!(generation, "discarding stale ticket counts");
            return FetchOutcome::Stale;
        }
        match result {
            Ok(remote) => {
                guard.counts = CountAggregate::from_remote(&remote);
                FetchOutcome::Applied
            }
            Err(error) => {
                guard.counts = CountAggregate::zeroed();
                drop(guard);
                warn!(%error, "ticket counts fetch failed");
                self.notifier.error(format!(
                    "An error occurred while fetching ticket counts: {}",
                    error.user_message()
                ));
                FetchOutcome::Failed
            }
        }
    }

    /// Finds a ticket on the loaded page, or asks the directory for it.
    pub async fn locate(&self, ticket_id: &TicketId) -> Result<Ticket, WorkspaceError> {
        let loaded = self
            .inner
            .lock()
            .await
            .page
            .ready()
            .and_then(|page| page.tickets.iter().find(|ticket| &ticket.id == ticket_id).cloned());
        if let Some(ticket) = loaded {
            return Ok(ticket);
        }
        debug!(%ticket_id, "ticket not on loaded page; fetching");
        Ok(self.directory.get_ticket(ticket_id).await?)
    }

    /// Starts `action` on `ticket`. Inspecting loads the ticket's context
    /// messages; close and delete wait for [`TicketWorkspace::confirm`]. A
    /// close or delete requested from the details view leaves it first.
    pub async fn request(&self, ticket: Ticket, action: TicketAction) -> Result<(), SelectionError> {
        let inspect = {
            let mut guard = self.inner.lock().await;
            let from_details = matches!(guard.selection, Selection::Inspecting(_));
            if from_details && action.requires_confirmation() && action.is_available_for(ticket.status) {
                guard.selection.close_details();
                guard.clear_details();
            }
            guard.selection.request(ticket.clone(), action)?;
            match action {
                TicketAction::Inspect => Some(guard.begin_details_fetch()),
                TicketAction::Close | TicketAction::Delete => None,
            }
        };

        if let Some(generation) = inspect {
            self.load_details(&ticket.id, generation).await;
        }
        Ok(())
    }

    /// Re-reads the inspected ticket and its context messages.
    pub async fn refresh_details(&self) -> FetchOutcome {
        let (ticket_id, generation) = {
            let mut guard = self.inner.lock().await;
            let Selection::Inspecting(ticket) = &guard.selection else {
                return FetchOutcome::Stale;
            };
            let ticket_id = ticket.id.clone();
            (ticket_id, guard.begin_details_fetch())
        };

        match self.directory.get_ticket(&ticket_id).await {
            Ok(fresh) => {
                let mut guard = self.inner.lock().await;
                if guard.details_generation == generation {
                    if let Selection::Inspecting(current) = &mut guard.selection {
                        *current = fresh;
                    }
                }
            }
            Err(error) => {
                warn!(%ticket_id, %error, "ticket refresh failed");
                self.notifier.emit(Notification::alert(
                    Severity::Warning,
                    format!("Could not refresh ticket {ticket_id}: {}", error.user_message()),
                ));
            }
        }

        self.load_details(&ticket_id, generation).await
    }

    async fn load_details(&self, ticket_id: &TicketId, generation: u64) -> FetchOutcome {
        let result = self.directory.ticket_messages(ticket_id).await;

        let mut guard = self.inner.lock().await;
        if guard.details_generation != generation {
            debug!(%ticket_id, generation, "discarding stale ticket messages");
            return FetchOutcome::Stale;
        }
        match result {
            Ok(messages) => {
                guard.details = Some(Loadable::Ready(messages));
                FetchOutcome::Applied
            }
            Err(error) => {
                warn!(%ticket_id, %error, "ticket context messages fetch failed");
                guard.details = Some(Loadable::Ready(Vec::new()));
                FetchOutcome::Failed
            }
        }
    }

    pub async fn close_details(&self) {
        let mut guard = self.inner.lock().await;
        guard.selection.close_details();
        if guard.selection.is_idle() {
            guard.clear_details();
        }
    }

    pub async fn cancel(&self) {
        let mut guard = self.inner.lock().await;
        guard.selection.cancel();
        guard.clear_details();
    }

    /// Runs the pending close or delete. The selection returns to idle before
    /// the directory is called; a failure is reported through the notifier
    /// and leaves counts and the page untouched.
    pub async fn confirm(&self) -> Result<TransitionOutcome, SelectionError> {
        let (ticket, action) = self.inner.lock().await.selection.confirm()?;
        let from = ticket.status;
        let Some(to) = action.target_status() else {
            return Err(SelectionError::NothingPending);
        };

        let result = match action {
            TicketAction::Close => self.directory.close_ticket(&ticket.id).await,
            TicketAction::Delete => self.directory.remove_ticket(&ticket.id).await,
            TicketAction::Inspect => return Err(SelectionError::NothingPending),
        };

        match result {
            Ok(updated) => {
                let request = {
                    let mut guard = self.inner.lock().await;
                    guard.counts = guard.counts.transition(from, to);
                    guard.begin_page_fetch()
                };
                info!(ticket_id = %ticket.id, %action, %from, %to, "ticket transition applied");
                self.notifier.success(format!(
                    "Ticket {} {} successfully.",
                    ticket.id,
                    action.past_tense()
                ));
                self.fetch_page(request).await;
                Ok(TransitionOutcome::Applied(updated))
            }
            Err(error) => {
                warn!(ticket_id = %ticket.id, %action, %error, "ticket transition failed");
                self.notifier.error(format!(
                    "An error occurred while trying to {action} ticket {}: {}",
                    ticket.id,
                    error.user_message()
                ));
                Ok(TransitionOutcome::Failed)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/workspace_tests.rs"]
mod tests;
