use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex as StdMutex,
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shared::{
    domain::{AuthorId, ChannelId, MessageId, TicketStatus},
    error::ApiError,
    protocol::{Author, StatusCounts},
};
use tokio::sync::{mpsc, oneshot};

use super::*;

fn ticket(id: &str, status: TicketStatus) -> Ticket {
    Ticket {
        id: TicketId::new(id),
        msg_id: MessageId::new(format!("m-{id}")),
        msg: None,
        status,
        resolved_by: None,
        ts_last_status_change: None,
        timestamp: Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
        context_messages: vec![MessageId::new(format!("m-{id}"))],
    }
}

fn message(id: &str) -> Message {
    Message {
        id: MessageId::new(id),
        channel_id: ChannelId::new("c1"),
        parent_channel_id: None,
        community_server_id: "s1".to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap(),
        has_attachment: false,
        reference_msg_id: None,
        discussion_id: None,
        content: format!("content of {id}"),
        msg_url: format!("https://chat.example/{id}"),
        author: Author {
            id: AuthorId::new("a1"),
            name: "ada".to_string(),
            nickname: String::new(),
            color: String::new(),
            discriminator: String::new(),
            avatar_url: String::new(),
            is_bot: false,
        },
    }
}

fn page_of(ids: &[&str], total: u64) -> TicketPage {
    TicketPage {
        ticket_count: total,
        tickets: ids
            .iter()
            .map(|id| ticket(id, TicketStatus::Open))
            .collect(),
    }
}

fn counts(open: u64, closed: u64, removed: u64) -> StatusCounts {
    [
        ("open".to_string(), open),
        ("closed".to_string(), closed),
        ("removed".to_string(), removed),
    ]
    .into_iter()
    .collect()
}

fn unavailable() -> DirectoryError {
    DirectoryError::Api(ApiError::new(503, "directory unavailable"))
}

#[derive(Default)]
struct FakeDirectory {
    page: Mutex<Option<TicketPage>>,
    counts: Mutex<Option<StatusCounts>>,
    messages: Mutex<Option<Vec<Message>>>,
    commands_fail: Mutex<bool>,
    gates: Mutex<HashMap<u32, oneshot::Receiver<TicketPage>>>,
    started: Mutex<Option<mpsc::UnboundedSender<u32>>>,
    counts_gates: Mutex<VecDeque<oneshot::Receiver<StatusCounts>>>,
    counts_started: Mutex<Option<mpsc::UnboundedSender<()>>>,
    message_gates: Mutex<HashMap<String, oneshot::Receiver<Vec<Message>>>>,
    messages_started: Mutex<Option<mpsc::UnboundedSender<String>>>,
    list_calls: Mutex<Vec<TicketQuery>>,
    command_calls: Mutex<Vec<(TicketAction, TicketId)>>,
    get_calls: Mutex<u32>,
}

impl FakeDirectory {
    fn healthy(page: TicketPage, seeded: StatusCounts) -> Self {
        Self {
            page: Mutex::new(Some(page)),
            counts: Mutex::new(Some(seeded)),
            messages: Mutex::new(Some(vec![message("m2"), message("m1")])),
            ..Self::default()
        }
    }

    async fn list_calls(&self) -> Vec<TicketQuery> {
        self.list_calls.lock().await.clone()
    }

    async fn command_calls(&self) -> Vec<(TicketAction, TicketId)> {
        self.command_calls.lock().await.clone()
    }

    async fn command(&self, action: TicketAction, ticket_id: &TicketId) -> Result<Ticket, DirectoryError> {
        self.command_calls
            .lock()
            .await
            .push((action, ticket_id.clone()));
        if *self.commands_fail.lock().await {
            return Err(unavailable());
        }
        let status = action.target_status().unwrap_or(TicketStatus::Open);
        Ok(ticket(ticket_id.as_str(), status))
    }
}

#[async_trait]
impl TicketDirectory for FakeDirectory {
    async fn list_tickets(&self, query: &TicketQuery) -> Result<TicketPage, DirectoryError> {
        self.list_calls.lock().await.push(query.clone());
        let gate = self.gates.lock().await.remove(&query.page);
        if let Some(started) = self.started.lock().await.as_ref() {
            let _ = started.send(query.page);
        }
        if let Some(gate) = gate {
            return gate.await.map_err(|_| unavailable());
        }
        self.page.lock().await.clone().ok_or_else(unavailable)
    }

    async fn counts_by_status(&self) -> Result<StatusCounts, DirectoryError> {
        let gate = self.counts_gates.lock().await.pop_front();
        if let Some(started) = self.counts_started.lock().await.as_ref() {
            let _ = started.send(());
        }
        if let Some(gate) = gate {
            return gate.await.map_err(|_| unavailable());
        }
        self.counts.lock().await.clone().ok_or_else(unavailable)
    }

    async fn get_ticket(&self, ticket_id: &TicketId) -> Result<Ticket, DirectoryError> {
        *self.get_calls.lock().await += 1;
        if ticket_id.as_str() == "missing" {
            return Err(DirectoryError::Api(ApiError::new(404, "Ticket with ID missing does not exist.")));
        }
        let mut fresh = ticket(ticket_id.as_str(), TicketStatus::Open);
        fresh.resolved_by = Some("moderator".to_string());
        Ok(fresh)
    }

    async fn ticket_messages(&self, ticket_id: &TicketId) -> Result<Vec<Message>, DirectoryError> {
        let gate = self.message_gates.lock().await.remove(ticket_id.as_str());
        if let Some(started) = self.messages_started.lock().await.as_ref() {
            let _ = started.send(ticket_id.as_str().to_string());
        }
        if let Some(gate) = gate {
            return gate.await.map_err(|_| unavailable());
        }
        self.messages.lock().await.clone().ok_or_else(unavailable)
    }

    async fn close_ticket(&self, ticket_id: &TicketId) -> Result<Ticket, DirectoryError> {
        self.command(TicketAction::Close, ticket_id).await
    }

    async fn remove_ticket(&self, ticket_id: &TicketId) -> Result<Ticket, DirectoryError> {
        self.command(TicketAction::Delete, ticket_id).await
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: StdMutex<Vec<Notification>>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn emit(&self, notification: Notification) {
        self.sent.lock().expect("notifier lock").push(notification);
    }
}

fn workspace(
    directory: &Arc<FakeDirectory>,
    notifier: &Arc<RecordingNotifier>,
    default_page_size: PageSize,
) -> TicketWorkspace {
    TicketWorkspace::new(
        directory.clone(),
        notifier.clone(),
        WorkspaceSettings { default_page_size },
    )
}

#[tokio::test]
async fn initial_load_shows_first_page_and_total() {
    let directory = Arc::new(FakeDirectory::healthy(
        page_of(&["t1", "t2", "t3", "t4", "t5"], 12),
        counts(9, 3, 0),
    ));
    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = workspace(&directory, &notifier, PageSize::Fixed(5));

    assert!(workspace.snapshot().await.page.is_loading());

    let (counts_outcome, page_outcome) = workspace.initial_load().await;
    assert_eq!(counts_outcome, FetchOutcome::Applied);
    assert_eq!(page_outcome, FetchOutcome::Applied);

    let snapshot = workspace.snapshot().await;
    assert_eq!(snapshot.visible_tickets().map(<[Ticket]>::len), Some(5));
    assert_eq!(snapshot.total_tickets(), Some(12));
    assert_eq!(snapshot.pagination.page_count(12), 3);
    assert_eq!(snapshot.counts.get(TicketStatus::Open), 9);

    let calls = directory.list_calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].page, 0);
    assert_eq!(calls[0].page_size, 5);
    assert_eq!(calls[0].status, None);
    assert!(notifier.sent().is_empty(), "successful fetches are silent");
}

#[tokio::test]
async fn counts_failure_does_not_block_ticket_list() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t1"], 1), counts(1, 0, 0)));
    *directory.counts.lock().await = None;
    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = workspace(&directory, &notifier, PageSize::Fixed(20));

    let (counts_outcome, page_outcome) = workspace.initial_load().await;

    assert_eq!(counts_outcome, FetchOutcome::Failed);
    assert_eq!(page_outcome, FetchOutcome::Applied);
    let snapshot = workspace.snapshot().await;
    assert_eq!(snapshot.counts, CountAggregate::zeroed());
    assert_eq!(snapshot.total_tickets(), Some(1));

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].severity, Severity::Error);
}

#[tokio::test]
async fn page_failure_settles_on_empty_list() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&[], 0), counts(4, 1, 0)));
    *directory.page.lock().await = None;
    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = workspace(&directory, &notifier, PageSize::Fixed(20));

    let (counts_outcome, page_outcome) = workspace.initial_load().await;

    assert_eq!(counts_outcome, FetchOutcome::Applied);
    assert_eq!(page_outcome, FetchOutcome::Failed);
    let snapshot = workspace.snapshot().await;
    assert_eq!(snapshot.page, Loadable::Ready(TicketPage::default()));
    assert_eq!(snapshot.counts.get(TicketStatus::Open), 4);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].severity, Severity::Error);
    assert!(sent[0].message.contains("directory unavailable"));
}

#[tokio::test]
async fn every_filter_change_resets_pagination() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t1"], 40), counts(1, 0, 0)));
    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = workspace(&directory, &notifier, PageSize::Fixed(5));

    for mask in 0u8..32 {
        let filter = TicketFilter {
            status: (mask & 1 != 0).then_some(TicketStatus::Closed),
            author: (mask & 2 != 0).then(|| "ada".to_string()),
            message: (mask & 4 != 0).then(|| "refund".to_string()),
            start_date: (mask & 8 != 0).then(|| chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            end_date: (mask & 16 != 0).then(|| chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()),
        };

        workspace.change_page(0, PageSize::Fixed(10)).await;
        workspace.change_page(3, PageSize::Fixed(10)).await;
        let before = directory.list_calls().await.len();

        workspace.apply_filter(filter.clone()).await;

        let calls = directory.list_calls().await;
        assert_eq!(calls.len(), before + 1, "exactly one fetch for mask {mask}");
        let snapshot = workspace.snapshot().await;
        assert_eq!(snapshot.filter, filter);
        assert_eq!(snapshot.pagination.page(), 0);
        assert_eq!(snapshot.pagination.page_size(), PageSize::Fixed(5));
        let last = calls.last().expect("fetch issued");
        assert_eq!((last.page, last.page_size), (0, 5));
    }
}

#[tokio::test]
async fn page_size_change_returns_to_first_page() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t1"], 40), counts(1, 0, 0)));
    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = workspace(&directory, &notifier, PageSize::Fixed(5));

    workspace.change_page(4, PageSize::Fixed(5)).await;
    assert_eq!(workspace.snapshot().await.pagination.page(), 4);

    workspace.change_page(4, PageSize::All).await;

    let snapshot = workspace.snapshot().await;
    assert_eq!(snapshot.pagination.page(), 0);
    assert_eq!(snapshot.pagination.page_size(), PageSize::All);
    let last = directory.list_calls().await.pop().expect("fetch issued");
    assert_eq!((last.page, last.page_size), (0, 0));
}

#[tokio::test]
async fn reset_twice_matches_reset_once() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t1"], 1), counts(1, 0, 0)));
    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = workspace(&directory, &notifier, PageSize::Fixed(20));

    workspace
        .apply_filter(TicketFilter {
            author: Some("ada".to_string()),
            ..TicketFilter::default()
        })
        .await;
    workspace.change_page(2, PageSize::Fixed(20)).await;

    workspace.reset_filter().await;
    let once = workspace.snapshot().await;
    workspace.reset_filter().await;
    let twice = workspace.snapshot().await;

    assert_eq!(once, twice);
    assert!(twice.filter.is_identity());
    assert_eq!(twice.pagination.page(), 0);
}

#[tokio::test]
async fn late_response_from_superseded_fetch_is_discarded() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t1"], 1), counts(1, 0, 0)));
    let (first_tx, first_rx) = oneshot::channel();
    let (second_tx, second_rx) = oneshot::channel();
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    directory.gates.lock().await.insert(1, first_rx);
    directory.gates.lock().await.insert(2, second_rx);
    *directory.started.lock().await = Some(started_tx);

    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = Arc::new(workspace(&directory, &notifier, PageSize::Fixed(5)));

    let first = tokio::spawn({
        let workspace = Arc::clone(&workspace);
        async move { workspace.change_page(1, PageSize::Fixed(5)).await }
    });
    assert_eq!(started_rx.recv().await, Some(1));

    let second = tokio::spawn({
        let workspace = Arc::clone(&workspace);
        async move { workspace.change_page(2, PageSize::Fixed(5)).await }
    });
    assert_eq!(started_rx.recv().await, Some(2));
    assert!(workspace.snapshot().await.page.is_loading());

    second_tx
        .send(page_of(&["from-second"], 11))
        .expect("second response");
    assert_eq!(second.await.expect("second task"), FetchOutcome::Applied);

    first_tx
        .send(page_of(&["from-first"], 11))
        .expect("first response");
    assert_eq!(first.await.expect("first task"), FetchOutcome::Stale);

    let snapshot = workspace.snapshot().await;
    let visible: Vec<&str> = snapshot
        .visible_tickets()
        .expect("page loaded")
        .iter()
        .map(|ticket| ticket.id.as_str())
        .collect();
    assert_eq!(visible, vec!["from-second"]);
    assert_eq!(snapshot.pagination.page(), 2);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn confirmed_close_refetches_and_moves_counts() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t1", "t2"], 12), counts(5, 2, 1)));
    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = workspace(&directory, &notifier, PageSize::Fixed(5));
    workspace.initial_load().await;
    workspace.change_page(1, PageSize::Fixed(5)).await;
    let calls_before = directory.list_calls().await.len();

    workspace
        .request(ticket("t1", TicketStatus::Open), TicketAction::Close)
        .await
        .expect("close request");
    assert!(directory.command_calls().await.is_empty(), "nothing runs before confirm");
    assert!(workspace.snapshot().await.selection.dialog_visible());

    let outcome = workspace.confirm().await.expect("confirm");

    match outcome {
        TransitionOutcome::Applied(updated) => assert_eq!(updated.status, TicketStatus::Closed),
        TransitionOutcome::Failed => panic!("close should succeed"),
    }
    assert_eq!(
        directory.command_calls().await,
        vec![(TicketAction::Close, TicketId::new("t1"))]
    );

    let calls = directory.list_calls().await;
    assert_eq!(calls.len(), calls_before + 1, "one refetch");
    let refetch = calls.last().expect("refetch");
    assert_eq!((refetch.page, refetch.page_size), (1, 5));

    let snapshot = workspace.snapshot().await;
    assert_eq!(snapshot.counts.get(TicketStatus::Open), 4);
    assert_eq!(snapshot.counts.get(TicketStatus::Closed), 3);
    assert_eq!(snapshot.counts.get(TicketStatus::Removed), 1);
    assert!(snapshot.selection.is_idle());

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].severity, Severity::Success);
    assert!(sent[0].message.contains("t1"));
}

#[tokio::test]
async fn failed_close_reports_once_and_changes_nothing() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t1"], 1), counts(5, 2, 0)));
    *directory.commands_fail.lock().await = true;
    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = workspace(&directory, &notifier, PageSize::Fixed(5));
    workspace.initial_load().await;
    let calls_before = directory.list_calls().await.len();
    let counts_before = workspace.snapshot().await.counts;

    workspace
        .request(ticket("t1", TicketStatus::Open), TicketAction::Close)
        .await
        .expect("close request");
    let outcome = workspace.confirm().await.expect("confirm");

    assert_eq!(outcome, TransitionOutcome::Failed);
    assert_eq!(directory.list_calls().await.len(), calls_before, "no refetch");
    let snapshot = workspace.snapshot().await;
    assert_eq!(snapshot.counts, counts_before);
    assert!(snapshot.selection.is_idle());

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].severity, Severity::Error);
    assert!(sent[0].message.contains("t1"));
}

#[tokio::test]
async fn confirmed_delete_moves_ticket_to_removed() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t3"], 1), counts(0, 4, 0)));
    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = workspace(&directory, &notifier, PageSize::Fixed(5));
    workspace.initial_load().await;

    workspace
        .request(ticket("t3", TicketStatus::Closed), TicketAction::Delete)
        .await
        .expect("delete request");
    workspace.confirm().await.expect("confirm");

    let snapshot = workspace.snapshot().await;
    assert_eq!(snapshot.counts.get(TicketStatus::Closed), 3);
    assert_eq!(snapshot.counts.get(TicketStatus::Removed), 1);
    assert_eq!(
        directory.command_calls().await,
        vec![(TicketAction::Delete, TicketId::new("t3"))]
    );
}

#[tokio::test]
async fn close_is_rejected_for_closed_ticket() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t1"], 1), counts(0, 1, 0)));
    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = workspace(&directory, &notifier, PageSize::Fixed(5));

    let error = workspace
        .request(ticket("t1", TicketStatus::Closed), TicketAction::Close)
        .await
        .expect_err("close must be rejected");

    assert!(matches!(error, SelectionError::ActionUnavailable { .. }));
    assert!(workspace.snapshot().await.selection.is_idle());
    assert_eq!(
        workspace.confirm().await,
        Err(SelectionError::NothingPending)
    );
    assert!(directory.command_calls().await.is_empty());
}

#[tokio::test]
async fn cancel_discards_pending_action() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t1"], 1), counts(1, 0, 0)));
    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = workspace(&directory, &notifier, PageSize::Fixed(5));

    workspace
        .request(ticket("t1", TicketStatus::Open), TicketAction::Delete)
        .await
        .expect("delete request");
    workspace.cancel().await;

    assert!(workspace.snapshot().await.selection.is_idle());
    assert_eq!(workspace.confirm().await, Err(SelectionError::NothingPending));
    assert!(directory.command_calls().await.is_empty());
    assert!(directory.list_calls().await.is_empty());
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn inspecting_loads_context_messages() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t1"], 1), counts(1, 0, 0)));
    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = workspace(&directory, &notifier, PageSize::Fixed(5));

    workspace
        .request(ticket("t1", TicketStatus::Open), TicketAction::Inspect)
        .await
        .expect("inspect");

    let snapshot = workspace.snapshot().await;
    assert_eq!(snapshot.selection.action(), Some(TicketAction::Inspect));
    let details = snapshot.details.expect("details shown");
    let ids: Vec<&str> = details
        .ready()
        .expect("messages loaded")
        .iter()
        .map(|message| message.id.as_str())
        .collect();
    assert_eq!(ids, vec!["m2", "m1"]);

    workspace.close_details().await;
    let snapshot = workspace.snapshot().await;
    assert!(snapshot.selection.is_idle());
    assert_eq!(snapshot.details, None);
}

#[tokio::test]
async fn failed_message_load_shows_empty_details() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t1"], 1), counts(1, 0, 0)));
    *directory.messages.lock().await = None;
    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = workspace(&directory, &notifier, PageSize::Fixed(5));

    workspace
        .request(ticket("t1", TicketStatus::Open), TicketAction::Inspect)
        .await
        .expect("inspect");

    let snapshot = workspace.snapshot().await;
    assert_eq!(snapshot.details, Some(Loadable::Ready(Vec::new())));
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn refresh_details_replaces_inspected_ticket() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t1"], 1), counts(1, 0, 0)));
    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = workspace(&directory, &notifier, PageSize::Fixed(5));

    assert_eq!(workspace.refresh_details().await, FetchOutcome::Stale);

    workspace
        .request(ticket("t1", TicketStatus::Open), TicketAction::Inspect)
        .await
        .expect("inspect");
    assert_eq!(workspace.refresh_details().await, FetchOutcome::Applied);

    let snapshot = workspace.snapshot().await;
    let inspected = snapshot.selection.ticket().expect("inspected ticket");
    assert_eq!(inspected.resolved_by.as_deref(), Some("moderator"));
    assert_eq!(*directory.get_calls.lock().await, 1);
}

#[test]
fn stale_completion_leaves_newer_state_alone() {
    let mut state = WorkspaceState::new(WorkspaceSettings::default());
    let first = state.begin_page_fetch();
    let second = state.begin_page_fetch();
    assert!(second.generation > first.generation);

    assert!(state
        .complete_page_fetch(second.generation, Ok(page_of(&["new"], 1)))
        .is_some());
    assert!(state
        .complete_page_fetch(first.generation, Err(unavailable()))
        .is_none());

    let page = state.page.ready().expect("page ready");
    assert_eq!(page.tickets[0].id.as_str(), "new");
}

#[tokio::test]
async fn superseded_counts_refresh_is_discarded() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t1"], 1), counts(1, 0, 0)));
    let (first_tx, first_rx) = oneshot::channel();
    let (second_tx, second_rx) = oneshot::channel();
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    directory.counts_gates.lock().await.extend([first_rx, second_rx]);
    *directory.counts_started.lock().await = Some(started_tx);

    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = Arc::new(workspace(&directory, &notifier, PageSize::Fixed(5)));

    let first = tokio::spawn({
        let workspace = Arc::clone(&workspace);
        async move { workspace.refresh_counts().await }
    });
    assert_eq!(started_rx.recv().await, Some(()));
    let second = tokio::spawn({
        let workspace = Arc::clone(&workspace);
        async move { workspace.refresh_counts().await }
    });
    assert_eq!(started_rx.recv().await, Some(()));

    second_tx.send(counts(8, 2, 0)).expect("second response");
    assert_eq!(second.await.expect("second task"), FetchOutcome::Applied);
    first_tx.send(counts(1, 0, 0)).expect("first response");
    assert_eq!(first.await.expect("first task"), FetchOutcome::Stale);

    let snapshot = workspace.snapshot().await;
    assert_eq!(snapshot.counts.get(TicketStatus::Open), 8);
    assert_eq!(snapshot.counts.get(TicketStatus::Closed), 2);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn messages_arriving_after_details_close_are_dropped() {
    for leave_with_cancel in [true, false] {
        let directory = Arc::new(FakeDirectory::healthy(page_of(&["t1"], 1), counts(1, 0, 0)));
        let (messages_tx, messages_rx) = oneshot::channel();
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        directory
            .message_gates
            .lock()
            .await
            .insert("t1".to_string(), messages_rx);
        *directory.messages_started.lock().await = Some(started_tx);

        let notifier = Arc::new(RecordingNotifier::default());
        let workspace = Arc::new(workspace(&directory, &notifier, PageSize::Fixed(5)));

        let inspect = tokio::spawn({
            let workspace = Arc::clone(&workspace);
            async move {
                workspace
                    .request(ticket("t1", TicketStatus::Open), TicketAction::Inspect)
                    .await
            }
        });
        assert_eq!(started_rx.recv().await.as_deref(), Some("t1"));
        assert_eq!(workspace.snapshot().await.details, Some(Loadable::Loading));

        if leave_with_cancel {
            workspace.cancel().await;
        } else {
            workspace.close_details().await;
        }
        messages_tx.send(vec![message("late")]).expect("late messages");
        assert_eq!(inspect.await.expect("inspect task"), Ok(()));

        let snapshot = workspace.snapshot().await;
        assert!(snapshot.selection.is_idle());
        assert_eq!(snapshot.details, None);
    }
}

#[tokio::test]
async fn newer_inspection_keeps_its_own_messages() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t1", "t2"], 2), counts(2, 0, 0)));
    let (messages_tx, messages_rx) = oneshot::channel();
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    directory
        .message_gates
        .lock()
        .await
        .insert("t1".to_string(), messages_rx);
    *directory.messages_started.lock().await = Some(started_tx);

    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = Arc::new(workspace(&directory, &notifier, PageSize::Fixed(5)));

    let first = tokio::spawn({
        let workspace = Arc::clone(&workspace);
        async move {
            workspace
                .request(ticket("t1", TicketStatus::Open), TicketAction::Inspect)
                .await
        }
    });
    assert_eq!(started_rx.recv().await.as_deref(), Some("t1"));

    workspace.close_details().await;
    workspace
        .request(ticket("t2", TicketStatus::Open), TicketAction::Inspect)
        .await
        .expect("inspect t2");
    assert_eq!(started_rx.recv().await.as_deref(), Some("t2"));

    messages_tx.send(vec![message("stale")]).expect("late messages");
    assert_eq!(first.await.expect("first inspect"), Ok(()));

    let snapshot = workspace.snapshot().await;
    assert_eq!(snapshot.selection.ticket().map(|t| t.id.as_str()), Some("t2"));
    let ids: Vec<&str> = snapshot
        .details
        .as_ref()
        .and_then(Loadable::ready)
        .expect("messages loaded")
        .iter()
        .map(|message| message.id.as_str())
        .collect();
    assert_eq!(ids, vec!["m2", "m1"]);
}

#[tokio::test]
async fn close_from_details_view_asks_for_confirmation() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t1"], 1), counts(1, 0, 0)));
    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = workspace(&directory, &notifier, PageSize::Fixed(5));

    workspace
        .request(ticket("t1", TicketStatus::Open), TicketAction::Inspect)
        .await
        .expect("inspect");
    workspace
        .request(ticket("t1", TicketStatus::Open), TicketAction::Close)
        .await
        .expect("close from details");

    let snapshot = workspace.snapshot().await;
    assert_eq!(snapshot.selection.action(), Some(TicketAction::Close));
    assert!(snapshot.selection.dialog_visible());
    assert_eq!(snapshot.details, None);

    let outcome = workspace.confirm().await.expect("confirm");
    assert!(matches!(outcome, TransitionOutcome::Applied(_)));
    assert_eq!(
        directory.command_calls().await,
        vec![(TicketAction::Close, TicketId::new("t1"))]
    );
}

#[tokio::test]
async fn unavailable_action_keeps_details_view() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t3"], 1), counts(0, 1, 0)));
    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = workspace(&directory, &notifier, PageSize::Fixed(5));

    workspace
        .request(ticket("t3", TicketStatus::Closed), TicketAction::Inspect)
        .await
        .expect("inspect");
    let error = workspace
        .request(ticket("t3", TicketStatus::Closed), TicketAction::Close)
        .await
        .expect_err("closed ticket cannot be closed");

    assert!(matches!(error, SelectionError::ActionUnavailable { .. }));
    let snapshot = workspace.snapshot().await;
    assert_eq!(snapshot.selection.action(), Some(TicketAction::Inspect));
    assert!(matches!(snapshot.details, Some(Loadable::Ready(_))));
}

#[tokio::test]
async fn locate_prefers_loaded_page_then_asks_directory() {
    let directory = Arc::new(FakeDirectory::healthy(page_of(&["t1"], 1), counts(1, 0, 0)));
    let notifier = Arc::new(RecordingNotifier::default());
    let workspace = workspace(&directory, &notifier, PageSize::Fixed(5));
    workspace.initial_load().await;

    let listed = workspace.locate(&TicketId::new("t1")).await.expect("listed ticket");
    assert_eq!(listed.resolved_by, None);
    assert_eq!(*directory.get_calls.lock().await, 0);

    let fetched = workspace.locate(&TicketId::new("t9")).await.expect("off-page ticket");
    assert_eq!(fetched.id.as_str(), "t9");
    assert_eq!(*directory.get_calls.lock().await, 1);

    let error = workspace
        .locate(&TicketId::new("missing"))
        .await
        .expect_err("unknown ticket");
    assert!(matches!(error, WorkspaceError::Directory(DirectoryError::Api(_))));
}
