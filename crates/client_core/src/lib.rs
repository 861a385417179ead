//! Client-side ticket workspace: directory access, local view state and the
//! orchestrator that keeps them consistent.

pub mod counts;
pub mod directory;
pub mod error;
pub mod filter;
pub mod notify;
pub mod pagination;
pub mod selection;
pub mod workspace;

pub use counts::CountAggregate;
pub use directory::{HttpTicketDirectory, TicketDirectory};
pub use error::{DirectoryError, SelectionError, WorkspaceError};
pub use filter::{FilterState, TicketFilter, TicketQuery};
pub use notify::{BroadcastNotifier, Notification, Notifier, Severity, SHOW_ALERT};
pub use pagination::{PageSize, PaginationState, DEFAULT_PAGE_SIZE, PAGE_SIZE_OPTIONS};
pub use selection::{Selection, TicketAction};
pub use workspace::{
    FetchOutcome, Loadable, PageRequest, TicketWorkspace, TransitionOutcome, WorkspaceSettings,
    WorkspaceSnapshot,
};
