//! Per-status ticket totals.

use std::collections::BTreeMap;

use shared::{domain::TicketStatus, protocol::StatusCounts};
use tracing::warn;

/// Count of tickets per status. Every status is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountAggregate {
    counts: BTreeMap<TicketStatus, u64>,
}

impl CountAggregate {
    pub fn zeroed() -> Self {
        Self {
            counts: TicketStatus::ALL.iter().map(|status| (*status, 0)).collect(),
        }
    }

    /// Seeds from the directory's counts response. Statuses the directory
    /// omits count as zero; unrecognised keys are dropped.
    pub fn from_remote(remote: &StatusCounts) -> Self {
        let mut aggregate = Self::zeroed();
        for (key, count) in remote {
            match key.parse::<TicketStatus>() {
                Ok(status) => {
                    aggregate.counts.insert(status, *count);
                }
                Err(error) => warn!(%error, count, "ignoring count for unrecognised status"),
            }
        }
        aggregate
    }

    pub fn get(&self, status: TicketStatus) -> u64 {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TicketStatus, u64)> + '_ {
        self.counts.iter().map(|(status, count)| (*status, *count))
    }

    /// Chip label such as `open: 3`.
    pub fn label(&self, status: TicketStatus) -> String {
        format!("{status}: {}", self.get(status))
    }

    /// Projects one ticket moving from `from` to `to`: one less in `from`, one
    /// more in `to`. When `from` is already zero, or the statuses match, the
    /// aggregate is returned unchanged so both entries always move together.
    pub fn transition(&self, from: TicketStatus, to: TicketStatus) -> Self {
        let source = self.get(from);
        if from == to || source == 0 {
            if from != to {
                warn!(%from, %to, "count transition skipped; source status has no tickets");
            }
            return self.clone();
        }

        let mut next = self.clone();
        next.counts.insert(from, source - 1);
        next.counts.insert(to, self.get(to) + 1);
        next
    }
}

impl Default for CountAggregate {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
#[path = "tests/counts_tests.rs"]
mod tests;
