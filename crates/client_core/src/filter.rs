//! Ticket search predicate and its conversion into a directory query.

use chrono::{
    DateTime, Duration, FixedOffset, Local, LocalResult, NaiveDate, NaiveTime, Offset, TimeZone,
};
use shared::domain::TicketStatus;

use crate::pagination::PageSize;

/// User-entered search predicate. Every field is optional; the all-empty value
/// is the identity filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub author: Option<String>,
    pub message: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl TicketFilter {
    pub fn identity() -> Self {
        Self::default()
    }

    /// True when no field carries a predicate. Blank text counts as empty.
    pub fn is_identity(&self) -> bool {
        self.status.is_none()
            && non_blank(&self.author).is_none()
            && non_blank(&self.message).is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }

    /// Converts to a directory query using the viewer's local offset.
    pub fn to_query(&self, page: u32, page_size: PageSize) -> TicketQuery {
        self.to_query_in(&Local, page, page_size)
    }

    pub fn to_query_in<Tz: TimeZone>(
        &self,
        tz: &Tz,
        page: u32,
        page_size: PageSize,
    ) -> TicketQuery {
        TicketQuery {
            page,
            page_size: page_size.wire_value(),
            author: non_blank(&self.author),
            msg_content: non_blank(&self.message),
            status: self.status.map(|status| vec![status]),
            timestamp_start: self
                .start_date
                .map(|date| local_bound(tz, date, start_of_day())),
            timestamp_end: self
                .end_date
                .map(|date| local_bound(tz, date, end_of_day())),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn start_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default()
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default()
}

/// Pins a calendar day boundary to the zone's offset on that day. A wall time
/// skipped by a DST jump resolves to the first instant after the gap: the
/// wall time is read with the offset in force a day earlier.
fn local_bound<Tz: TimeZone>(tz: &Tz, date: NaiveDate, time: NaiveTime) -> DateTime<FixedOffset> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(bound) | LocalResult::Ambiguous(bound, _) => bound.fixed_offset(),
        LocalResult::None => {
            let before_gap = tz.offset_from_utc_datetime(&(naive - Duration::days(1))).fix();
            let instant = naive - Duration::seconds(i64::from(before_gap.local_minus_utc()));
            tz.from_utc_datetime(&instant).fixed_offset()
        }
    }
}

/// Query parameters accepted by the directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketQuery {
    pub page: u32,
    /// Zero asks for an unbounded page.
    pub page_size: u32,
    pub author: Option<String>,
    pub msg_content: Option<String>,
    /// `None` leaves the directory on its default open/closed view.
    pub status: Option<Vec<TicketStatus>>,
    pub timestamp_start: Option<DateTime<FixedOffset>>,
    pub timestamp_end: Option<DateTime<FixedOffset>>,
}

impl TicketQuery {
    /// Flattens into URL query pairs, omitting absent fields.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
        ];
        if let Some(author) = &self.author {
            pairs.push(("author", author.clone()));
        }
        if let Some(content) = &self.msg_content {
            pairs.push(("msg_content", content.clone()));
        }
        for status in self.status.iter().flatten() {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(start) = &self.timestamp_start {
            pairs.push(("timestamp_start", format_bound(start)));
        }
        if let Some(end) = &self.timestamp_end {
            pairs.push(("timestamp_end", format_bound(end)));
        }
        pairs
    }
}

fn format_bound(bound: &DateTime<FixedOffset>) -> String {
    bound.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// The applied filter. Each call replaces the previous value wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    current: TicketFilter,
}

impl FilterState {
    pub fn current(&self) -> &TicketFilter {
        &self.current
    }

    pub fn apply(&mut self, filter: TicketFilter) {
        self.current = filter;
    }

    pub fn reset(&mut self) {
        self.current = TicketFilter::identity();
    }
}

#[cfg(test)]
#[path = "tests/filter_tests.rs"]
mod tests;
