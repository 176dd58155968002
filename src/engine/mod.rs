mod error;
mod index;
mod ingest;
mod recurrence;
mod selection;

pub use error::BookingError;
pub use index::OccupancyIndex;
pub use ingest::{duration_to_slots, normalize_record, normalize_recurring, parse_hour, parse_table};
pub use recurrence::{expand, expand_daily};
pub use selection::{Rejection, SelectOutcome, SelectionController};

use tracing::{debug, warn};

use crate::limits::*;
use crate::model::*;

/// Which of the three fetched lists a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordList {
    Bookings,
    OneOffEvents,
    RecurringEvents,
}

impl RecordList {
    pub fn label(self) -> &'static str {
        match self {
            RecordList::Bookings => "bookings",
            RecordList::OneOffEvents => "one_off_events",
            RecordList::RecurringEvents => "recurring_events",
        }
    }
}

/// A record left out of the index, with the reason.
#[derive(Debug)]
pub struct SkippedRecord {
    pub list: RecordList,
    pub position: usize,
    pub error: BookingError,
}

#[derive(Debug)]
pub struct RebuildOutcome {
    pub index: OccupancyIndex,
    /// Reservations that went into the index, after recurring expansion.
    pub reservations: usize,
    pub skipped: Vec<SkippedRecord>,
}

// ── Rebuild ───────────────────────────────────────────────────────

/// Build a fresh occupancy index from the three raw record lists.
///
/// Bookings and one-off events go straight in; recurring events are expanded
/// over `range` first. Bad records are skipped and reported, never fatal.
pub fn rebuild(
    bookings: &[RawRecord],
    one_off_events: &[RawRecord],
    recurring_events: &[RawRecord],
    range: &DateRange,
) -> RebuildOutcome {
    let started = std::time::Instant::now();
    let range = clamp_range(range);
    let mut reservations: Vec<Reservation> = Vec::new();
    let mut skipped: Vec<SkippedRecord> = Vec::new();

    for (list, records) in [
        (RecordList::Bookings, bookings),
        (RecordList::OneOffEvents, one_off_events),
    ] {
        for (position, raw) in capped(list, records, &mut skipped).iter().enumerate() {
            match normalize_record(raw) {
                Ok(Some(r)) => reservations.push(r),
                Ok(None) => debug!("{} #{position} has no table", list.label()),
                Err(error) => skipped.push(SkippedRecord { list, position, error }),
            }
        }
    }

    let list = RecordList::RecurringEvents;
    for (position, raw) in capped(list, recurring_events, &mut skipped).iter().enumerate() {
        match normalize_recurring(raw) {
            Ok(Some(event)) => reservations.extend(expand(&event, &range)),
            Ok(None) => debug!("{} #{position} has no table", list.label()),
            Err(error) => skipped.push(SkippedRecord { list, position, error }),
        }
    }

    for s in &skipped {
        warn!("skipping {} #{}: {}", s.list.label(), s.position, s.error);
        metrics::counter!(crate::observability::RECORDS_SKIPPED_TOTAL, "list" => s.list.label())
            .increment(1);
    }

    let index = OccupancyIndex::build(&reservations);
    metrics::counter!(crate::observability::REBUILDS_TOTAL).increment(1);
    metrics::histogram!(crate::observability::REBUILD_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    RebuildOutcome {
        index,
        reservations: reservations.len(),
        skipped,
    }
}

fn clamp_range(range: &DateRange) -> DateRange {
    if range.days() <= MAX_HORIZON_DAYS {
        return *range;
    }
    warn!(
        "date range {}..{} exceeds {MAX_HORIZON_DAYS} days, clamping",
        range.min, range.max
    );
    DateRange {
        min: range.min,
        max: range.min.add_days(MAX_HORIZON_DAYS - 1),
    }
}

/// At most `MAX_RECORDS_PER_FETCH` records, noting the overflow.
fn capped<'a>(
    list: RecordList,
    records: &'a [RawRecord],
    skipped: &mut Vec<SkippedRecord>,
) -> &'a [RawRecord] {
    if records.len() <= MAX_RECORDS_PER_FETCH {
        return records;
    }
    skipped.push(SkippedRecord {
        list,
        position: MAX_RECORDS_PER_FETCH,
        error: BookingError::LimitExceeded("too many records in one fetch"),
    });
    &records[..MAX_RECORDS_PER_FETCH]
}
