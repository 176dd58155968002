use tracing::debug;

use crate::model::*;

/// One reservation per day in `range`, inclusive on both ends.
pub fn expand_daily(event: &RecurringEvent, range: &DateRange) -> Vec<Reservation> {
    range
        .dates()
        .map(|date| Reservation {
            date,
            start: event.start,
            duration_slots: event.duration_slots,
            table: event.table.clone(),
        })
        .collect()
}

/// Expand by repeat kind. Only daily repetition is supported; everything
/// else expands to nothing.
pub fn expand(event: &RecurringEvent, range: &DateRange) -> Vec<Reservation> {
    match &event.repeat {
        RepeatKind::Daily => expand_daily(event, range),
        RepeatKind::Never => Vec::new(),
        RepeatKind::Other(kind) => {
            debug!("ignoring recurring event with repeat kind {kind:?}");
            Vec::new()
        }
    }
}
