use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::{AmountSettings, BookingSettings};
use crate::engine::{
    BookingError, OccupancyIndex, Rejection, SelectOutcome, SelectionController, duration_to_slots,
    rebuild,
};
use crate::model::*;
use crate::notify::Notifier;
use crate::source::{FetchedRecords, ReservationDataSource, SourceError, fetch_all};

#[derive(Debug, Clone, PartialEq)]
pub enum BookingNotice {
    IndexRebuilt {
        generation: u64,
        reservations: usize,
        skipped: usize,
    },
    RefreshFailed {
        generation: u64,
        reason: String,
    },
    ContextChanged(BookingContext),
    SelectionChanged(SelectionState),
    SelectionRejected {
        table: TableId,
        rejection: Rejection,
    },
    BookingSubmitted(BookingPayload),
}

/// Issued when a refresh starts; carries the range to fetch and the
/// generation used to order completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    pub generation: u64,
    pub range: DateRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildSummary {
    pub generation: u64,
    pub reservations: usize,
    pub skipped: usize,
    /// Selection cleared because the new data books that table.
    pub dropped_selection: Option<TableId>,
}

/// What the floor plan shows for one table at the active context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableState {
    pub table: TableId,
    pub occupied: bool,
    pub selected: bool,
}

/// Guest-entered part of a booking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingForm {
    pub party_size: u32,
    pub duration_hours: f64,
    pub starters: Vec<String>,
    pub phone: String,
    pub address: String,
}

/// Body posted to the booking collection. `table` is `null` when no table
/// was chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingPayload {
    pub date: CalendarDate,
    pub hour: String,
    pub table: Option<TableId>,
    pub duration: f64,
    #[serde(rename = "ppl")]
    pub party_size: u32,
    pub starters: Vec<String>,
    pub phone: String,
    pub address: String,
}

/// Ties the occupancy index to one booking session: refreshes data, tracks
/// the active context and selection, and submits bookings.
pub struct BookingCoordinator {
    index: Arc<OccupancyIndex>,
    selection: SelectionController,
    range: DateRange,
    /// Bounds for party size and duration in hours.
    form_bounds: AmountSettings,
    issued: u64,
    applied: u64,
    notify: Notifier<BookingNotice>,
}

impl BookingCoordinator {
    /// Start with an empty index (everything free) and the context at
    /// `today`, opening hour.
    pub fn new(settings: &BookingSettings, today: CalendarDate) -> Self {
        let context = BookingContext {
            date: today,
            slot: settings.open_slot(),
        };
        Self {
            index: Arc::new(OccupancyIndex::empty()),
            selection: SelectionController::new(settings.tables.iter().cloned(), context),
            range: DateRange::from_today(today, settings.horizon_days),
            form_bounds: AmountSettings::default(),
            issued: 0,
            applied: 0,
            notify: Notifier::new(),
        }
    }

    /// Use the stepper bounds the booking form offers for party size and hours.
    pub fn with_form_bounds(mut self, bounds: AmountSettings) -> Self {
        self.form_bounds = bounds;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingNotice> {
        self.notify.subscribe()
    }

    /// Current index snapshot. Later refreshes replace it, they never mutate it.
    pub fn index(&self) -> Arc<OccupancyIndex> {
        self.index.clone()
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn context(&self) -> BookingContext {
        self.selection.context()
    }

    pub fn selection(&self) -> &SelectionState {
        self.selection.state()
    }

    pub fn applied_generation(&self) -> u64 {
        self.applied
    }

    // ── Refresh ──────────────────────────────────────────

    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.issued += 1;
        RefreshTicket {
            generation: self.issued,
            range: self.range,
        }
    }

    /// Apply a finished fetch. Completions older than the last applied one
    /// are discarded, successful or not, so a slow response never overwrites
    /// newer data or reports a failure that no longer matters.
    pub fn complete_refresh(
        &mut self,
        ticket: RefreshTicket,
        fetched: Result<FetchedRecords, SourceError>,
    ) -> Result<RebuildSummary, BookingError> {
        if ticket.generation <= self.applied {
            warn!(
                "discarding refresh #{}: #{} already applied",
                ticket.generation, self.applied
            );
            metrics::counter!(crate::observability::REFRESH_STALE_TOTAL).increment(1);
            return Err(BookingError::StaleRefresh {
                generation: ticket.generation,
                applied: self.applied,
            });
        }

        let records = match fetched {
            Ok(records) => records,
            Err(e) => {
                warn!("refresh #{} failed: {e}", ticket.generation);
                metrics::counter!(crate::observability::REFRESH_FAILED_TOTAL).increment(1);
                self.notify.send(BookingNotice::RefreshFailed {
                    generation: ticket.generation,
                    reason: e.to_string(),
                });
                return Err(BookingError::Source(e));
            }
        };

        let outcome = rebuild(
            &records.bookings,
            &records.one_off_events,
            &records.recurring_events,
            &ticket.range,
        );
        self.index = Arc::new(outcome.index);
        self.applied = ticket.generation;

        let dropped_selection = self.selection.revalidate(&self.index);
        if dropped_selection.is_some() {
            self.notify
                .send(BookingNotice::SelectionChanged(self.selection.state().clone()));
        }

        info!(
            "refresh #{} applied: {} reservations, {} skipped",
            ticket.generation,
            outcome.reservations,
            outcome.skipped.len()
        );
        self.notify.send(BookingNotice::IndexRebuilt {
            generation: ticket.generation,
            reservations: outcome.reservations,
            skipped: outcome.skipped.len(),
        });

        Ok(RebuildSummary {
            generation: ticket.generation,
            reservations: outcome.reservations,
            skipped: outcome.skipped.len(),
            dropped_selection,
        })
    }

    pub async fn refresh(
        &mut self,
        source: &dyn ReservationDataSource,
    ) -> Result<RebuildSummary, BookingError> {
        let ticket = self.begin_refresh();
        let fetched = fetch_all(source, &ticket.range).await;
        self.complete_refresh(ticket, fetched)
    }

    // ── Context & selection ──────────────────────────────

    /// Returns true if the context changed (and the selection was cleared).
    pub fn set_context(&mut self, date: CalendarDate, slot: HalfHourSlot) -> bool {
        let context = BookingContext { date, slot };
        let had_selection = self.selection.state() != &SelectionState::NoSelection;
        if !self.selection.set_context(context) {
            return false;
        }
        self.notify.send(BookingNotice::ContextChanged(context));
        if had_selection {
            self.notify
                .send(BookingNotice::SelectionChanged(SelectionState::NoSelection));
        }
        true
    }

    pub fn click(&mut self, table: &TableId) -> SelectOutcome {
        let outcome = self.selection.select(&self.index, table);
        match outcome.rejection {
            Some(rejection) => {
                let reason = match rejection {
                    Rejection::Occupied => "occupied",
                    Rejection::UnknownTable => "unknown_table",
                };
                metrics::counter!(crate::observability::SELECTION_REJECTED_TOTAL, "reason" => reason)
                    .increment(1);
                self.notify.send(BookingNotice::SelectionRejected {
                    table: table.clone(),
                    rejection,
                });
            }
            None => self
                .notify
                .send(BookingNotice::SelectionChanged(outcome.state.clone())),
        }
        outcome
    }

    pub fn reset_selection(&mut self) -> SelectionState {
        self.selection.reset()
    }

    /// Every known table with its state at the active context.
    pub fn table_states(&self) -> Vec<TableState> {
        let ctx = self.selection.context();
        self.selection
            .tables()
            .map(|table| TableState {
                table: table.clone(),
                occupied: self.index.is_occupied(ctx.date, ctx.slot, table),
                selected: self.selection.is_selected(table),
            })
            .collect()
    }

    // ── Submission ───────────────────────────────────────

    pub fn prepare_payload(&self, form: &BookingForm) -> Result<BookingPayload, BookingError> {
        let AmountSettings { min, max, .. } = self.form_bounds;
        duration_to_slots(form.duration_hours)?;
        if form.duration_hours < f64::from(min) || form.duration_hours > f64::from(max) {
            return Err(BookingError::InvalidDuration(format!(
                "{} hours is outside {min}..={max}",
                form.duration_hours
            )));
        }
        if !(min..=max).contains(&form.party_size) {
            return Err(BookingError::InvalidPartySize(form.party_size));
        }
        let ctx = self.selection.context();
        Ok(BookingPayload {
            date: ctx.date,
            hour: ctx.slot.to_string(),
            table: self.selection.state().selected().cloned(),
            duration: form.duration_hours,
            party_size: form.party_size,
            starters: form.starters.clone(),
            phone: form.phone.clone(),
            address: form.address.clone(),
        })
    }

    /// Post the booking, clear the selection, then rebuild from the source so
    /// the new booking shows up. A failed follow-up refresh is reported
    /// through notices but does not fail the submission.
    pub async fn submit(
        &mut self,
        form: &BookingForm,
        source: &dyn ReservationDataSource,
    ) -> Result<BookingPayload, BookingError> {
        let payload = self.prepare_payload(form)?;
        source.post_booking(&payload).await?;
        metrics::counter!(crate::observability::BOOKINGS_SUBMITTED_TOTAL).increment(1);
        info!(
            "booking submitted for {} {} table {:?}",
            payload.date, payload.hour, payload.table
        );

        self.selection.reset();
        self.notify.send(BookingNotice::BookingSubmitted(payload.clone()));

        if let Err(e) = self.refresh(source).await {
            warn!("refresh after booking failed: {e}");
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> CalendarDate {
        CalendarDate::parse(s).unwrap()
    }

    fn slot(s: &str) -> HalfHourSlot {
        HalfHourSlot::parse(s).unwrap()
    }

    fn coordinator() -> BookingCoordinator {
        let settings = BookingSettings {
            tables: (1..=9).map(TableId::from).collect(),
            ..BookingSettings::default()
        };
        let mut c = BookingCoordinator::new(&settings, date("2023-10-01"));
        c.set_context(date("2023-10-01"), slot("18:00"));
        c
    }

    fn booked(table: u32) -> FetchedRecords {
        FetchedRecords {
            bookings: serde_json::from_str(&format!(
                r#"[{{"date":"2023-10-01","hour":"18:00","duration":1.5,"table":{table}}}]"#
            ))
            .unwrap(),
            ..FetchedRecords::default()
        }
    }

    #[test]
    fn starts_empty_at_opening_hour() {
        let settings = BookingSettings::default();
        let c = BookingCoordinator::new(&settings, date("2023-10-01"));
        assert!(c.index().is_empty());
        assert_eq!(c.context().slot.to_string(), "12:00");
        assert_eq!(c.range().days(), 15);
        assert_eq!(c.table_states().len(), 3);
    }

    #[test]
    fn refresh_replaces_index_wholesale() {
        let mut c = coordinator();
        let before = c.index();
        let t = c.begin_refresh();
        c.complete_refresh(t, Ok(booked(5))).unwrap();
        assert!(before.is_empty());
        assert!(c.index().is_occupied(date("2023-10-01"), slot("19:00"), &TableId::from(5)));

        let t = c.begin_refresh();
        c.complete_refresh(t, Ok(booked(6))).unwrap();
        assert!(!c.index().is_occupied(date("2023-10-01"), slot("19:00"), &TableId::from(5)));
    }

    #[test]
    fn stale_completion_is_discarded() {
        let mut c = coordinator();
        let older = c.begin_refresh();
        let newer = c.begin_refresh();
        c.complete_refresh(newer, Ok(booked(6))).unwrap();
        let err = c.complete_refresh(older, Ok(booked(5))).unwrap_err();
        assert!(matches!(err, BookingError::StaleRefresh { generation: 1, applied: 2 }));
        assert!(c.index().is_occupied(date("2023-10-01"), slot("18:00"), &TableId::from(6)));
        assert!(!c.index().is_occupied(date("2023-10-01"), slot("18:00"), &TableId::from(5)));
    }

    #[test]
    fn older_completion_applies_if_newer_not_back_yet() {
        let mut c = coordinator();
        let older = c.begin_refresh();
        let newer = c.begin_refresh();
        c.complete_refresh(older, Ok(booked(5))).unwrap();
        assert_eq!(c.applied_generation(), 1);
        c.complete_refresh(newer, Ok(booked(6))).unwrap();
        assert_eq!(c.applied_generation(), 2);
    }

    #[test]
    fn failed_fetch_keeps_index_and_reports() {
        let mut c = coordinator();
        let mut rx = c.subscribe();
        let t = c.begin_refresh();
        c.complete_refresh(t, Ok(booked(5))).unwrap();
        let t = c.begin_refresh();
        let err = c
            .complete_refresh(t, Err(SourceError::Unavailable("offline".into())))
            .unwrap_err();
        assert!(matches!(err, BookingError::Source(_)));
        assert!(c.index().is_occupied(date("2023-10-01"), slot("18:00"), &TableId::from(5)));

        assert!(matches!(rx.try_recv().unwrap(), BookingNotice::IndexRebuilt { .. }));
        assert!(matches!(
            rx.try_recv().unwrap(),
            BookingNotice::RefreshFailed { generation: 2, .. }
        ));
    }

    #[test]
    fn rejected_click_notifies_once() {
        let mut c = coordinator();
        let t = c.begin_refresh();
        c.complete_refresh(t, Ok(booked(5))).unwrap();
        let mut rx = c.subscribe();

        let out = c.click(&TableId::from(5));
        assert!(!out.accepted);
        assert_eq!(c.selection(), &SelectionState::NoSelection);
        assert_eq!(
            rx.try_recv().unwrap(),
            BookingNotice::SelectionRejected {
                table: TableId::from(5),
                rejection: Rejection::Occupied,
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn click_toggle_and_move() {
        let mut c = coordinator();
        c.click(&TableId::from(2));
        c.click(&TableId::from(2));
        assert_eq!(c.selection(), &SelectionState::NoSelection);

        c.click(&TableId::from(2));
        c.click(&TableId::from(7));
        assert_eq!(c.selection(), &SelectionState::Selected(TableId::from(7)));
        let views = c.table_states();
        let selected: Vec<_> = views.iter().filter(|v| v.selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].table, TableId::from(7));
    }

    #[test]
    fn context_change_resets_selection() {
        let mut c = coordinator();
        c.click(&TableId::from(2));
        assert!(c.set_context(date("2023-10-02"), slot("18:00")));
        assert_eq!(c.selection(), &SelectionState::NoSelection);
        c.click(&TableId::from(2));
        assert!(c.set_context(date("2023-10-02"), slot("20:00")));
        assert_eq!(c.selection(), &SelectionState::NoSelection);
    }

    #[test]
    fn refresh_drops_selection_that_became_booked() {
        let mut c = coordinator();
        c.click(&TableId::from(5));
        let t = c.begin_refresh();
        let summary = c.complete_refresh(t, Ok(booked(5))).unwrap();
        assert_eq!(summary.dropped_selection, Some(TableId::from(5)));
        assert_eq!(c.selection(), &SelectionState::NoSelection);
    }

    #[test]
    fn table_states_reflect_occupancy() {
        let mut c = coordinator();
        let t = c.begin_refresh();
        c.complete_refresh(t, Ok(booked(5))).unwrap();
        let views = c.table_states();
        assert!(views.iter().find(|v| v.table == TableId::from(5)).unwrap().occupied);
        assert_eq!(views.iter().filter(|v| v.occupied).count(), 1);
    }

    #[test]
    fn payload_without_selection_has_null_table() {
        let c = coordinator();
        let form = BookingForm {
            party_size: 2,
            duration_hours: 1.5,
            starters: vec!["water".into()],
            phone: "555".into(),
            address: "Main St".into(),
        };
        let payload = c.prepare_payload(&form).unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["table"], serde_json::Value::Null);
        assert_eq!(json["hour"], "18:00");
        assert_eq!(json["date"], "2023-10-01");
        assert_eq!(json["ppl"], 2);
        assert_eq!(json["duration"], 1.5);
    }

    #[test]
    fn payload_rejects_bad_duration() {
        let c = coordinator();
        let form = BookingForm {
            duration_hours: 0.75,
            ..BookingForm::default()
        };
        assert!(matches!(c.prepare_payload(&form), Err(BookingError::InvalidDuration(_))));
    }

    #[test]
    fn payload_respects_form_bounds() {
        let c = coordinator();
        let form = |party_size, duration_hours| BookingForm {
            party_size,
            duration_hours,
            ..BookingForm::default()
        };
        assert!(matches!(c.prepare_payload(&form(0, 2.0)), Err(BookingError::InvalidPartySize(0))));
        assert!(matches!(c.prepare_payload(&form(10, 2.0)), Err(BookingError::InvalidPartySize(10))));
        assert!(matches!(c.prepare_payload(&form(2, 0.0)), Err(BookingError::InvalidDuration(_))));
        assert!(matches!(c.prepare_payload(&form(2, 9.5)), Err(BookingError::InvalidDuration(_))));
        assert!(c.prepare_payload(&form(9, 9.0)).is_ok());

        let wide = coordinator().with_form_bounds(AmountSettings {
            default_value: 1,
            min: 1,
            max: 20,
        });
        assert!(wide.prepare_payload(&form(12, 10.0)).is_ok());
    }

    #[test]
    fn stale_failure_is_not_reported() {
        let mut c = coordinator();
        let older = c.begin_refresh();
        let newer = c.begin_refresh();
        c.complete_refresh(newer, Ok(booked(6))).unwrap();
        let mut rx = c.subscribe();

        let err = c
            .complete_refresh(older, Err(SourceError::Unavailable("timeout".into())))
            .unwrap_err();
        assert!(matches!(err, BookingError::StaleRefresh { generation: 1, applied: 2 }));
        assert!(rx.try_recv().is_err());
        assert!(c.index().is_occupied(date("2023-10-01"), slot("18:00"), &TableId::from(6)));
    }

    #[test]
    fn huge_configured_horizon_does_not_panic() {
        let settings = BookingSettings {
            horizon_days: u32::MAX,
            ..BookingSettings::default()
        };
        let c = BookingCoordinator::new(&settings, date("2023-10-01"));
        assert!(c.range().max > date("2023-10-01"));

        let settings = crate::config::Settings::from_lookup(|key| {
            (key == "TABLEBOOK_HORIZON_DAYS").then(|| "4000000000".to_string())
        });
        let c = BookingCoordinator::new(&settings.booking, date("2023-10-01"));
        assert_eq!(c.range().days(), 15);
    }
}
