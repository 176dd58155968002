use std::collections::{HashMap, HashSet};

use crate::model::*;

/// Occupancy by `(date, half-hour slot)`. A missing date or slot means nothing
/// is booked there.
///
/// Built in one pass and never patched afterwards: a fresh fetch produces a
/// fresh index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupancyIndex {
    by_date: HashMap<CalendarDate, HashMap<HalfHourSlot, HashSet<TableId>>>,
}

impl OccupancyIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Insert each reservation's table into every slot it covers.
    /// Overlapping records for the same table collapse into one entry.
    pub fn build<'a>(reservations: impl IntoIterator<Item = &'a Reservation>) -> Self {
        let mut index = Self::default();
        for reservation in reservations {
            for (date, slot) in reservation.occupied_slots() {
                index
                    .by_date
                    .entry(date)
                    .or_default()
                    .entry(slot)
                    .or_default()
                    .insert(reservation.table.clone());
            }
        }
        index
    }

    pub fn is_occupied(&self, date: CalendarDate, slot: HalfHourSlot, table: &TableId) -> bool {
        self.by_date
            .get(&date)
            .and_then(|slots| slots.get(&slot))
            .is_some_and(|tables| tables.contains(table))
    }

    /// Tables booked at `(date, slot)`, sorted.
    pub fn occupied_tables(&self, date: CalendarDate, slot: HalfHourSlot) -> Vec<TableId> {
        let mut tables: Vec<TableId> = self
            .by_date
            .get(&date)
            .and_then(|slots| slots.get(&slot))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        tables.sort();
        tables
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    pub fn date_count(&self) -> usize {
        self.by_date.len()
    }

    /// Number of `(date, slot)` keys holding at least one table.
    pub fn slot_count(&self) -> usize {
        self.by_date.values().map(HashMap::len).sum()
    }
}
