use std::collections::BTreeSet;

use tracing::debug;

use crate::model::*;

use super::OccupancyIndex;

/// Why a click did not change the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The table is booked at the active date and hour.
    Occupied,
    /// The table is not part of the floor plan.
    UnknownTable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOutcome {
    pub accepted: bool,
    pub state: SelectionState,
    pub rejection: Option<Rejection>,
}

/// Single-table selection for one booking session.
///
/// States are `NoSelection` and `Selected(t)`. A free table toggles or moves
/// the selection; a booked or unknown table leaves it untouched. Changing the
/// active context always clears it.
#[derive(Debug, Clone)]
pub struct SelectionController {
    tables: BTreeSet<TableId>,
    context: BookingContext,
    state: SelectionState,
}

impl SelectionController {
    pub fn new(tables: impl IntoIterator<Item = TableId>, context: BookingContext) -> Self {
        Self {
            tables: tables.into_iter().collect(),
            context,
            state: SelectionState::NoSelection,
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn context(&self) -> BookingContext {
        self.context
    }

    /// Known tables, sorted.
    pub fn tables(&self) -> impl Iterator<Item = &TableId> {
        self.tables.iter()
    }

    pub fn is_selected(&self, table: &TableId) -> bool {
        self.state.selected() == Some(table)
    }

    pub fn select(&mut self, index: &OccupancyIndex, table: &TableId) -> SelectOutcome {
        if !self.tables.contains(table) {
            return self.reject(Rejection::UnknownTable);
        }
        if index.is_occupied(self.context.date, self.context.slot, table) {
            return self.reject(Rejection::Occupied);
        }

        self.state = match &self.state {
            SelectionState::Selected(current) if current == table => SelectionState::NoSelection,
            _ => SelectionState::Selected(table.clone()),
        };
        SelectOutcome {
            accepted: true,
            state: self.state.clone(),
            rejection: None,
        }
    }

    fn reject(&self, rejection: Rejection) -> SelectOutcome {
        SelectOutcome {
            accepted: false,
            state: self.state.clone(),
            rejection: Some(rejection),
        }
    }

    /// Move to a new context. Returns true if the context differed, in which
    /// case the selection was cleared.
    pub fn set_context(&mut self, context: BookingContext) -> bool {
        if context == self.context {
            return false;
        }
        self.context = context;
        self.reset();
        true
    }

    pub fn reset(&mut self) -> SelectionState {
        self.state = SelectionState::NoSelection;
        self.state.clone()
    }

    /// Drop the selection if `index` now marks it booked. Returns the dropped table.
    pub fn revalidate(&mut self, index: &OccupancyIndex) -> Option<TableId> {
        let SelectionState::Selected(table) = &self.state else {
            return None;
        };
        if !index.is_occupied(self.context.date, self.context.slot, table) {
            return None;
        }
        let dropped = table.clone();
        debug!("selected table {dropped} became booked, clearing selection");
        self.state = SelectionState::NoSelection;
        Some(dropped)
    }
}
