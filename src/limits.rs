/// Half-hour slots in one calendar day.
pub const SLOTS_PER_DAY: u8 = 48;

/// Longest accepted reservation: 24 hours.
pub const MAX_DURATION_SLOTS: u16 = 48;

/// Widest date range a recurring event is expanded over.
pub const MAX_HORIZON_DAYS: i64 = 366;

/// Most records accepted from one list of a single fetch.
pub const MAX_RECORDS_PER_FETCH: usize = 100_000;
