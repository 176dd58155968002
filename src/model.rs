use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::limits::SLOTS_PER_DAY;

/// Calendar day, ordered and serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn parse(text: &str) -> Option<Self> {
        NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok().map(Self)
    }

    pub fn today() -> Self {
        Self(chrono::Local::now().date_naive())
    }

    /// Shift by `days`, saturating at the ends of the supported calendar.
    pub fn add_days(self, days: i64) -> Self {
        let step = Days::new(days.unsigned_abs());
        let shifted = if days >= 0 {
            self.0.checked_add_days(step).unwrap_or(NaiveDate::MAX)
        } else {
            self.0.checked_sub_days(step).unwrap_or(NaiveDate::MIN)
        };
        Self(shifted)
    }

    /// Signed number of days from `self` to `other`.
    pub fn days_until(self, other: CalendarDate) -> i64 {
        (other.0 - self.0).num_days()
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for CalendarDate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid date: {s:?}"))
    }
}

/// Half-hour units since midnight: 0 = 00:00, 47 = 23:30.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HalfHourSlot(u8);

impl HalfHourSlot {
    pub const MIDNIGHT: HalfHourSlot = HalfHourSlot(0);

    pub fn new(index: u8) -> Option<Self> {
        (index < SLOTS_PER_DAY).then_some(Self(index))
    }

    pub fn from_hour(hour: u8) -> Option<Self> {
        hour.checked_mul(2).and_then(Self::new)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// Parse `H:MM` or `H:MM:SS`. Only `:00` and `:30` are accepted.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().split(':');
        let hours: u8 = parts.next()?.parse().ok()?;
        let minutes: u8 = parts.next()?.parse().ok()?;
        if let Some(seconds) = parts.next() {
            let seconds: u8 = seconds.parse().ok()?;
            if seconds != 0 {
                return None;
            }
        }
        if parts.next().is_some() {
            return None;
        }
        let half = match minutes {
            0 => 0,
            30 => 1,
            _ => return None,
        };
        hours.checked_mul(2).and_then(|h| Self::new(h + half))
    }
}

impl fmt::Display for HalfHourSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = if self.0 % 2 == 0 { 0 } else { 30 };
        write!(f, "{}:{:02}", self.0 / 2, minutes)
    }
}

impl FromStr for HalfHourSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid hour: {s:?}"))
    }
}

/// Table identifier in normalized form. Numeric text always becomes `Number`,
/// so `"5"` and `5` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableId {
    Number(u32),
    Token(String),
}

impl TableId {
    pub fn normalize(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<u32>() {
            Ok(n) => TableId::Number(n),
            Err(_) => TableId::Token(raw.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<u32> {
        match self {
            TableId::Number(n) => Some(*n),
            TableId::Token(_) => None,
        }
    }
}

impl From<u32> for TableId {
    fn from(n: u32) -> Self {
        TableId::Number(n)
    }
}

impl From<&str> for TableId {
    fn from(raw: &str) -> Self {
        TableId::normalize(raw)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableId::Number(n) => write!(f, "{n}"),
            TableId::Token(t) => f.write_str(t),
        }
    }
}

impl Serialize for TableId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TableId::Number(n) => serializer.serialize_u32(*n),
            TableId::Token(t) => serializer.serialize_str(t),
        }
    }
}

impl<'de> Deserialize<'de> for TableId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            Text(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Number(n) => u32::try_from(n)
                .map(TableId::Number)
                .unwrap_or_else(|_| TableId::Token(n.to_string())),
            Repr::Text(s) => TableId::normalize(&s),
        })
    }
}

/// A normalized booking or one-off event: `table` is occupied for
/// `duration_slots` half-hours starting at `start` on `date`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub date: CalendarDate,
    pub start: HalfHourSlot,
    pub duration_slots: u16,
    pub table: TableId,
}

impl Reservation {
    /// Every `(date, slot)` this reservation covers, in order. Slots past 23:30
    /// continue on the following day.
    pub fn occupied_slots(&self) -> impl Iterator<Item = (CalendarDate, HalfHourSlot)> + '_ {
        let per_day = u32::from(SLOTS_PER_DAY);
        (0..u32::from(self.duration_slots)).map(move |k| {
            let absolute = u32::from(self.start.index()) + k;
            let date = self.date.add_days(i64::from(absolute / per_day));
            (date, HalfHourSlot((absolute % per_day) as u8))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepeatKind {
    Never,
    Daily,
    /// Anything else the backend sends. Ignored during expansion.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurringEvent {
    pub repeat: RepeatKind,
    pub start: HalfHourSlot,
    pub duration_slots: u16,
    pub table: TableId,
}

// ── Wire records ─────────────────────────────────────────────────

/// A loosely typed backend field. Numbers and text are kept as they came;
/// anything else lands in `Other` so one odd record never fails a whole list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawScalar {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl RawScalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawScalar::Number(n) => Some(*n),
            RawScalar::Text(t) => t.trim().parse().ok(),
            RawScalar::Other(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawScalar::Text(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for RawScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawScalar::Number(n) => write!(f, "{n}"),
            RawScalar::Text(t) => write!(f, "{t:?}"),
            RawScalar::Other(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for RawScalar {
    fn from(text: &str) -> Self {
        RawScalar::Text(text.to_string())
    }
}

impl From<String> for RawScalar {
    fn from(text: String) -> Self {
        RawScalar::Text(text)
    }
}

impl From<f64> for RawScalar {
    fn from(n: f64) -> Self {
        RawScalar::Number(n)
    }
}

impl From<u32> for RawScalar {
    fn from(n: u32) -> Self {
        RawScalar::Number(f64::from(n))
    }
}

/// The `repeat` field: `false` for one-off events, `"daily"` for recurring ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepeatField {
    Flag(bool),
    Kind(String),
    Other(serde_json::Value),
}

impl Default for RepeatField {
    fn default() -> Self {
        RepeatField::Flag(false)
    }
}

impl RepeatField {
    pub fn kind(&self) -> RepeatKind {
        match self {
            RepeatField::Flag(false) => RepeatKind::Never,
            RepeatField::Flag(true) => RepeatKind::Other("true".into()),
            RepeatField::Kind(k) if k == "daily" => RepeatKind::Daily,
            RepeatField::Kind(k) => RepeatKind::Other(k.clone()),
            RepeatField::Other(v) => RepeatKind::Other(v.to_string()),
        }
    }

    pub fn is_repeating(&self) -> bool {
        self.kind() != RepeatKind::Never
    }
}

/// Booking or event as stored by the backend. Fields outside the occupancy
/// model (`ppl`, `starters`, `phone`, ...) are ignored. Field types are checked
/// later, per record, by the engine's ingest step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<RawScalar>,
    #[serde(default)]
    pub hour: Option<RawScalar>,
    #[serde(default)]
    pub duration: Option<RawScalar>,
    #[serde(default)]
    pub table: Option<RawScalar>,
    #[serde(default)]
    pub repeat: RepeatField,
}

impl RawRecord {
    /// The record's date, if present and well formed.
    pub fn calendar_date(&self) -> Option<CalendarDate> {
        self.date.as_ref()?.as_text().and_then(CalendarDate::parse)
    }
}

// ── Context & selection ──────────────────────────────────────────

/// The active (date, hour) pair occupancy and selection are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingContext {
    pub date: CalendarDate,
    pub slot: HalfHourSlot,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    NoSelection,
    Selected(TableId),
}

impl SelectionState {
    pub fn selected(&self) -> Option<&TableId> {
        match self {
            SelectionState::Selected(t) => Some(t),
            SelectionState::NoSelection => None,
        }
    }
}

/// Inclusive `[min, max]` booking horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub min: CalendarDate,
    pub max: CalendarDate,
}

impl DateRange {
    pub fn new(min: CalendarDate, max: CalendarDate) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }

    /// `today` through `today + horizon_days`.
    pub fn from_today(today: CalendarDate, horizon_days: u32) -> Self {
        Self {
            min: today,
            max: today.add_days(i64::from(horizon_days)),
        }
    }

    pub fn days(&self) -> i64 {
        self.min.days_until(self.max) + 1
    }

    pub fn contains(&self, date: CalendarDate) -> bool {
        self.min <= date && date <= self.max
    }

    pub fn dates(&self) -> impl Iterator<Item = CalendarDate> {
        let min = self.min;
        (0..self.days()).map(move |d| min.add_days(d))
    }
}
