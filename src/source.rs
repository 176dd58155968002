use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cart::OrderPayload;
use crate::catalog::Product;
use crate::coordinator::BookingPayload;
use crate::model::*;

#[derive(Debug)]
pub enum SourceError {
    Io(std::io::Error),
    Parse(String),
    Unavailable(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Io(e) => write!(f, "I/O error: {e}"),
            SourceError::Parse(e) => write!(f, "malformed data: {e}"),
            SourceError::Unavailable(e) => write!(f, "source unavailable: {e}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        SourceError::Io(e)
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Parse(e.to_string())
    }
}

/// The three record lists one refresh works from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedRecords {
    pub bookings: Vec<RawRecord>,
    pub one_off_events: Vec<RawRecord>,
    pub recurring_events: Vec<RawRecord>,
}

/// Where bookings and events come from and where new bookings go.
#[async_trait]
pub trait ReservationDataSource: Send + Sync {
    /// Bookings dated within `range`.
    async fn bookings(&self, range: &DateRange) -> Result<Vec<RawRecord>, SourceError>;
    /// Non-repeating events dated within `range`.
    async fn one_off_events(&self, range: &DateRange) -> Result<Vec<RawRecord>, SourceError>;
    /// Repeating events starting on or before `range.max`.
    async fn recurring_events(&self, range: &DateRange) -> Result<Vec<RawRecord>, SourceError>;
    async fn post_booking(&self, payload: &BookingPayload) -> Result<(), SourceError>;
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn products(&self) -> Result<Vec<Product>, SourceError>;
    async fn post_order(&self, order: &OrderPayload) -> Result<(), SourceError>;
}

/// Fetch all three lists concurrently. Any single failure fails the whole fetch.
pub async fn fetch_all(
    source: &dyn ReservationDataSource,
    range: &DateRange,
) -> Result<FetchedRecords, SourceError> {
    let (bookings, one_off_events, recurring_events) = futures::try_join!(
        source.bookings(range),
        source.one_off_events(range),
        source.recurring_events(range),
    )?;
    Ok(FetchedRecords {
        bookings,
        one_off_events,
        recurring_events,
    })
}

// ── JSON data directory ──────────────────────────────────────────

const BOOKING_FILE: &str = "booking.json";
const EVENT_FILE: &str = "event.json";
const PRODUCT_FILE: &str = "product.json";
const ORDER_FILE: &str = "order.json";

/// Serves the storefront collections from JSON arrays in a directory. A missing
/// file reads as an empty collection.
pub struct JsonDirSource {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_list<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, SourceError> {
        let path = self.dir.join(file);
        if !tokio::fs::try_exists(&path).await? {
            debug!("{} missing, treating as empty", path.display());
            return Ok(Vec::new());
        }
        let text = tokio::fs::read_to_string(&path).await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Read a booking or event list element by element. An element that is not
    /// a record at all becomes an empty record, which the rebuild then reports
    /// as skipped.
    async fn read_records(&self, file: &str) -> Result<Vec<RawRecord>, SourceError> {
        let items: Vec<serde_json::Value> = self.read_list(file).await?;
        Ok(items
            .into_iter()
            .enumerate()
            .map(|(position, item)| {
                serde_json::from_value(item).unwrap_or_else(|e| {
                    warn!("{file} #{position} is not a record: {e}");
                    RawRecord::default()
                })
            })
            .collect())
    }

    /// Append `item` to the array in `file`, assigning the next numeric `id`.
    async fn append<T: Serialize>(&self, file: &str, item: &T) -> Result<u64, SourceError> {
        let _guard = self.write_lock.lock().await;
        let mut items: Vec<serde_json::Value> = self.read_list(file).await?;
        let next_id = items
            .iter()
            .filter_map(|v| v.get("id").and_then(serde_json::Value::as_u64))
            .max()
            .unwrap_or(0)
            + 1;

        let mut value = serde_json::to_value(item)?;
        let serde_json::Value::Object(map) = &mut value else {
            return Err(SourceError::Parse(format!("{file}: item is not an object")));
        };
        map.insert("id".into(), next_id.into());
        items.push(value);

        tokio::fs::create_dir_all(&self.dir).await?;
        let text = serde_json::to_string_pretty(&items)?;
        tokio::fs::write(self.dir.join(file), text).await?;
        Ok(next_id)
    }
}

/// Keep records dated inside `range`. Records with a missing or unreadable
/// date are kept so the rebuild can report them.
fn dated_within(record: &RawRecord, range: &DateRange) -> bool {
    match record.calendar_date() {
        Some(date) => range.contains(date),
        None => true,
    }
}

#[async_trait]
impl ReservationDataSource for JsonDirSource {
    async fn bookings(&self, range: &DateRange) -> Result<Vec<RawRecord>, SourceError> {
        let all = self.read_records(BOOKING_FILE).await?;
        Ok(all.into_iter().filter(|r| dated_within(r, range)).collect())
    }

    async fn one_off_events(&self, range: &DateRange) -> Result<Vec<RawRecord>, SourceError> {
        let all = self.read_records(EVENT_FILE).await?;
        Ok(all
            .into_iter()
            .filter(|r| !r.repeat.is_repeating() && dated_within(r, range))
            .collect())
    }

    async fn recurring_events(&self, range: &DateRange) -> Result<Vec<RawRecord>, SourceError> {
        let all = self.read_records(EVENT_FILE).await?;
        Ok(all
            .into_iter()
            .filter(|r| r.repeat.is_repeating())
            .filter(|r| {
                r.calendar_date()
                    .is_none_or(|start| start <= range.max)
            })
            .collect())
    }

    async fn post_booking(&self, payload: &BookingPayload) -> Result<(), SourceError> {
        let id = self.append(BOOKING_FILE, payload).await?;
        info!("stored booking #{id} for {} {}", payload.date, payload.hour);
        Ok(())
    }
}

#[async_trait]
impl CatalogSource for JsonDirSource {
    async fn products(&self) -> Result<Vec<Product>, SourceError> {
        self.read_list(PRODUCT_FILE).await
    }

    async fn post_order(&self, order: &OrderPayload) -> Result<(), SourceError> {
        let id = self.append(ORDER_FILE, order).await?;
        info!("stored order #{id}, {} items", order.total_number);
        Ok(())
    }
}
