use crate::source::SourceError;

#[derive(Debug)]
pub enum BookingError {
    InvalidHour(String),
    InvalidDuration(String),
    InvalidDate(String),
    InvalidTable(String),
    /// Party size outside the configured bounds.
    InvalidPartySize(u32),
    MissingField(&'static str),
    LimitExceeded(&'static str),
    /// A refresh completed after a newer one had already been applied.
    StaleRefresh { generation: u64, applied: u64 },
    Source(SourceError),
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::InvalidHour(h) => write!(f, "invalid hour: {h:?}"),
            BookingError::InvalidDuration(d) => write!(f, "invalid duration: {d}"),
            BookingError::InvalidDate(d) => write!(f, "invalid date: {d}"),
            BookingError::InvalidTable(t) => write!(f, "invalid table: {t}"),
            BookingError::InvalidPartySize(n) => write!(f, "party size {n} out of range"),
            BookingError::MissingField(name) => write!(f, "missing field: {name}"),
            BookingError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            BookingError::StaleRefresh { generation, applied } => write!(
                f,
                "refresh #{generation} is stale: #{applied} already applied"
            ),
            BookingError::Source(e) => write!(f, "data source error: {e}"),
        }
    }
}

impl std::error::Error for BookingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BookingError::Source(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SourceError> for BookingError {
    fn from(e: SourceError) -> Self {
        BookingError::Source(e)
    }
}
