use crate::limits::MAX_DURATION_SLOTS;
use crate::model::*;

use super::BookingError;

// ── Boundary normalization ────────────────────────────────────────

pub fn parse_hour(text: &str) -> Result<HalfHourSlot, BookingError> {
    HalfHourSlot::parse(text).ok_or_else(|| BookingError::InvalidHour(text.to_string()))
}

/// Convert a duration in hours to half-hour slots. Zero is allowed and occupies nothing.
pub fn duration_to_slots(hours: f64) -> Result<u16, BookingError> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(BookingError::InvalidDuration(format!("{hours} hours")));
    }
    let doubled = hours * 2.0;
    if doubled.fract() != 0.0 {
        return Err(BookingError::InvalidDuration(format!(
            "{hours} hours is not a multiple of half an hour"
        )));
    }
    if doubled > f64::from(MAX_DURATION_SLOTS) {
        return Err(BookingError::LimitExceeded("duration too long"));
    }
    Ok(doubled as u16)
}

/// A table given as a whole number or as text. Anything else is rejected.
pub fn parse_table(raw: &RawScalar) -> Result<TableId, BookingError> {
    match raw {
        RawScalar::Text(t) if !t.trim().is_empty() => Ok(TableId::normalize(t)),
        RawScalar::Number(n) if n.fract() == 0.0 && *n >= 0.0 && *n <= f64::from(u32::MAX) => {
            Ok(TableId::Number(*n as u32))
        }
        other => Err(BookingError::InvalidTable(other.to_string())),
    }
}

fn parse_timing(raw: &RawRecord) -> Result<(HalfHourSlot, u16), BookingError> {
    let hour = raw.hour.as_ref().ok_or(BookingError::MissingField("hour"))?;
    let start = match hour.as_text() {
        Some(text) => parse_hour(text)?,
        None => return Err(BookingError::InvalidHour(hour.to_string())),
    };
    let duration = raw.duration.as_ref().ok_or(BookingError::MissingField("duration"))?;
    let hours = duration
        .as_f64()
        .ok_or_else(|| BookingError::InvalidDuration(duration.to_string()))?;
    Ok((start, duration_to_slots(hours)?))
}

/// Normalize a booking or one-off event. `Ok(None)` means the record is valid
/// but holds no table (a booking submitted without one).
pub fn normalize_record(raw: &RawRecord) -> Result<Option<Reservation>, BookingError> {
    let date_field = raw.date.as_ref().ok_or(BookingError::MissingField("date"))?;
    let date = raw
        .calendar_date()
        .ok_or_else(|| BookingError::InvalidDate(date_field.to_string()))?;
    let (start, duration_slots) = parse_timing(raw)?;
    let Some(table) = raw.table.as_ref() else {
        return Ok(None);
    };
    Ok(Some(Reservation {
        date,
        start,
        duration_slots,
        table: parse_table(table)?,
    }))
}

/// Normalize a recurring event. The record's own date, if any, is not used:
/// expansion covers the requested range.
pub fn normalize_recurring(raw: &RawRecord) -> Result<Option<RecurringEvent>, BookingError> {
    let (start, duration_slots) = parse_timing(raw)?;
    let Some(table) = raw.table.as_ref() else {
        return Ok(None);
    };
    Ok(Some(RecurringEvent {
        repeat: raw.repeat.kind(),
        start,
        duration_slots,
        table: parse_table(table)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(date: Option<&str>, hour: &str, duration: f64, table: Option<u32>) -> RawRecord {
        RawRecord {
            date: date.map(RawScalar::from),
            hour: Some(hour.into()),
            duration: Some(duration.into()),
            table: table.map(RawScalar::from),
            repeat: RepeatField::default(),
        }
    }

    #[test]
    fn duration_conversion() {
        assert_eq!(duration_to_slots(1.5).unwrap(), 3);
        assert_eq!(duration_to_slots(0.0).unwrap(), 0);
        assert_eq!(duration_to_slots(24.0).unwrap(), 48);
    }

    #[test]
    fn duration_rejections() {
        assert!(matches!(duration_to_slots(-1.0), Err(BookingError::InvalidDuration(_))));
        assert!(matches!(duration_to_slots(1.25), Err(BookingError::InvalidDuration(_))));
        assert!(matches!(duration_to_slots(f64::NAN), Err(BookingError::InvalidDuration(_))));
        assert!(matches!(duration_to_slots(24.5), Err(BookingError::LimitExceeded(_))));
    }

    #[test]
    fn hour_rejection_keeps_text() {
        let err = parse_hour("18:45").unwrap_err();
        assert_eq!(err.to_string(), "invalid hour: \"18:45\"");
    }

    #[test]
    fn normalize_booking() {
        let r = normalize_record(&raw(Some("2023-10-01"), "18:00", 1.5, Some(5)))
            .unwrap()
            .unwrap();
        assert_eq!(r.date.to_string(), "2023-10-01");
        assert_eq!(r.start.to_string(), "18:00");
        assert_eq!(r.duration_slots, 3);
        assert_eq!(r.table, TableId::from(5));
    }

    #[test]
    fn booking_without_table_is_valid_but_empty() {
        let r = normalize_record(&raw(Some("2023-10-01"), "18:00", 2.0, None)).unwrap();
        assert!(r.is_none());
    }

    #[test]
    fn booking_without_date_rejected() {
        let err = normalize_record(&raw(None, "18:00", 2.0, Some(1))).unwrap_err();
        assert!(matches!(err, BookingError::MissingField("date")));
    }

    #[test]
    fn booking_with_bad_date_rejected() {
        let err = normalize_record(&raw(Some("2023-02-30"), "18:00", 2.0, Some(1))).unwrap_err();
        assert!(matches!(err, BookingError::InvalidDate(_)));
    }

    #[test]
    fn non_numeric_duration_text_rejected() {
        let mut rec = raw(Some("2023-10-01"), "18:00", 1.0, Some(1));
        rec.duration = Some("two".into());
        assert!(matches!(normalize_record(&rec), Err(BookingError::InvalidDuration(_))));
        rec.duration = None;
        assert!(matches!(normalize_record(&rec), Err(BookingError::MissingField("duration"))));
    }

    #[test]
    fn recurring_ignores_record_date() {
        let mut rec = raw(Some("2019-01-01"), "12:00", 1.0, Some(3));
        rec.repeat = RepeatField::Kind("daily".into());
        let ev = normalize_recurring(&rec).unwrap().unwrap();
        assert_eq!(ev.repeat, RepeatKind::Daily);
        assert_eq!(ev.duration_slots, 2);

        rec.date = None;
        assert!(normalize_recurring(&rec).unwrap().is_some());
    }

    #[test]
    fn table_forms() {
        assert_eq!(parse_table(&RawScalar::Number(2.0)).unwrap(), TableId::from(2));
        assert_eq!(parse_table(&"4".into()).unwrap(), TableId::from(4));
        assert_eq!(parse_table(&"bar ".into()).unwrap(), TableId::Token("bar".into()));
        assert!(matches!(parse_table(&RawScalar::Number(2.5)), Err(BookingError::InvalidTable(_))));
        assert!(matches!(parse_table(&RawScalar::Number(-1.0)), Err(BookingError::InvalidTable(_))));
        assert!(matches!(parse_table(&"  ".into()), Err(BookingError::InvalidTable(_))));
        assert!(matches!(
            parse_table(&RawScalar::Other(serde_json::Value::Bool(true))),
            Err(BookingError::InvalidTable(_))
        ));
    }

    #[test]
    fn mistyped_fields_rejected_per_record() {
        let mut rec = raw(Some("2023-10-01"), "18:00", 1.0, Some(1));
        rec.hour = Some(18u32.into());
        assert!(matches!(normalize_record(&rec), Err(BookingError::InvalidHour(_))));

        let mut rec = raw(Some("2023-10-01"), "18:00", 1.0, Some(1));
        rec.date = Some(20231001u32.into());
        assert!(matches!(normalize_record(&rec), Err(BookingError::InvalidDate(_))));

        let mut rec = raw(Some("2023-10-01"), "18:00", 1.0, Some(1));
        rec.duration = Some(RawScalar::Other(serde_json::Value::Bool(true)));
        assert!(matches!(normalize_record(&rec), Err(BookingError::InvalidDuration(_))));
    }
}
