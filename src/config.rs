use std::path::PathBuf;
use std::str::FromStr;

use crate::limits::MAX_HORIZON_DAYS;
use crate::model::{HalfHourSlot, TableId};

/// Runtime settings. Built once at startup and handed to each component's
/// constructor; nothing reads the environment after that.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub booking: BookingSettings,
    pub amount: AmountSettings,
    pub cart: CartSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingSettings {
    /// Days past today that can be booked.
    pub horizon_days: u32,
    pub open_hour: u8,
    /// Exclusive. 24 means the last bookable slot is 23:30.
    pub close_hour: u8,
    pub tables: Vec<TableId>,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            horizon_days: 14,
            open_hour: 12,
            close_hour: 24,
            tables: (1..=3).map(TableId::from).collect(),
        }
    }
}

impl BookingSettings {
    pub fn open_slot(&self) -> HalfHourSlot {
        HalfHourSlot::from_hour(self.open_hour).unwrap_or(HalfHourSlot::MIDNIGHT)
    }

    /// Every bookable half-hour from opening to closing.
    pub fn bookable_slots(&self) -> Vec<HalfHourSlot> {
        let first = self.open_hour.saturating_mul(2);
        let last = self.close_hour.saturating_mul(2);
        (first..last).filter_map(HalfHourSlot::new).collect()
    }
}

/// Bounds for the amount stepper (portions, party size, hours).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountSettings {
    pub default_value: u32,
    pub min: u32,
    pub max: u32,
}

impl Default for AmountSettings {
    fn default() -> Self {
        Self {
            default_value: 1,
            min: 1,
            max: 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartSettings {
    pub delivery_fee: u32,
}

impl Default for CartSettings {
    fn default() -> Self {
        Self { delivery_fee: 20 }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            booking: BookingSettings::default(),
            amount: AmountSettings::default(),
            cart: CartSettings::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Missing or unparsable values keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Settings::default();

        let tables = lookup("TABLEBOOK_TABLES")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(TableId::normalize)
                    .collect::<Vec<_>>()
            })
            .filter(|t| !t.is_empty())
            .unwrap_or(defaults.booking.tables);

        let mut amount = AmountSettings {
            default_value: parse_var(&lookup, "TABLEBOOK_AMOUNT_DEFAULT").unwrap_or(defaults.amount.default_value),
            min: parse_var(&lookup, "TABLEBOOK_AMOUNT_MIN").unwrap_or(defaults.amount.min),
            max: parse_var(&lookup, "TABLEBOOK_AMOUNT_MAX").unwrap_or(defaults.amount.max),
        };
        if amount.min > amount.max {
            amount = defaults.amount;
        }
        amount.default_value = amount.default_value.clamp(amount.min, amount.max);

        let mut booking = BookingSettings {
            horizon_days: parse_var(&lookup, "TABLEBOOK_HORIZON_DAYS").unwrap_or(defaults.booking.horizon_days),
            open_hour: parse_var(&lookup, "TABLEBOOK_OPEN_HOUR").unwrap_or(defaults.booking.open_hour),
            close_hour: parse_var(&lookup, "TABLEBOOK_CLOSE_HOUR").unwrap_or(defaults.booking.close_hour),
            tables,
        };
        if booking.open_hour >= booking.close_hour || booking.close_hour > 24 {
            booking.open_hour = defaults.booking.open_hour;
            booking.close_hour = defaults.booking.close_hour;
        }
        if i64::from(booking.horizon_days) >= MAX_HORIZON_DAYS {
            booking.horizon_days = defaults.booking.horizon_days;
        }

        Self {
            data_dir: lookup("TABLEBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            metrics_port: parse_var(&lookup, "TABLEBOOK_METRICS_PORT"),
            booking,
            amount,
            cart: CartSettings {
                delivery_fee: parse_var(&lookup, "TABLEBOOK_DELIVERY_FEE").unwrap_or(defaults.cart.delivery_fee),
            },
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}
