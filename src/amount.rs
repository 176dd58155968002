use tokio::sync::broadcast;
use tracing::debug;

use crate::config::AmountSettings;
use crate::notify::Notifier;

/// Bounded integer stepper (portions, guests, hours). Rejected input leaves the
/// previous value in place; accepted changes go out to subscribers.
pub struct AmountStepper {
    settings: AmountSettings,
    value: u32,
    changes: Notifier<u32>,
}

impl AmountStepper {
    /// Bounds given in the wrong order are swapped.
    pub fn new(settings: AmountSettings) -> Self {
        let settings = AmountSettings {
            min: settings.min.min(settings.max),
            max: settings.min.max(settings.max),
            ..settings
        };
        Self {
            value: settings.default_value.clamp(settings.min, settings.max),
            settings,
            changes: Notifier::new(),
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn subscribe(&self) -> broadcast::Receiver<u32> {
        self.changes.subscribe()
    }

    /// Returns true if the value changed.
    pub fn set_value(&mut self, candidate: i64) -> bool {
        let in_bounds = candidate >= i64::from(self.settings.min)
            && candidate <= i64::from(self.settings.max);
        if !in_bounds || candidate == i64::from(self.value) {
            return false;
        }
        self.value = candidate as u32;
        self.changes.send(self.value);
        true
    }

    /// Accept typed input. Non-numeric text is discarded.
    pub fn set_text(&mut self, text: &str) -> bool {
        match text.trim().parse::<i64>() {
            Ok(n) => self.set_value(n),
            Err(_) => {
                debug!("discarding non-numeric amount {text:?}");
                false
            }
        }
    }

    pub fn increase(&mut self) -> bool {
        self.set_value(i64::from(self.value) + 1)
    }

    pub fn decrease(&mut self) -> bool {
        self.set_value(i64::from(self.value) - 1)
    }
}
