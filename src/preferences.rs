use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const CURRENCY: &str = "currency";
pub const DATE_FORMAT: &str = "date_format";
pub const OUTPUT_TYPE: &str = "output_type";

/// Process-wide report settings.
///
/// `currency` only affects display. `date_format` is a chrono format string
/// used to parse record dates. `output_type` names the report writer; it is
/// not checked here, so an unsupported type only shows up when reports are
/// generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub currency: String,
    pub date_format: String,
    pub output_type: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            currency: "USD".into(),
            date_format: "%Y-%m-%d".into(),
            output_type: "json".into(),
        }
    }
}

impl Preferences {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the preference named `key` to `value`.
    ///
    /// Unknown keys are logged and ignored rather than treated as errors.
    /// Returns whether `key` was recognised.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let slot = match key {
            CURRENCY => &mut self.currency,
            DATE_FORMAT => &mut self.date_format,
            OUTPUT_TYPE => &mut self.output_type,
            _ => {
                warn!("ignoring unknown preference: {key}");
                return false;
            }
        };
        *slot = value.to_string();
        debug!("preference {key:?} set to {value:?}");
        true
    }

    /// Applies every `(key, value)` pair in order, returning the keys that
    /// were ignored.
    pub fn set_many<K, V>(&mut self, prefs: impl IntoIterator<Item = (K, V)>) -> Vec<String>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        prefs
            .into_iter()
            .filter(|(key, value)| !self.set(key.as_ref(), value.as_ref()))
            .map(|(key, _)| key.as_ref().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fn_uses_usd_iso_dates_and_json() {
        let prefs = Preferences::default();
        assert_eq!(prefs.currency, "USD");
        assert_eq!(prefs.date_format, "%Y-%m-%d");
        assert_eq!(prefs.output_type, "json");
    }

    #[test]
    fn set_fn_updates_known_keys() {
        let mut prefs = Preferences::new();
        assert!(prefs.set("currency", "EUR"));
        assert!(prefs.set("output_type", "csv"));
        assert_eq!(prefs.currency, "EUR");
        assert_eq!(prefs.output_type, "csv");
    }

    #[test]
    fn set_fn_ignores_unknown_keys() {
        let mut prefs = Preferences::new();
        assert!(!prefs.set("unknown_key", "invalid_value"));
        assert_eq!(prefs, Preferences::default());
    }

    #[test]
    fn set_fn_is_idempotent() {
        let mut prefs = Preferences::new();
        assert!(prefs.set("currency", "GBP"));
        let once = prefs.clone();
        assert!(prefs.set("currency", "GBP"));
        assert_eq!(prefs, once);
    }

    #[test]
    fn set_many_fn_returns_ignored_keys() {
        let mut prefs = Preferences::new();
        let ignored = prefs.set_many([("unknown_key", "x"), ("currency", "GBP"), ("colour", "red")]);
        assert_eq!(ignored, vec!["unknown_key", "colour"]);
        assert_eq!(prefs.currency, "GBP");
    }
}
