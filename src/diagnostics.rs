use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutOptions {
    pub debug_outlines: bool,
    pub placeholder_digits: usize,
    pub compress_streams: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            debug_outlines: false,
            placeholder_digits: 3,
            compress_streams: true,
        }
    }
}

impl LayoutOptions {
    /// Defaults overridden by `FOLIO_DEBUG_OUTLINES` and `FOLIO_COMPRESS`.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(value) = env_flag("FOLIO_DEBUG_OUTLINES") {
            options.debug_outlines = value;
        }
        if let Some(value) = env_flag("FOLIO_COMPRESS") {
            options.compress_streams = value;
        }
        options
    }

    pub fn with_debug_outlines(mut self, enabled: bool) -> Self {
        self.debug_outlines = enabled;
        self
    }

    pub fn with_placeholder_digits(mut self, digits: usize) -> Self {
        self.placeholder_digits = digits.max(1);
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress_streams = enabled;
        self
    }
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|v| parse_flag(&v))
}

fn parse_flag(raw: &str) -> bool {
    let v = raw.trim();
    v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes")
}

/// Collects warnings and counters for one render session. Every warning is
/// also sent to the `log` facade.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    inner: Arc<Mutex<DiagnosticsState>>,
}

#[derive(Debug, Default)]
struct DiagnosticsState {
    warnings: Vec<String>,
    counters: BTreeMap<String, u64>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        if let Ok(mut state) = self.inner.lock() {
            state.warnings.push(message);
        }
    }

    pub fn increment(&self, key: &str, amount: u64) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    pub fn warnings(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|state| state.warnings.clone())
            .unwrap_or_default()
    }

    pub fn warning_count(&self) -> usize {
        self.inner
            .lock()
            .map(|state| state.warnings.len())
            .unwrap_or(0)
    }

    pub fn counter(&self, key: &str) -> u64 {
        self.inner
            .lock()
            .ok()
            .and_then(|state| state.counters.get(key).copied())
            .unwrap_or(0)
    }

    pub fn counters(&self) -> BTreeMap<String, u64> {
        self.inner
            .lock()
            .map(|state| state.counters.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parsing_accepts_common_spellings() {
        assert!(parse_flag("1"));
        assert!(parse_flag(" TRUE "));
        assert!(parse_flag("yes"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("off"));
    }

    #[test]
    fn defaults_reserve_three_placeholder_digits() {
        let options = LayoutOptions::default();
        assert_eq!(options.placeholder_digits, 3);
        assert!(options.compress_streams);
        assert!(!options.debug_outlines);
        assert_eq!(options.with_placeholder_digits(0).placeholder_digits, 1);
    }

    #[test]
    fn clones_share_one_collector() {
        let diagnostics = Diagnostics::new();
        let other = diagnostics.clone();
        other.warn("line too narrow");
        diagnostics.increment("split.text", 2);
        other.increment("split.text", 1);
        assert_eq!(diagnostics.warnings(), vec!["line too narrow".to_string()]);
        assert_eq!(diagnostics.counter("split.text"), 3);
        assert_eq!(diagnostics.counter("missing"), 0);
    }
}
