//! Signal log records and their typed projection.
//!
//! Records arrive from a charting webhook as loose JSON objects. Every field
//! is optional; anything missing, `null`, or of an unexpected shape degrades
//! to an empty string. Nothing here rejects a record.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

// ============================================================================
// Raw Record
// ============================================================================

/// One raw log entry as received or stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSignalRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub symbol: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub signal: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub exchange: String,
}

/// Accept strings as-is, render numbers and booleans, and map everything
/// else (null, arrays, objects) to an empty string.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

impl RawSignalRecord {
    /// Parse one log line. Returns `None` for blank lines and anything that
    /// is not a JSON object.
    pub fn from_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
        Self::from_value(value)
    }

    /// Project a JSON value onto a record. Non-objects yield `None`.
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}

// ============================================================================
// Observation
// ============================================================================

/// The part of a log entry the matcher looks at.
///
/// Text is kept verbatim; comparisons uppercase on the fly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalObservation {
    pub symbol: String,
    pub signal_text: String,
    pub exchange: String,
}

impl SignalObservation {
    pub fn new(
        symbol: impl Into<String>,
        signal_text: impl Into<String>,
        exchange: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            signal_text: signal_text.into(),
            exchange: exchange.into(),
        }
    }

    /// Case-insensitive exchange comparison.
    pub fn is_on_exchange(&self, exchange: &str) -> bool {
        self.exchange.to_uppercase() == exchange.to_uppercase()
    }
}

impl From<RawSignalRecord> for SignalObservation {
    fn from(record: RawSignalRecord) -> Self {
        Self {
            symbol: record.symbol,
            signal_text: record.signal,
            exchange: record.exchange,
        }
    }
}

/// Parse a whole log body, one JSON object per line, skipping bad lines.
pub fn parse_log_lines(content: &str) -> Vec<SignalObservation> {
    content
        .lines()
        .filter_map(RawSignalRecord::from_line)
        .map(SignalObservation::from)
        .collect()
}

// ============================================================================
// Aggregation
// ============================================================================

/// All observations sharing one raw symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolAggregate<'a> {
    pub symbol: &'a str,
    pub observations: Vec<&'a SignalObservation>,
}

/// Group observations by raw (non-uppercased) symbol.
///
/// Groups come out in the order each symbol first appears in the log, so
/// the same log always yields the same grouping.
pub fn group_by_symbol(observations: &[SignalObservation]) -> Vec<SymbolAggregate<'_>> {
    let mut groups: Vec<SymbolAggregate<'_>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for obs in observations {
        match index.get(obs.symbol.as_str()) {
            Some(&pos) => groups[pos].observations.push(obs),
            None => {
                index.insert(obs.symbol.as_str(), groups.len());
                groups.push(SymbolAggregate {
                    symbol: obs.symbol.as_str(),
                    observations: vec![obs],
                });
            }
        }
    }

    groups
}
