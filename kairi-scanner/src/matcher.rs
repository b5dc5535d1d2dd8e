//! Compound "oversold + buy" rule.
//!
//! A symbol matches when, among its observations on the requested exchange,
//! at least one carries a KAIRI reading at or below the threshold and at
//! least one carries a buy marker. The two may come from different entries.

use crate::signal::{group_by_symbol, SignalObservation, SymbolAggregate};

/// Oscillator keyword preceding the numeric reading.
pub const KAIRI_KEYWORD: &str = "KAIRI";

/// Buy-count marker as emitted by the charting indicator.
pub const BUY_COUNT_MARKER: &str = "ALIŞ SAYIMI";

/// Perfect-buy marker as emitted by the charting indicator.
pub const PERFECT_BUY_MARKER: &str = "MÜKEMMEL ALIŞ";

/// Default oversold threshold.
pub const DEFAULT_KAIRI_THRESHOLD: f64 = -20.0;

/// Extract the KAIRI reading from a signal text.
///
/// Takes the first whitespace-delimited token after the first `KAIRI`
/// occurrence. `None` when the keyword is absent or the token is not a number.
pub fn kairi_reading(signal_text: &str) -> Option<f64> {
    let upper = signal_text.to_uppercase();
    let pos = upper.find(KAIRI_KEYWORD)?;
    upper[pos + KAIRI_KEYWORD.len()..]
        .split_whitespace()
        .next()?
        .parse::<f64>()
        .ok()
}

/// Whether a signal text carries either buy marker.
pub fn has_buy_marker(signal_text: &str) -> bool {
    let upper = signal_text.to_uppercase();
    upper.contains(BUY_COUNT_MARKER) || upper.contains(PERFECT_BUY_MARKER)
}

/// Ordered list of uppercased matching symbols.
pub type MatchResult = Vec<String>;

/// Evaluates the compound rule for one exchange.
#[derive(Debug, Clone, Copy)]
pub struct SignalMatcher {
    threshold: f64,
}

impl Default for SignalMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_KAIRI_THRESHOLD)
    }
}

impl SignalMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Whether one observation shows an oversold reading.
    pub fn is_oversold(&self, obs: &SignalObservation) -> bool {
        kairi_reading(&obs.signal_text).is_some_and(|value| value <= self.threshold)
    }

    /// Decide membership for one symbol's observations.
    pub fn matches(&self, aggregate: &SymbolAggregate<'_>, exchange: &str) -> bool {
        let mut oversold = false;
        let mut buy = false;

        for obs in aggregate
            .observations
            .iter()
            .filter(|obs| obs.is_on_exchange(exchange))
        {
            oversold = oversold || self.is_oversold(obs);
            buy = buy || has_buy_marker(&obs.signal_text);
            if oversold && buy {
                return true;
            }
        }

        false
    }

    /// Run the rule over a whole log.
    pub fn match_symbols(&self, observations: &[SignalObservation], exchange: &str) -> MatchResult {
        let matched: MatchResult = group_by_symbol(observations)
            .iter()
            .filter(|aggregate| self.matches(aggregate, exchange))
            .map(|aggregate| aggregate.symbol.to_uppercase())
            .collect();

        tracing::debug!(
            exchange,
            observations = observations.len(),
            matched = matched.len(),
            "Matched symbols against oversold + buy rule"
        );

        matched
    }
}
