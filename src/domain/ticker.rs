//! Ticker symbol parsing, extraction from free text, and scan selection.

use regex::Regex;
use std::collections::HashSet;

use super::error::HedgeError;

/// Short words that look like tickers in upper-case text.
const COMMON_WORDS: &[&str] = &[
    "A", "I", "AM", "BE", "DO", "GO", "IN", "IS", "IT", "ME", "MY", "NO", "OF", "ON", "OR", "PM",
    "SO", "TO", "UP", "US", "WE",
];

/// Splits a comma-separated list into trimmed, upper-cased, unique symbols.
pub fn parse_tickers(list: &str) -> Result<Vec<String>, HedgeError> {
    let mut seen = HashSet::new();
    let tickers: Vec<String> = list
        .split(',')
        .map(|t| t.trim().to_ascii_uppercase())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect();
    if tickers.is_empty() {
        return Err(HedgeError::invalid_input("no tickers given"));
    }
    Ok(tickers)
}

/// Finds known symbols mentioned in text such as posts or comments.
pub struct TickerExtractor {
    pattern: Regex,
    known: HashSet<String>,
}

impl TickerExtractor {
    pub fn new<I, S>(known: I) -> Result<Self, HedgeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pattern = Regex::new(r"\$?\b[A-Z]{1,5}\b")
            .map_err(|e| HedgeError::invalid_input(format!("ticker pattern: {e}")))?;
        Ok(TickerExtractor {
            pattern,
            known: known.into_iter().map(Into::into).collect(),
        })
    }

    /// Mentions in order of appearance; repeats are kept.
    pub fn find(&self, text: &str) -> Vec<String> {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().trim_start_matches('$'))
            .filter(|t| !COMMON_WORDS.contains(t))
            .filter(|t| self.known.contains(*t))
            .map(str::to_string)
            .collect()
    }
}

/// Owned positions first, then the most-mentioned tickers, without repeats.
pub fn select_scan_tickers(owned: &[String], hot: &[String], max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    owned
        .iter()
        .chain(hot)
        .filter(|t| seen.insert(*t))
        .take(max)
        .cloned()
        .collect()
}
