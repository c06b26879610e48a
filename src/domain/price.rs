//! Daily price bars and trading-calendar helpers.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::error::HedgeError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Close of the most recent bar, whatever order the slice is in.
pub fn latest_close(bars: &[PriceBar]) -> Option<f64> {
    bars.iter().max_by_key(|b| b.date).map(|b| b.close)
}

/// Monday to Friday dates in `[start, end]`.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

pub fn parse_date(value: &str) -> Result<NaiveDate, HedgeError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        HedgeError::invalid_input(format!("invalid date '{value}', expected YYYY-MM-DD"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: &str, close: f64) -> PriceBar {
        PriceBar {
            ticker: "AAPL".into(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000,
        }
    }

    #[test]
    fn latest_close_ignores_order() {
        let bars = vec![bar("2024-03-05", 12.0), bar("2024-03-01", 10.0), bar("2024-03-04", 11.0)];
        assert_eq!(latest_close(&bars), Some(12.0));
        assert_eq!(latest_close(&[]), None);
    }

    #[test]
    fn business_days_skip_weekends() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(); // Friday
        let end = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let days = business_days(start, end);
        assert_eq!(days.len(), 3);
        assert_eq!(days[1], NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    }

    #[test]
    fn business_days_empty_when_reversed() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(business_days(start, end).is_empty());
    }

    #[test]
    fn parse_date_is_strict() {
        assert!(parse_date("2024-01-31").is_ok());
        assert!(parse_date("2024/01/31").is_err());
        assert!(parse_date("31-01-2024").is_err());
    }
}
