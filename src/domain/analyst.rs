//! Selectable analysts.

use std::fmt;

use super::error::HedgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Analyst {
    WarrenBuffett,
    Sentiment,
}

impl Analyst {
    /// Display order.
    pub fn all() -> Vec<Analyst> {
        vec![Analyst::WarrenBuffett, Analyst::Sentiment]
    }

    pub fn key(&self) -> &'static str {
        match self {
            Analyst::WarrenBuffett => "warren_buffett",
            Analyst::Sentiment => "sentiment",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Analyst::WarrenBuffett => "Warren Buffett",
            Analyst::Sentiment => "Sentiment Analyst",
        }
    }

    /// Name the analyst's signals are recorded under.
    pub fn agent_name(&self) -> &'static str {
        match self {
            Analyst::WarrenBuffett => "warren_buffett_agent",
            Analyst::Sentiment => "sentiment_agent",
        }
    }

    pub fn parse(value: &str) -> Result<Analyst, HedgeError> {
        let key = value.trim().to_lowercase();
        Analyst::all()
            .into_iter()
            .find(|a| a.key() == key || a.agent_name() == key)
            .ok_or_else(|| {
                let known: Vec<&str> = Analyst::all().iter().map(|a| a.key()).collect();
                HedgeError::invalid_input(format!(
                    "unknown analyst '{}', expected one of: {}",
                    value.trim(),
                    known.join(", ")
                ))
            })
    }

    /// Parses a comma-separated list, keeping display order and dropping duplicates.
    pub fn parse_list(value: &str) -> Result<Vec<Analyst>, HedgeError> {
        let mut selected = Vec::new();
        for token in value.split(',').filter(|t| !t.trim().is_empty()) {
            let analyst = Analyst::parse(token)?;
            if !selected.contains(&analyst) {
                selected.push(analyst);
            }
        }
        if selected.is_empty() {
            return Err(HedgeError::invalid_input("at least one analyst is required"));
        }
        selected.sort();
        Ok(selected)
    }
}

impl fmt::Display for Analyst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_key_and_agent_name() {
        assert_eq!(Analyst::parse("warren_buffett").unwrap(), Analyst::WarrenBuffett);
        assert_eq!(Analyst::parse(" SENTIMENT_AGENT ").unwrap(), Analyst::Sentiment);
        assert!(Analyst::parse("technicals").is_err());
    }

    #[test]
    fn parse_list_orders_and_dedups() {
        let list = Analyst::parse_list("sentiment,warren_buffett,sentiment").unwrap();
        assert_eq!(list, vec![Analyst::WarrenBuffett, Analyst::Sentiment]);
    }

    #[test]
    fn parse_list_rejects_empty() {
        assert!(Analyst::parse_list(" , ").is_err());
    }
}
