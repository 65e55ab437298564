//! CSV candle feed.
//!
//! The bot does not collect market data itself; an external pipeline drops
//! OHLCV candles into a CSV file that is re-read at the start of every tick.
//!
//! Expected format:
//! ```csv
//! timestamp,open,high,low,close,volume
//! 2024-01-01T00:00:00Z,42000,42100,41900,42050,135.2
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// One OHLCV candle.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        anyhow::ensure!(
            fields.len() == 6,
            "expected 6 fields (timestamp,open,high,low,close,volume), got {}",
            fields.len()
        );

        Ok(Self {
            timestamp: DateTime::parse_from_rfc3339(fields[0])
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| format!("bad timestamp {:?}", fields[0]))?,
            open: parse_field("open", fields[1])?,
            high: parse_field("high", fields[2])?,
            low: parse_field("low", fields[3])?,
            close: parse_field("close", fields[4])?,
            volume: parse_field("volume", fields[5])?,
        })
    }
}

fn parse_field(name: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value).with_context(|| format!("bad {name} value {value:?}"))
}

/// Re-readable CSV price feed.
#[derive(Debug, Clone)]
pub struct CsvPriceFeed {
    path: PathBuf,
}

impl CsvPriceFeed {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load all candles, sorted oldest first.
    pub fn load(&self) -> Result<Vec<Candle>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read candle file {}", self.path.display()))?;
        Self::from_csv_content(&content)
    }

    pub fn from_csv_content(content: &str) -> Result<Vec<Candle>> {
        let mut candles = Vec::new();

        for (line_num, line) in content.lines().enumerate() {
            if line_num == 0 && line.starts_with("timestamp") {
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }

            let candle = Candle::parse(line)
                .with_context(|| format!("failed to parse line {}: {}", line_num + 1, line))?;
            candles.push(candle);
        }

        if candles.is_empty() {
            anyhow::bail!("candle file contains no data rows");
        }

        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = "\
timestamp,open,high,low,close,volume
2024-01-01T01:00:00Z,42000,42100,41900,42050,135.2
2024-01-01T00:00:00Z,41900,42010,41800,42000,140.0
";

    #[test]
    fn test_parse_and_sort() {
        let candles = CsvPriceFeed::from_csv_content(SAMPLE).unwrap();
        assert_eq!(candles.len(), 2);
        // sorted oldest first even though the file is not
        assert_eq!(candles[0].close, dec!(42000));
        assert_eq!(candles[1].close, dec!(42050));
        assert_eq!(candles[1].high, dec!(42100));
    }

    #[test]
    fn test_rejects_short_rows() {
        let err = CsvPriceFeed::from_csv_content("2024-01-01T00:00:00Z,42000\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_rejects_empty_file() {
        assert!(CsvPriceFeed::from_csv_content("timestamp,open,high,low,close,volume\n").is_err());
    }

    #[test]
    fn test_rejects_bad_decimal() {
        let err = CsvPriceFeed::from_csv_content(
            "2024-01-01T00:00:00Z,42000,42100,41900,not-a-price,1\n",
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("close"));
    }
}
