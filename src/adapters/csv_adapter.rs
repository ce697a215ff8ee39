//! CSV dataset adapter and episode exports.

use crate::domain::error::GymError;
use crate::domain::episode::EpisodeRun;
use crate::domain::frame::{FeatureFrame, MarketData, ReferencePriceSeries};
use crate::domain::normalize::{self, ZScore};
use crate::domain::position::TradeRecord;
use crate::ports::data_port::DataPort;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Loads a feature table from a headered CSV file. Every column not in
/// `exclude` becomes a feature; `price_column` is also read raw as the
/// reference price series.
pub struct CsvDatasetAdapter {
    path: PathBuf,
    price_column: String,
    exclude: Vec<String>,
    normalize: bool,
    clip: f64,
}

impl CsvDatasetAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            price_column: "close".into(),
            exclude: Vec::new(),
            normalize: true,
            clip: 5.0,
        }
    }

    pub fn with_price_column(mut self, column: impl Into<String>) -> Self {
        self.price_column = column.into();
        self
    }

    pub fn with_exclude(mut self, columns: Vec<String>) -> Self {
        self.exclude = columns;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Z-score bound. Only applies when normalizing; raw features are never
    /// clipped.
    pub fn with_clip(mut self, clip: f64) -> Self {
        self.clip = clip;
        self
    }

    fn parse_cell(raw: &str, column: &str, line: usize) -> Result<f64, GymError> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
            return Ok(f64::NAN);
        }
        raw.parse().map_err(|e| GymError::Dataset {
            reason: format!("line {line}: invalid value '{raw}' in column '{column}': {e}"),
        })
    }
}

impl DataPort for CsvDatasetAdapter {
    fn load_market_data(&self) -> Result<MarketData, GymError> {
        let content = fs::read_to_string(&self.path).map_err(|e| GymError::Dataset {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| GymError::Dataset {
                reason: format!("CSV header error: {}", e),
            })?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let price_idx = headers
            .iter()
            .position(|h| *h == self.price_column)
            .ok_or_else(|| GymError::Dataset {
                reason: format!("price column '{}' not found", self.price_column),
            })?;

        let feature_idx: Vec<usize> = (0..headers.len())
            .filter(|&i| !self.exclude.contains(&headers[i]))
            .collect();
        if feature_idx.is_empty() {
            return Err(GymError::Dataset {
                reason: "no feature columns left after exclusions".into(),
            });
        }

        let mut raw_rows: Vec<Vec<f64>> = Vec::new();
        let mut prices: Vec<f64> = Vec::new();

        for (i, result) in rdr.records().enumerate() {
            let line = i + 2;
            let record = result.map_err(|e| GymError::Dataset {
                reason: format!("CSV parse error: {}", e),
            })?;

            let price_raw = record.get(price_idx).ok_or_else(|| GymError::Dataset {
                reason: format!("line {line}: missing {} column", self.price_column),
            })?;
            prices.push(Self::parse_cell(price_raw, &self.price_column, line)?);

            let row = feature_idx
                .iter()
                .map(|&c| {
                    let raw = record.get(c).ok_or_else(|| GymError::Dataset {
                        reason: format!("line {line}: missing {} column", headers[c]),
                    })?;
                    Self::parse_cell(raw, &headers[c], line)
                })
                .collect::<Result<Vec<f64>, GymError>>()?;
            raw_rows.push(row);
        }

        let rows = if self.normalize {
            ZScore::fit(&raw_rows, self.clip).apply(&raw_rows)
        } else {
            normalize::clean(&raw_rows)
        };

        let columns = feature_idx.iter().map(|&c| headers[c].clone()).collect();
        let frame = FeatureFrame::new(columns, rows)?;
        let prices = ReferencePriceSeries::new(prices)?;
        let data = MarketData::new(frame, prices)?;

        info!(
            path = %self.path.display(),
            rows = data.len(),
            features = data.frame().width(),
            normalized = self.normalize,
            "loaded dataset"
        );
        Ok(data)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[derive(Serialize)]
struct EquityRow {
    step: usize,
    net_worth: f64,
    position: &'static str,
    reward: f64,
}

#[derive(Serialize)]
struct TradeRow {
    entry_step: usize,
    exit_step: usize,
    side: &'static str,
    entry_price: f64,
    exit_price: f64,
    notional: f64,
    fees: f64,
    gross_pnl: f64,
    pnl: f64,
}

fn csv_error(path: &Path, e: csv::Error) -> GymError {
    GymError::Dataset {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

/// Writes one row per equity point; row 0 is the starting balance.
pub fn write_equity_curve(path: &Path, run: &EpisodeRun) -> Result<(), GymError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    for (step, &net_worth) in run.equity_curve.iter().enumerate() {
        let (position, reward) = if step == 0 {
            ("FLAT", 0.0)
        } else {
            (run.sides[step - 1].as_str(), run.rewards[step - 1])
        };
        wtr.serialize(EquityRow {
            step,
            net_worth,
            position,
            reward,
        })
        .map_err(|e| csv_error(path, e))?;
    }
    wtr.flush()?;
    debug!(path = %path.display(), points = run.equity_curve.len(), "wrote equity curve");
    Ok(())
}

pub fn write_trades(path: &Path, trades: &[TradeRecord]) -> Result<(), GymError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    for record in trades {
        let t = &record.trade;
        wtr.serialize(TradeRow {
            entry_step: record.entry_step,
            exit_step: record.exit_step,
            side: t.side.as_str(),
            entry_price: t.entry_price,
            exit_price: t.exit_price,
            notional: t.notional,
            fees: t.fees(),
            gross_pnl: t.gross_pnl,
            pnl: t.pnl,
        })
        .map_err(|e| csv_error(path, e))?;
    }
    wtr.flush()?;
    debug!(path = %path.display(), trades = trades.len(), "wrote trades");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CSV: &str = "timestamp,close,rsi,volume\n\
        2024-01-15 00:00,100.0,55.0,1000\n\
        2024-01-15 01:00,101.0,60.0,1200\n\
        2024-01-15 02:00,99.5,,900\n\
        2024-01-15 03:00,102.0,70.0,1500\n";

    fn setup(content: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_features_and_raw_prices() {
        let (_dir, path) = setup(CSV);
        let data = CsvDatasetAdapter::new(path)
            .with_exclude(vec!["timestamp".into()])
            .load_market_data()
            .unwrap();

        assert_eq!(data.len(), 4);
        assert_eq!(data.frame().columns(), &["close", "rsi", "volume"]);
        assert_eq!(data.prices().as_slice(), &[100.0, 101.0, 99.5, 102.0]);
    }

    #[test]
    fn normalized_features_are_clipped_and_filled() {
        let (_dir, path) = setup(CSV);
        let data = CsvDatasetAdapter::new(path)
            .with_exclude(vec!["timestamp".into()])
            .load_market_data()
            .unwrap();

        assert_eq!(data.frame().row(2)[1], 0.0);
        for i in 0..data.len() {
            assert!(data.frame().row(i).iter().all(|v| v.abs() <= 5.0));
        }
    }

    #[test]
    fn raw_features_when_not_normalizing() {
        let (_dir, path) = setup(CSV);
        let data = CsvDatasetAdapter::new(path)
            .with_exclude(vec!["timestamp".into(), "volume".into()])
            .with_normalize(false)
            .load_market_data()
            .unwrap();
        assert_eq!(data.frame().row(1), &[101.0, 60.0]);
    }

    #[test]
    fn raw_features_keep_their_scale() {
        let (_dir, path) = setup(CSV);
        let data = CsvDatasetAdapter::new(path)
            .with_exclude(vec!["timestamp".into()])
            .with_normalize(false)
            .with_clip(5.0)
            .load_market_data()
            .unwrap();
        assert_eq!(data.frame().row(3), &[102.0, 70.0, 1500.0]);
        assert_eq!(data.frame().row(2)[1], 0.0);
    }

    #[test]
    fn missing_price_column_is_dataset_error() {
        let (_dir, path) = setup(CSV);
        let err = CsvDatasetAdapter::new(path)
            .with_price_column("mid")
            .load_market_data()
            .unwrap_err();
        assert!(matches!(err, GymError::Dataset { reason } if reason.contains("'mid'")));
    }

    #[test]
    fn text_in_feature_column_is_dataset_error() {
        let (_dir, path) = setup(CSV);
        let err = CsvDatasetAdapter::new(path).load_market_data().unwrap_err();
        assert!(matches!(err, GymError::Dataset { reason } if reason.contains("timestamp")));
    }

    #[test]
    fn missing_price_is_invalid_data() {
        let (_dir, path) = setup("close,f\n100,1\n,2\n");
        let err = CsvDatasetAdapter::new(path).load_market_data().unwrap_err();
        assert!(matches!(err, GymError::InvalidData { .. }));
    }

    #[test]
    fn missing_file_is_dataset_error() {
        let err = CsvDatasetAdapter::new(PathBuf::from("/nonexistent/data.csv"))
            .load_market_data()
            .unwrap_err();
        assert!(matches!(err, GymError::Dataset { .. }));
    }
}
