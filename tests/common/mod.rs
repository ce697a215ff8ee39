#![allow(dead_code)]

use candlegym::domain::environment::{EnvConfig, TradingEnvironment};
use candlegym::domain::error::GymError;
use candlegym::domain::frame::{FeatureFrame, MarketData, ReferencePriceSeries};
use candlegym::ports::data_port::DataPort;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

pub struct MockDataPort {
    pub prices: Vec<f64>,
    pub width: usize,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new(prices: Vec<f64>) -> Self {
        Self {
            prices,
            width: 3,
            error: None,
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn load_market_data(&self) -> Result<MarketData, GymError> {
        if let Some(reason) = &self.error {
            return Err(GymError::Dataset {
                reason: reason.clone(),
            });
        }
        Ok(make_market(&self.prices, self.width))
    }

    fn describe(&self) -> String {
        format!("mock ({} rows)", self.prices.len())
    }
}

/// Features are the one-step return followed by constant columns.
pub fn make_market(prices: &[f64], width: usize) -> MarketData {
    let rows = prices
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let ret = if i == 0 { 0.0 } else { (p / prices[i - 1] - 1.0) as f32 };
            let mut row = vec![ret];
            row.resize(width, 1.0);
            row
        })
        .collect();
    let frame = FeatureFrame::from_rows(rows).unwrap();
    MarketData::new(frame, ReferencePriceSeries::new(prices.to_vec()).unwrap()).unwrap()
}

pub fn small_config() -> EnvConfig {
    EnvConfig {
        lookback_window: 3,
        ..EnvConfig::default()
    }
}

pub fn make_env(prices: &[f64]) -> TradingEnvironment {
    make_env_with(prices, small_config())
}

pub fn make_env_with(prices: &[f64], config: EnvConfig) -> TradingEnvironment {
    TradingEnvironment::new(Arc::new(make_market(prices, 3)), config).unwrap()
}

/// Context rows at `first`, then one row per step of `path`, then the
/// terminal row. Step `k` of an episode trades at `path[k]`.
pub fn price_path(lookback: usize, first: f64, path: &[f64]) -> Vec<f64> {
    let mut prices = vec![first; lookback + 1];
    prices.extend_from_slice(path);
    prices.push(*path.last().unwrap_or(&first));
    prices
}

pub fn generate_prices(count: usize, start: f64, step: f64) -> Vec<f64> {
    (0..count).map(|i| start + i as f64 * step).collect()
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn write_dataset(dir: &Path, prices: &[f64]) -> PathBuf {
    let path = dir.join("dataset.csv");
    let mut content = String::from("timestamp,close,momentum,volume\n");
    for (i, p) in prices.iter().enumerate() {
        let momentum = if i % 4 < 2 { 1.5 } else { -1.5 };
        content.push_str(&format!("t{i},{p},{momentum},{}\n", 1000 + i));
    }
    std::fs::write(&path, content).unwrap();
    path
}

pub fn is_exit(code: ExitCode, expected: u8) -> bool {
    format!("{code:?}") == format!("{:?}", ExitCode::from(expected))
}
