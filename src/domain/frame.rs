//! Feature rows, reference prices and the observation windows cut from them.

use std::fmt;

use super::error::GymError;

/// Fixed-width table of numeric observation columns, one row per time step.
///
/// Rows are stored contiguously so a lookback window is a single slice.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    columns: Vec<String>,
    values: Vec<f32>,
    width: usize,
}

impl FeatureFrame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f32>>) -> Result<Self, GymError> {
        let width = columns.len();
        if width == 0 {
            return Err(GymError::InvalidData {
                reason: "feature frame has no columns".into(),
            });
        }

        let mut values = Vec::with_capacity(rows.len() * width);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(GymError::InvalidData {
                    reason: format!("row {} has {} values, expected {}", i, row.len(), width),
                });
            }
            if let Some(col) = row.iter().position(|v| !v.is_finite()) {
                return Err(GymError::InvalidData {
                    reason: format!("non-finite feature at row {}, column {}", i, columns[col]),
                });
            }
            values.extend(row);
        }

        Ok(Self {
            columns,
            values,
            width,
        })
    }

    /// Builds a frame with generated column names `f0..fN`.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, GymError> {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        let columns = (0..width).map(|i| format!("f{i}")).collect();
        Self::new(columns, rows)
    }

    pub fn len(&self) -> usize {
        self.values.len() / self.width
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row(&self, index: usize) -> &[f32] {
        let start = index * self.width;
        &self.values[start..start + self.width]
    }

    /// Rows `[start, end)` as one contiguous slice.
    pub fn rows(&self, start: usize, end: usize) -> &[f32] {
        &self.values[start * self.width..end * self.width]
    }
}

/// Trade prices aligned index-for-index with a [`FeatureFrame`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePriceSeries(Vec<f64>);

impl ReferencePriceSeries {
    pub fn new(prices: Vec<f64>) -> Result<Self, GymError> {
        if let Some(i) = prices.iter().position(|p| !p.is_finite() || *p <= 0.0) {
            return Err(GymError::InvalidData {
                reason: format!("reference price at index {} is {}", i, prices[i]),
            });
        }
        Ok(Self(prices))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> f64 {
        self.0[index]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// A feature frame paired with its reference prices. Immutable once built;
/// environments share it through an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketData {
    frame: FeatureFrame,
    prices: ReferencePriceSeries,
}

impl MarketData {
    pub fn new(frame: FeatureFrame, prices: ReferencePriceSeries) -> Result<Self, GymError> {
        if frame.len() != prices.len() {
            return Err(GymError::InvalidData {
                reason: format!(
                    "feature frame has {} rows but price series has {} values",
                    frame.len(),
                    prices.len()
                ),
            });
        }
        Ok(Self { frame, prices })
    }

    pub fn frame(&self) -> &FeatureFrame {
        &self.frame
    }

    pub fn prices(&self) -> &ReferencePriceSeries {
        &self.prices
    }

    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }
}

/// How an observation window is presented to a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObservationLayout {
    /// `lookback × width` matrix.
    #[default]
    Window,
    /// `lookback * width` vector.
    Flat,
}

impl std::str::FromStr for ObservationLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "window" | "matrix" => Ok(ObservationLayout::Window),
            "flat" | "flattened" => Ok(ObservationLayout::Flat),
            other => Err(format!("unknown observation layout '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationShape {
    Window { rows: usize, cols: usize },
    Flat(usize),
}

impl ObservationShape {
    pub fn new(layout: ObservationLayout, rows: usize, cols: usize) -> Self {
        match layout {
            ObservationLayout::Window => ObservationShape::Window { rows, cols },
            ObservationLayout::Flat => ObservationShape::Flat(rows * cols),
        }
    }

    pub fn element_count(&self) -> usize {
        match *self {
            ObservationShape::Window { rows, cols } => rows * cols,
            ObservationShape::Flat(len) => len,
        }
    }
}

impl fmt::Display for ObservationShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservationShape::Window { rows, cols } => write!(f, "[{rows}, {cols}]"),
            ObservationShape::Flat(len) => write!(f, "[{len}]"),
        }
    }
}

/// One lookback window of feature rows, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    values: Vec<f32>,
    rows: usize,
    cols: usize,
    layout: ObservationLayout,
}

impl Observation {
    pub(crate) fn from_window(frame: &FeatureFrame, end: usize, lookback: usize, layout: ObservationLayout) -> Self {
        Self {
            values: frame.rows(end - lookback, end).to_vec(),
            rows: lookback,
            cols: frame.width(),
            layout,
        }
    }

    pub fn shape(&self) -> ObservationShape {
        ObservationShape::new(self.layout, self.rows, self.cols)
    }

    /// Row-major values, whatever the layout.
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn row(&self, index: usize) -> &[f32] {
        &self.values[index * self.cols..(index + 1) * self.cols]
    }

    /// The most recent row in the window.
    pub fn latest(&self) -> &[f32] {
        self.row(self.rows - 1)
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }
}
