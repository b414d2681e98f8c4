//! FeatureTable data structure for hourly, time-indexed load features.

use crate::error::{ChargingError, Result};
use chrono::{DateTime, Utc};

/// Name of the column promoted to the datetime index when no index is set.
pub const DATETIME_COLUMN: &str = "datetime";

/// A single named column of a [`FeatureTable`].
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Numeric samples; `NaN` marks a missing value.
    Numeric(Vec<f64>),
    /// Datetime samples.
    Datetime(Vec<DateTime<Utc>>),
}

impl Column {
    /// Number of rows in the column.
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(values) => values.len(),
            Column::Datetime(values) => values.len(),
        }
    }

    /// Check if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric samples, or `None` for a datetime column.
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Column::Numeric(values) => Some(values),
            Column::Datetime(_) => None,
        }
    }
}

/// Non-missing samples of one numeric column together with the row
/// positions they were taken from.
///
/// Detectors index into `values`; `positions` maps those indices back to
/// rows of the table, so columns with different missing-data patterns never
/// share a row-to-time mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RetainedSamples {
    pub positions: Vec<usize>,
    pub values: Vec<f64>,
}

impl RetainedSamples {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A table of named feature columns sharing one timestamp axis.
///
/// The axis is either an explicit datetime index or, before
/// [`FeatureTable::with_datetime_index`] is applied, a datetime column named
/// `datetime`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    index: Option<Vec<DateTime<Utc>>>,
    names: Vec<String>,
    columns: Vec<Column>,
}

/// Builder for constructing a [`FeatureTable`].
#[derive(Debug, Clone, Default)]
pub struct FeatureTableBuilder {
    index: Option<Vec<DateTime<Utc>>>,
    names: Vec<String>,
    columns: Vec<Column>,
}

impl FeatureTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the datetime index.
    pub fn index(mut self, timestamps: Vec<DateTime<Utc>>) -> Self {
        self.index = Some(timestamps);
        self
    }

    /// Append a numeric column.
    pub fn column(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.names.push(name.into());
        self.columns.push(Column::Numeric(values));
        self
    }

    /// Append a datetime column.
    pub fn datetime_column(mut self, name: impl Into<String>, values: Vec<DateTime<Utc>>) -> Self {
        self.names.push(name.into());
        self.columns.push(Column::Datetime(values));
        self
    }

    pub fn build(self) -> Result<FeatureTable> {
        FeatureTable::new(self.index, self.names, self.columns)
    }
}

impl FeatureTable {
    /// Create a new table, validating column names and lengths.
    pub fn new(
        index: Option<Vec<DateTime<Utc>>>,
        names: Vec<String>,
        columns: Vec<Column>,
    ) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(ChargingError::DimensionMismatch {
                expected: columns.len(),
                got: names.len(),
            });
        }

        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(ChargingError::InvalidParameter(format!(
                    "duplicate column name '{name}'"
                )));
            }
        }

        let rows = index
            .as_ref()
            .map(|idx| idx.len())
            .or_else(|| columns.first().map(Column::len))
            .unwrap_or(0);

        for column in &columns {
            if column.len() != rows {
                return Err(ChargingError::DimensionMismatch {
                    expected: rows,
                    got: column.len(),
                });
            }
        }

        if let Some(idx) = &index {
            validate_axis(idx)?;
        }

        Ok(Self {
            index,
            names,
            columns,
        })
    }

    pub fn builder() -> FeatureTableBuilder {
        FeatureTableBuilder::new()
    }

    /// A table with no rows and no columns.
    pub fn empty() -> Self {
        Self {
            index: None,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.index
            .as_ref()
            .map(|idx| idx.len())
            .or_else(|| self.columns.first().map(Column::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
    }

    /// Get a numeric column by name.
    pub fn numeric_column(&self, name: &str) -> Result<&[f64]> {
        match self.column(name) {
            Some(Column::Numeric(values)) => Ok(values),
            Some(Column::Datetime(_)) => Err(ChargingError::InputShape(format!(
                "column '{name}' is not numeric"
            ))),
            None => Err(ChargingError::MissingColumn(name.to_string())),
        }
    }

    /// Iterate over numeric columns in insertion order.
    pub fn numeric_columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.names
            .iter()
            .zip(&self.columns)
            .filter_map(|(name, column)| column.as_numeric().map(|v| (name.as_str(), v)))
    }

    pub fn index(&self) -> Option<&[DateTime<Utc>]> {
        self.index.as_deref()
    }

    pub fn has_datetime_index(&self) -> bool {
        self.index.is_some()
    }

    /// Ensure the table is indexed by time.
    ///
    /// Keeps an existing index, otherwise promotes the `datetime` column to
    /// the index. Tables without rows always have a (trivially) valid axis.
    pub fn with_datetime_index(mut self) -> Result<Self> {
        if self.index.is_some() {
            return Ok(self);
        }

        let datetime_pos = self
            .names
            .iter()
            .position(|n| n == DATETIME_COLUMN)
            .filter(|&pos| matches!(self.columns[pos], Column::Datetime(_)));

        if let Some(pos) = datetime_pos {
            if let Column::Datetime(timestamps) = self.columns.remove(pos) {
                validate_axis(&timestamps)?;
                self.names.remove(pos);
                self.index = Some(timestamps);
                return Ok(self);
            }
        }

        if self.is_empty() {
            self.index = Some(Vec::new());
            return Ok(self);
        }

        Err(ChargingError::InputShape(
            "table must have a datetime column or a datetime index".to_string(),
        ))
    }

    /// Timestamps of the index.
    pub fn timestamps(&self) -> Result<&[DateTime<Utc>]> {
        self.index.as_deref().ok_or_else(|| {
            ChargingError::InputShape("table has no datetime index".to_string())
        })
    }

    /// Finite samples of a numeric column with their row positions.
    ///
    /// `NaN` and infinite values are both treated as missing.
    pub fn retained_samples(&self, name: &str) -> Result<RetainedSamples> {
        let values = self.numeric_column(name)?;
        let (positions, values) = values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, &v)| (i, v))
            .unzip();
        Ok(RetainedSamples { positions, values })
    }

    /// Minimum of a column over the closed time range `[from, to]`.
    ///
    /// Missing values are ignored; `None` means the reduction was empty.
    pub fn window_min(
        &self,
        name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        Ok(self
            .window_values(name, from, to)?
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f64::min))
    }

    /// Maximum of a column over the closed time range `[from, to]`.
    pub fn window_max(
        &self,
        name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        Ok(self
            .window_values(name, from, to)?
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f64::max))
    }

    fn window_values(
        &self,
        name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<&[f64]> {
        let timestamps = self.timestamps()?;
        let values = self.numeric_column(name)?;
        if from > to {
            return Ok(&[]);
        }
        let start = timestamps.partition_point(|t| *t < from);
        let end = timestamps.partition_point(|t| *t <= to);
        Ok(&values[start..end])
    }
}

fn validate_axis(timestamps: &[DateTime<Utc>]) -> Result<()> {
    if timestamps.windows(2).any(|w| w[1] <= w[0]) {
        return Err(ChargingError::InputShape(
            "datetime axis must be strictly increasing".to_string(),
        ));
    }
    Ok(())
}
