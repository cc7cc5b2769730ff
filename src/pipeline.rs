use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::error::GeobioError;
use crate::mgrs;
use crate::schema;
use crate::table::{self, Cell, LAT, LON, TabularDataset};

/// Column holding the MGRS reference, by header name or zero-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridColumn {
    Index(usize),
    Name(String),
}

impl Default for GridColumn {
    fn default() -> Self {
        GridColumn::Index(1)
    }
}

impl fmt::Display for GridColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridColumn::Index(index) => write!(f, "#{index}"),
            GridColumn::Name(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for GridColumn {
    type Err = GeobioError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(GeobioError::InvalidGridColumn(value.to_string()));
        }
        Ok(match trimmed.parse::<usize>() {
            Ok(index) => GridColumn::Index(index),
            Err(_) => GridColumn::Name(trimmed.to_string()),
        })
    }
}

impl GridColumn {
    fn resolve(&self, dataset: &TabularDataset) -> Result<usize, GeobioError> {
        match self {
            GridColumn::Index(index) if *index < dataset.columns().len() => Ok(*index),
            GridColumn::Name(name) => dataset
                .column_index(name)
                .ok_or_else(|| GeobioError::GridColumnNotFound(name.clone())),
            GridColumn::Index(_) => Err(GeobioError::GridColumnNotFound(self.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateMode {
    /// MGRS references converted from the grid column.
    Grid,
    /// Latitude/longitude columns already present.
    Geographic,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionSummary {
    pub converted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizationReport {
    pub mode: CoordinateMode,
    pub input_rows: usize,
    pub conversion: Option<ConversionSummary>,
    pub retained_rows: usize,
}

/// Fills `lat`/`lon` from the grid column, one row at a time.
///
/// A row whose reference fails to decode gets null coordinates and the pass
/// continues; the row filter removes it afterwards.
pub fn convert_coordinates(
    dataset: &mut TabularDataset,
    column: &GridColumn,
) -> Result<ConversionSummary, GeobioError> {
    let source = column.resolve(dataset)?;
    let lat = dataset.ensure_column(LAT);
    let lon = dataset.ensure_column(LON);

    let mut summary = ConversionSummary::default();
    for (index, row) in dataset.rows_mut().iter_mut().enumerate() {
        let converted = match &row[source] {
            Cell::Text(reference) => mgrs::to_lat_lon(reference),
            Cell::Number(value) => mgrs::to_lat_lon(&value.to_string()),
            Cell::Null => Err(GeobioError::conversion("", "empty reference")),
        };
        match converted {
            Ok(position) => {
                row[lat] = Cell::Number(position.lat);
                row[lon] = Cell::Number(position.lon);
                summary.converted += 1;
            }
            Err(err) => {
                tracing::warn!(row = index, error = %err, "coordinate conversion failed");
                row[lat] = Cell::Null;
                row[lon] = Cell::Null;
                summary.failed += 1;
            }
        }
    }
    tracing::info!(
        converted = summary.converted,
        failed = summary.failed,
        "coordinate conversion finished"
    );
    Ok(summary)
}

/// Normalizes a table whose grid column holds MGRS references.
pub fn normalize_grid(
    mut dataset: TabularDataset,
    column: &GridColumn,
) -> Result<(TabularDataset, NormalizationReport), GeobioError> {
    let input_rows = dataset.len();
    let summary = convert_coordinates(&mut dataset, column)?;
    let dataset = finish(dataset)?;
    let report = NormalizationReport {
        mode: CoordinateMode::Grid,
        input_rows,
        conversion: Some(summary),
        retained_rows: dataset.len(),
    };
    Ok((dataset, report))
}

/// Normalizes a table that already carries latitude/longitude columns.
pub fn normalize_geographic(
    dataset: TabularDataset,
) -> Result<(TabularDataset, NormalizationReport), GeobioError> {
    let input_rows = dataset.len();
    let dataset = finish(dataset)?;
    let report = NormalizationReport {
        mode: CoordinateMode::Geographic,
        input_rows,
        conversion: None,
        retained_rows: dataset.len(),
    };
    Ok((dataset, report))
}

pub fn normalize_file(
    path: &Path,
    delimiter: Option<u8>,
    mode: CoordinateMode,
    column: &GridColumn,
) -> Result<(TabularDataset, NormalizationReport), GeobioError> {
    let dataset = table::read_delimited_path(path, delimiter)?;
    tracing::debug!(
        path = %path.display(),
        rows = dataset.len(),
        columns = dataset.columns().len(),
        "occurrence table loaded"
    );
    match mode {
        CoordinateMode::Grid => normalize_grid(dataset, column),
        CoordinateMode::Geographic => normalize_geographic(dataset),
    }
}

fn finish(mut dataset: TabularDataset) -> Result<TabularDataset, GeobioError> {
    schema::normalize_schema(&mut dataset);
    schema::filter_rows(&mut dataset);
    schema::project_canonical(&mut dataset);

    let missing = dataset.missing_canonical_columns();
    if !missing.is_empty() {
        return Err(GeobioError::MissingColumns(missing));
    }
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_grid_column() {
        assert_eq!("1".parse::<GridColumn>().unwrap(), GridColumn::Index(1));
        assert_eq!(
            "MGRS".parse::<GridColumn>().unwrap(),
            GridColumn::Name("MGRS".to_string())
        );
        assert_matches!(" ".parse::<GridColumn>(), Err(GeobioError::InvalidGridColumn(_)));
    }

    #[test]
    fn conversion_isolates_failed_rows() {
        let mut dataset = TabularDataset::from_rows(
            &["Taxon", "MGRS"],
            vec![
                vec![Some("Quercus suber"), Some("29SNB1234")],
                vec![Some("Quercus faginea"), Some("invalid")],
                vec![Some("Quercus robur"), None],
            ],
        );
        let summary = convert_coordinates(&mut dataset, &GridColumn::default()).unwrap();
        assert_eq!(summary, ConversionSummary { converted: 1, failed: 2 });
        assert_matches!(dataset.cell(0, "lat"), Some(Cell::Number(_)));
        assert_matches!(dataset.cell(1, "lat"), Some(Cell::Null));
    }

    #[test]
    fn missing_grid_column_fails() {
        let dataset = TabularDataset::from_rows(&["Taxon"], vec![vec![Some("Quercus suber")]]);
        let err = normalize_grid(dataset, &GridColumn::Name("MGRS".into())).unwrap_err();
        assert_matches!(err, GeobioError::GridColumnNotFound(_));
    }

    #[test]
    fn geographic_without_longitude_fails() {
        let dataset = TabularDataset::from_rows(
            &["Species", "Latitude"],
            vec![vec![Some("Quercus suber"), Some("38.0")]],
        );
        let err = normalize_geographic(dataset).unwrap_err();
        assert_matches!(err, GeobioError::MissingColumns(columns) if columns == ["lon"]);
    }
}
