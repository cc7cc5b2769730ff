use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GeobioError;

pub const SPECIES: &str = "species";
pub const LAT: &str = "lat";
pub const LON: &str = "lon";
pub const CANONICAL_COLUMNS: [&str; 3] = [SPECIES, LAT, LON];

const DEFAULT_CSV_DELIMITER: u8 = b',';
const DEFAULT_TSV_DELIMITER: u8 = b'\t';

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Empty fields are read as nulls.
    pub fn from_field(field: &str) -> Self {
        if field.trim().is_empty() {
            Cell::Null
        } else {
            Cell::Text(field.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(value) if value.is_finite() => Some(*value),
            Cell::Text(value) => value.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    pub fn render(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Text(value) => value.clone(),
            Cell::Number(value) => value.to_string(),
        }
    }
}

pub type OccurrenceRow = Vec<Cell>;

/// In-memory occurrence table. Every row holds exactly one cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularDataset {
    columns: Vec<String>,
    rows: Vec<OccurrenceRow>,
}

impl TabularDataset {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(columns: &[&str], rows: Vec<Vec<Option<&str>>>) -> Self {
        let mut dataset = Self::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            let cells = row
                .into_iter()
                .map(|value| value.map_or(Cell::Null, Cell::from_field))
                .collect();
            dataset.push_row(cells);
        }
        dataset
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[OccurrenceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Pads or truncates the row to the column count.
    pub fn push_row(&mut self, mut row: OccurrenceRow) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|cells| cells.get(index))
    }

    /// Returns the index of `name`, appending a null-filled column if absent.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(index) = self.column_index(name) {
            return index;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(Cell::Null);
        }
        self.columns.len() - 1
    }

    pub fn set_columns(&mut self, columns: Vec<String>) {
        debug_assert_eq!(columns.len(), self.columns.len());
        self.columns = columns;
    }

    pub fn rows_mut(&mut self) -> &mut Vec<OccurrenceRow> {
        &mut self.rows
    }

    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Cell]) -> bool,
    {
        self.rows.retain(|row| keep(row.as_slice()));
    }

    /// Keeps only the named columns, in the given order. Unknown names are skipped.
    pub fn project(&mut self, names: &[&str]) {
        let indices: Vec<usize> = names
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect();
        self.columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            let projected = indices.iter().map(|&i| row[i].clone()).collect();
            *row = projected;
        }
    }

    pub fn missing_canonical_columns(&self) -> Vec<String> {
        CANONICAL_COLUMNS
            .iter()
            .filter(|name| !self.has_column(name))
            .map(|name| name.to_string())
            .collect()
    }

    /// Typed view of a canonical table. Rows with null cells are skipped.
    pub fn records(&self) -> Vec<OccurrenceRecord> {
        let (Some(species), Some(lat), Some(lon)) = (
            self.column_index(SPECIES),
            self.column_index(LAT),
            self.column_index(LON),
        ) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| {
                Some(OccurrenceRecord {
                    species: row[species].as_text()?.to_string(),
                    lat: row[lat].as_f64()?,
                    lon: row[lon].as_f64()?,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceRecord {
    pub species: String,
    pub lat: f64,
    pub lon: f64,
}

pub fn infer_delimiter(path: &Path) -> u8 {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    }
}

pub fn read_delimited_path(path: &Path, delimiter: Option<u8>) -> Result<TabularDataset, GeobioError> {
    let file = File::open(path)
        .map_err(|err| GeobioError::Read(format!("open {}: {err}", path.display())))?;
    let delimiter = delimiter.unwrap_or_else(|| infer_delimiter(path));
    read_delimited(BufReader::new(file), delimiter)
}

/// Reads a headed delimited table. Short records are padded with nulls.
pub fn read_delimited<R: Read>(reader: R, delimiter: u8) -> Result<TabularDataset, GeobioError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|err| GeobioError::Read(err.to_string()))?
        .iter()
        .map(|header| header.trim().to_string())
        .collect::<Vec<_>>();
    let mut dataset = TabularDataset::new(headers);

    for record in reader.records() {
        let record = record.map_err(|err| GeobioError::Read(err.to_string()))?;
        dataset.push_row(record.iter().map(Cell::from_field).collect());
    }
    Ok(dataset)
}

pub fn write_csv<W: Write>(dataset: &TabularDataset, writer: W) -> Result<(), GeobioError> {
    let mut writer = csv::WriterBuilder::new().from_writer(writer);
    writer
        .write_record(dataset.columns())
        .map_err(|err| GeobioError::Write(err.to_string()))?;
    for row in dataset.rows() {
        writer
            .write_record(row.iter().map(Cell::render))
            .map_err(|err| GeobioError::Write(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| GeobioError::Write(err.to_string()))?;
    Ok(())
}

/// Writes the table to `path`. The dataset itself is left untouched on failure.
pub fn write_csv_path(dataset: &TabularDataset, path: &Path) -> Result<(), GeobioError> {
    let file = File::create(path)
        .map_err(|err| GeobioError::Write(format!("create {}: {err}", path.display())))?;
    write_csv(dataset, BufWriter::new(file))?;
    tracing::info!(path = %path.display(), rows = dataset.len(), "occurrence table written");
    Ok(())
}
