//! CSV-shaped table with a variable schema.
//!
//! Rows are stored positionally against `columns`; a row shorter than the
//! header has empty trailing cells. Concatenation unions columns instead of
//! requiring both sides to share one schema.

use crate::errors::AdapterError;
use crate::models::AppointmentRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// A table with the given header and no rows.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a table from records, columns in first-seen field order.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a AppointmentRecord>) -> Self {
        let mut table = Table::default();
        for record in records {
            table.push_record(record);
        }
        table
    }

    /// Parses UTF-8 comma-delimited text with a header row.
    ///
    /// Blank input yields an empty table rather than an error.
    pub fn parse(bytes: &[u8]) -> Result<Self, AdapterError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Table::default());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() > columns.len() {
                return Err(AdapterError::Csv(format!(
                    "row {} has {} fields but the header has {}",
                    index + 1,
                    record.len(),
                    columns.len()
                )));
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { columns, rows })
    }

    /// Serializes header and rows; an empty table serializes to no bytes.
    pub fn to_csv(&self) -> Result<Vec<u8>, AdapterError> {
        if self.columns.is_empty() {
            return Ok(Vec::new());
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(
                (0..self.columns.len()).map(|i| row.get(i).map(String::as_str).unwrap_or("")),
            )?;
        }
        writer
            .into_inner()
            .map_err(|err| AdapterError::Csv(err.to_string()))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one column top to bottom; missing cells read as `""`.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(index).map(String::as_str).unwrap_or(""))
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows
            .get(row)
            .map(|r| r.get(index).map(String::as_str).unwrap_or(""))
    }

    /// Appends one record as a row, adding any columns it introduces.
    pub fn push_record(&mut self, record: &AppointmentRecord) {
        let mut row = vec![String::new(); self.columns.len()];
        for (name, cell) in record.cells() {
            let index = match self.column_index(name) {
                Some(index) => index,
                None => {
                    self.columns.push(name.to_string());
                    row.push(String::new());
                    self.columns.len() - 1
                }
            };
            row[index] = cell;
        }
        self.rows.push(row);
    }

    /// Appends `other` below `self`. Existing columns keep their position;
    /// columns only `other` has are added after them.
    pub fn concat(&mut self, other: Table) {
        let mapping: Vec<usize> = other
            .columns
            .into_iter()
            .map(|name| match self.column_index(&name) {
                Some(index) => index,
                None => {
                    self.columns.push(name);
                    self.columns.len() - 1
                }
            })
            .collect();

        for row in other.rows {
            let mut placed = vec![String::new(); self.columns.len()];
            for (cell, &target) in row.into_iter().zip(&mapping) {
                placed[target] = cell;
            }
            self.rows.push(placed);
        }
    }
}
