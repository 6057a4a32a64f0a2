use crate::address::RowAddress;
use crate::error::{AppError, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// One data row keyed by column header. Empty string means unset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowRecord(BTreeMap<String, String>);

impl RowRecord {
    /// Zip a header row with a value row.
    ///
    /// Value rows shorter than the header are padded with empty strings;
    /// cells beyond the last header are dropped.
    pub fn from_row(headers: &[String], values: &[String]) -> Result<Self> {
        let headers_record = csv::StringRecord::from(headers.to_vec());

        let mut row_vec: Vec<String> = values.iter().take(headers.len()).cloned().collect();
        while row_vec.len() < headers.len() {
            row_vec.push(String::new());
        }

        let record = csv::StringRecord::from(row_vec);
        let map: BTreeMap<String, String> = record
            .deserialize(Some(&headers_record))
            .map_err(|e| AppError::Sheets(format!("Failed to zip row with headers: {}", e)))?;

        Ok(Self(map))
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }
}

/// A row selected for processing together with its physical location.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressedRow {
    pub address: RowAddress,
    pub data: RowRecord,
}

/// Headers plus every data row of a sheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetRows {
    pub headers: Vec<String>,
    pub rows: Vec<RowRecord>,
}

impl SheetRows {
    /// Treat the first row as headers and zip the rest.
    pub fn from_values(values: &[Vec<String>]) -> Result<Self> {
        let Some((headers, rest)) = values.split_first() else {
            return Ok(Self::default());
        };

        let rows = rest
            .iter()
            .map(|row| RowRecord::from_row(headers, row))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            headers: headers.clone(),
            rows,
        })
    }
}

/// Headers plus the unprocessed rows returned by a filtered read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilteredRows {
    pub headers: Vec<String>,
    pub rows: Vec<AddressedRow>,
}

/// Render a cell value returned by a backend as the string we work with.
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn cells_to_strings(values: &[Value]) -> Vec<String> {
    values.iter().map(cell_to_string).collect()
}

#[cfg(test)]
pub(crate) mod test_helpers {
    pub(crate) fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }
}
