use crate::error::{AppError, Result};

/// Strip an optional sheet qualifier (`incoming!C14` -> `C14`).
pub fn local_address(address: &str) -> &str {
    match address.rfind('!') {
        Some(idx) => &address[idx + 1..],
        None => address,
    }
}

/// Extract the row number from a cell address such as `C14` or `AB23`.
///
/// Everything from the first decimal digit to the end of the address is
/// parsed as the row number, so any column width is accepted.
pub fn row_ordinal(address: &str) -> Result<u32> {
    let local = local_address(address);
    let start = local
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| AppError::MalformedAddress(address.to_string()))?;

    local[start..]
        .parse::<u32>()
        .map_err(|_| AppError::MalformedAddress(address.to_string()))
}

/// Spreadsheet column letters for a zero-based column index.
pub fn column_letters(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// The cell addresses making up one data row, left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowAddress(Vec<String>);

impl RowAddress {
    pub fn new(cells: Vec<String>) -> Result<Self> {
        if cells.is_empty() {
            return Err(AppError::MalformedAddress(
                "row address has no cells".to_string(),
            ));
        }
        Ok(Self(cells))
    }

    /// Addresses for `width` columns of `row`, starting at column `A`.
    pub fn for_row(row: u32, width: usize) -> Result<Self> {
        Self::new(
            (0..width)
                .map(|col| format!("{}{}", column_letters(col), row))
                .collect(),
        )
    }

    pub fn first(&self) -> &str {
        &self.0[0]
    }

    pub fn last(&self) -> &str {
        &self.0[self.0.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Row number of the leftmost cell.
    pub fn ordinal(&self) -> Result<u32> {
        row_ordinal(self.first())
    }

    /// `first:last`, without sheet qualifiers.
    pub fn range(&self) -> String {
        format!("{}:{}", local_address(self.first()), local_address(self.last()))
    }
}
