//! Plain whitespace-delimited numeric tables (comparison code output)

use crate::reader::{map_file, LineReader};
use crate::types::{FormatErrorKind, FortError, Result};
use std::path::Path;
use tracing::{info, instrument};

/// Row-major table with a fixed column count
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnTable {
    columns: usize,
    values: Vec<f64>,
}

impl ColumnTable {
    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.values.len() / self.columns.max(1)
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        let start = index.checked_mul(self.columns)?;
        self.values.get(start..start + self.columns)
    }

    /// One column across all rows
    pub fn column(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.columns {
            return None;
        }
        Some(
            self.values
                .chunks_exact(self.columns)
                .map(|row| row[index])
                .collect(),
        )
    }

    #[inline]
    pub fn as_flat(&self) -> &[f64] {
        &self.values
    }
}

fn parse_row(line: &str, columns: usize, out: &mut Vec<f64>) -> bool {
    let start = out.len();
    for token in line.split_whitespace() {
        match token.parse::<f64>() {
            Ok(v) if out.len() - start < columns => out.push(v),
            _ => {
                out.truncate(start);
                return false;
            }
        }
    }
    if out.len() - start == columns {
        true
    } else {
        out.truncate(start);
        false
    }
}

/// Keep the lines of `data` that hold exactly `columns` numbers
pub fn parse_table(data: &[u8], columns: usize) -> Result<ColumnTable> {
    if columns == 0 {
        return Err(FortError::Config("table needs at least one column".into()));
    }

    let mut reader = LineReader::new(data);
    let mut values = Vec::new();
    while let Some(line) = reader.next_line() {
        parse_row(&line, columns, &mut values);
    }

    if values.is_empty() {
        return Err(FortError::format(
            FormatErrorKind::NoData,
            reader.location(),
            format!("no rows with {} numeric columns", columns),
        ));
    }
    Ok(ColumnTable { columns, values })
}

#[instrument(skip_all, fields(path = %path.as_ref().display(), columns = columns))]
pub fn read_table<P: AsRef<Path>>(path: P, columns: usize) -> Result<ColumnTable> {
    let mmap = map_file(path.as_ref())?;
    let table = parse_table(&mmap, columns)?;
    info!(rows = table.rows(), "Table read");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_skips_text_and_short_rows() {
        let text = "\
# x  rho  te  ti
0.0 2.7 1.0 1.0
1.0e-4 2.6 1.5 1.2
1.0 2.0
2.0e-4 2.5 2.0 1.4 9.9
3.0e-4 2.4 2.5 1.6
";
        let table = parse_table(text.as_bytes(), 4).unwrap();
        assert_eq!(table.rows(), 3);
        assert_eq!(table.column(1), Some(vec![2.7, 2.6, 2.4]));
        assert_eq!(table.row(2), Some(&[3.0e-4, 2.4, 2.5, 1.6][..]));
        assert_eq!(table.column(4), None);
    }

    #[test]
    fn test_table_errors() {
        assert!(matches!(parse_table(b"1 2\n", 0), Err(FortError::Config(_))));
        let err = parse_table(b"a b c d\n", 4).unwrap_err();
        assert_eq!(err.format_kind(), Some(FormatErrorKind::NoData));
    }
}
