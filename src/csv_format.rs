//! CSV tokenization and writing.
//!
//! Documents are handled line by line: each line is tokenized on its own
//! with the delimiter and quote character of the inferred format, so a
//! broken line never desynchronizes the rest of the file.

use crate::error::{Error, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};

/// Split one line into fields.
///
/// Returns `None` when the line yields no record at all.
pub fn split_row(line: &str, delimiter: u8, quote: u8) -> Result<Option<Vec<String>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .quote(quote)
        .from_reader(line.as_bytes());

    let mut record = StringRecord::new();
    if !reader.read_record(&mut record)? {
        return Ok(None);
    }
    Ok(Some(record.iter().map(str::to_string).collect()))
}

/// Lines of a decoded document, with `\r\n` endings normalized.
pub fn lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// Render rows as comma-delimited CSV with standard quoting.
pub fn write_rows<I, R, S>(rows: I) -> Result<String>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    for row in rows {
        writer.write_record(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_semicolon_row() {
        let row = split_row(r#"2025-07-18;"KAMIL; PRZELEW";-40000,00;"#, b';', b'"')
            .unwrap()
            .unwrap();
        assert_eq!(row, vec!["2025-07-18", "KAMIL; PRZELEW", "-40000,00", ""]);
    }

    #[test]
    fn test_split_custom_quote() {
        let row = split_row("'a,b',c", b',', b'\'').unwrap().unwrap();
        assert_eq!(row, vec!["a,b", "c"]);
    }

    #[test]
    fn test_lines_strip_carriage_returns() {
        assert_eq!(lines("a\r\nb\nc"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_write_rows_quotes_when_needed() {
        let out = write_rows(vec![vec!["Date", "Description"], vec!["2024-01-01", "Shop, Inc."]]).unwrap();
        assert_eq!(out, "Date,Description\n2024-01-01,\"Shop, Inc.\"\n");
    }
}
