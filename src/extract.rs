//! Content extractors: raw upload bytes to text the pipeline can work on.

use crate::csv_format;
use crate::encoding::EncodingDetector;
use crate::error::{Error, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::Timelike;
use std::io::Cursor;
use std::path::Path;

/// Kind of uploaded document, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Csv,
    Pdf,
    /// `xls` or `xlsx`.
    Spreadsheet,
}

impl SourceType {
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(SourceType::Csv),
            "pdf" => Ok(SourceType::Pdf),
            "xls" | "xlsx" => Ok(SourceType::Spreadsheet),
            _ => Err(Error::UnsupportedFileType(if extension.is_empty() {
                filename.to_string()
            } else {
                extension
            })),
        }
    }
}

/// Decode a delimited-text upload. The text is returned unchanged otherwise.
pub fn decode_csv(detector: &EncodingDetector, bytes: &[u8], filename: Option<&str>) -> Result<String> {
    let (text, encoding) = detector.decode(bytes, filename)?;
    log::info!("Decoded {} as {}", filename.unwrap_or("input"), encoding);
    Ok(text)
}

/// One worksheet with every cell rendered as text.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    /// Non-empty rows only.
    pub rows: Vec<Vec<String>>,
}

/// Read every sheet of an `xls`/`xlsx` workbook.
pub fn read_spreadsheet(bytes: &[u8]) -> Result<Vec<Sheet>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(render_cell).collect::<Vec<_>>())
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .collect::<Vec<_>>();
        log::debug!("Sheet '{}': {} non-empty rows", name, rows.len());
        sheets.push(Sheet { name, rows });
    }
    Ok(sheets)
}

fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => single_line(s),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => render_float(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) if datetime.time().num_seconds_from_midnight() == 0 => {
                datetime.format("%Y-%m-%d").to_string()
            }
            Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

/// Line breaks and tabs inside a cell become spaces, one row per line.
fn single_line(cell: &str) -> String {
    cell.replace("\r\n", " ").replace(['\r', '\n', '\t'], " ")
}

fn render_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

fn sheet_marker(name: &str) -> String {
    format!("=== Sheet: {} ===", name)
}

/// Flatten sheets to tab-separated lines, each sheet behind a marker line.
pub fn sheets_to_text(sheets: &[Sheet]) -> String {
    let mut lines = Vec::new();
    for sheet in sheets {
        lines.push(sheet_marker(&sheet.name));
        lines.extend(sheet.rows.iter().map(|row| {
            row.iter().map(|cell| single_line(cell)).collect::<Vec<_>>().join("\t")
        }));
    }
    lines.join("\n")
}

/// Same layout as [`sheets_to_text`], written as quoted comma CSV.
pub fn sheets_to_csv(sheets: &[Sheet]) -> Result<String> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    for sheet in sheets {
        rows.push(vec![sheet_marker(&sheet.name)]);
        rows.extend(
            sheet
                .rows
                .iter()
                .map(|row| row.iter().map(|cell| single_line(cell)).collect()),
        );
    }
    csv_format::write_rows(rows)
}

/// Number of pages in a PDF.
pub fn pdf_page_count(bytes: &[u8]) -> Result<usize> {
    let document = lopdf::Document::load_mem(bytes)?;
    Ok(document.get_pages().len())
}

/// Plain text of every page of a PDF.
pub fn pdf_text(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| Error::Pdf(e.to_string()))
}
