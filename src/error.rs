//! Error types for the statement converter.
//!
//! Errors fall into two families: conditions caused by the submitted
//! document (unusable input) and faults of the system or its collaborators.
//! [`Error::is_client_error`] tells them apart.

use std::io;
use thiserror::Error;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while converting a statement.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred during read or write operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error tokenizing or writing CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The byte encoding of the input could not be determined reliably.
    #[error("Encoding detection failed{}: {message}", file_suffix(.filename))]
    EncodingUndetermined {
        filename: Option<String>,
        message: String,
    },

    /// The input is not a csv, pdf, xls or xlsx document.
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// The oracle answer could not be turned into a format specification.
    #[error("Format inference failed: {0}")]
    FormatInferenceFailed(String),

    /// Neither a start nor an end date could be resolved for the statement.
    #[error("Statement contains no transactions and no statement period")]
    EmptyStatement,

    /// Malformed but non-empty input data.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Spreadsheet could not be opened or read.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// PDF could not be read.
    #[error("PDF error: {0}")]
    Pdf(String),

    /// The reasoning oracle call failed.
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A fixed-grammar bank parser rejected the export.
    #[error("Error parsing {bank} statement: {message}")]
    BankParser { bank: String, message: String },

    /// Error reading MT940 text.
    #[error("MT940 parsing error at line {line}: {message}")]
    Mt940Parse { line: usize, message: String },

    /// Invalid date format.
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Invalid amount format.
    #[error("Invalid amount format: {0}")]
    InvalidAmount(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),
}

fn file_suffix(filename: &Option<String>) -> String {
    match filename {
        Some(name) => format!(" for file '{}'", name),
        None => String::new(),
    }
}

impl Error {
    /// Whether the error was caused by the submitted document rather than
    /// by the system. Client errors should be reported back to the user
    /// and never escalated as faults.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::EncodingUndetermined { .. }
                | Error::UnsupportedFileType(_)
                | Error::EmptyStatement
                | Error::Validation(_)
                | Error::BankParser { .. }
        )
    }

    pub(crate) fn bank(bank: &str, message: impl Into<String>) -> Self {
        Error::BankParser {
            bank: bank.to_string(),
            message: message.into(),
        }
    }
}

impl From<calamine::Error> for Error {
    fn from(err: calamine::Error) -> Self {
        Error::Spreadsheet(err.to_string())
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::Pdf(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Oracle(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_distinguished() {
        assert!(Error::EmptyStatement.is_client_error());
        assert!(Error::UnsupportedFileType("docx".into()).is_client_error());
        assert!(Error::Validation("currency".into()).is_client_error());
        assert!(!Error::Oracle("timeout".into()).is_client_error());
        assert!(!Error::FormatInferenceFailed("bad json".into()).is_client_error());
    }

    #[test]
    fn test_encoding_message_names_file() {
        let err = Error::EncodingUndetermined {
            filename: Some("export.csv".into()),
            message: "confidence too low".into(),
        };
        assert_eq!(
            err.to_string(),
            "Encoding detection failed for file 'export.csv': confidence too low"
        );
    }
}
