//! Format specification of a tabular bank export.
//!
//! The oracle answers with loosely shaped JSON; [`FormatSpecification::from_json`]
//! validates it into a typed structure once, so the table parser never
//! inspects JSON shape while it walks rows.
//!
//! Expected JSON:
//!
//! ```json
//! {
//!   "format": {
//!     "delimiter": ";", "quote_char": "\"",
//!     "transaction_start_row": 6, "date_format": "%Y-%m-%d",
//!     "decimal_separator": ",", "thousands_separator": " "
//!   },
//!   "columns": {
//!     "date": 0, "description": 2,
//!     "description_parts": {"counterparty": 2, "title": 3},
//!     "amount": 4, "balance": 5, "reference": null
//!   },
//!   "amount_rules": {
//!     "separate_debit_credit_columns": false,
//!     "debit_column": null, "credit_column": null,
//!     "check_all_amount_columns": [4]
//!   },
//!   "metadata": {"account_number": "PL27...", "currency": "PLN"}
//! }
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

/// How the description of a row is assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptionSource {
    /// One column holds the whole description.
    Single(usize),
    /// Counterparty and title live in separate columns and are joined.
    Parts {
        counterparty: Option<usize>,
        title: Option<usize>,
    },
    /// No description column; rows get an empty description.
    Absent,
}

/// How the signed amount of a row is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountResolution {
    /// One signed amount column.
    Single(usize),
    /// Separate columns; debit values become negative, credit values positive.
    DebitCredit { debit: usize, credit: usize },
    /// Probe columns in order; the first usable value wins.
    Candidates(Vec<usize>),
}

impl AmountResolution {
    /// Columns probed in order for a signed amount.
    pub fn candidates(&self) -> Vec<usize> {
        match self {
            AmountResolution::Single(column) => vec![*column],
            AmountResolution::DebitCredit { debit, credit } => vec![*debit, *credit],
            AmountResolution::Candidates(columns) => columns.clone(),
        }
    }
}

/// Column positions, zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub date: usize,
    pub description: DescriptionSource,
    pub balance: Option<usize>,
    pub reference: Option<usize>,
}

/// Statement-level facts the oracle found in the header block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFacts {
    pub account_number: Option<String>,
    pub currency: Option<String>,
    pub opening_balance: Option<String>,
    pub closing_balance: Option<String>,
    pub statement_start_date: Option<String>,
    pub statement_end_date: Option<String>,
}

/// Everything needed to parse a tabular export without further oracle calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpecification {
    pub delimiter: u8,
    pub quote_char: u8,
    /// Zero-based line index of the first transaction row.
    pub transaction_start_row: usize,
    /// chrono/strftime date pattern, e.g. `%d.%m.%Y`.
    pub date_format: String,
    pub decimal_separator: String,
    pub thousands_separator: String,
    pub columns: ColumnMap,
    pub amount: AmountResolution,
    pub header: HeaderFacts,
}

#[derive(Debug, Deserialize)]
struct RawSpec {
    format: RawFormat,
    columns: RawColumns,
    #[serde(default)]
    amount_rules: RawAmountRules,
    #[serde(default)]
    metadata: Option<RawMetadata>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    delimiter: String,
    #[serde(default)]
    quote_char: Option<String>,
    transaction_start_row: usize,
    #[serde(default)]
    date_format: Option<String>,
    #[serde(default)]
    decimal_separator: Option<String>,
    #[serde(default)]
    thousands_separator: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawColumns {
    date: Option<usize>,
    #[serde(default)]
    description: Option<usize>,
    #[serde(default)]
    description_parts: Option<RawDescriptionParts>,
    #[serde(default)]
    amount: Option<usize>,
    #[serde(default)]
    debit: Option<usize>,
    #[serde(default)]
    credit: Option<usize>,
    #[serde(default)]
    balance: Option<usize>,
    #[serde(default)]
    reference: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawDescriptionParts {
    #[serde(default)]
    counterparty: Option<usize>,
    #[serde(default)]
    title: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAmountRules {
    #[serde(default)]
    separate_debit_credit_columns: bool,
    #[serde(default)]
    debit_column: Option<usize>,
    #[serde(default)]
    credit_column: Option<usize>,
    #[serde(default)]
    check_all_amount_columns: Vec<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    account_number: Option<Value>,
    #[serde(default)]
    currency: Option<Value>,
    #[serde(default)]
    opening_balance: Option<Value>,
    #[serde(default)]
    closing_balance: Option<Value>,
    #[serde(default)]
    statement_start_date: Option<Value>,
    #[serde(default)]
    statement_end_date: Option<Value>,
}

impl FormatSpecification {
    /// Validate a JSON document into a specification.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawSpec = serde_json::from_str(json)
            .map_err(|e| Error::FormatInferenceFailed(format!("invalid JSON: {}", e)))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSpec) -> Result<Self> {
        let invalid = |message: &str| Error::FormatInferenceFailed(message.to_string());

        let delimiter = parse_delimiter(&raw.format.delimiter)
            .ok_or_else(|| invalid(&format!("unusable delimiter {:?}", raw.format.delimiter)))?;
        let quote_char = match raw.format.quote_char.as_deref() {
            None | Some("") => b'"',
            Some(quote) => single_ascii(quote)
                .ok_or_else(|| invalid(&format!("unusable quote character {:?}", quote)))?,
        };

        let date = raw.columns.date.ok_or_else(|| invalid("no date column"))?;

        let description = match raw.columns.description_parts {
            Some(RawDescriptionParts { counterparty, title })
                if counterparty.is_some() || title.is_some() =>
            {
                DescriptionSource::Parts { counterparty, title }
            }
            _ => match raw.columns.description {
                Some(column) => DescriptionSource::Single(column),
                None => DescriptionSource::Absent,
            },
        };

        let rules = raw.amount_rules;
        let amount = if rules.separate_debit_credit_columns {
            let debit = rules.debit_column.or(raw.columns.debit);
            let credit = rules.credit_column.or(raw.columns.credit);
            match (debit, credit) {
                (Some(debit), Some(credit)) => AmountResolution::DebitCredit { debit, credit },
                _ => return Err(invalid("separate debit/credit columns without both indices")),
            }
        } else if !rules.check_all_amount_columns.is_empty() {
            AmountResolution::Candidates(rules.check_all_amount_columns)
        } else if let Some(column) = raw.columns.amount {
            AmountResolution::Single(column)
        } else {
            return Err(invalid("no amount column"));
        };

        let header = raw
            .metadata
            .map(|m| HeaderFacts {
                account_number: value_text(m.account_number),
                currency: value_text(m.currency),
                opening_balance: value_text(m.opening_balance),
                closing_balance: value_text(m.closing_balance),
                statement_start_date: value_text(m.statement_start_date),
                statement_end_date: value_text(m.statement_end_date),
            })
            .unwrap_or_default();

        Ok(FormatSpecification {
            delimiter,
            quote_char,
            transaction_start_row: raw.format.transaction_start_row,
            date_format: raw
                .format
                .date_format
                .filter(|f| !f.trim().is_empty())
                .unwrap_or_else(|| "%Y-%m-%d".to_string()),
            decimal_separator: raw.format.decimal_separator.unwrap_or_else(|| ".".to_string()),
            thousands_separator: raw.format.thousands_separator.unwrap_or_default(),
            columns: ColumnMap {
                date,
                description,
                balance: raw.columns.balance,
                reference: raw.columns.reference,
            },
            amount,
            header,
        })
    }

    /// Every column index a row must have for all referenced fields.
    pub fn referenced_columns(&self) -> Vec<usize> {
        let mut columns = vec![self.columns.date];
        match &self.columns.description {
            DescriptionSource::Single(column) => columns.push(*column),
            DescriptionSource::Parts { counterparty, title } => {
                columns.extend(counterparty.iter().chain(title.iter()).copied())
            }
            DescriptionSource::Absent => {}
        }
        columns.extend(self.amount.candidates());
        columns.extend(self.columns.balance);
        columns.extend(self.columns.reference);
        columns
    }

    /// Minimum number of fields a data row needs.
    pub fn min_row_width(&self) -> usize {
        self.referenced_columns()
            .into_iter()
            .max()
            .map_or(0, |max| max + 1)
    }
}

fn parse_delimiter(raw: &str) -> Option<u8> {
    match raw {
        "\t" | "\\t" => Some(b'\t'),
        other if other.eq_ignore_ascii_case("tab") => Some(b'\t'),
        other => single_ascii(other),
    }
}

fn single_ascii(raw: &str) -> Option<u8> {
    match raw.as_bytes() {
        [byte] if byte.is_ascii() => Some(*byte),
        _ => None,
    }
}

fn value_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
