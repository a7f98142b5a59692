//! Deterministic parser for tabular exports.
//!
//! Given the decoded document and its [`FormatSpecification`], every data
//! row is turned into a [`Transaction`] with local logic only. A row that
//! cannot be parsed is skipped and logged; it never aborts the batch.

use crate::csv_format;
use crate::format_spec::{AmountResolution, DescriptionSource, FormatSpecification};
use crate::types::{StatementMetadata, Transaction, TransactionType, DEFAULT_CURRENCY};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Formats tried after the specification's own date format.
pub const FALLBACK_DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d.%m.%Y", "%m/%d/%Y", "%d/%m/%Y"];

/// Cell values that mean "no amount in this column".
const EMPTY_AMOUNTS: [&str; 5] = ["", "-", "0", "0,00", "0.00"];

/// Why a row was left out.
#[derive(Debug, Clone, PartialEq)]
pub enum RowSkip {
    Tokenize(String),
    TooFewColumns { needed: usize, found: usize },
    NoAmount,
    BadDate(String),
}

impl fmt::Display for RowSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowSkip::Tokenize(e) => write!(f, "cannot tokenize: {}", e),
            RowSkip::TooFewColumns { needed, found } => {
                write!(f, "needs {} columns, found {}", needed, found)
            }
            RowSkip::NoAmount => write!(f, "no usable amount"),
            RowSkip::BadDate(raw) => write!(f, "unparseable date {:?}", raw),
        }
    }
}

/// Parses rows of a document according to one specification.
#[derive(Debug, Clone, Copy)]
pub struct TableParser<'a> {
    spec: &'a FormatSpecification,
}

impl<'a> TableParser<'a> {
    pub fn new(spec: &'a FormatSpecification) -> Self {
        Self { spec }
    }

    /// Parse every data row of `text`.
    pub fn parse(&self, text: &str) -> (Vec<Transaction>, StatementMetadata) {
        let mut transactions = Vec::new();
        let mut skipped = 0usize;

        for (index, line) in csv_format::lines(text)
            .into_iter()
            .enumerate()
            .skip(self.spec.transaction_start_row)
        {
            if line.trim().is_empty() {
                continue;
            }
            match self.parse_row(line) {
                Ok(transaction) => transactions.push(transaction),
                Err(reason) => {
                    skipped += 1;
                    log::debug!("Skipping row {}: {}", index, reason);
                }
            }
        }

        log::info!(
            "Parsed {} transactions from row {} onwards ({} rows skipped)",
            transactions.len(),
            self.spec.transaction_start_row,
            skipped
        );

        (transactions, self.metadata())
    }

    /// Parse a single data line.
    pub fn parse_row(&self, line: &str) -> Result<Transaction, RowSkip> {
        let row = csv_format::split_row(line, self.spec.delimiter, self.spec.quote_char)
            .map_err(|e| RowSkip::Tokenize(e.to_string()))?
            .unwrap_or_default();

        let needed = self.spec.min_row_width();
        if row.len() < needed {
            return Err(RowSkip::TooFewColumns {
                needed,
                found: row.len(),
            });
        }

        let amount = self.resolve_amount(&row).ok_or(RowSkip::NoAmount)?;

        let raw_date = row[self.spec.columns.date].trim();
        let date = parse_date(raw_date, &self.spec.date_format)
            .ok_or_else(|| RowSkip::BadDate(raw_date.to_string()))?;

        let balance = self
            .spec
            .columns
            .balance
            .and_then(|column| self.number(&row[column]));

        let reference = self
            .spec
            .columns
            .reference
            .map(|column| row[column].trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(Transaction {
            date,
            amount,
            description: self.resolve_description(&row),
            transaction_type: TransactionType::from_amount(amount),
            reference,
            balance,
        })
    }

    fn resolve_description(&self, row: &[String]) -> String {
        match &self.spec.columns.description {
            DescriptionSource::Single(column) => row[*column].trim().to_string(),
            DescriptionSource::Parts { counterparty, title } => counterparty
                .iter()
                .chain(title.iter())
                .map(|column| row[*column].trim())
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
            DescriptionSource::Absent => String::new(),
        }
    }

    fn resolve_amount(&self, row: &[String]) -> Option<Decimal> {
        match &self.spec.amount {
            AmountResolution::DebitCredit { debit, credit } => {
                if let Some(value) = self.amount_cell(&row[*debit]) {
                    Some(-value.abs())
                } else {
                    self.amount_cell(&row[*credit]).map(|value| value.abs())
                }
            }
            resolution => resolution
                .candidates()
                .into_iter()
                .find_map(|column| self.amount_cell(&row[column])),
        }
    }

    fn amount_cell(&self, raw: &str) -> Option<Decimal> {
        if EMPTY_AMOUNTS.contains(&raw.trim()) {
            return None;
        }
        self.number(raw)
    }

    fn number(&self, raw: &str) -> Option<Decimal> {
        parse_number(
            raw,
            &self.spec.decimal_separator,
            &self.spec.thousands_separator,
        )
    }

    fn metadata(&self) -> StatementMetadata {
        let header = &self.spec.header;
        StatementMetadata {
            account_number: header.account_number.clone(),
            currency: header
                .currency
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_uppercase)
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            statement_start_date: header
                .statement_start_date
                .as_deref()
                .and_then(|d| parse_date(d, &self.spec.date_format)),
            statement_end_date: header
                .statement_end_date
                .as_deref()
                .and_then(|d| parse_date(d, &self.spec.date_format)),
            opening_balance: header.opening_balance.as_deref().and_then(|b| self.number(b)),
            closing_balance: header.closing_balance.as_deref().and_then(|b| self.number(b)),
            source_filename: None,
        }
    }
}

/// Parse a locale-formatted number.
///
/// The thousands separator and any whitespace are removed and the decimal
/// separator becomes a period before parsing.
pub fn parse_number(raw: &str, decimal_separator: &str, thousands_separator: &str) -> Option<Decimal> {
    let mut cleaned = raw.trim().to_string();
    if !thousands_separator.is_empty() {
        cleaned = cleaned.replace(thousands_separator, "");
    }
    cleaned.retain(|c| !c.is_whitespace());
    if !decimal_separator.is_empty() && decimal_separator != "." {
        cleaned = cleaned.replace(decimal_separator, ".");
    }
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(cleaned).ok()
}

/// Parse a date with `primary` first, then the fallback chain.
pub fn parse_date(raw: &str, primary: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    parse_date_exact(raw, primary).or_else(|| {
        // "2025-07-18 00:00:00" from spreadsheets
        let first = raw.split_whitespace().next()?;
        if first == raw {
            return None;
        }
        parse_date_exact(first, primary)
    })
}

fn parse_date_exact(raw: &str, primary: &str) -> Option<NaiveDate> {
    std::iter::once(primary)
        .chain(FALLBACK_DATE_FORMATS)
        .find_map(|format| {
            NaiveDate::parse_from_str(raw, format)
                .ok()
                .or_else(|| NaiveDateTime::parse_from_str(raw, format).ok().map(|dt| dt.date()))
        })
}
