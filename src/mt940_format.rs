//! MT940 statement rendering and reading.
//!
//! MT940 is the SWIFT message type for electronic account statements. A
//! statement is built from extracted transactions and metadata with
//! [`Mt940Statement::build`] and rendered as `\n`-joined tagged lines:
//!
//! ```text
//! :20:250718-EXPORT
//! :25:/PL27105000990000000000000000
//! :28C:00001
//! :60F:C250718PLN1000,00
//! :61:2507180718D40000,00NMSC
//! :86:Przelew
//! :62F:D250718PLN39000,00
//! ```
//!
//! [`Mt940Statement::from_read`] reads this layout back.

use crate::error::{Error, Result};
use crate::types::{DebitCredit, StatementMetadata, Transaction};
use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::str::FromStr;

/// SWIFT limit for the `:20:` reference.
const MAX_REFERENCE_LEN: usize = 16;
/// `:86:` is at most 6 lines of 65 characters.
const DESCRIPTION_LINE_LEN: usize = 65;
const DESCRIPTION_MAX_LINES: usize = 6;
/// Non-urgent, miscellaneous.
const TRANSACTION_TYPE_CODE: &str = "NMSC";
const STATEMENT_NUMBER: &str = "00001";
const UNKNOWN_ACCOUNT: &str = "UNKNOWN";

/// A `:60F:` or `:62F:` balance.
#[derive(Debug, Clone, PartialEq)]
pub struct Mt940Balance {
    pub mark: DebitCredit,
    pub date: NaiveDate,
    pub currency: String,
    /// Unsigned amount; the sign lives in `mark`.
    pub amount: Decimal,
}

impl Mt940Balance {
    fn new(signed: Decimal, date: NaiveDate, currency: &str) -> Self {
        Self {
            mark: DebitCredit::from_amount(signed),
            date,
            currency: currency.to_string(),
            amount: signed.abs(),
        }
    }

    pub fn signed_amount(&self) -> Decimal {
        self.mark.signed(self.amount)
    }
}

/// A `:61:` statement line with its `:86:` information.
#[derive(Debug, Clone, PartialEq)]
pub struct Mt940Entry {
    pub value_date: NaiveDate,
    pub entry_date: NaiveDate,
    pub mark: DebitCredit,
    /// Unsigned amount; the sign lives in `mark`.
    pub amount: Decimal,
    pub type_code: String,
    /// Whitespace-collapsed description, truncated to the `:86:` limit.
    pub description: String,
}

impl Mt940Entry {
    pub fn signed_amount(&self) -> Decimal {
        self.mark.signed(self.amount)
    }
}

/// Represents an MT940 statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Mt940Statement {
    /// `:20:` transaction reference number.
    pub reference: String,
    /// `:25:` account identification.
    pub account: String,
    /// `:28C:` statement number.
    pub statement_number: String,
    pub opening_balance: Mt940Balance,
    pub entries: Vec<Mt940Entry>,
    pub closing_balance: Mt940Balance,
}

/// Render transactions and metadata as MT940 text.
pub fn render(
    transactions: &[Transaction],
    metadata: &StatementMetadata,
    account_override: Option<&str>,
) -> Result<String> {
    Ok(Mt940Statement::build(transactions, metadata, account_override)?.to_string())
}

impl Mt940Statement {
    /// Build a statement, deriving whatever the metadata leaves open.
    ///
    /// Fails with [`Error::EmptyStatement`] when neither a start nor an end
    /// date can be resolved, and with [`Error::Validation`] on a currency
    /// that is not three letters.
    pub fn build(
        transactions: &[Transaction],
        metadata: &StatementMetadata,
        account_override: Option<&str>,
    ) -> Result<Self> {
        let start = metadata
            .statement_start_date
            .or_else(|| transactions.first().map(|t| t.date));
        let end = metadata
            .statement_end_date
            .or_else(|| transactions.last().map(|t| t.date));
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) => (start, end),
            (Some(date), None) | (None, Some(date)) => (date, date),
            (None, None) => return Err(Error::EmptyStatement),
        };

        let currency = validate_currency(&metadata.currency)?;

        let opening = metadata.opening_balance.unwrap_or_else(|| {
            transactions
                .first()
                .and_then(|t| t.balance.map(|balance| balance - t.amount))
                .unwrap_or(Decimal::ZERO)
        });
        let closing = metadata.closing_balance.unwrap_or_else(|| {
            transactions
                .last()
                .and_then(|t| t.balance)
                .unwrap_or_else(|| opening + transactions.iter().map(|t| t.amount).sum::<Decimal>())
        });

        let account = account_override
            .or(metadata.account_number.as_deref())
            .unwrap_or(UNKNOWN_ACCOUNT);

        let entries = transactions
            .iter()
            .map(|t| Mt940Entry {
                value_date: t.date,
                entry_date: t.date,
                mark: DebitCredit::from_amount(t.amount),
                amount: t.amount.abs(),
                type_code: TRANSACTION_TYPE_CODE.to_string(),
                description: wrap_description(&t.description)
                    .iter()
                    .map(|line| continuation_text(line))
                    .collect(),
            })
            .collect();

        Ok(Self {
            reference: statement_reference(start, metadata.source_filename.as_deref()),
            account: format_account(account),
            statement_number: STATEMENT_NUMBER.to_string(),
            opening_balance: Mt940Balance::new(opening, start, &currency),
            entries,
            closing_balance: Mt940Balance::new(closing, end, &currency),
        })
    }

    /// Parse an MT940 statement from any source implementing `Read`.
    pub fn from_read<R: Read>(reader: &mut R) -> Result<Self> {
        let lines = BufReader::new(reader)
            .lines()
            .collect::<std::io::Result<Vec<String>>>()?;
        Self::parse_lines(&lines)
    }

    /// Write the statement to any destination implementing `Write`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write!(writer, "{}", self)?;
        Ok(())
    }

    /// Sum of all signed entry amounts.
    pub fn net_movement(&self) -> Decimal {
        self.entries.iter().map(Mt940Entry::signed_amount).sum()
    }

    fn parse_lines(lines: &[String]) -> Result<Self> {
        let mut reference = None;
        let mut account = None;
        let mut statement_number = String::new();
        let mut opening_balance = None;
        let mut closing_balance = None;
        let mut entries: Vec<Mt940Entry> = Vec::new();
        let mut in_description = false;

        for (index, raw) in lines.iter().enumerate() {
            let line_no = index + 1;
            let line = raw.trim_end_matches('\r');

            if let Some(value) = line.strip_prefix(":20:") {
                reference = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix(":25:") {
                account = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix(":28C:") {
                statement_number = value.trim().to_string();
            } else if let Some(value) = line.strip_prefix(":60F:").or_else(|| line.strip_prefix(":60M:")) {
                opening_balance = Some(parse_balance(value, line_no)?);
            } else if let Some(value) = line.strip_prefix(":62F:").or_else(|| line.strip_prefix(":62M:")) {
                closing_balance = Some(parse_balance(value, line_no)?);
            } else if let Some(value) = line.strip_prefix(":61:") {
                entries.push(parse_entry(value, line_no)?);
            } else if let Some(value) = line.strip_prefix(":86:") {
                let entry = entries.last_mut().ok_or_else(|| Error::Mt940Parse {
                    line: line_no,
                    message: ":86: without a preceding :61:".to_string(),
                })?;
                entry.description = value.to_string();
                in_description = true;
                continue;
            } else if in_description && !line.starts_with(':') && !line.starts_with('-') {
                // Continuation of a hard-wrapped :86: field.
                if let Some(entry) = entries.last_mut() {
                    entry.description.push_str(continuation_text(line));
                }
                continue;
            }
            in_description = false;
        }

        Ok(Self {
            reference: reference.ok_or_else(|| Error::MissingField("statement reference :20:".to_string()))?,
            account: account.ok_or_else(|| Error::MissingField("account identification :25:".to_string()))?,
            statement_number,
            opening_balance: opening_balance
                .ok_or_else(|| Error::MissingField("opening balance :60F:".to_string()))?,
            entries,
            closing_balance: closing_balance
                .ok_or_else(|| Error::MissingField("closing balance :62F:".to_string()))?,
        })
    }
}

impl fmt::Display for Mt940Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ":20:{}", self.reference)?;
        writeln!(f, ":25:{}", self.account)?;
        writeln!(f, ":28C:{}", self.statement_number)?;
        writeln!(f, ":60F:{}", balance_field(&self.opening_balance))?;

        for entry in &self.entries {
            writeln!(
                f,
                ":61:{}{:02}{:02}{}{}{}",
                format_mt940_date(&entry.value_date),
                entry.entry_date.month(),
                entry.entry_date.day(),
                entry.mark.as_str(),
                format_amount(entry.amount),
                entry.type_code
            )?;
            for (index, line) in wrap_description(&entry.description).iter().enumerate() {
                if index == 0 {
                    writeln!(f, ":86:{}", line)?;
                } else {
                    writeln!(f, "{}", line)?;
                }
            }
        }

        write!(f, ":62F:{}", balance_field(&self.closing_balance))
    }
}

fn balance_field(balance: &Mt940Balance) -> String {
    format!(
        "{}{}{}{}",
        balance.mark.as_str(),
        format_mt940_date(&balance.date),
        balance.currency,
        format_amount(balance.amount)
    )
}

/// Absolute value, two decimals, comma separator, no grouping.
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount
        .abs()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string().replace('.', ",")
}

/// Strip whitespace and add the IBAN slash when the result looks like one.
pub fn format_account(raw: &str) -> String {
    let account: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if account.is_empty() {
        return UNKNOWN_ACCOUNT.to_string();
    }
    let iban_like = account.chars().count() >= 15
        && account.chars().take(2).all(|c| c.is_ascii_alphabetic());
    if iban_like && !account.starts_with('/') {
        format!("/{}", account)
    } else {
        account
    }
}

/// `YYMMDD-FILEPART`, at most 16 characters.
///
/// Only ASCII letters and digits are kept; SWIFT has no accented letters.
fn statement_reference(start: NaiveDate, source_filename: Option<&str>) -> String {
    let file_part: String = source_filename
        .and_then(|name| Path::new(name).file_stem())
        .map(|stem| {
            stem.to_string_lossy()
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .take(8)
                .collect::<String>()
                .to_uppercase()
        })
        .filter(|part| !part.is_empty())
        .unwrap_or_else(|| "STMT".to_string());

    format!("{}-{}", format_mt940_date(&start), file_part)
        .chars()
        .take(MAX_REFERENCE_LEN)
        .collect()
}

fn validate_currency(raw: &str) -> Result<String> {
    let currency = raw.trim().to_uppercase();
    if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(currency)
    } else {
        Err(Error::Validation(format!("unsupported currency code {:?}", raw)))
    }
}

/// Collapse whitespace and hard-split into `:86:` lines.
///
/// Continuation lines never start with `:` or `-`. The split moves back
/// over such characters; when that is impossible the next line gets one
/// escaping space, which [`continuation_text`] removes again.
fn wrap_description(description: &str) -> Vec<String> {
    let collapsed = description.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return vec!["-".to_string()];
    }
    let chars: Vec<char> = collapsed.chars().collect();
    let mut lines: Vec<String> = Vec::new();
    let mut start = 0;

    while start < chars.len() && lines.len() < DESCRIPTION_MAX_LINES {
        let escaped = !lines.is_empty() && needs_escape(&chars[start..]);
        let width = if escaped { DESCRIPTION_LINE_LEN - 1 } else { DESCRIPTION_LINE_LEN };
        let full = (start + width).min(chars.len());

        let mut end = full;
        while end < chars.len() && end > start + 1 && needs_escape(&chars[end..]) {
            end -= 1;
        }
        if end < chars.len() && needs_escape(&chars[end..]) {
            end = full;
        }

        let mut line = String::with_capacity(end - start + 1);
        if escaped {
            line.push(' ');
        }
        line.extend(&chars[start..end]);
        lines.push(line);
        start = end;
    }
    lines
}

fn looks_like_tag(c: char) -> bool {
    c == ':' || c == '-'
}

/// Whether a continuation line starting here could be misread.
fn needs_escape(chars: &[char]) -> bool {
    match chars {
        [c, ..] if looks_like_tag(*c) => true,
        [' ', c, ..] => looks_like_tag(*c),
        _ => false,
    }
}

/// Text of a `:86:` continuation line with the writer's escape removed.
fn continuation_text(line: &str) -> &str {
    match line.strip_prefix(' ') {
        Some(rest) if needs_escape(&rest.chars().take(2).collect::<Vec<_>>()) => rest,
        _ => line,
    }
}

fn parse_balance(content: &str, line: usize) -> Result<Mt940Balance> {
    let invalid = |message: &str| Error::Mt940Parse {
        line,
        message: message.to_string(),
    };

    let mark = content
        .get(0..1)
        .and_then(|m| m.parse::<DebitCredit>().ok())
        .ok_or_else(|| invalid("invalid D/C mark"))?;
    let date = content
        .get(1..7)
        .ok_or_else(|| invalid("missing date"))
        .and_then(parse_mt940_date)?;
    let currency = content
        .get(7..10)
        .ok_or_else(|| invalid("missing currency"))?
        .to_string();
    let amount = content
        .get(10..)
        .ok_or_else(|| invalid("missing amount"))
        .and_then(parse_amount)?;

    Ok(Mt940Balance {
        mark,
        date,
        currency,
        amount,
    })
}

fn parse_entry(content: &str, line: usize) -> Result<Mt940Entry> {
    let invalid = |message: &str| Error::Mt940Parse {
        line,
        message: message.to_string(),
    };

    let value_date = content
        .get(0..6)
        .ok_or_else(|| invalid("missing value date"))
        .and_then(parse_mt940_date)?;

    let mut rest = content.get(6..).unwrap_or("");
    let entry_date = match rest.get(0..4) {
        Some(mmdd) if mmdd.chars().all(|c| c.is_ascii_digit()) => {
            rest = &rest[4..];
            parse_mt940_entry_date(mmdd, value_date.year())?
        }
        _ => value_date,
    };

    // Reversal marks (RC, RD) are read as their plain counterpart.
    let rest = rest.strip_prefix('R').unwrap_or(rest);
    let mark = rest
        .get(0..1)
        .and_then(|m| m.parse::<DebitCredit>().ok())
        .ok_or_else(|| invalid("invalid D/C mark"))?;
    let rest = &rest[1..];

    let amount_end = rest
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    let amount = parse_amount(&rest[..amount_end])?;
    let type_code = rest[amount_end..].chars().take(4).collect();

    Ok(Mt940Entry {
        value_date,
        entry_date,
        mark,
        amount,
        type_code,
        description: String::new(),
    })
}

fn parse_amount(raw: &str) -> Result<Decimal> {
    Decimal::from_str(&raw.trim().replace(',', ".")).map_err(|_| Error::InvalidAmount(raw.to_string()))
}

/// Parse MT940 date format (YYMMDD) to NaiveDate.
fn parse_mt940_date(date_str: &str) -> Result<NaiveDate> {
    let invalid = || Error::InvalidDate(date_str.to_string());
    if date_str.len() != 6 || !date_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let year: i32 = date_str[0..2].parse().map_err(|_| invalid())?;
    let month: u32 = date_str[2..4].parse().map_err(|_| invalid())?;
    let day: u32 = date_str[4..6].parse().map_err(|_| invalid())?;

    // Assume 2000+ for years < 50, otherwise 1900+
    let full_year = if year < 50 { 2000 + year } else { 1900 + year };
    NaiveDate::from_ymd_opt(full_year, month, day).ok_or_else(invalid)
}

/// Parse MT940 entry date (MMDD) using year from value date.
fn parse_mt940_entry_date(date_str: &str, year: i32) -> Result<NaiveDate> {
    let invalid = || Error::InvalidDate(date_str.to_string());
    let month: u32 = date_str.get(0..2).ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let day: u32 = date_str.get(2..4).ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Format NaiveDate to MT940 format (YYMMDD).
fn format_mt940_date(date: &NaiveDate) -> String {
    format!("{:02}{:02}{:02}", date.year() % 100, date.month(), date.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn metadata() -> StatementMetadata {
        StatementMetadata {
            account_number: Some("PL 27 1050 0099 0000 0000 0000 0000".to_string()),
            currency: "pln".to_string(),
            source_filename: Some("wyciąg_lipiec-2025.csv".to_string()),
            ..StatementMetadata::default()
        }
    }

    fn transactions() -> Vec<Transaction> {
        let mut out = Transaction::new(date(2025, 7, 18), dec("-40000.00"), "Przelew  wychodzący\tna konto");
        out.balance = Some(dec("-39000.00"));
        vec![out, Transaction::new(date(2025, 7, 18), dec("40000.00"), "Przelew przychodzący")]
    }

    #[test]
    fn test_render_full_statement() {
        let text = render(&transactions(), &metadata(), None).unwrap();
        assert_eq!(
            text,
            ":20:250718-WYCIGLIP\n\
             :25:/PL27105000990000000000000000\n\
             :28C:00001\n\
             :60F:C250718PLN1000,00\n\
             :61:2507180718D40000,00NMSC\n\
             :86:Przelew wychodzący na konto\n\
             :61:2507180718C40000,00NMSC\n\
             :86:Przelew przychodzący\n\
             :62F:C250718PLN1000,00"
        );
    }

    #[test]
    fn test_render_is_idempotent() {
        let first = render(&transactions(), &metadata(), None).unwrap();
        let second = render(&transactions(), &metadata(), None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_amount_format() {
        assert_eq!(format_amount(dec("-40000")), "40000,00");
        assert_eq!(format_amount(dec("0.005")), "0,01");
        assert_eq!(format_amount(dec("1234567.891")), "1234567,89");
        assert_eq!(format_amount(Decimal::ZERO), "0,00");
        assert_eq!(format_amount(dec("-0.1")), "0,10");
    }

    #[test]
    fn test_empty_statement_without_dates_fails() {
        let err = render(&[], &StatementMetadata::default(), None).unwrap_err();
        assert!(matches!(err, Error::EmptyStatement));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_empty_statement_with_period_renders_balances_only() {
        let meta = StatementMetadata {
            statement_start_date: Some(date(2025, 3, 31)),
            statement_end_date: Some(date(2025, 3, 31)),
            opening_balance: Some(dec("250.00")),
            closing_balance: Some(dec("250.00")),
            ..StatementMetadata::default()
        };
        let text = render(&[], &meta, Some("DE89 3704 0044 0532 0130 00")).unwrap();
        assert_eq!(
            text,
            ":20:250331-STMT\n\
             :25:/DE89370400440532013000\n\
             :28C:00001\n\
             :60F:C250331EUR250,00\n\
             :62F:C250331EUR250,00"
        );
        assert!(!text.contains(":61:"));
    }

    #[test]
    fn test_single_known_date_is_mirrored() {
        let meta = StatementMetadata {
            statement_end_date: Some(date(2025, 1, 31)),
            ..StatementMetadata::default()
        };
        let statement = Mt940Statement::build(&[], &meta, None).unwrap();
        assert_eq!(statement.opening_balance.date, date(2025, 1, 31));
        assert_eq!(statement.closing_balance.date, date(2025, 1, 31));
    }

    #[test]
    fn test_long_description_wraps() {
        let description = "x".repeat(200);
        let lines = wrap_description(&description);
        assert_eq!(lines.len(), 4);
        assert!(lines.iter().all(|l| l.chars().count() <= 65));

        let txn = Transaction::new(date(2025, 1, 2), dec("1"), description);
        let text = render(&[txn], &StatementMetadata::default(), None).unwrap();
        let rendered: Vec<&str> = text.lines().collect();
        assert_eq!(rendered[5], format!(":86:{}", "x".repeat(65)));
        assert_eq!(rendered[6], "x".repeat(65));
        assert_eq!(rendered[7], "x".repeat(65));
        assert_eq!(rendered[8], "xxxxx");
        assert!(rendered[9].starts_with(":62F:"));
    }

    #[test]
    fn test_description_truncated_and_placeholder() {
        assert_eq!(wrap_description(&"y".repeat(1000)).len(), 6);
        assert_eq!(wrap_description("  \t "), vec!["-".to_string()]);
    }

    #[test]
    fn test_account_formatting() {
        assert_eq!(format_account("PL 27 1050 0099 0000 0000 0000 0000"), "/PL27105000990000000000000000");
        assert_eq!(format_account("UNKNOWN"), "UNKNOWN");
        assert_eq!(format_account("/PL27105000990000000000000000"), "/PL27105000990000000000000000");
        assert_eq!(format_account("12345678901234567890"), "12345678901234567890");
        assert_eq!(format_account("   "), "UNKNOWN");
    }

    #[test]
    fn test_missing_account_is_unknown() {
        let txn = Transaction::new(date(2025, 1, 2), dec("1"), "x");
        let statement = Mt940Statement::build(&[txn], &StatementMetadata::default(), None).unwrap();
        assert_eq!(statement.account, "UNKNOWN");
    }

    #[test]
    fn test_reference_from_filename() {
        assert_eq!(statement_reference(date(2025, 7, 18), Some("/tmp/export.csv")), "250718-EXPORT");
        assert_eq!(
            statement_reference(date(2025, 7, 18), Some("Account_Statement_2025.xlsx")),
            "250718-ACCOUNTS"
        );
        assert_eq!(statement_reference(date(2025, 7, 18), Some("__.pdf")), "250718-STMT");
        assert_eq!(statement_reference(date(2025, 7, 18), Some("wyciąg_lipiec.csv")), "250718-WYCIGLIP");
        assert_eq!(statement_reference(date(2025, 7, 18), None), "250718-STMT");
    }

    #[test]
    fn test_invalid_currency_is_validation_error() {
        let meta = StatementMetadata {
            currency: "Złoty".to_string(),
            ..StatementMetadata::default()
        };
        let txn = Transaction::new(date(2025, 1, 2), dec("1"), "x");
        assert!(matches!(render(&[txn], &meta, None), Err(Error::Validation(_))));
    }

    #[test]
    fn test_balance_derivation() {
        let mut first = Transaction::new(date(2025, 1, 2), dec("-20.00"), "a");
        first.balance = Some(dec("80.00"));
        let second = Transaction::new(date(2025, 1, 3), dec("5.50"), "b");
        let statement =
            Mt940Statement::build(&[first, second], &StatementMetadata::default(), None).unwrap();
        assert_eq!(statement.opening_balance.signed_amount(), dec("100.00"));
        assert_eq!(statement.closing_balance.signed_amount(), dec("85.50"));

        let debit = Transaction::new(date(2025, 1, 2), dec("-7.25"), "fee");
        let statement = Mt940Statement::build(&[debit], &StatementMetadata::default(), None).unwrap();
        assert_eq!(statement.opening_balance.signed_amount(), Decimal::ZERO);
        assert_eq!(statement.closing_balance.mark, DebitCredit::Debit);
        assert_eq!(statement.closing_balance.amount, dec("7.25"));
    }

    #[test]
    fn test_read_back_rendered_output() {
        let mut long = Transaction::new(date(2025, 7, 19), dec("-12.34"), "z".repeat(130));
        long.balance = Some(dec("987.66"));
        let text = render(&[long], &metadata(), None).unwrap();

        let statement = Mt940Statement::from_read(&mut text.as_bytes()).unwrap();
        assert_eq!(statement.account, "/PL27105000990000000000000000");
        assert_eq!(statement.statement_number, "00001");
        assert_eq!(statement.entries.len(), 1);
        assert_eq!(statement.entries[0].description, "z".repeat(130));
        assert_eq!(statement.entries[0].signed_amount(), dec("-12.34"));
        assert_eq!(statement.opening_balance.signed_amount(), dec("1000.00"));
        assert_eq!(statement.closing_balance.currency, "PLN");
        assert_eq!(statement.net_movement(), dec("-12.34"));

        let mut written = Vec::new();
        statement.write_to(&mut written).unwrap();
        assert_eq!(String::from_utf8(written).unwrap(), text);
    }

    #[test]
    fn test_continuation_lines_never_look_like_tags() {
        for tail in [":61:REF 12", "-50% discount"] {
            let description = format!("{}{}", "a".repeat(65), tail);
            let txn = Transaction::new(date(2025, 7, 18), dec("-5"), description.clone());
            let text = render(&[txn], &metadata(), None).unwrap();

            let entry_lines: Vec<&str> = text
                .lines()
                .skip_while(|l| !l.starts_with(":86:"))
                .take_while(|l| !l.starts_with(":62F:"))
                .collect();
            assert_eq!(entry_lines.len(), 2, "{}", text);
            assert!(!entry_lines[1].starts_with(':') && !entry_lines[1].starts_with('-'));
            assert!(entry_lines.iter().all(|l| l.trim_start_matches(":86:").chars().count() <= 65));

            let statement = Mt940Statement::from_read(&mut text.as_bytes()).unwrap();
            assert_eq!(statement.entries.len(), 1);
            assert_eq!(statement.entries[0].description, description);
        }
    }

    #[test]
    fn test_space_before_tag_survives_round_trip() {
        let moved = format!("{} :61:x", "c".repeat(65));
        assert_eq!(wrap_description(&moved)[1], "c :61:x");

        let escaped = format!("{} :x", "-".repeat(65));
        assert_eq!(wrap_description(&escaped)[1], "  :x");

        for description in [moved, escaped] {
            let txn = Transaction::new(date(2025, 7, 18), dec("1"), description.clone());
            let text = render(&[txn], &metadata(), None).unwrap();
            let read = Mt940Statement::from_read(&mut text.as_bytes()).unwrap();
            assert_eq!(read.entries[0].description, description);
        }
    }

    #[test]
    fn test_runs_of_dashes_are_escaped() {
        let description = "-".repeat(130);
        let lines = wrap_description(&description);
        assert_eq!(lines[0], "-".repeat(65));
        assert_eq!(lines[1], format!(" {}", "-".repeat(64)));
        assert_eq!(lines[2], " -");
        assert!(lines.iter().all(|l| l.chars().count() <= 65));

        let txn = Transaction::new(date(2025, 7, 18), dec("1"), description.clone());
        let statement = Mt940Statement::build(&[txn.clone()], &metadata(), None).unwrap();
        assert_eq!(statement.entries[0].description, description);

        let text = render(&[txn], &metadata(), None).unwrap();
        let read = Mt940Statement::from_read(&mut text.as_bytes()).unwrap();
        assert_eq!(read.entries[0].description, description);
    }

    #[test]
    fn test_read_requires_reference() {
        let err = Mt940Statement::from_read(&mut ":25:X\n:60F:C250101EUR0,00\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::MissingField(_)));
    }

    #[test]
    fn test_parse_mt940_date() {
        let date = parse_mt940_date("250218").unwrap();
        assert_eq!(date.year(), 2025);
        assert_eq!(date.month(), 2);
        assert_eq!(date.day(), 18);
        assert!(parse_mt940_date("25021").is_err());
    }
}
