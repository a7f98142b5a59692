use super::{cause, parse_amount, parse_date, BankParser, BankStatement, BankStatementHeader, BankTransaction};
use crate::error::{Error, Result};
use csv::{ReaderBuilder, StringRecord};

const BANK: &str = "Santander";

/// Santander comma-separated export.
///
/// The first record is the statement header (generation date, period
/// start, account, holder, currency, opening and closing balance, entry
/// count); every following record is one operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SantanderParser;

impl BankParser for SantanderParser {
    fn bank_name(&self) -> &'static str {
        BANK
    }

    fn parse(&self, text: &str) -> Result<BankStatement> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());
        let rows = reader
            .records()
            .collect::<std::result::Result<Vec<StringRecord>, csv::Error>>()
            .map_err(|e| Error::bank(BANK, format!("Failed to parse CSV content: {}", e)))?;

        if rows.len() < 2 {
            return Err(Error::bank(
                BANK,
                "CSV file must contain at least a header and one transaction",
            ));
        }

        let header = parse_header(&rows[0])?;
        let transactions = rows[1..]
            .iter()
            .enumerate()
            .map(|(index, row)| {
                parse_transaction(row).map_err(|e| {
                    Error::bank(BANK, format!("Error parsing transaction row {}: {}", index + 1, cause(e)))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if transactions.len() != header.number_of_entries {
            return Err(Error::bank(
                BANK,
                format!(
                    "Number of transactions ({}) doesn't match header count ({})",
                    transactions.len(),
                    header.number_of_entries
                ),
            ));
        }

        Ok(BankStatement {
            header,
            transactions,
        })
    }
}

fn parse_header(row: &StringRecord) -> Result<BankStatementHeader> {
    if row.len() < 8 {
        return Err(Error::bank(BANK, "Header row must contain at least 8 fields"));
    }

    let start_date = parse_date(BANK, &row[1], "%d-%m-%Y")?;
    let number_of_entries = row[7]
        .trim()
        .parse::<usize>()
        .map_err(|_| Error::bank(BANK, format!("Invalid entry count '{}'", &row[7])))?;

    Ok(BankStatementHeader {
        generation_date: Some(parse_date(BANK, &row[0], "%Y-%m-%d")?),
        start_date,
        // The export covers a single period start; the end is not given.
        end_date: start_date,
        account_holder: row[3].to_string(),
        account_number: row[2].trim_matches('\'').to_string(),
        currency: row[4].to_string(),
        initial_balance: parse_amount(BANK, &row[5])?,
        end_balance: parse_amount(BANK, &row[6])?,
        number_of_entries,
    })
}

fn parse_transaction(row: &StringRecord) -> Result<BankTransaction> {
    if row.len() < 8 {
        return Err(Error::bank(BANK, "Transaction row must contain at least 8 fields"));
    }

    let optional = |value: &str| Some(value.to_string()).filter(|v| !v.is_empty());

    Ok(BankTransaction {
        registered_date: parse_date(BANK, &row[0], "%d-%m-%Y")?,
        initiated_date: parse_date(BANK, &row[1], "%d-%m-%Y")?,
        title: row[2].to_string(),
        other_party_info: optional(&row[3]),
        other_party_account: optional(&row[4]),
        amount: parse_amount(BANK, &row[5])?,
        resulting_balance: Some(parse_amount(BANK, &row[6])?),
        entry_number: row[7]
            .trim()
            .parse()
            .map_err(|_| Error::bank(BANK, format!("Invalid entry number '{}'", &row[7])))?,
    })
}
