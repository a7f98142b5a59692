use super::{cause, parse_amount, parse_date, BankParser, BankStatement, BankStatementHeader, BankTransaction};
use crate::csv_format;
use crate::error::{Error, Result};
use regex::Regex;
use rust_decimal::Decimal;

const BANK: &str = "mBank";

const CLIENT_MARKER: &str = "#Klient";
const PERIOD_MARKER: &str = "#Za okres:";
const ACCOUNT_MARKER: &str = "eKonto - ";
const DATA_HEADER: [&str; 5] = [
    "#Data operacji",
    "#Opis operacji",
    "#Rachunek",
    "#Kategoria",
    "#Kwota",
];

/// mBank semicolon-separated "Lista operacji" export.
///
/// A block of `#`-prefixed marker rows (client, period, account) precedes
/// the operations table. mBank reports neither an opening balance nor
/// running balances.
#[derive(Debug, Clone, Copy, Default)]
pub struct MBankParser;

impl BankParser for MBankParser {
    fn bank_name(&self) -> &'static str {
        BANK
    }

    fn parse(&self, text: &str) -> Result<BankStatement> {
        let rows: Vec<Vec<String>> = csv_format::lines(text.trim())
            .into_iter()
            .map(split_cells)
            .collect();

        if rows.len() < 10 {
            return Err(Error::bank(BANK, "mBank CSV file appears to be incomplete"));
        }

        let mut header = parse_header(&rows)?;
        let heuristics = Heuristics::new()?;

        let mut transactions = Vec::new();
        if let Some(start) = rows.iter().position(|row| is_data_header(row)) {
            for (index, row) in rows[start + 1..].iter().enumerate() {
                if row.len() < 5 || row[0].is_empty() || row[0].starts_with('#') {
                    continue;
                }
                let transaction = parse_transaction(row, transactions.len() + 1, &heuristics).map_err(|e| {
                    Error::bank(BANK, format!("Error parsing transaction row {}: {}", index + 1, cause(e)))
                })?;
                transactions.push(transaction);
            }
        }

        header.number_of_entries = transactions.len();
        header.end_balance = header.initial_balance + transactions.iter().map(|t| t.amount).sum::<Decimal>();

        Ok(BankStatement {
            header,
            transactions,
        })
    }
}

/// Semicolon cells, trimmed. Quoted cells keep embedded semicolons.
fn split_cells(line: &str) -> Vec<String> {
    match csv_format::split_row(line.trim(), b';', b'"') {
        Ok(Some(cells)) => cells.into_iter().map(|c| c.trim().to_string()).collect(),
        _ => line.split(';').map(|c| c.trim().to_string()).collect(),
    }
}

fn is_data_header(row: &[String]) -> bool {
    row.len() >= DATA_HEADER.len() && row.iter().zip(DATA_HEADER).all(|(cell, marker)| cell == marker)
}

fn first_cell_after<'a>(rows: &'a [Vec<String>], marker: &str) -> Option<&'a Vec<String>> {
    rows.iter()
        .position(|row| row.first().map(String::as_str) == Some(marker))
        .and_then(|index| rows.get(index + 1))
}

fn parse_header(rows: &[Vec<String>]) -> Result<BankStatementHeader> {
    let account_holder = first_cell_after(rows, CLIENT_MARKER)
        .and_then(|row| row.first())
        .filter(|name| !name.is_empty())
        .cloned()
        .ok_or_else(|| Error::bank(BANK, "Client information not found"))?;

    let period = first_cell_after(rows, PERIOD_MARKER)
        .filter(|row| row.len() >= 3)
        .ok_or_else(|| Error::bank(BANK, "Period information not found"))?;
    let start_date = parse_date(BANK, &period[0], "%d.%m.%Y")?;
    let end_date = parse_date(BANK, &period[1], "%d.%m.%Y")?;

    let account_number = rows
        .iter()
        .flatten()
        .find(|cell| cell.contains(ACCOUNT_MARKER.trim_end()))
        .map(|cell| cell.replace(ACCOUNT_MARKER, "").trim().to_string())
        .filter(|account| !account.is_empty())
        .ok_or_else(|| Error::bank(BANK, "Account information not found"))?;

    Ok(BankStatementHeader {
        generation_date: None,
        start_date,
        end_date,
        account_holder,
        account_number,
        currency: "PLN".to_string(),
        initial_balance: Decimal::ZERO,
        end_balance: Decimal::ZERO,
        number_of_entries: 0,
    })
}

fn parse_transaction(row: &[String], entry_number: usize, heuristics: &Heuristics) -> Result<BankTransaction> {
    let date = parse_date(BANK, &row[0], "%Y-%m-%d")?;
    let description = row[1].trim_matches('"').trim().to_string();
    let amount = parse_amount(BANK, &row[4])?;

    Ok(BankTransaction {
        registered_date: date,
        initiated_date: date,
        other_party_info: heuristics.other_party_info(&description),
        other_party_account: heuristics.other_party_account(&description),
        title: description,
        amount,
        resulting_balance: None,
        entry_number,
    })
}

/// Patterns behind the counterparty heuristics.
struct Heuristics {
    postal_code: Regex,
    account_number: Regex,
}

impl Heuristics {
    fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::bank(BANK, format!("Invalid pattern: {}", e)))
        };
        Ok(Self {
            postal_code: compile(r"\d{2}-\d{3}")?,
            account_number: compile(r"\d{2}\s?\d{4}\s?\d{4}\s?\d{4}\s?\d{4}\s?\d{4}\s?\d{4}")?,
        })
    }

    /// Counterparty name or address guessed from an operation description.
    fn other_party_info(&self, description: &str) -> Option<String> {
        let parts: Vec<&str> = description.split(',').map(str::trim).collect();
        if parts.len() > 1 {
            if !description.contains("PRZELEW ŚRODKÓW") {
                return Some(parts[0].to_string());
            }
            // Own transfer: only an address in the third part says anything.
            let address = parts.get(2)?;
            let upper = address.to_uppercase();
            let looks_like_address = ["UL.", "AL.", "PLAC", "OS."].iter().any(|k| upper.contains(k))
                || self.postal_code.is_match(address);
            return looks_like_address.then(|| address.to_string());
        }

        for prefix in ["PRZELEW ZEWNĘTRZNY PRZYCHODZĄCY", "PRZELEW ZEWNĘTRZNY WYCHODZĄCY"] {
            if !description.contains(prefix) {
                continue;
            }
            let remaining = description.replace(prefix, "");
            let words: Vec<&str> = remaining
                .split_whitespace()
                .take_while(|word| !(word.len() >= 20 && word.chars().all(|c| c.is_ascii_digit())))
                .take(5)
                .collect();
            if !words.is_empty() {
                return Some(words.join(" "));
            }
        }
        None
    }

    /// First 26-digit Polish account number in a description.
    fn other_party_account(&self, description: &str) -> Option<String> {
        self.account_number
            .find_iter(description)
            .map(|m| m.as_str().chars().filter(|c| !c.is_whitespace()).collect::<String>())
            .find(|account| account.len() == 26)
    }
}
