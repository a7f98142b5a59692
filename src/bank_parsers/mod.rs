//! Fixed-grammar readers for known bank exports.
//!
//! Each parser turns the decoded export into a [`BankStatement`]. Parsers
//! are looked up by case-insensitive bank name in a [`BankParserRegistry`]
//! that the application builds once and passes around.

mod mbank;
mod santander;

pub use mbank::MBankParser;
pub use santander::SantanderParser;

use crate::error::{Error, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Statement-level record of a bank export.
#[derive(Debug, Clone, PartialEq)]
pub struct BankStatementHeader {
    pub generation_date: Option<NaiveDate>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub account_holder: String,
    pub account_number: String,
    pub currency: String,
    pub initial_balance: Decimal,
    pub end_balance: Decimal,
    pub number_of_entries: usize,
}

/// One row of a bank export.
#[derive(Debug, Clone, PartialEq)]
pub struct BankTransaction {
    pub registered_date: NaiveDate,
    pub initiated_date: NaiveDate,
    pub title: String,
    pub other_party_info: Option<String>,
    pub other_party_account: Option<String>,
    pub amount: Decimal,
    /// Balance after the operation, when the bank reports it.
    pub resulting_balance: Option<Decimal>,
    pub entry_number: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BankStatement {
    pub header: BankStatementHeader,
    pub transactions: Vec<BankTransaction>,
}

/// Reader for one bank's export grammar.
pub trait BankParser: Send + Sync {
    fn bank_name(&self) -> &'static str;

    /// Parse a decoded export. Structural mismatches are
    /// [`Error::BankParser`] errors naming the cause.
    fn parse(&self, text: &str) -> Result<BankStatement>;
}

/// Bank parsers by lower-cased bank name.
#[derive(Default)]
pub struct BankParserRegistry {
    parsers: BTreeMap<String, Box<dyn BankParser>>,
}

impl BankParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in parser.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SantanderParser));
        registry.register(Box::new(MBankParser));
        registry
    }

    pub fn register(&mut self, parser: Box<dyn BankParser>) {
        self.parsers.insert(parser.bank_name().to_lowercase(), parser);
    }

    pub fn get(&self, bank: &str) -> Result<&dyn BankParser> {
        self.parsers
            .get(&bank.to_lowercase())
            .map(|parser| parser.as_ref())
            .ok_or_else(|| {
                Error::bank(
                    bank,
                    format!(
                        "Bank '{}' not supported. Available banks: {}",
                        bank,
                        self.supported_banks().join(", ")
                    ),
                )
            })
    }

    pub fn supported_banks(&self) -> Vec<String> {
        self.parsers.keys().cloned().collect()
    }
}

/// `-2317,82` / `"40 000,00 PLN"` style amounts.
fn parse_amount(bank: &str, raw: &str) -> Result<Decimal> {
    let cleaned: String = raw
        .trim_matches('"')
        .replace("PLN", "")
        .replace(',', ".")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    cleaned
        .parse::<Decimal>()
        .map_err(|_| Error::bank(bank, format!("Invalid amount format '{}'", raw.trim())))
}

/// Message of a nested parser error, without the bank prefix.
fn cause(error: Error) -> String {
    match error {
        Error::BankParser { message, .. } => message,
        other => other.to_string(),
    }
}

fn parse_date(bank: &str, raw: &str, format: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), format)
        .map_err(|e| Error::bank(bank, format!("Invalid date '{}': {}", raw.trim(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup_is_case_insensitive() {
        let registry = BankParserRegistry::with_defaults();
        assert_eq!(registry.supported_banks(), vec!["mbank".to_string(), "santander".to_string()]);
        assert_eq!(registry.get("MBANK").unwrap().bank_name(), "mBank");
        assert_eq!(registry.get("Santander").unwrap().bank_name(), "Santander");
    }

    #[test]
    fn test_unknown_bank_lists_available() {
        let registry = BankParserRegistry::with_defaults();
        let err = registry.get("ing").err().unwrap();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("Available banks: mbank, santander"));
    }

    #[test]
    fn test_empty_registry() {
        assert!(BankParserRegistry::new().supported_banks().is_empty());
    }

    #[test]
    fn test_amounts() {
        assert_eq!(parse_amount("x", "\"-2317,82\"").unwrap(), Decimal::new(-231782, 2));
        assert_eq!(parse_amount("x", "-40 000,00 PLN").unwrap(), Decimal::new(-4000000, 2));
        assert!(parse_amount("x", "abc").is_err());
    }
}
