//! Oracle-driven transaction extraction.
//!
//! The oracle answers in a line-oriented grammar:
//!
//! ```text
//! METADATA,account,currency,start_date,end_date,opening_balance,closing_balance
//! TXN,date,amount,"description",type,reference,balance
//! ```
//!
//! Parsing is defensive: malformed lines are skipped, and an answer without
//! any `TXN` line is a valid empty statement.

use crate::csv_format;
use crate::error::Result;
use crate::inference::strip_code_fences;
use crate::oracle::{DocumentAttachment, Oracle, OracleRequest};
use crate::prompts;
use crate::table_parser::{parse_date, parse_number};
use crate::types::{StatementMetadata, TokenUsage, Transaction, TransactionType, DEFAULT_CURRENCY};

/// Transactions and metadata read from one oracle answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedStatement {
    pub transactions: Vec<Transaction>,
    pub metadata: StatementMetadata,
    /// Whether a METADATA line was present.
    pub has_metadata: bool,
    pub usage: TokenUsage,
}

/// Parse an answer in the extraction grammar.
pub fn parse_extraction_response(text: &str) -> ExtractedStatement {
    let mut transactions = Vec::new();
    let mut metadata = StatementMetadata::default();
    let mut has_metadata = false;

    for line in csv_format::lines(strip_code_fences(text)) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts = match csv_format::split_row(line, b',', b'"') {
            Ok(Some(parts)) if !parts.is_empty() => parts,
            _ => {
                log::debug!("Skipping malformed line: {}", preview(line));
                continue;
            }
        };

        match parts[0].trim() {
            "METADATA" if parts.len() >= 7 => {
                metadata = parse_metadata_line(&parts);
                has_metadata = true;
            }
            "TXN" if parts.len() >= 5 => match parse_transaction_line(&parts) {
                Some(transaction) => transactions.push(transaction),
                None => log::debug!("Skipping malformed transaction: {}", preview(line)),
            },
            _ => log::debug!("Ignoring line: {}", preview(line)),
        }
    }

    ExtractedStatement {
        transactions,
        metadata,
        has_metadata,
        usage: TokenUsage::default(),
    }
}

fn parse_metadata_line(parts: &[String]) -> StatementMetadata {
    let field = |index: usize| parts[index].trim();
    let non_empty = |index: usize| Some(field(index)).filter(|v| !v.is_empty());

    StatementMetadata {
        account_number: non_empty(1).map(str::to_string),
        currency: non_empty(2)
            .map(str::to_uppercase)
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        statement_start_date: non_empty(3).and_then(|d| parse_date(d, "%Y-%m-%d")),
        statement_end_date: non_empty(4).and_then(|d| parse_date(d, "%Y-%m-%d")),
        opening_balance: non_empty(5).and_then(|b| parse_number(b, ".", "")),
        closing_balance: non_empty(6).and_then(|b| parse_number(b, ".", "")),
        source_filename: None,
    }
}

fn parse_transaction_line(parts: &[String]) -> Option<Transaction> {
    let field = |index: usize| parts.get(index).map(|v| v.trim()).unwrap_or("");

    let date = parse_date(field(1), "%Y-%m-%d")?;
    let amount = parse_number(field(2), ".", "")?;
    let transaction_type = field(4)
        .parse::<TransactionType>()
        .unwrap_or_else(|_| TransactionType::from_amount(amount));

    Some(Transaction {
        date,
        amount,
        description: field(3).to_string(),
        transaction_type,
        reference: Some(field(5)).filter(|r| !r.is_empty()).map(str::to_string),
        balance: parse_number(field(6), ".", ""),
    })
}

fn preview(line: &str) -> String {
    line.chars().take(100).collect()
}

/// Extract transactions from `text` with one oracle call.
pub async fn extract_text(
    oracle: &dyn Oracle,
    text: &str,
    max_tokens: u32,
) -> Result<ExtractedStatement> {
    let request = OracleRequest::text(format!("{}{}", prompts::TRANSACTION_EXTRACTION, text), max_tokens);
    let reply = oracle.complete(request).await?;

    let mut extracted = parse_extraction_response(&reply.text);
    extracted.usage = reply.usage;
    Ok(extracted)
}

/// Extract transactions from a PDF handed to the oracle as a document.
pub async fn extract_pdf(
    oracle: &dyn Oracle,
    pdf: &[u8],
    page_count: usize,
    max_tokens: u32,
) -> Result<ExtractedStatement> {
    let prompt = format!(
        "{}{}",
        prompts::PDF_EXTRACTION.replace("{pages}", &page_count.to_string()),
        prompts::TRANSACTION_EXTRACTION
    );
    let request = OracleRequest {
        prompt,
        attachment: Some(DocumentAttachment::pdf(pdf)),
        max_tokens,
    };
    let reply = oracle.complete(request).await?;

    let mut extracted = parse_extraction_response(&reply.text);
    extracted.usage = reply.usage;
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_full_response() {
        let response = r#"METADATA,PL61109010140000071219812874,PLN,2024-01-01,2024-01-31,2000.00,1949.75
TXN,2024-01-15,-50.25,"Card payment, Warsaw",DEBIT,REF123456,1949.75
TXN,2024-01-16,500.00,"Salary ""January""",CREDIT,,"#;
        let parsed = parse_extraction_response(response);

        assert!(parsed.has_metadata);
        assert_eq!(parsed.metadata.currency, "PLN");
        assert_eq!(
            parsed.metadata.statement_start_date,
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(parsed.metadata.closing_balance, Some(dec("1949.75")));

        assert_eq!(parsed.transactions.len(), 2);
        let first = &parsed.transactions[0];
        assert_eq!(first.amount, dec("-50.25"));
        assert_eq!(first.description, "Card payment, Warsaw");
        assert_eq!(first.reference.as_deref(), Some("REF123456"));
        assert_eq!(first.balance, Some(dec("1949.75")));

        let second = &parsed.transactions[1];
        assert_eq!(second.description, "Salary \"January\"");
        assert_eq!(second.transaction_type, TransactionType::Credit);
        assert_eq!(second.reference, None);
        assert_eq!(second.balance, None);
    }

    #[test]
    fn test_metadata_only_is_an_empty_statement() {
        let parsed = parse_extraction_response("METADATA,,,,,,\n");
        assert!(parsed.has_metadata);
        assert!(parsed.transactions.is_empty());
        assert_eq!(parsed.metadata.currency, "EUR");
        assert_eq!(parsed.metadata.account_number, None);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let response = "```csv\nHere are the transactions:\n\
                        TXN,2024-02-01,not-a-number,\"x\",DEBIT\n\
                        TXN,2024-02-02\n\
                        TXN,2024-02-03,12.00,\"Refund\",WEIRD,,\n\
                        ```";
        let parsed = parse_extraction_response(response);
        assert!(!parsed.has_metadata);
        assert_eq!(parsed.transactions.len(), 1);
        assert_eq!(parsed.transactions[0].transaction_type, TransactionType::Credit);
    }
}
