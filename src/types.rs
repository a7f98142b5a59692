//! Common types shared by the extraction pipeline and the MT940 writer.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

use crate::format_spec::FormatSpecification;

/// One ledger movement extracted from a source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Value date of the movement.
    pub date: NaiveDate,

    /// Signed amount: negative is money out, positive is money in.
    pub amount: Decimal,

    /// Free-text description, as long as the source makes it.
    pub description: String,

    /// Kind of movement.
    pub transaction_type: TransactionType,

    /// Transaction identifier, if the source carries one.
    pub reference: Option<String>,

    /// Running account balance after this movement.
    pub balance: Option<Decimal>,
}

impl Transaction {
    /// Create a transaction whose type is derived from the amount sign.
    pub fn new(date: NaiveDate, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            date,
            amount,
            description: description.into(),
            transaction_type: TransactionType::from_amount(amount),
            reference: None,
            balance: None,
        }
    }
}

/// Kind of ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Credit,
    Debit,
    Transfer,
    Fee,
    Interest,
    Other,
}

impl TransactionType {
    /// Negative is a debit, positive a credit, zero is neither.
    pub fn from_amount(amount: Decimal) -> Self {
        if amount.is_zero() {
            TransactionType::Other
        } else if amount < Decimal::ZERO {
            TransactionType::Debit
        } else {
            TransactionType::Credit
        }
    }

}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CREDIT" => Ok(TransactionType::Credit),
            "DEBIT" => Ok(TransactionType::Debit),
            "TRANSFER" => Ok(TransactionType::Transfer),
            "FEE" => Ok(TransactionType::Fee),
            "INTEREST" => Ok(TransactionType::Interest),
            "OTHER" => Ok(TransactionType::Other),
            _ => Err(format!("Invalid transaction type: {}", s)),
        }
    }
}

/// Debit/Credit mark used in MT940 balance and statement lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebitCredit {
    /// Debit (outgoing, or a negative balance).
    Debit,
    /// Credit (incoming, or a non-negative balance).
    Credit,
}

impl DebitCredit {
    /// `D` for negative values, `C` for everything else.
    pub fn from_amount(amount: Decimal) -> Self {
        if amount < Decimal::ZERO {
            DebitCredit::Debit
        } else {
            DebitCredit::Credit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DebitCredit::Debit => "D",
            DebitCredit::Credit => "C",
        }
    }

    /// Apply the mark to an unsigned amount.
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            DebitCredit::Debit => -amount.abs(),
            DebitCredit::Credit => amount.abs(),
        }
    }
}

impl FromStr for DebitCredit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "D" => Ok(DebitCredit::Debit),
            "C" => Ok(DebitCredit::Credit),
            _ => Err(format!("Invalid debit/credit indicator: {}", s)),
        }
    }
}

/// Statement-level facts accompanying a transaction list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementMetadata {
    /// Account identifier, possibly an IBAN with spaces.
    pub account_number: Option<String>,

    /// ISO 4217 currency code.
    pub currency: String,

    pub statement_start_date: Option<NaiveDate>,
    pub statement_end_date: Option<NaiveDate>,

    pub opening_balance: Option<Decimal>,
    pub closing_balance: Option<Decimal>,

    /// Name of the uploaded file; only feeds the `:20:` reference.
    pub source_filename: Option<String>,
}

/// Currency used when the document does not state one.
pub const DEFAULT_CURRENCY: &str = "EUR";

impl Default for StatementMetadata {
    fn default() -> Self {
        Self {
            account_number: None,
            currency: DEFAULT_CURRENCY.to_string(),
            statement_start_date: None,
            statement_end_date: None,
            opening_balance: None,
            closing_balance: None,
            source_filename: None,
        }
    }
}

/// Token counters reported by the reasoning oracle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Which path of the pipeline produced the final transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsingMethod {
    /// Inferred format specification + deterministic parse.
    FormatSpec,
    /// Same, after re-coding a spreadsheet as comma-delimited CSV.
    FormatSpecCsvRetry,
    /// One oracle extraction call over the whole text.
    AiSingle,
    /// Oracle extraction over header+window chunks.
    AiChunked,
    /// PDF bytes handed to a vision-capable oracle.
    PdfVision,
    /// Fixed-grammar bank parser.
    BankParser,
}

impl fmt::Display for ParsingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParsingMethod::FormatSpec => "format_spec",
            ParsingMethod::FormatSpecCsvRetry => "format_spec_csv_retry",
            ParsingMethod::AiSingle => "ai_single",
            ParsingMethod::AiChunked => "ai_chunked",
            ParsingMethod::PdfVision => "pdf_vision",
            ParsingMethod::BankParser => "bank_parser",
        };
        f.write_str(name)
    }
}

/// Outcome of converting one document into structured data.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub transactions: Vec<Transaction>,
    pub metadata: StatementMetadata,
    /// Tokens spent across every attempt, failed ones included.
    pub usage: TokenUsage,
    pub parsing_method: ParsingMethod,
    /// The last format specification that was inferred, if any.
    pub format_spec: Option<FormatSpecification>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_from_sign() {
        assert_eq!(TransactionType::from_amount(Decimal::new(-4000000, 2)), TransactionType::Debit);
        assert_eq!(TransactionType::from_amount(Decimal::new(1, 2)), TransactionType::Credit);
        assert_eq!(TransactionType::from_amount(Decimal::ZERO), TransactionType::Other);
    }

    #[test]
    fn test_transaction_type_from_str() {
        assert_eq!("fee".parse::<TransactionType>().ok(), Some(TransactionType::Fee));
        assert_eq!(" INTEREST ".parse::<TransactionType>().ok(), Some(TransactionType::Interest));
        assert!("UNKNOWN".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_debit_credit() {
        assert_eq!("D".parse::<DebitCredit>().ok(), Some(DebitCredit::Debit));
        assert_eq!("C".parse::<DebitCredit>().ok(), Some(DebitCredit::Credit));
        assert_eq!("d".parse::<DebitCredit>().ok(), Some(DebitCredit::Debit));
        assert!("X".parse::<DebitCredit>().is_err());
        assert!("DBIT".parse::<DebitCredit>().is_err());
        assert_eq!(DebitCredit::from_amount(Decimal::ZERO), DebitCredit::Credit);
        assert_eq!(DebitCredit::Debit.signed(Decimal::new(500, 2)), Decimal::new(-500, 2));
    }

    #[test]
    fn test_usage_accumulates() {
        let mut usage = TokenUsage::new(100, 20);
        usage += TokenUsage::new(50, 5);
        assert_eq!(usage, TokenUsage::new(150, 25));
        assert_eq!(usage.total(), 175);
    }
}
