//! Conversion of fixed-grammar bank statements into the pipeline model.
//!
//! A [`BankStatement`] becomes the same (transactions, metadata) pair the
//! extraction pipeline produces, so both feed one MT940 serializer.

use crate::bank_parsers::{BankStatement, BankTransaction};
use crate::types::{StatementMetadata, Transaction, TransactionType};

impl From<&BankTransaction> for Transaction {
    fn from(row: &BankTransaction) -> Self {
        let description = match &row.other_party_info {
            Some(party) => format!("{} {}", row.title, party),
            None => row.title.clone(),
        };

        Transaction {
            date: row.initiated_date,
            amount: row.amount,
            description,
            transaction_type: TransactionType::from_amount(row.amount),
            reference: Some(format!("{:04}", row.entry_number)),
            balance: row.resulting_balance,
        }
    }
}

impl BankStatement {
    /// Transactions and metadata for MT940 rendering.
    pub fn into_parts(self, source_filename: Option<&str>) -> (Vec<Transaction>, StatementMetadata) {
        let transactions = self.transactions.iter().map(Transaction::from).collect();
        let header = self.header;
        let metadata = StatementMetadata {
            account_number: Some(header.account_number),
            currency: header.currency,
            statement_start_date: Some(header.start_date),
            statement_end_date: Some(header.end_date),
            opening_balance: Some(header.initial_balance),
            closing_balance: Some(header.end_balance),
            source_filename: source_filename.map(str::to_string),
        };
        (transactions, metadata)
    }
}
