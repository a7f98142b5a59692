//! Instructions sent to the reasoning oracle.

/// Asks for a JSON format specification of a tabular export sample.
pub const FORMAT_INFERENCE: &str = r#"You are analysing the first lines of a bank statement export (CSV or a spreadsheet flattened to tab-separated text).
Describe its layout so that a program can parse every transaction row without your help.

Return ONLY one JSON object, no prose, with this shape:

{
  "format": {
    "delimiter": ";",
    "quote_char": "\"",
    "transaction_start_row": 0,
    "date_format": "%Y-%m-%d",
    "decimal_separator": ",",
    "thousands_separator": ""
  },
  "columns": {
    "date": 0,
    "description": 1,
    "description_parts": {"counterparty": null, "title": null},
    "amount": 2,
    "balance": null,
    "reference": null
  },
  "amount_rules": {
    "separate_debit_credit_columns": false,
    "debit_column": null,
    "credit_column": null,
    "check_all_amount_columns": []
  },
  "metadata": {
    "account_number": null,
    "currency": null,
    "opening_balance": null,
    "closing_balance": null,
    "statement_start_date": null,
    "statement_end_date": null
  }
}

Rules:
- Column indices and row indices are zero-based. Rows are the lines of the sample exactly as given, including blank lines and metadata lines above the table.
- transaction_start_row is the index of the FIRST line whose first column contains a date. Do not skip rows that repeat the date of an earlier row, and never skip ahead looking for a date change.
  Example: line 5 is "Date;Description;Amount", line 6 is "2025-07-18;Transfer out;-40000,00", line 7 is "2025-07-18;Transfer in;40000,00". The answer is 6, not 7.
  Example: line 0 is "2024-01-02,Coffee,-3.50". The answer is 0.
- date_format uses strftime codes (%d, %m, %Y, %y).
- If the counterparty and the payment title live in different columns, fill description_parts and leave description null.
- If money in and money out are in separate columns, set separate_debit_credit_columns and both debit_column and credit_column.
- If the amount may appear in one of several columns (for example transaction amount and blocked amount), list them in check_all_amount_columns in priority order.
- metadata holds statement-level facts visible above the table; use null when absent. Remove spaces from IBANs.

Sample:

"#;

/// Asks for the line-oriented METADATA/TXN extraction grammar.
pub const TRANSACTION_EXTRACTION: &str = r#"You are a financial document parser. Extract ALL transactions from the document below.

Output format, CSV with properly quoted fields:

METADATA,account_number,currency,statement_start_date,statement_end_date,opening_balance,closing_balance
TXN,date,amount,"description",transaction_type,reference,balance

Example:
METADATA,PL61109010140000071219812874,PLN,2024-01-01,2024-01-31,2000.00,1949.75
TXN,2024-01-15,-50.25,"Card payment, Warsaw",DEBIT,REF123456,1949.75
TXN,2024-01-16,500.00,"Salary",CREDIT,,

Field rules:
- date: YYYY-MM-DD
- amount: period as decimal separator, no thousands separator; negative for money out, positive for money in
- description: always quoted
- transaction_type: CREDIT, DEBIT, TRANSFER, FEE, INTEREST or OTHER
- reference and balance: empty when not available
- account_number: remove all whitespace from IBANs
- currency: 3-letter ISO code; use EUR when the document does not state one
- opening_balance and closing_balance: empty when not available

Return ONLY the METADATA line followed by one TXN line per transaction, in document order. No other text.

Document content:

"#;

/// Same grammar, for a PDF attached as a document.
pub const PDF_EXTRACTION: &str = r#"The attached PDF is a bank statement with {pages} page(s). Read every page, including tables that continue across pages.

"#;
