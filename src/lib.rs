//! Statement to MT940 Converter Library
//!
//! Converts bank statement exports into SWIFT MT940 statements.
//!
//! # Sources
//!
//! - **CSV / XLS / XLSX**: the layout is inferred by a reasoning oracle from
//!   the first lines, then every row is parsed locally
//! - **PDF**: transactions are extracted by the oracle
//! - **Known banks** (Santander, mBank): fixed-grammar parsers, no oracle
//!
//! When local parsing finds nothing, the pipeline falls back to oracle
//! extraction, in chunks for long documents.
//!
//! # Examples
//!
//! ## Converting an export with the oracle pipeline
//!
//! ```no_run
//! use statement_mt940::config::Config;
//! use statement_mt940::oracle::AnthropicOracle;
//! use statement_mt940::pipeline::Pipeline;
//!
//! # async fn run() -> statement_mt940::Result<()> {
//! let config = Config::load(None)?;
//! let oracle = AnthropicOracle::from_config(&config.oracle)?;
//! let pipeline = Pipeline::new(Box::new(oracle), config.pipeline, config.oracle.max_tokens);
//!
//! let bytes = std::fs::read("export.csv")?;
//! let conversion = pipeline.convert(&bytes, "export.csv", None).await?;
//! println!("{}", conversion.mt940);
//! # Ok(())
//! # }
//! ```
//!
//! ## Converting a known bank export
//!
//! ```no_run
//! use statement_mt940::bank_parsers::BankParserRegistry;
//! use statement_mt940::mt940_format;
//!
//! let registry = BankParserRegistry::with_defaults();
//! let text = std::fs::read_to_string("santander.csv")?;
//! let statement = registry.get("santander")?.parse(&text)?;
//! let (transactions, metadata) = statement.into_parts(Some("santander.csv"));
//! println!("{}", mt940_format::render(&transactions, &metadata, None)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod encoding;
pub mod extract;
pub mod csv_format;
pub mod format_spec;
pub mod prompts;
pub mod oracle;
pub mod inference;
pub mod table_parser;
pub mod extraction;
pub mod pipeline;
pub mod mt940_format;
pub mod bank_parsers;
pub mod conversion;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::{
    DebitCredit, ExtractionResult, ParsingMethod, StatementMetadata, TokenUsage, Transaction,
    TransactionType,
};
