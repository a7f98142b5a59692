//! Document-to-transactions orchestration.
//!
//! Tabular documents go through format inference and the deterministic
//! table parser first. When that yields nothing, spreadsheets get one retry
//! as canonical comma CSV, and everything else falls back to oracle
//! extraction, split into header+window chunks for long documents. Each
//! step returns a value and the loop in [`Pipeline::run_tabular`] decides
//! the next [`Stage`] from it.

use crate::config::PipelineSettings;
use crate::csv_format;
use crate::encoding::EncodingDetector;
use crate::error::{Error, Result};
use crate::extract::{self, Sheet, SourceType};
use crate::extraction::{self, ExtractedStatement};
use crate::format_spec::FormatSpecification;
use crate::inference;
use crate::mt940_format;
use crate::oracle::Oracle;
use crate::table_parser::TableParser;
use crate::types::{ExtractionResult, ParsingMethod, StatementMetadata, TokenUsage, Transaction};

/// A tabular document ready for inference.
#[derive(Debug, Clone)]
pub struct TabularDocument {
    /// Decoded CSV, or tab-flattened sheets.
    pub text: String,
    /// Present for spreadsheets; enables the comma CSV retry.
    pub sheets: Option<Vec<Sheet>>,
}

enum Stage {
    InferFormat { text: String, csv_retry: bool },
    DeterministicParse { text: String, spec: FormatSpecification, csv_retry: bool },
    ExcelCsvRetry,
    AiFallbackSingle,
    AiFallbackChunked,
    Done(ParsedStatement),
    Failed(Error),
}

struct ParsedStatement {
    transactions: Vec<Transaction>,
    metadata: StatementMetadata,
    method: ParsingMethod,
}

/// Bookkeeping shared by all stages of one conversion.
#[derive(Default)]
struct Run {
    usage: TokenUsage,
    format_spec: Option<FormatSpecification>,
}

/// MT940 text plus the extraction it was rendered from.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub mt940: String,
    pub extraction: ExtractionResult,
}

/// Converts uploaded documents using one oracle.
pub struct Pipeline {
    oracle: Box<dyn Oracle>,
    settings: PipelineSettings,
    max_tokens: u32,
}

impl Pipeline {
    pub fn new(oracle: Box<dyn Oracle>, settings: PipelineSettings, max_tokens: u32) -> Self {
        Self {
            oracle,
            settings,
            max_tokens,
        }
    }

    /// Extract and render a document as MT940.
    pub async fn convert(
        &self,
        bytes: &[u8],
        filename: &str,
        account_override: Option<&str>,
    ) -> Result<Conversion> {
        let extraction = self.extract(bytes, filename).await?;
        let mt940 = mt940_format::render(
            &extraction.transactions,
            &extraction.metadata,
            account_override,
        )?;
        Ok(Conversion { mt940, extraction })
    }

    /// Extract transactions and statement metadata from a document.
    pub async fn extract(&self, bytes: &[u8], filename: &str) -> Result<ExtractionResult> {
        let source = SourceType::from_filename(filename)?;
        log::info!("Processing {} as {:?} ({} bytes)", filename, source, bytes.len());

        let mut result = match source {
            SourceType::Csv => {
                let detector = EncodingDetector::new(
                    self.settings.csv_min_confidence,
                    &self.settings.priority_encodings,
                );
                let text = extract::decode_csv(&detector, bytes, Some(filename))?;
                self.run_tabular(TabularDocument { text, sheets: None }).await?
            }
            SourceType::Spreadsheet => {
                let sheets = extract::read_spreadsheet(bytes)?;
                let text = extract::sheets_to_text(&sheets);
                self.run_tabular(TabularDocument {
                    text,
                    sheets: Some(sheets),
                })
                .await?
            }
            SourceType::Pdf => self.run_pdf(bytes).await?,
        };

        result.metadata.source_filename = Some(filename.to_string());
        log::info!(
            "Extracted {} transactions via {} ({} input / {} output tokens)",
            result.transactions.len(),
            result.parsing_method,
            result.usage.input_tokens,
            result.usage.output_tokens
        );
        Ok(result)
    }

    /// Drive the inference / parse / retry / fallback state machine.
    pub async fn run_tabular(&self, document: TabularDocument) -> Result<ExtractionResult> {
        let mut run = Run::default();
        let mut stage = Stage::InferFormat {
            text: document.text.clone(),
            csv_retry: false,
        };

        loop {
            stage = match stage {
                Stage::InferFormat { text, csv_retry } => {
                    let sample = head(&text, self.settings.sample_lines);
                    log::debug!("Inferring format from {} sample lines", self.settings.sample_lines);
                    match inference::infer_format(self.oracle.as_ref(), &sample, self.max_tokens).await {
                        Ok(inferred) => {
                            run.usage += inferred.usage;
                            run.format_spec = Some(inferred.spec.clone());
                            Stage::DeterministicParse {
                                text,
                                spec: inferred.spec,
                                csv_retry,
                            }
                        }
                        Err(failure) => {
                            run.usage += failure.usage;
                            log::warn!("Format inference failed ({}), using oracle extraction", failure.reason);
                            self.ai_fallback(&document.text)
                        }
                    }
                }
                Stage::DeterministicParse { text, spec, csv_retry } => {
                    let (transactions, metadata) = TableParser::new(&spec).parse(&text);
                    if !transactions.is_empty() {
                        Stage::Done(ParsedStatement {
                            transactions,
                            metadata,
                            method: if csv_retry {
                                ParsingMethod::FormatSpecCsvRetry
                            } else {
                                ParsingMethod::FormatSpec
                            },
                        })
                    } else if document.sheets.is_some() && !csv_retry {
                        log::warn!("Format specification matched no rows, retrying spreadsheet as CSV");
                        Stage::ExcelCsvRetry
                    } else {
                        log::warn!("Format specification matched no rows, using oracle extraction");
                        self.ai_fallback(&document.text)
                    }
                }
                Stage::ExcelCsvRetry => {
                    let sheets = document.sheets.as_deref().unwrap_or_default();
                    match extract::sheets_to_csv(sheets) {
                        Ok(text) => Stage::InferFormat {
                            text,
                            csv_retry: true,
                        },
                        Err(e) => {
                            log::warn!("Cannot re-code spreadsheet as CSV: {}", e);
                            self.ai_fallback(&document.text)
                        }
                    }
                }
                Stage::AiFallbackSingle => match self.extract_single(&document.text).await {
                    Ok(extracted) => {
                        run.usage += extracted.usage;
                        Stage::Done(ParsedStatement {
                            transactions: extracted.transactions,
                            metadata: extracted.metadata,
                            method: ParsingMethod::AiSingle,
                        })
                    }
                    Err(e) => Stage::Failed(e),
                },
                Stage::AiFallbackChunked => match self.extract_chunked(&document.text).await {
                    Ok(extracted) => {
                        run.usage += extracted.usage;
                        Stage::Done(ParsedStatement {
                            transactions: extracted.transactions,
                            metadata: extracted.metadata,
                            method: ParsingMethod::AiChunked,
                        })
                    }
                    Err(e) => Stage::Failed(e),
                },
                Stage::Done(parsed) => {
                    return Ok(ExtractionResult {
                        transactions: parsed.transactions,
                        metadata: parsed.metadata,
                        usage: run.usage,
                        parsing_method: parsed.method,
                        format_spec: run.format_spec,
                    })
                }
                Stage::Failed(e) => return Err(e),
            };
        }
    }

    fn ai_fallback(&self, text: &str) -> Stage {
        if line_count(text) > self.settings.chunk_threshold_lines {
            Stage::AiFallbackChunked
        } else {
            Stage::AiFallbackSingle
        }
    }

    async fn run_pdf(&self, bytes: &[u8]) -> Result<ExtractionResult> {
        if self.settings.pdf_vision && self.oracle.supports_documents() {
            let pages = extract::pdf_page_count(bytes)?;
            log::info!("Sending {} page PDF to the oracle as a document", pages);
            let extracted = extraction::extract_pdf(self.oracle.as_ref(), bytes, pages, self.max_tokens).await?;
            return Ok(ExtractionResult {
                transactions: extracted.transactions,
                metadata: extracted.metadata,
                usage: extracted.usage,
                parsing_method: ParsingMethod::PdfVision,
                format_spec: None,
            });
        }

        let text = extract::pdf_text(bytes)?;
        let (extracted, method) = if line_count(&text) > self.settings.chunk_threshold_lines {
            (self.extract_chunked(&text).await?, ParsingMethod::AiChunked)
        } else {
            (self.extract_single(&text).await?, ParsingMethod::AiSingle)
        };
        Ok(ExtractionResult {
            transactions: extracted.transactions,
            metadata: extracted.metadata,
            usage: extracted.usage,
            parsing_method: method,
            format_spec: None,
        })
    }

    async fn extract_single(&self, text: &str) -> Result<ExtractedStatement> {
        extraction::extract_text(self.oracle.as_ref(), text, self.max_tokens).await
    }

    /// Extract chunk by chunk, in order. Failed chunks are skipped.
    async fn extract_chunked(&self, text: &str) -> Result<ExtractedStatement> {
        let chunks = chunk_lines(text, self.settings.header_lines, self.settings.lines_per_chunk);
        log::info!("Extracting {} chunks", chunks.len());

        let mut parts = Vec::with_capacity(chunks.len());
        let mut last_error = None;
        for (index, chunk) in chunks.iter().enumerate() {
            log::debug!("Extracting chunk {}/{}", index + 1, chunks.len());
            match extraction::extract_text(self.oracle.as_ref(), chunk, self.max_tokens).await {
                Ok(part) => parts.push(part),
                Err(e) => {
                    log::warn!("Chunk {}/{} failed: {}", index + 1, chunks.len(), e);
                    last_error = Some(e);
                }
            }
        }

        match (parts.is_empty(), last_error) {
            (true, Some(e)) => Err(e),
            _ => Ok(merge_chunks(parts)),
        }
    }
}

fn head(text: &str, lines: usize) -> String {
    csv_format::lines(text)
        .into_iter()
        .take(lines)
        .collect::<Vec<_>>()
        .join("\n")
}

fn line_count(text: &str) -> usize {
    csv_format::lines(text).len()
}

/// Split a document into chunks that each start with the header lines.
///
/// Documents whose data part fits in one window come back whole.
pub fn chunk_lines(text: &str, header_lines: usize, lines_per_chunk: usize) -> Vec<String> {
    let lines = csv_format::lines(text);
    if lines.len() <= header_lines || lines_per_chunk == 0 {
        return vec![text.to_string()];
    }

    let (header, data) = lines.split_at(header_lines);
    if data.len() <= lines_per_chunk {
        return vec![text.to_string()];
    }

    data.chunks(lines_per_chunk)
        .map(|window| {
            header
                .iter()
                .chain(window.iter())
                .copied()
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect()
}

/// Merge per-chunk results in chunk order.
///
/// Metadata comes from the first chunk that reported any. The period is
/// widened to cover every chunk and the closing balance is taken from the
/// last chunk that reports one.
pub fn merge_chunks(parts: Vec<ExtractedStatement>) -> ExtractedStatement {
    let mut merged = ExtractedStatement {
        transactions: Vec::new(),
        metadata: StatementMetadata::default(),
        has_metadata: false,
        usage: TokenUsage::default(),
    };

    for part in parts {
        merged.usage += part.usage;
        merged.transactions.extend(part.transactions);

        if !part.has_metadata {
            continue;
        }
        let incoming = part.metadata;
        if !merged.has_metadata {
            merged.metadata = incoming;
            merged.has_metadata = true;
            continue;
        }

        let current = &mut merged.metadata;
        current.statement_start_date = match (current.statement_start_date, incoming.statement_start_date) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        current.statement_end_date = match (current.statement_end_date, incoming.statement_end_date) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        if incoming.closing_balance.is_some() {
            current.closing_balance = incoming.closing_balance;
        }
        if current.account_number.is_none() {
            current.account_number = incoming.account_number;
        }
        if current.opening_balance.is_none() {
            current.opening_balance = incoming.opening_balance;
        }
    }

    merged
}
