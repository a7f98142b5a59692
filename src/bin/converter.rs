//! Statement converter - CLI tool turning bank statement exports into MT940.

use clap::Parser;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use statement_mt940::{
    bank_parsers::BankParserRegistry,
    config::Config,
    encoding::EncodingDetector,
    mt940_format::{self, Mt940Statement},
    oracle::AnthropicOracle,
    pipeline::Pipeline,
    Result,
};

#[derive(Parser)]
#[command(name = "mt940_converter")]
#[command(about = "Convert bank statement exports (CSV, PDF, XLS, XLSX) to MT940", long_about = None)]
struct Cli {
    /// Input statement file
    #[arg(required_unless_present = "list_banks")]
    input: Option<PathBuf>,

    /// Output file path (or stdout if not provided)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Account number to use instead of the one found in the document
    #[arg(long)]
    account: Option<String>,

    /// Use the fixed-grammar parser of this bank instead of the AI pipeline
    #[arg(long)]
    bank: Option<String>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// List banks with a fixed-grammar parser and exit
    #[arg(long)]
    list_banks: bool,

    /// Print a summary of the written statement to stderr
    #[arg(long)]
    summary: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(if e.is_client_error() { 2 } else { 1 });
    }
}

async fn run(cli: Cli) -> Result<()> {
    let registry = BankParserRegistry::with_defaults();
    if cli.list_banks {
        for bank in registry.supported_banks() {
            println!("{}", bank);
        }
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    let Some(input) = cli.input else {
        return Ok(());
    };
    let filename = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    let bytes = fs::read(&input)?;

    let mt940 = match cli.bank.as_deref() {
        Some(bank) => {
            let detector = EncodingDetector::new(
                config.pipeline.min_confidence,
                &config.pipeline.priority_encodings,
            );
            let (text, encoding) = detector.decode(&bytes, Some(&filename))?;
            log::info!("Decoded {} as {}", filename, encoding);

            let statement = registry.get(bank)?.parse(&text)?;
            log::info!(
                "Parsed {} {} transactions",
                statement.transactions.len(),
                bank
            );
            let (transactions, metadata) = statement.into_parts(Some(&filename));
            mt940_format::render(&transactions, &metadata, cli.account.as_deref())?
        }
        None => {
            let oracle = AnthropicOracle::from_config(&config.oracle)?;
            let pipeline = Pipeline::new(Box::new(oracle), config.pipeline, config.oracle.max_tokens);
            let conversion = pipeline
                .convert(&bytes, &filename, cli.account.as_deref())
                .await?;
            log::info!(
                "Parsing method: {}, tokens used: {}",
                conversion.extraction.parsing_method,
                conversion.extraction.usage.total()
            );
            conversion.mt940
        }
    };

    match cli.output.as_deref() {
        Some(path) => write_output(&mut File::create(path)?, &mt940)?,
        None => write_output(&mut io::stdout(), &mt940)?,
    }

    if cli.summary {
        print_summary(&mt940, cli.output.as_deref())?;
    }

    Ok(())
}

fn write_output<W: Write>(writer: &mut W, mt940: &str) -> Result<()> {
    writeln!(writer, "{}", mt940)?;
    writer.flush()?;
    Ok(())
}

fn print_summary(mt940: &str, output: Option<&Path>) -> Result<()> {
    let statement = Mt940Statement::from_read(&mut mt940.as_bytes())?;
    let target = output
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "stdout".to_string());

    eprintln!("Statement {} written to {}", statement.reference, target);
    eprintln!("  Account:         {}", statement.account);
    eprintln!("  Transactions:    {}", statement.entries.len());
    eprintln!(
        "  Opening balance: {} {}",
        statement.opening_balance.signed_amount(),
        statement.opening_balance.currency
    );
    eprintln!("  Net movement:    {}", statement.net_movement());
    eprintln!(
        "  Closing balance: {} {}",
        statement.closing_balance.signed_amount(),
        statement.closing_balance.currency
    );
    Ok(())
}
