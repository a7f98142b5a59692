use async_trait::async_trait;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use statement_mt940::bank_parsers::BankParserRegistry;
use statement_mt940::config::PipelineSettings;
use statement_mt940::mt940_format::{self, Mt940Statement};
use statement_mt940::oracle::{Oracle, OracleReply, OracleRequest};
use statement_mt940::pipeline::Pipeline;
use statement_mt940::{Error, ParsingMethod, StatementMetadata, TokenUsage};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Oracle answering from a fixed list of replies.
struct CannedOracle {
    replies: Mutex<VecDeque<String>>,
}

impl CannedOracle {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
        }
    }
}

#[async_trait]
impl Oracle for CannedOracle {
    async fn complete(&self, _request: OracleRequest) -> statement_mt940::Result<OracleReply> {
        let text = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Oracle("no reply left".to_string()))?;
        Ok(OracleReply {
            text,
            usage: TokenUsage::new(50, 5),
        })
    }
}

const EXPORT: &str = "Wyciąg z rachunku\n\
    Rachunek;PL27 1050 0099 0000 0000 0000 0000\n\
    \n\
    Okres;2025-07-01;2025-07-31\n\
    \n\
    Data;Opis;Kontrahent;Tytuł;Kwota;\n\
    2025-07-18;Przelew wychodzący;Jan;Zwrot;-40000,00;\n\
    2025-07-18;Przelew przychodzący;Anna;Wpłata;40000,00;";

const FORMAT: &str = r#"```json
{"format": {"delimiter": ";", "transaction_start_row": 6,
  "date_format": "%Y-%m-%d", "decimal_separator": ","},
 "columns": {"date": 0, "description": 1, "amount": 4}}
```"#;

#[tokio::test]
async fn semicolon_export_converts_through_inferred_format() {
    let pipeline = Pipeline::new(
        Box::new(CannedOracle::new(&[FORMAT])),
        PipelineSettings::default(),
        4096,
    );

    let conversion = pipeline
        .convert(EXPORT.as_bytes(), "lipiec.csv", Some("PL27 1050 0099 0000 0000 0000 0000"))
        .await
        .unwrap();

    assert_eq!(conversion.extraction.parsing_method, ParsingMethod::FormatSpec);
    assert_eq!(conversion.extraction.usage, TokenUsage::new(50, 5));

    let lines: Vec<&str> = conversion.mt940.lines().collect();
    assert_eq!(lines[1], ":25:/PL27105000990000000000000000");
    assert_eq!(lines[2], ":28C:00001");
    assert!(lines.contains(&":61:2507180718D40000,00NMSC"), "{}", conversion.mt940);
    assert!(lines.contains(&":61:2507180718C40000,00NMSC"), "{}", conversion.mt940);
    assert!(!conversion.mt940.ends_with('-'));

    let statement = Mt940Statement::from_read(&mut conversion.mt940.as_bytes()).unwrap();
    assert_eq!(statement.entries.len(), 2);
    assert_eq!(statement.net_movement(), Decimal::ZERO);
    assert_eq!(statement.entries[0].description, "Przelew wychodzący");
}

#[tokio::test]
async fn unreadable_export_falls_back_to_extraction() {
    let pipeline = Pipeline::new(
        Box::new(CannedOracle::new(&[
            "I could not determine the layout.",
            "METADATA,PL27105000990000000000000000,PLN,2025-07-01,2025-07-31,100.00,100.00\n\
             TXN,2025-07-18,-40000.00,\"Przelew wychodzący\",DEBIT,,\n\
             TXN,2025-07-18,40000.00,\"Przelew przychodzący\",CREDIT,,",
        ])),
        PipelineSettings::default(),
        4096,
    );

    let conversion = pipeline.convert(EXPORT.as_bytes(), "lipiec.csv", None).await.unwrap();

    assert_eq!(conversion.extraction.parsing_method, ParsingMethod::AiSingle);
    assert_eq!(conversion.extraction.usage, TokenUsage::new(100, 10));
    assert!(conversion.mt940.contains(":60F:C250701PLN100,00"));
    assert!(conversion.mt940.ends_with(":62F:C250731PLN100,00"));
}

#[test]
fn santander_export_converts_without_oracle() {
    let export = "2025-09-22,01-09-2025,'64 1500 1878 1018 7023 1577 0000,JAN KOWALSKI,PLN,\"-2317,82\",\"-3681,08\",2,\n\
        19-09-2025,19-09-2025,Opłata za odnowienie kred. w rach. pł.,,,\"-500,00\",\"-3681,08\",1,\n\
        08-09-2025,08-09-2025,Splata karty kredytowej,Centrum Kart,98 1090 1489 4000 0001 1351 0822,\"-637,56\",\"-3181,08\",2,";

    let registry = BankParserRegistry::with_defaults();
    let statement = registry.get("santander").unwrap().parse(export).unwrap();
    let (transactions, metadata) = statement.into_parts(Some("santander.csv"));
    let text = mt940_format::render(&transactions, &metadata, None).unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], ":20:250901-SANTANDE");
    assert_eq!(lines[1], ":25:64150018781018702315770000");
    assert_eq!(lines[3], ":60F:D250901PLN2317,82");
    assert_eq!(lines.iter().filter(|l| l.starts_with(":61:")).count(), 2);
    assert_eq!(lines.last(), Some(&":62F:D250901PLN3681,08"));
}

#[test]
fn statement_without_dates_is_rejected() {
    let err = mt940_format::render(&[], &StatementMetadata::default(), None).unwrap_err();
    assert!(matches!(err, Error::EmptyStatement));
    assert!(err.is_client_error());
}
