//! Format inference: ask the oracle how a tabular export is laid out.

use crate::format_spec::FormatSpecification;
use crate::oracle::{Oracle, OracleRequest};
use crate::prompts;
use crate::types::TokenUsage;

/// A validated specification and the tokens spent obtaining it.
#[derive(Debug, Clone, PartialEq)]
pub struct InferredFormat {
    pub spec: FormatSpecification,
    pub usage: TokenUsage,
}

/// Inference did not produce a usable specification.
///
/// Recoverable: the pipeline falls back to oracle extraction. The tokens
/// already spent travel with the failure.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceFailure {
    pub reason: String,
    pub usage: TokenUsage,
}

/// Infer the format specification from the first lines of a document.
pub async fn infer_format(
    oracle: &dyn Oracle,
    sample: &str,
    max_tokens: u32,
) -> Result<InferredFormat, InferenceFailure> {
    let request = OracleRequest::text(format!("{}{}", prompts::FORMAT_INFERENCE, sample), max_tokens);

    let reply = oracle.complete(request).await.map_err(|e| InferenceFailure {
        reason: e.to_string(),
        usage: TokenUsage::default(),
    })?;

    let json = strip_code_fences(&reply.text);
    match FormatSpecification::from_json(json) {
        Ok(spec) => {
            log::info!(
                "Inferred format: delimiter {:?}, transactions from row {}, dates as {}",
                spec.delimiter as char,
                spec.transaction_start_row,
                spec.date_format
            );
            Ok(InferredFormat {
                spec,
                usage: reply.usage,
            })
        }
        Err(e) => Err(InferenceFailure {
            reason: e.to_string(),
            usage: reply.usage,
        }),
    }
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::oracle::OracleReply;
    use async_trait::async_trait;

    struct Canned(String);

    #[async_trait]
    impl Oracle for Canned {
        async fn complete(&self, request: OracleRequest) -> Result<OracleReply> {
            assert!(request.prompt.ends_with("Date;Amount\n"));
            Ok(OracleReply {
                text: self.0.clone(),
                usage: TokenUsage::new(1200, 150),
            })
        }
    }

    struct Unreachable;

    #[async_trait]
    impl Oracle for Unreachable {
        async fn complete(&self, _request: OracleRequest) -> Result<OracleReply> {
            Err(Error::Oracle("connection refused".to_string()))
        }
    }

    const SPEC: &str = r#"{"format": {"delimiter": ";", "transaction_start_row": 1},
                          "columns": {"date": 0, "amount": 1}}"#;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{}\n```\n"), "{}");
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[tokio::test]
    async fn test_fenced_reply_is_accepted() {
        let oracle = Canned(format!("```json\n{}\n```", SPEC));
        let inferred = infer_format(&oracle, "Date;Amount\n", 2048).await.unwrap();
        assert_eq!(inferred.spec.delimiter, b';');
        assert_eq!(inferred.usage, TokenUsage::new(1200, 150));
    }

    #[tokio::test]
    async fn test_invalid_json_keeps_usage() {
        let failure = infer_format(&Canned("I think it is semicolon separated.".to_string()), "Date;Amount\n", 2048)
            .await
            .unwrap_err();
        assert_eq!(failure.usage, TokenUsage::new(1200, 150));
        assert!(failure.reason.starts_with("Format inference failed: invalid JSON"), "{}", failure.reason);
    }

    #[tokio::test]
    async fn test_oracle_error_is_recoverable_failure() {
        let failure = infer_format(&Unreachable, "Date;Amount\n", 2048).await.unwrap_err();
        assert!(failure.reason.contains("connection refused"));
        assert_eq!(failure.usage, TokenUsage::default());
    }
}
