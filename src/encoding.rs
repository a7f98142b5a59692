//! Byte encoding detection for uploaded documents.
//!
//! Every candidate encoding decodes the input; the share of plausible
//! characters among the "suspicious" ones (non-ASCII characters and ASCII
//! control characters) becomes the candidate's confidence. `chardetng`
//! breaks ties. Detection fails instead of guessing when the best
//! confidence is under the threshold.

use crate::error::{Error, Result};
use chardetng::EncodingDetector as StatisticalGuess;
use encoding_rs::Encoding;

/// Encodings scored for every input, in tie-break order.
const CANDIDATES: [&Encoding; 7] = [
    encoding_rs::UTF_8,
    encoding_rs::WINDOWS_1250,
    encoding_rs::ISO_8859_2,
    encoding_rs::WINDOWS_1252,
    encoding_rs::ISO_8859_15,
    encoding_rs::WINDOWS_1251,
    encoding_rs::WINDOWS_1257,
];

/// A preferred encoding wins when it scores within this distance of the best.
const PRIORITY_MARGIN: f32 = 0.05;

/// Non-letter symbols that legitimately appear in bank exports.
const PLAUSIBLE_SYMBOLS: &[char] = &[
    '€', '£', '¥', '§', '°', '«', '»', '–', '—', '„', '“', '”', '‘', '’', '‚', '…', '·', '×',
    '\u{a0}', '\u{feff}',
];

/// Result of encoding detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub encoding: &'static Encoding,
    /// Share of plausible characters, in `[0, 1]`.
    pub confidence: f32,
}

impl Detection {
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }
}

/// Statistical encoding detector with a confidence threshold.
#[derive(Debug, Clone)]
pub struct EncodingDetector {
    min_confidence: f32,
    priority: Vec<&'static Encoding>,
}

impl EncodingDetector {
    /// `priority_hints` are encoding labels such as `windows-1250`; unknown
    /// labels are ignored.
    pub fn new(min_confidence: f32, priority_hints: &[String]) -> Self {
        let priority = priority_hints
            .iter()
            .filter_map(|label| Encoding::for_label(label.trim().as_bytes()))
            .collect();
        Self {
            min_confidence,
            priority,
        }
    }

    /// Detect the encoding of `content`.
    pub fn detect(&self, content: &[u8], filename: Option<&str>) -> Result<Detection> {
        self.detect_and_decode(content, filename)
            .map(|(_, detection)| detection)
    }

    /// Detect the encoding and decode `content` in one step.
    pub fn decode(&self, content: &[u8], filename: Option<&str>) -> Result<(String, &'static str)> {
        let (text, detection) = self.detect_and_decode(content, filename)?;
        Ok((text, detection.name()))
    }

    fn detect_and_decode(&self, content: &[u8], filename: Option<&str>) -> Result<(String, Detection)> {
        let undetermined = |message: String| Error::EncodingUndetermined {
            filename: filename.map(str::to_string),
            message,
        };

        if content.is_empty() {
            return Err(undetermined("cannot detect encoding of empty content".to_string()));
        }

        if let Some((encoding, bom_len)) = Encoding::for_bom(content) {
            let (text, _) = encoding.decode_without_bom_handling(&content[bom_len..]);
            return Ok((text.into_owned(), Detection { encoding, confidence: 1.0 }));
        }

        if content.is_ascii() {
            let text = String::from_utf8_lossy(content).into_owned();
            return Ok((text, Detection { encoding: encoding_rs::UTF_8, confidence: 1.0 }));
        }

        let mut guesser = StatisticalGuess::new();
        guesser.feed(content, true);
        let guessed = guesser.guess(None, true);

        let mut scored: Vec<(usize, &'static Encoding, f32, String)> = CANDIDATES
            .iter()
            .enumerate()
            .filter_map(|(order, encoding)| {
                let text = encoding.decode_without_bom_handling_and_without_replacement(content)?;
                let score = coherence(&text);
                Some((order, *encoding, score, text.into_owned()))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.2.total_cmp(&a.2)
                .then_with(|| (b.1 == guessed).cmp(&(a.1 == guessed)))
                .then_with(|| a.0.cmp(&b.0))
        });

        if scored.is_empty() {
            return Err(undetermined(
                "no candidate encoding decodes the content; the file may be corrupted".to_string(),
            ));
        }

        let mut chosen = 0;
        let best_confidence = scored[0].2;
        // Hints only settle ambiguity between single-byte encodings.
        if scored[0].1 != encoding_rs::UTF_8 {
            let hinted = self.priority.iter().find_map(|hint| {
                scored
                    .iter()
                    .position(|(_, encoding, score, _)| {
                        encoding == hint && (best_confidence - score).abs() < PRIORITY_MARGIN
                    })
            });
            if let Some(position) = hinted {
                chosen = position;
            }
        }

        let (_, encoding, confidence, text) = scored.swap_remove(chosen);
        log::debug!(
            "Detected encoding {} with {:.1}% confidence (statistical guess: {})",
            encoding.name(),
            confidence * 100.0,
            guessed.name()
        );

        if confidence < self.min_confidence {
            return Err(undetermined(format!(
                "confidence too low: detected {} with {:.1}% confidence, {:.1}% required",
                encoding.name(),
                confidence * 100.0,
                self.min_confidence * 100.0
            )));
        }

        Ok((text, Detection { encoding, confidence }))
    }
}

/// Share of suspicious characters that look like real text.
fn coherence(text: &str) -> f32 {
    let mut suspicious = 0usize;
    let mut plausible = 0usize;

    for c in text.chars() {
        if c.is_ascii_graphic() || c.is_ascii_whitespace() {
            continue;
        }
        suspicious += 1;
        if !c.is_ascii() && (c.is_alphabetic() || PLAUSIBLE_SYMBOLS.contains(&c)) {
            plausible += 1;
        }
    }

    if suspicious == 0 {
        1.0
    } else {
        plausible as f32 / suspicious as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLISH: &str = "Data;Opis;Kwota\n2025-07-18;Przelew środków, ul. Bukowińska, Zażółć gęślą jaźń;-40 000,00\n";

    fn hints() -> Vec<String> {
        vec!["windows-1250".to_string(), "ISO-8859-2".to_string()]
    }

    #[test]
    fn test_utf8_text() {
        let detector = EncodingDetector::new(0.7, &hints());
        let (text, name) = detector.decode(POLISH.as_bytes(), None).unwrap();
        assert_eq!(name, "UTF-8");
        assert_eq!(text, POLISH);
    }

    #[test]
    fn test_windows_1250_text() {
        let (bytes, _, had_errors) = encoding_rs::WINDOWS_1250.encode(POLISH);
        assert!(!had_errors);
        let detector = EncodingDetector::new(0.5, &hints());
        let (text, name) = detector.decode(&bytes, Some("ing.csv")).unwrap();
        assert_eq!(name, "windows-1250");
        assert_eq!(text, POLISH);
    }

    #[test]
    fn test_priority_hint_settles_ambiguous_bytes() {
        // 0xE9 is `é` in every Latin code page.
        let bytes = b"Caf\xE9;Opis;12,50\n";

        let detector = EncodingDetector::new(0.7, &["ISO-8859-2".to_string()]);
        let (text, name) = detector.decode(bytes, None).unwrap();
        assert_eq!(name, "ISO-8859-2");
        assert_eq!(text, "Café;Opis;12,50\n");

        let (_, name) = EncodingDetector::new(0.7, &hints()).decode(bytes, None).unwrap();
        assert_eq!(name, "windows-1250");

        let reversed = vec!["ISO-8859-2".to_string(), "windows-1250".to_string()];
        let (_, name) = EncodingDetector::new(0.7, &reversed).decode(bytes, None).unwrap();
        assert_eq!(name, "ISO-8859-2");
    }

    #[test]
    fn test_ascii_is_utf8() {
        let detector = EncodingDetector::new(0.7, &[]);
        let detection = detector.detect(b"date,amount\n2024-01-01,10.00\n", None).unwrap();
        assert_eq!(detection.name(), "UTF-8");
        assert_eq!(detection.confidence, 1.0);
    }

    #[test]
    fn test_bom_is_stripped() {
        let detector = EncodingDetector::new(0.7, &[]);
        let (text, name) = detector.decode(b"\xEF\xBB\xBFdate;amount", None).unwrap();
        assert_eq!(name, "UTF-8");
        assert_eq!(text, "date;amount");
    }

    #[test]
    fn test_empty_content_fails() {
        let detector = EncodingDetector::new(0.7, &[]);
        let err = detector.detect(b"", Some("empty.csv")).unwrap_err();
        assert!(matches!(err, Error::EncodingUndetermined { .. }));
    }

    #[test]
    fn test_binary_noise_fails_below_threshold() {
        let noise: Vec<u8> = (0u8..=31).chain(0x80..=0x9F).cycle().take(512).collect();
        let detector = EncodingDetector::new(0.7, &hints());
        let err = detector.detect(&noise, None).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_coherence_scores() {
        assert_eq!(coherence("plain ascii"), 1.0);
        assert_eq!(coherence("łąka"), 1.0);
        assert!(coherence("\u{0001}\u{0002}ł") < 0.5);
    }
}
