use std::marker::PhantomData;

use hedge_models::QuantMetrics;
use serde::de::DeserializeOwned;

use crate::error::ParseError;

/// Extract the first JSON object from a string that may contain surrounding text.
///
/// Handles common LLM response formats:
/// - Clean JSON: `{"key": "value"}`
/// - Markdown-wrapped: ```json\n{"key": "value"}\n```
/// - Prefix text: `Here is the analysis:\n{"key": "value"}`
pub fn extract_json(text: &str) -> Result<String, ParseError> {
    let trimmed = text.trim();

    if trimmed.starts_with('{') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Ok(trimmed.to_string());
    }

    if let Some(json_str) = extract_from_markdown_block(trimmed) {
        if json_str.starts_with('{')
            && serde_json::from_str::<serde_json::Value>(&json_str).is_ok()
        {
            return Ok(json_str);
        }
    }

    if let Some(json_str) = extract_balanced(trimmed, '{', '}') {
        if serde_json::from_str::<serde_json::Value>(&json_str).is_ok() {
            return Ok(json_str);
        }
    }

    Err(ParseError::NoJson(text.len()))
}

/// Extract the first JSON array, with the same tolerance as [`extract_json`].
pub fn extract_json_array(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let candidates = [
        Some(trimmed.to_string()),
        extract_from_markdown_block(trimmed),
        extract_balanced(trimmed, '[', ']'),
    ];
    candidates.into_iter().flatten().find(|candidate| {
        candidate.starts_with('[')
            && serde_json::from_str::<serde_json::Value>(candidate).is_ok()
    })
}

/// Extract JSON from a markdown code block (```json ... ``` or ``` ... ```)
fn extract_from_markdown_block(text: &str) -> Option<String> {
    let start_markers = ["```json\n", "```json\r\n", "```\n", "```\r\n"];

    for marker in &start_markers {
        if let Some(start) = text.find(marker) {
            let json_start = start + marker.len();
            if let Some(end) = text[json_start..].find("```") {
                let extracted = text[json_start..json_start + end].trim();
                return Some(extracted.to_string());
            }
        }
    }

    None
}

/// Find the first balanced `open ... close` span, ignoring delimiters inside strings.
fn extract_balanced(text: &str, open: char, close: char) -> Option<String> {
    let mut depth = 0;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => {
                escape_next = true;
            }
            '"' => {
                in_string = !in_string;
            }
            c if c == open && !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            c if c == close && !in_string && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        return Some(text[s..=i].to_string());
                    }
                }
            }
            _ => {}
        }
    }

    None
}

/// Deserialize the first JSON object found in `raw` into `T`.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, ParseError> {
    let json_str = extract_json(raw)?;
    serde_json::from_str(&json_str).map_err(|e| ParseError::Shape(e.to_string()))
}

/// Pull ticker symbols out of a ticker-discovery answer.
///
/// Accepts a JSON array, a JSON object with a `tickers` array, or plain text
/// in which case upper-case tokens of 2-5 letters (optionally with a `.X`
/// class suffix) are taken. Symbols are upper-cased and de-duplicated in order.
pub fn parse_ticker_list(raw: &str) -> Vec<String> {
    let from_json: Option<Vec<String>> = extract_json_array(raw)
        .and_then(|arr| serde_json::from_str(&arr).ok())
        .or_else(|| {
            extract_json(raw).ok().and_then(|obj| {
                let value: serde_json::Value = serde_json::from_str(&obj).ok()?;
                serde_json::from_value(value.get("tickers")?.clone()).ok()
            })
        });

    let candidates = match from_json {
        Some(list) => list
            .into_iter()
            .map(|t| t.trim().to_ascii_uppercase())
            .collect::<Vec<_>>(),
        None => raw
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '.'))
            .map(|t| t.trim_end_matches('.'))
            .filter(|t| looks_like_ticker(t))
            .map(str::to_string)
            .collect(),
    };

    let mut tickers: Vec<String> = Vec::new();
    for ticker in candidates {
        if !ticker.is_empty() && !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }
    tickers
}

fn looks_like_ticker(token: &str) -> bool {
    let (base, class) = match token.split_once('.') {
        Some((base, class)) => (base, Some(class)),
        None => (token, None),
    };
    let base_ok = (1..=5).contains(&base.len()) && base.chars().all(|c| c.is_ascii_uppercase());
    let class_ok = class.map_or(true, |c| c.len() == 1 && c.chars().all(|c| c.is_ascii_uppercase()));
    // Single letters are almost always prose ("I", "A") rather than symbols.
    base_ok && class_ok && base.len() > 1
}

/// Optional check on a stage's raw output.
///
/// Stage output is opaque by default; installing a validator on an adapter makes
/// a rejected output abort the run as malformed.
pub trait OutputValidator: Send + Sync {
    fn validate(&self, output: &str) -> Result<(), ParseError>;
}

/// Accepts any output that contains a JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonObject;

impl OutputValidator for JsonObject {
    fn validate(&self, output: &str) -> Result<(), ParseError> {
        extract_json(output).map(|_| ())
    }
}

/// Accepts output whose first JSON object deserializes into `T`.
pub struct TypedJson<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedJson<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedJson<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> OutputValidator for TypedJson<T> {
    fn validate(&self, output: &str) -> Result<(), ParseError> {
        parse_json::<T>(output).map(|_| ())
    }
}

/// Quant output must be a [`QuantMetrics`] object with unit-interval scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuantMetricsCheck;

impl OutputValidator for QuantMetricsCheck {
    fn validate(&self, output: &str) -> Result<(), ParseError> {
        let metrics: QuantMetrics = parse_json(output)?;
        match metrics.out_of_range_score() {
            Some(field) => Err(ParseError::Invalid(format!("{field} outside [0, 1]"))),
            None => Ok(()),
        }
    }
}
