//! Parsing of model output, with one repair pass for the malformations the
//! model is known to produce: Markdown code fences and unevaluated sums such
//! as `93116159 + 4922` in place of a number.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::error::ExtractionError;

static RE_BARE_SUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\s*[+\-]\s*\d+(?:\s*[+\-]\s*\d+)*").unwrap());

/// Parses raw model output, repairing it once if the first parse fails.
/// When the repaired text still fails to parse, the error reports the
/// position of the first failure in the raw output.
pub fn parse_model_output(raw: &str) -> Result<Value, ExtractionError> {
    let first_error = match serde_json::from_str::<Value>(raw) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    tracing::debug!(
        error = %first_error,
        "Model output is not valid JSON, attempting repair"
    );

    let repaired = repair(raw);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => {
            tracing::info!("Repaired malformed model output");
            Ok(value)
        }
        Err(second_error) => {
            tracing::debug!(error = %second_error, "Repaired output still invalid");
            Err(parse_error(&first_error))
        }
    }
}

/// Strips code fences and evaluates bare sums outside string literals.
pub fn repair(raw: &str) -> String {
    let unfenced = strip_code_fence(raw);

    let mut repaired = String::with_capacity(unfenced.len());
    for segment in split_string_literals(unfenced) {
        match segment {
            Segment::Literal(text) => repaired.push_str(text),
            Segment::Code(text) => {
                repaired.push_str(&RE_BARE_SUM.replace_all(text, |caps: &Captures| {
                    let expr = &caps[0];
                    evaluate_sum(expr).map_or_else(|| expr.to_string(), |n| n.to_string())
                }));
            }
        }
    }
    repaired
}

fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    }
    if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    /// A JSON string literal including its quotes. Never rewritten, so
    /// periods like "113年11-12月" survive the repair.
    Literal(&'a str),
    Code(&'a str),
}

fn split_string_literals(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut code_start = 0;
    let mut chars = text.char_indices();

    while let Some((i, c)) = chars.next() {
        if c != '"' {
            continue;
        }
        if code_start < i {
            segments.push(Segment::Code(&text[code_start..i]));
        }

        let mut end = text.len();
        let mut escaped = false;
        for (j, c) in chars.by_ref() {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                end = j + 1;
                break;
            }
        }
        segments.push(Segment::Literal(&text[i..end]));
        code_start = end;
    }

    if code_start < text.len() {
        segments.push(Segment::Code(&text[code_start..]));
    }
    segments
}

/// Sums a `digits (+|-) digits ...` expression digit by digit. Returns
/// `None` on overflow so the caller leaves the text untouched.
fn evaluate_sum(expr: &str) -> Option<i128> {
    let mut total: i128 = 0;
    let mut current: Option<i128> = None;
    let mut sign: i128 = 1;

    for c in expr.chars().filter(|c| !c.is_whitespace()).chain(['+']) {
        if let Some(digit) = c.to_digit(10) {
            let value = current.unwrap_or(0);
            current = Some(value.checked_mul(10)?.checked_add(i128::from(digit))?);
        } else if c == '+' || c == '-' {
            if let Some(value) = current.take() {
                total = total.checked_add(sign.checked_mul(value)?)?;
            }
            sign = if c == '+' { 1 } else { -1 };
        } else {
            return None;
        }
    }
    Some(total)
}

fn parse_error(e: &serde_json::Error) -> ExtractionError {
    let full = e.to_string();
    let suffix = format!(" at line {} column {}", e.line(), e.column());
    let message = full.strip_suffix(&suffix).unwrap_or(&full).to_string();
    ExtractionError::Parse {
        message,
        line: e.line(),
        column: e.column(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_json_untouched() {
        let value = parse_model_output(r#"{"totalSales": 5}"#).unwrap();
        assert_eq!(value, json!({"totalSales": 5}));
    }

    #[test]
    fn test_bare_sum_is_evaluated() {
        let value = parse_model_output(r#"{"totalSales": 93116159 + 4922}"#).unwrap();
        assert_eq!(value["totalSales"], json!(93121081));
    }

    #[test]
    fn test_mixed_signs() {
        let value = parse_model_output(r#"{"net": 1000 - 250 + 5, "x": 3-4}"#).unwrap();
        assert_eq!(value, json!({"net": 755, "x": -1}));
    }

    #[test]
    fn test_code_fence_removed() {
        let raw = "```json\n{\"sales\": {\"grandTotal\": 10 + 20}}\n```";
        let value = parse_model_output(raw).unwrap();
        assert_eq!(value["sales"]["grandTotal"], json!(30));
    }

    #[test]
    fn test_bare_fence_removed() {
        let value = parse_model_output("```\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_period_strings_are_protected() {
        let raw = r#"{"period": "113年11-12月", "note": "5 + 5", "total": 1 + 1}"#;
        let value = parse_model_output(raw).unwrap();
        assert_eq!(value["period"], json!("113年11-12月"));
        assert_eq!(value["note"], json!("5 + 5"));
        assert_eq!(value["total"], json!(2));
    }

    #[test]
    fn test_escaped_quotes_stay_inside_literal() {
        let raw = r#"{"name": "say \"1+1\" now", "n": 2 + 2}"#;
        let value = parse_model_output(raw).unwrap();
        assert_eq!(value["name"], json!("say \"1+1\" now"));
        assert_eq!(value["n"], json!(4));
    }

    #[test]
    fn test_unrepairable_reports_original_position() {
        let raw = "{\n  \"a\": 1,\n  \"b\": oops\n}";
        match parse_model_output(raw) {
            Err(ExtractionError::Parse {
                message,
                line,
                column,
            }) => {
                assert_eq!(line, 3);
                assert!(column > 0);
                assert!(!message.contains("at line"), "message: {message}");
            }
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_overflowing_sum_left_alone() {
        let expr = "99999999999999999999999999999999999999999 + 1";
        assert_eq!(evaluate_sum(expr), None);
        assert_eq!(repair(expr), expr);
    }

    #[test]
    fn test_split_segments() {
        let segments = split_string_literals(r#"{"a": 1+2}"#);
        assert_eq!(
            segments,
            vec![
                Segment::Code("{"),
                Segment::Literal("\"a\""),
                Segment::Code(": 1+2}"),
            ]
        );
    }

    #[test]
    fn test_unterminated_literal_kept_verbatim() {
        assert_eq!(repair(r#"{"a": "1+2"#), r#"{"a": "1+2"#);
    }
}
