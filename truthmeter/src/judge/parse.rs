//! Parsing and recovery of the judge's JSON output

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use super::outcome::ScoreRecord;

/// Why the judge output could not be turned into scores
#[derive(Debug, thiserror::Error)]
pub enum JudgeParseError {
    #[error("no JSON object found in judge output")]
    NoJsonObject,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing key '{0}'")]
    MissingKey(&'static str),

    #[error("'{key}' is not numeric: {value}")]
    NotNumeric { key: &'static str, value: String },

    #[error("'{key}' out of range [0, 100]: {value}")]
    OutOfRange { key: &'static str, value: f64 },

    #[error("'reasoning' must be a non-empty string")]
    EmptyReasoning,
}

fn code_fence() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)```(?:json)?").unwrap())
}

/// Remove every ```` ```json ```` / ```` ``` ```` marker and surrounding whitespace
pub fn strip_code_fences(raw: &str) -> String {
    code_fence().replace_all(raw, "").trim().to_string()
}

/// Parse judge output into an attributed score record.
///
/// Only the shape is checked: three numeric scores in range and a
/// non-empty reasoning string. Whatever `model_version` the engine echoed
/// is discarded in favour of the judge's own attribution.
pub fn parse_judge_output(raw: &str) -> Result<ScoreRecord, JudgeParseError> {
    let text = strip_code_fences(raw);
    let object = parse_object(&text)?;

    let accuracy = score(&object, "accuracy_score")?;
    let clarity = score(&object, "clarity_score")?;
    let completeness = score(&object, "completeness_score")?;

    let reasoning = match object.get("reasoning") {
        None => return Err(JudgeParseError::MissingKey("reasoning")),
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(_) => return Err(JudgeParseError::EmptyReasoning),
    };

    Ok(ScoreRecord::attributed(accuracy, clarity, completeness, reasoning))
}

/// Parse the whole text as an object, else fall back to the outermost `{...}` span
fn parse_object(text: &str) -> Result<Map<String, Value>, JudgeParseError> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Ok(map);
    }

    let embedded = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return Err(JudgeParseError::NoJsonObject),
    };

    match serde_json::from_str::<Value>(embedded)? {
        Value::Object(map) => Ok(map),
        _ => Err(JudgeParseError::NoJsonObject),
    }
}

fn score(object: &Map<String, Value>, key: &'static str) -> Result<f64, JudgeParseError> {
    let value = object.get(key).ok_or(JudgeParseError::MissingKey(key))?;

    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
    .ok_or_else(|| JudgeParseError::NotNumeric {
        key,
        value: value.to_string(),
    })?;

    if !(0.0..=100.0).contains(&number) {
        return Err(JudgeParseError::OutOfRange { key, value: number });
    }
    Ok(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::{JUDGE_NAME, JUDGE_VERSION};

    const FENCED: &str = "```json\n{\"accuracy_score\":92.5,\"clarity_score\":88,\"completeness_score\":90,\"reasoning\":\"**Strengths**: ok\\n\\n**Drawbacks**: terse\",\"model_version\":\"1.0.0\"}\n```";

    #[test]
    fn test_fenced_output_parses() {
        let record = parse_judge_output(FENCED).unwrap();
        assert_eq!(record.accuracy_score, 92.5);
        assert_eq!(record.clarity_score, 88.0);
        assert_eq!(record.completeness_score, 90.0);
        assert!(record.reasoning.starts_with("**Strengths**"));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("```JSON {\"a\":1} ```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }

    #[test]
    fn test_engine_version_is_overwritten() {
        let raw = r#"{"accuracy_score":70,"clarity_score":70,"completeness_score":70,"reasoning":"Drawbacks: many","model_version":"9.9.9"}"#;
        let record = parse_judge_output(raw).unwrap();
        assert_eq!(record.model_version, JUDGE_VERSION);
        assert_eq!(record.judged_by, JUDGE_NAME);
    }

    #[test]
    fn test_missing_model_version_is_supplied() {
        let raw = r#"{"accuracy_score":70,"clarity_score":70,"completeness_score":70,"reasoning":"Drawbacks: many"}"#;
        assert_eq!(parse_judge_output(raw).unwrap().model_version, JUDGE_VERSION);
    }

    #[test]
    fn test_object_embedded_in_prose() {
        let raw = "Here is my evaluation:\n{\"accuracy_score\": 80, \"clarity_score\": 85, \"completeness_score\": 75, \"reasoning\": \"Drawbacks: thin\"}\nThanks!";
        let record = parse_judge_output(raw).unwrap();
        assert_eq!(record.scores(), [80.0, 85.0, 75.0]);
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let raw = r#"{"accuracy_score":"92.5","clarity_score":"88%","completeness_score":90,"reasoning":"Drawbacks: x"}"#;
        let record = parse_judge_output(raw).unwrap();
        assert_eq!(record.scores(), [92.5, 88.0, 90.0]);
    }

    #[test]
    fn test_non_json_text() {
        let err = parse_judge_output("I cannot grade this answer.").unwrap_err();
        assert!(matches!(err, JudgeParseError::NoJsonObject));
    }

    #[test]
    fn test_truncated_json() {
        let err = parse_judge_output("{\"accuracy_score\": 90, \"clarity_score\": }").unwrap_err();
        assert!(matches!(err, JudgeParseError::Json(_)));
    }

    #[test]
    fn test_missing_key() {
        let raw = r#"{"accuracy_score":90,"clarity_score":90,"reasoning":"Drawbacks: x"}"#;
        let err = parse_judge_output(raw).unwrap_err();
        assert!(matches!(err, JudgeParseError::MissingKey("completeness_score")));
        assert_eq!(err.to_string(), "missing key 'completeness_score'");
    }

    #[test]
    fn test_non_numeric_score() {
        let raw = r#"{"accuracy_score":"high","clarity_score":90,"completeness_score":90,"reasoning":"x"}"#;
        let err = parse_judge_output(raw).unwrap_err();
        assert!(matches!(err, JudgeParseError::NotNumeric { key: "accuracy_score", .. }));

        let raw = r#"{"accuracy_score":null,"clarity_score":90,"completeness_score":90,"reasoning":"x"}"#;
        assert!(matches!(
            parse_judge_output(raw).unwrap_err(),
            JudgeParseError::NotNumeric { .. }
        ));
    }

    #[test]
    fn test_out_of_range_score() {
        let raw = r#"{"accuracy_score":105,"clarity_score":90,"completeness_score":90,"reasoning":"x"}"#;
        let err = parse_judge_output(raw).unwrap_err();
        assert!(matches!(err, JudgeParseError::OutOfRange { key: "accuracy_score", .. }));
    }

    #[test]
    fn test_empty_reasoning() {
        let raw = r#"{"accuracy_score":100,"clarity_score":100,"completeness_score":100,"reasoning":"  "}"#;
        assert!(matches!(
            parse_judge_output(raw).unwrap_err(),
            JudgeParseError::EmptyReasoning
        ));
    }

    #[test]
    fn test_array_is_not_an_object() {
        assert!(parse_judge_output("[1, 2, 3]").is_err());
    }
}
