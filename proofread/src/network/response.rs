//! Turns whatever the correction service answered into an [`AnalysisOutcome`].
//!
//! The service is an LLM behind a thin HTTP wrapper, so the structured result
//! may arrive as a JSON object, as a string embedding a fenced JSON block, or
//! not at all. Anything that cannot be recovered degrades to a clean result
//! for the submitted text, keeping the raw body for diagnostics.

use serde_json::Value;

use crate::analysis::{AnalysisOutcome, AnalysisResult};

const FENCE: &str = "```";
const ENVELOPE_FIELDS: [&str; 4] = ["data", "result", "response", "text"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FencedBlock<'a> {
    info: &'a str,
    body: &'a str,
}

pub fn interpret_response(body: &str, original: &str) -> AnalysisOutcome {
    let parsed = match serde_json::from_str::<Value>(body) {
        Ok(value) => from_json(&value),
        Err(_) => from_text(body),
    };

    match parsed {
        Some(result) => AnalysisOutcome::Parsed(result.normalized(original)),
        None => AnalysisOutcome::Degraded {
            result: AnalysisResult::clean(original),
            raw: body.to_string(),
        },
    }
}

fn from_json(value: &Value) -> Option<AnalysisResult> {
    if value.get("hasErrors").is_some() {
        return parse_value(value);
    }

    match envelope_payload(value)? {
        Value::String(text) => from_text(text),
        payload @ Value::Object(_) => parse_value(payload),
        _ => None,
    }
}

fn envelope_payload(value: &Value) -> Option<&Value> {
    ENVELOPE_FIELDS
        .iter()
        .find_map(|field| value.get(*field))
        .or_else(|| value.pointer("/candidates/0/content/parts/0/text"))
}

fn parse_value(value: &Value) -> Option<AnalysisResult> {
    serde_json::from_value::<AnalysisResult>(value.clone()).ok()
}

/// Extracts a result from free text.
///
/// Candidates are tried in order: blocks fenced as `json`, untagged fenced
/// blocks, the whole text, then the outermost brace-delimited slice. The first
/// candidate that parses wins.
pub fn from_text(text: &str) -> Option<AnalysisResult> {
    let blocks = fenced_blocks(text);
    let tagged = blocks
        .iter()
        .filter(|block| block.info.eq_ignore_ascii_case("json"))
        .map(|block| block.body);
    let untagged = blocks
        .iter()
        .filter(|block| block.info.is_empty())
        .map(|block| block.body);

    tagged
        .chain(untagged)
        .chain(std::iter::once(text.trim()))
        .chain(outermost_object(text))
        .find_map(parse_candidate)
}

fn parse_candidate(candidate: &str) -> Option<AnalysisResult> {
    serde_json::from_str::<AnalysisResult>(candidate).ok()
}

fn fenced_blocks(text: &str) -> Vec<FencedBlock<'_>> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        let Some(newline) = after_open.find('\n') else {
            break;
        };
        let info = after_open[..newline].trim();
        let body_start = &after_open[newline + 1..];
        let Some(close) = body_start.find(FENCE) else {
            break;
        };

        blocks.push(FencedBlock {
            info,
            body: body_start[..close].trim(),
        });
        rest = &body_start[close + FENCE.len()..];
    }

    blocks
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::CorrectionKind;

    const PAYLOAD: &str = r#"{"hasErrors":true,"errorCount":1,"corrections":[{"type":"grammar","original":"he go","correction":"he goes","explanation":"agreement"}],"correctedText":"he goes home"}"#;

    #[test]
    fn parses_structured_data_envelope() {
        let body = format!(r#"{{"message":"success","data":{PAYLOAD}}}"#);
        let outcome = interpret_response(&body, "he go home");

        let AnalysisOutcome::Parsed(result) = outcome else {
            panic!("expected parsed outcome");
        };
        assert!(result.has_errors);
        assert_eq!(result.corrections[0].kind, CorrectionKind::Grammar);
        assert_eq!(result.corrections[0].corrected, "he goes");
    }

    #[test]
    fn parses_json_fence_inside_natural_language() {
        let text = format!("Here is my analysis:\n```json\n{PAYLOAD}\n```\nHope this helps!");
        let body = serde_json::json!({ "data": text }).to_string();

        let outcome = interpret_response(&body, "he go home");
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.result().corrected_text, "he goes home");
    }

    #[test]
    fn parses_model_candidates_envelope() {
        let text = format!("```\n{PAYLOAD}\n```");
        let body = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
        .to_string();

        let outcome = interpret_response(&body, "he go home");
        assert!(outcome.result().has_errors);
    }

    #[test]
    fn json_fence_wins_over_earlier_untagged_fence() {
        let text = format!(
            "```\n{{\"hasErrors\":false}}\n```\nthen\n```json\n{PAYLOAD}\n```"
        );
        let result = from_text(&text).expect("fenced payload should parse");
        assert!(result.has_errors);
    }

    #[test]
    fn first_parseable_json_fence_wins() {
        let text = format!("```json\nnot json\n```\n```json\n{PAYLOAD}\n```");
        let result = from_text(&text).expect("second fence should parse");
        assert_eq!(result.corrections.len(), 1);
    }

    #[test]
    fn falls_back_to_outermost_braces() {
        let text = format!("Sure! {PAYLOAD} Let me know.");
        let result = from_text(&text).expect("embedded object should parse");
        assert!(result.has_errors);
    }

    #[test]
    fn garbage_degrades_to_clean_result_for_original() {
        let original = "Some submitted text that is long enough.";
        let outcome = interpret_response("<<<totally not json>>>", original);

        let AnalysisOutcome::Degraded { result, raw } = outcome else {
            panic!("expected degraded outcome");
        };
        assert!(!result.has_errors);
        assert!(result.corrections.is_empty());
        assert_eq!(result.corrected_text, original);
        assert_eq!(raw, "<<<totally not json>>>");
    }

    #[test]
    fn envelope_without_payload_degrades() {
        let outcome = interpret_response(r#"{"message":"error"}"#, "text");
        assert!(outcome.is_degraded());
    }

    #[test]
    fn errors_flag_without_corrections_is_treated_as_clean() {
        let body = r#"{"data":{"hasErrors":true,"errorCount":2,"corrections":[],"correctedText":"x"}}"#;
        let outcome = interpret_response(body, "original");

        assert!(!outcome.is_degraded());
        assert_eq!(outcome.into_result(), AnalysisResult::clean("original"));
    }

    #[test]
    fn null_corrected_text_keeps_corrections_and_uses_original() {
        let body = r#"{"data":{"hasErrors":true,"errorCount":null,"corrections":[{"type":"spelling","original":"teh","correction":"the"}],"correctedText":null}}"#;
        let outcome = interpret_response(body, "teh cat");

        let AnalysisOutcome::Parsed(result) = outcome else {
            panic!("expected parsed outcome");
        };
        assert_eq!(result.error_count, 1);
        assert_eq!(result.corrections[0].corrected, "the");
        assert_eq!(result.corrected_text, "teh cat");
    }

    #[test]
    fn unterminated_fence_is_ignored() {
        assert!(fenced_blocks("```json\n{\"hasErrors\":false}").is_empty());
    }
}
