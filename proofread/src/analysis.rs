use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum CorrectionKind {
    Grammar,
    Spelling,
    #[default]
    Other,
}

impl From<String> for CorrectionKind {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "grammar" => Self::Grammar,
            "spelling" => Self::Spelling,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correction {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: CorrectionKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub original: String,
    #[serde(alias = "correction", default, deserialize_with = "null_as_default")]
    pub corrected: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub has_errors: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub error_count: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub corrections: Vec<Correction>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub corrected_text: String,
}

/// Models send `null` for fields they have nothing to say about.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl AnalysisResult {
    /// Neutral "no issues found" result for `original`.
    pub fn clean(original: &str) -> Self {
        Self {
            has_errors: false,
            error_count: 0,
            corrections: Vec::new(),
            corrected_text: original.to_string(),
        }
    }

    /// Enforces the result invariants against the text that was analyzed.
    ///
    /// `has_errors` without any correction is treated as a clean result, and a
    /// clean result never carries corrections.
    pub fn normalized(mut self, original: &str) -> Self {
        if !self.has_errors || self.corrections.is_empty() {
            return Self::clean(original);
        }

        self.error_count = self.corrections.len();
        if self.corrected_text.trim().is_empty() {
            self.corrected_text = original.to_string();
        }
        self
    }
}

/// Outcome of a completed analysis call.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Parsed(AnalysisResult),
    /// The service answered but no structured payload could be recovered.
    Degraded { result: AnalysisResult, raw: String },
}

impl AnalysisOutcome {
    pub fn result(&self) -> &AnalysisResult {
        match self {
            Self::Parsed(result) => result,
            Self::Degraded { result, .. } => result,
        }
    }

    pub fn into_result(self) -> AnalysisResult {
        match self {
            Self::Parsed(result) => result,
            Self::Degraded { result, .. } => result,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correction_accepts_service_field_names() {
        let payload = r#"{"type":"spelling","original":"teh","correction":"the","explanation":"typo"}"#;
        let correction: Correction =
            serde_json::from_str(payload).expect("correction should parse");

        assert_eq!(correction.kind, CorrectionKind::Spelling);
        assert_eq!(correction.corrected, "the");
        assert_eq!(correction.explanation.as_deref(), Some("typo"));
    }

    #[test]
    fn unknown_correction_type_maps_to_other() {
        let payload = r#"{"type":"Punctuation","original":"a","corrected":"a."}"#;
        let correction: Correction =
            serde_json::from_str(payload).expect("correction should parse");
        assert_eq!(correction.kind, CorrectionKind::Other);
    }

    #[test]
    fn null_fields_fall_back_to_defaults() {
        let payload = r#"{
            "hasErrors": true,
            "errorCount": null,
            "corrections": [{"type": null, "original": "teh", "correction": "the"}],
            "correctedText": null
        }"#;
        let result: AnalysisResult = serde_json::from_str(payload).expect("result should parse");

        assert_eq!(result.corrections.len(), 1);
        assert_eq!(result.corrections[0].kind, CorrectionKind::Other);
        assert_eq!(result.corrections[0].corrected, "the");
        assert_eq!(result.corrected_text, "");
    }

    #[test]
    fn result_serializes_camel_case() {
        let result = AnalysisResult::clean("fine text");
        let serialized = serde_json::to_string(&result).expect("result should serialize");

        assert!(serialized.contains("\"hasErrors\":false"));
        assert!(serialized.contains("\"correctedText\":\"fine text\""));
    }

    #[test]
    fn errors_without_corrections_normalize_to_clean() {
        let result = AnalysisResult {
            has_errors: true,
            error_count: 3,
            corrections: Vec::new(),
            corrected_text: "something else".to_string(),
        }
        .normalized("original");

        assert_eq!(result, AnalysisResult::clean("original"));
    }

    #[test]
    fn normalization_recounts_and_fills_corrected_text() {
        let result = AnalysisResult {
            has_errors: true,
            error_count: 7,
            corrections: vec![Correction {
                kind: CorrectionKind::Grammar,
                original: "he go".to_string(),
                corrected: "he goes".to_string(),
                explanation: None,
            }],
            corrected_text: "  ".to_string(),
        }
        .normalized("he go home");

        assert!(result.has_errors);
        assert_eq!(result.error_count, 1);
        assert_eq!(result.corrected_text, "he go home");
    }
}
