//! Offline checks run on every live edit.
//!
//! They never call the network and never touch the text unless an [`AutoFix`]
//! is applied explicitly.

use futures_util::future::BoxFuture;
use serde::Serialize;

use crate::analysis::{AnalysisOutcome, AnalysisResult, Correction, CorrectionKind};
use crate::network::{AnalysisError, Corrector};
use crate::utils::{char_len, is_terminal_punctuation};

pub const DEFAULT_MIN_WORDS: usize = 50;
pub const DEFAULT_PUNCTUATION_MIN_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    Spacing,
    Capitalization,
    Punctuation,
    Length,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoFix {
    CollapseSpaces,
}

impl AutoFix {
    pub fn apply(self, text: &str) -> String {
        match self {
            Self::CollapseSpaces => collapse_spaces(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub kind: FindingKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<AutoFix>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeuristicReport {
    pub errors: Vec<Finding>,
    pub suggestions: Vec<Finding>,
    pub word_count: usize,
    pub char_count: usize,
}

impl HeuristicReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.suggestions.is_empty()
    }

    /// Distinct auto-fixes offered by this report, in the order found.
    pub fn fixes(&self) -> Vec<AutoFix> {
        let mut fixes = Vec::new();
        for fix in self
            .errors
            .iter()
            .chain(self.suggestions.iter())
            .filter_map(|finding| finding.fix)
        {
            if !fixes.contains(&fix) {
                fixes.push(fix);
            }
        }
        fixes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeuristicConfig {
    pub min_words: usize,
    pub punctuation_min_chars: usize,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            min_words: DEFAULT_MIN_WORDS,
            punctuation_min_chars: DEFAULT_PUNCTUATION_MIN_CHARS,
        }
    }
}

pub fn check_text(text: &str, config: &HeuristicConfig) -> HeuristicReport {
    let mut report = HeuristicReport {
        word_count: text.split_whitespace().count(),
        char_count: char_len(text),
        ..HeuristicReport::default()
    };
    if text.trim().is_empty() {
        return report;
    }

    for (index, line) in lines(text).enumerate() {
        let line_number = index + 1;

        if has_interior_double_space(line) {
            report.errors.push(Finding {
                kind: FindingKind::Spacing,
                line: Some(line_number),
                message: "Double space detected".to_string(),
                fix: Some(AutoFix::CollapseSpaces),
            });
        }

        if starts_lowercase(line) {
            report.errors.push(Finding {
                kind: FindingKind::Capitalization,
                line: Some(line_number),
                message: "Sentence should start with capital letter".to_string(),
                fix: None,
            });
        }

        if char_len(line) > config.punctuation_min_chars && !ends_with_terminal_punctuation(line)
        {
            report.suggestions.push(Finding {
                kind: FindingKind::Punctuation,
                line: Some(line_number),
                message: "Consider adding punctuation at the end".to_string(),
                fix: None,
            });
        }
    }

    if report.word_count < config.min_words {
        report.suggestions.push(Finding {
            kind: FindingKind::Length,
            line: None,
            message: format!(
                "Essay is short ({} words). Consider adding more content.",
                report.word_count
            ),
            fix: None,
        });
    }

    report
}

/// Applies every auto-fix the report offers.
pub fn apply_fixes(text: &str, report: &HeuristicReport) -> String {
    report
        .fixes()
        .into_iter()
        .fold(text.to_string(), |current, fix| fix.apply(&current))
}

fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

fn has_interior_double_space(line: &str) -> bool {
    line.trim().contains("  ")
}

fn starts_lowercase(line: &str) -> bool {
    line.chars()
        .next()
        .is_some_and(|ch| ch.is_alphabetic() && ch.is_lowercase())
}

fn ends_with_terminal_punctuation(line: &str) -> bool {
    line.trim_end()
        .chars()
        .next_back()
        .is_some_and(is_terminal_punctuation)
}

fn collapse_spaces(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len());
    let mut previous_space = false;
    for ch in text.chars() {
        if ch == ' ' {
            if previous_space {
                continue;
            }
            previous_space = true;
        } else {
            previous_space = false;
        }
        collapsed.push(ch);
    }
    collapsed
}

fn capitalize_first(line: &str) -> String {
    let mut chars = line.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Serves the heuristic checker through the [`Corrector`] seam so the monitor
/// can run without a remote service.
#[derive(Debug, Clone, Default)]
pub struct HeuristicCorrector {
    config: HeuristicConfig,
}

impl HeuristicCorrector {
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }

    pub fn correct(&self, text: &str) -> AnalysisResult {
        let report = check_text(text, &self.config);
        let mut corrections = Vec::new();
        let mut corrected_lines = Vec::new();

        for (index, line) in lines(text).enumerate() {
            let line_number = index + 1;
            let mut fixed = line.to_string();
            for finding in report
                .errors
                .iter()
                .filter(|finding| finding.line == Some(line_number))
            {
                let (kind, next) = match finding.kind {
                    FindingKind::Spacing => (CorrectionKind::Other, collapse_spaces(&fixed)),
                    FindingKind::Capitalization => {
                        (CorrectionKind::Grammar, capitalize_first(&fixed))
                    }
                    FindingKind::Punctuation | FindingKind::Length => continue,
                };
                corrections.push(Correction {
                    kind,
                    original: fixed.trim().to_string(),
                    corrected: next.trim().to_string(),
                    explanation: Some(finding.message.clone()),
                });
                fixed = next;
            }
            corrected_lines.push(fixed);
        }

        AnalysisResult {
            has_errors: !corrections.is_empty(),
            error_count: corrections.len(),
            corrections,
            corrected_text: corrected_lines.join("\n"),
        }
        .normalized(text)
    }
}

impl Corrector for HeuristicCorrector {
    fn analyze<'a>(
        &'a self,
        text: &'a str,
    ) -> BoxFuture<'a, Result<AnalysisOutcome, AnalysisError>> {
        Box::pin(async move { Ok(AnalysisOutcome::Parsed(self.correct(text))) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spacing_errors(report: &HeuristicReport) -> Vec<&Finding> {
        report
            .errors
            .iter()
            .filter(|finding| finding.kind == FindingKind::Spacing)
            .collect()
    }

    #[test]
    fn double_space_is_reported_once_and_fixed() {
        let config = HeuristicConfig::default();
        let text = "this is bad.  really";

        let report = check_text(text, &config);
        let spacing = spacing_errors(&report);
        assert_eq!(spacing.len(), 1);
        assert_eq!(spacing[0].line, Some(1));
        assert_eq!(spacing[0].fix, Some(AutoFix::CollapseSpaces));

        let fixed = apply_fixes(text, &report);
        assert_eq!(fixed, "this is bad. really");
        assert!(spacing_errors(&check_text(&fixed, &config)).is_empty());
    }

    #[test]
    fn leading_and_trailing_spaces_are_not_interior() {
        let report = check_text("   Indented line.   ", &HeuristicConfig::default());
        assert!(spacing_errors(&report).is_empty());
    }

    #[test]
    fn lowercase_line_start_is_a_capitalization_error() {
        let report = check_text("Fine start.\nbad start.", &HeuristicConfig::default());
        let capitalization: Vec<_> = report
            .errors
            .iter()
            .filter(|finding| finding.kind == FindingKind::Capitalization)
            .collect();

        assert_eq!(capitalization.len(), 1);
        assert_eq!(capitalization[0].line, Some(2));
    }

    #[test]
    fn non_alphabetic_line_start_is_ignored() {
        let report = check_text("42 apples were sold.", &HeuristicConfig::default());
        assert!(
            report
                .errors
                .iter()
                .all(|finding| finding.kind != FindingKind::Capitalization)
        );
    }

    #[test]
    fn long_line_without_terminal_punctuation_is_a_suggestion() {
        let report = check_text(
            "This line is clearly longer than twenty characters",
            &HeuristicConfig::default(),
        );

        assert!(report.errors.is_empty());
        assert!(
            report
                .suggestions
                .iter()
                .any(|finding| finding.kind == FindingKind::Punctuation
                    && finding.line == Some(1))
        );
    }

    #[test]
    fn short_text_gets_length_suggestion() {
        let report = check_text("Too short.", &HeuristicConfig::default());
        let length = report
            .suggestions
            .iter()
            .find(|finding| finding.kind == FindingKind::Length)
            .expect("length suggestion expected");

        assert_eq!(length.line, None);
        assert!(length.message.contains("(2 words)"));
    }

    #[test]
    fn long_enough_text_has_no_length_suggestion() {
        let config = HeuristicConfig {
            min_words: 3,
            ..HeuristicConfig::default()
        };
        let report = check_text("Three words here.", &config);
        assert!(report.is_clean());
        assert_eq!(report.word_count, 3);
    }

    #[test]
    fn blank_text_has_no_findings() {
        let report = check_text("  \n ", &HeuristicConfig::default());
        assert!(report.is_clean());
    }

    #[test]
    fn heuristic_corrector_builds_corrections() {
        let corrector = HeuristicCorrector::default();
        let result = corrector.correct("this is  wrong.\nAll good here.");

        assert!(result.has_errors);
        assert_eq!(result.error_count, 2);
        assert_eq!(result.corrected_text, "This is wrong.\nAll good here.");
        assert_eq!(result.corrections[0].kind, CorrectionKind::Other);
        assert_eq!(result.corrections[1].kind, CorrectionKind::Grammar);
    }

    #[test]
    fn heuristic_corrector_reports_clean_text() {
        let result = HeuristicCorrector::default().correct("Nothing to fix here.");
        assert_eq!(result, AnalysisResult::clean("Nothing to fix here."));
    }
}
