//! Explanation rendering for ensemble verdicts.
//!
//! Scoring builds evidence records first; this module turns the retained
//! [`DetectorResult`]s into the human-readable `explanation` string as a
//! separate, independently testable step.

use promptshield_core::{DetectorResult, DETECTOR_HEURISTIC, DETECTOR_ML, DETECTOR_REGEX};

/// Render the explanation for a verdict from the retained detector results.
///
/// The summary names how many detectors fired and, per detector, its score
/// and evidence: matched pattern labels for the pattern matcher, alerting
/// sub-scores for the heuristic analyzer, and the literal probability for the
/// classifier.
#[must_use]
pub fn render_explanation(retained: &[DetectorResult]) -> String {
    if retained.is_empty() {
        return "No injection indicators detected across all detection layers.".to_string();
    }
    let details: Vec<String> = retained.iter().map(describe).collect();
    format!(
        "Detected by {} detector(s). {}",
        retained.len(),
        details.join("; ")
    )
}

fn describe(result: &DetectorResult) -> String {
    let name = result.detector_name.as_str();
    if name == DETECTOR_REGEX {
        if result.triggered.is_empty() {
            format!("{name} ({:.2}): no patterns matched", result.score)
        } else {
            format!(
                "{name} ({:.2}): matched patterns {}",
                result.score,
                result.triggered.join(", ")
            )
        }
    } else if name == DETECTOR_HEURISTIC {
        if result.triggered.is_empty() {
            format!(
                "{name} ({:.2}): no sub-score above its alert threshold",
                result.score
            )
        } else {
            format!(
                "{name} ({:.2}): elevated signals {}",
                result.score,
                result.triggered.join(", ")
            )
        }
    } else if name == DETECTOR_ML {
        format!("{name} ({:.2}): injection probability {:.4}", result.score, result.score)
    } else {
        format!("{name} ({:.2})", result.score)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use promptshield_core::AttackCategory;

    #[test]
    fn test_no_detectors() {
        let text = render_explanation(&[]);
        assert!(text.contains("No injection indicators"));
    }

    #[test]
    fn test_regex_lists_pattern_labels() {
        let result = DetectorResult::new(
            DETECTOR_REGEX,
            0.95,
            0.95,
            vec!["ignore_previous".to_string(), "system_prompt_extract".to_string()],
            Some(AttackCategory::RoleOverride),
        );
        let text = render_explanation(&[result]);
        assert!(text.starts_with("Detected by 1 detector(s)."));
        assert!(text.contains("regex (0.95)"));
        assert!(text.contains("ignore_previous, system_prompt_extract"));
    }

    #[test]
    fn test_heuristic_lists_sub_scores() {
        let result = DetectorResult::new(
            DETECTOR_HEURISTIC,
            0.4,
            0.4,
            vec!["instruction_token_ratio".to_string()],
            None,
        );
        let text = render_explanation(&[result]);
        assert!(text.contains("heuristic (0.40): elevated signals instruction_token_ratio"));
    }

    #[test]
    fn test_ml_reports_literal_probability() {
        let result = DetectorResult::new(
            DETECTOR_ML,
            0.8137,
            0.6274,
            vec![DETECTOR_ML.to_string()],
            None,
        );
        let text = render_explanation(&[result]);
        assert!(text.contains("injection probability 0.8137"));
    }

    #[test]
    fn test_multiple_detectors_joined() {
        let results = vec![
            DetectorResult::new(DETECTOR_REGEX, 0.95, 0.95, vec!["x".to_string()], None),
            DetectorResult::new(DETECTOR_HEURISTIC, 0.4, 0.4, vec![], None),
        ];
        let text = render_explanation(&results);
        assert!(text.starts_with("Detected by 2 detector(s)."));
        assert!(text.contains("; "));
    }
}
