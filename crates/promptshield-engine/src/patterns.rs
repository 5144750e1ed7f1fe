//! Injection pattern catalog.
//!
//! Static, versioned collection of `(label, pattern, weight)` entries grouped
//! by attack category. Declaration order is significant: when two matched
//! entries carry the same weight, the earlier-declared entry wins category
//! tie-breaks, so the category builders below are concatenated in a fixed,
//! documented order.
//!
//! Pattern authors encode evasion tolerance (extra whitespace, punctuation
//! between tokens) in the patterns themselves; the matcher applies them
//! verbatim.

use promptshield_core::{AttackCategory, PromptShieldError, Result};
use regex::{Regex, RegexBuilder};

/// One compiled catalog entry.
pub struct PatternEntry {
    /// Stable identifier reported as triggered evidence.
    pub label: &'static str,
    /// Compiled pattern, case-insensitive with `.` matching newlines.
    pub regex: Regex,
    /// Attack category this pattern attributes a match to.
    pub category: AttackCategory,
    /// Confidence weight in `(0, 1]`.
    pub weight: f64,
}

/// The full pattern catalog, owned exclusively for the process lifetime.
pub struct PatternCatalog {
    entries: Vec<PatternEntry>,
}

impl PatternCatalog {
    /// Compile the built-in catalog: all six attack categories in declaration
    /// order.
    ///
    /// # Errors
    ///
    /// Returns a pattern error if any entry fails to compile; the catalog is
    /// all-or-nothing, a partially-compiled catalog is never used.
    pub fn builtin() -> Result<Self> {
        let mut entries = Vec::new();
        entries.extend(compile_patterns(
            AttackCategory::RoleOverride,
            ROLE_OVERRIDE_DEFS,
        )?);
        entries.extend(compile_patterns(
            AttackCategory::InstructionLeak,
            INSTRUCTION_LEAK_DEFS,
        )?);
        entries.extend(compile_patterns(
            AttackCategory::EncodingEvasion,
            ENCODING_EVASION_DEFS,
        )?);
        entries.extend(compile_patterns(
            AttackCategory::DelimiterInjection,
            DELIMITER_INJECTION_DEFS,
        )?);
        entries.extend(compile_patterns(
            AttackCategory::IndirectInjection,
            INDIRECT_INJECTION_DEFS,
        )?);
        entries.extend(compile_patterns(
            AttackCategory::ContextManipulation,
            CONTEXT_MANIPULATION_DEFS,
        )?);
        Ok(Self { entries })
    }

    /// Build a catalog from pre-compiled entries, preserving their order.
    #[must_use]
    pub fn from_entries(entries: Vec<PatternEntry>) -> Self {
        Self { entries }
    }

    /// Entries in declaration order.
    #[must_use]
    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    /// Number of entries in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compile `(label, pattern, weight)` definitions for one category.
///
/// Patterns compile case-insensitive, with `.` matching newlines and `^`/`$`
/// anchoring per line.
pub fn compile_patterns(
    category: AttackCategory,
    defs: &[(&'static str, &'static str, f64)],
) -> Result<Vec<PatternEntry>> {
    defs.iter()
        .map(|&(label, pattern, weight)| {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .dot_matches_new_line(true)
                .multi_line(true)
                .build()
                .map_err(|e| {
                    PromptShieldError::Pattern(format!(
                        "failed to compile pattern '{label}': {e}"
                    ))
                })?;
            if !(0.0..=1.0).contains(&weight) || weight == 0.0 {
                return Err(PromptShieldError::Pattern(format!(
                    "pattern '{label}' weight must lie in (0, 1], got {weight}"
                )));
            }
            Ok(PatternEntry {
                label,
                regex,
                category,
                weight,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Pattern tables
// ---------------------------------------------------------------------------

/// Attempts to replace or override the model's role or instructions.
const ROLE_OVERRIDE_DEFS: &[(&str, &str, f64)] = &[
    (
        "ignore_previous",
        r"(ignore|drop|disregard|forget|discard|skip|override|dismiss)\s+(all\s+)?(previous|prior|above|earlier)\s+(instructions?|prompts?|rules?|guidelines?|context)",
        0.95,
    ),
    (
        "you_are_now",
        r"you\s+are\s+now\s+((a|an|the|my)\s+)?\w+",
        0.85,
    ),
    (
        "disregard",
        r"disregard\s+(your|all|any|the)\s+(previous|system|initial|original)\s+",
        0.90,
    ),
    (
        "new_instructions",
        r"(new|updated|revised|override)\s+instructions?\s*[:\-]",
        0.85,
    ),
    (
        "forget_everything",
        r"forget\s+(everything|all|anything)\s+(you|that)\s+(know|were|have)",
        0.90,
    ),
    (
        "do_not_follow",
        r"do\s+not\s+follow\s+(your|the|any)\s+(previous|original|initial|system)",
        0.90,
    ),
    (
        "pretend_to_be",
        r"pretend\s+(to\s+be|you\s+are|that\s+you)",
        0.80,
    ),
    ("act_as", r"act\s+as\s+(a|an|if|though)\s+", 0.70),
    (
        "jailbreak_mode",
        r"(developer|god|admin|sudo|root)\s*mode|DAN\s*(mode|prompt|jailbreak|\(Do\s+Anything)|Do\s+Anything\s+Now",
        0.95,
    ),
    (
        "bypass_restrictions",
        r"bypass\s+(your|all|any|the)\s+(restrictions?|filters?|safety|guardrails?|limitations?)",
        0.95,
    ),
];

/// Attempts to extract the system prompt or hidden configuration.
const INSTRUCTION_LEAK_DEFS: &[(&str, &str, f64)] = &[
    (
        "repeat_instructions",
        r"(repeat|show|display|print|output|reveal)\s+(your|the|all)\s+(system\s+)?(instructions?|prompt|rules?|guidelines?|configuration)",
        0.90,
    ),
    (
        "what_were_you_told",
        r"what\s+(were|are)\s+you(r)?\s+(told|instructed|programmed|configured|given)",
        0.85,
    ),
    (
        "system_prompt_extract",
        r"(system\s+prompt|initial\s+prompt|hidden\s+prompt|secret\s+instructions?)",
        0.80,
    ),
    (
        "beginning_of_conversation",
        r"(beginning|start|first\s+part)\s+of\s+(this\s+)?(conversation|chat|session|context)",
        0.70,
    ),
    (
        "verbatim_output",
        r"(verbatim|word\s+for\s+word|exactly\s+as)\s+(output|repeat|copy|print)",
        0.85,
    ),
    (
        "above_text",
        r"(text|content|message)\s+(above|before)\s+(this|the\s+user)",
        0.75,
    ),
    (
        "developer_instructions",
        r"(developer|creator|maker|builder)\s+(instructions?|notes?|prompt)",
        0.80,
    ),
    (
        "internal_config",
        r"(internal|private|confidential|hidden)\s+(config|settings?|parameters?|rules?)",
        0.80,
    ),
];

/// Payloads disguised via base64, hex, leetspeak, or similar encodings.
const ENCODING_EVASION_DEFS: &[(&str, &str, f64)] = &[
    (
        "base64_instruction",
        r"(base64|b64|decode)\s*[:\(]\s*[A-Za-z0-9+/=]{20,}",
        0.85,
    ),
    (
        "hex_encoded",
        r"\\x[0-9a-fA-F]{2}(\\x[0-9a-fA-F]{2}){4,}",
        0.80,
    ),
    (
        "unicode_escape",
        r"\\u[0-9a-fA-F]{4}(\\u[0-9a-fA-F]{4}){3,}",
        0.80,
    ),
    (
        "rot13_reference",
        r"(rot13|caesar\s+cipher|rot\s*-?\s*13)\s*[:\(]",
        0.85,
    ),
    (
        "leetspeak_instructions",
        r"1gn0r3\s+pr3v10us|1nstruct10ns?|syst3m\s+pr0mpt",
        0.80,
    ),
    (
        "reversed_text",
        r"(reverse\s+(this|the\s+text|instructions?|string|prompt)|read\s+(it\s+)?backwards?|tpmorP|snoitcurtsni)",
        0.60,
    ),
];

/// Fake role tags, XML markers, or separators that forge message structure.
const DELIMITER_INJECTION_DEFS: &[(&str, &str, f64)] = &[
    (
        "triple_quotes",
        r#""""[\s\S]*?(system|instruction|prompt|ignore)"#,
        0.85,
    ),
    (
        "hash_delimiter",
        r"#{3,}\s*(system|instruction|end|new\s+section)",
        0.80,
    ),
    (
        "system_tag",
        r"\[(SYSTEM|INST|SYS|ADMIN|ASSISTANT|USER)\]",
        0.90,
    ),
    (
        "xml_tags",
        r"<\s*/?\s*(system|instruction|prompt|context|message)\s*>",
        0.85,
    ),
    (
        "separator_override",
        r"[-=]{5,}\s*(system|new|override|instructions?|end\s+of)",
        0.80,
    ),
    (
        "markdown_heading_inject",
        r"^#+\s*(system|instructions?|override|configuration)\s*$",
        0.75,
    ),
];

/// Instructions planted for future turns or other consumers of the text.
const INDIRECT_INJECTION_DEFS: &[(&str, &str, f64)] = &[
    (
        "when_user_asks",
        r"when\s+(the\s+)?(user|human|person)\s+(asks?|says?|mentions?|requests?)\s+",
        0.85,
    ),
    (
        "instead_do",
        r"instead\s+(of\s+)?(answering|responding|doing)\s+",
        0.75,
    ),
    (
        "from_now_on",
        r"from\s+now\s+on\s+(you\s+)?(will|must|should|shall)\s+",
        0.85,
    ),
    (
        "always_respond",
        r"(always|never)\s+(respond|reply|answer|say)\s+(with|that|as)\s+",
        0.80,
    ),
    (
        "hidden_instruction",
        r"(hidden|secret|embedded)\s+(instruction|command|directive|task)",
        0.85,
    ),
    (
        "important_instruction",
        r"IMPORTANT\s*[:\-!]\s*(ignore|override|forget|disregard|you\s+must)",
        0.90,
    ),
];

/// Fabricated conversation history or simulated tool output.
const CONTEXT_MANIPULATION_DEFS: &[(&str, &str, f64)] = &[
    (
        "fake_assistant",
        r"(assistant|ai|bot|model)\s*:\s*(sure|okay|yes|absolutely|of\s+course)",
        0.85,
    ),
    (
        "fake_conversation",
        r"(user|human)\s*:\s*.+\n\s*(assistant|ai)\s*:\s*",
        0.80,
    ),
    (
        "simulated_output",
        r"(simulate|emulate|generate)\s+(the\s+)?(output|response|result)\s+(of|from|as\s+if)",
        0.75,
    ),
    (
        "hypothetical_scenario",
        r"(hypothetically|in\s+theory|imagine\s+that|suppose\s+that|what\s+if)\s+.*(ignore|bypass|override|no\s+restrictions?)",
        0.85,
    ),
    (
        "tool_output_fake",
        r"(tool|function|api)\s+(output|result|response)\s*[:\{]",
        0.70,
    ),
    (
        "previous_conversation",
        r"(in\s+our\s+previous|last\s+time|earlier\s+you\s+said|you\s+already\s+agreed)",
        0.75,
    ),
];

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_compiles() {
        let catalog = PatternCatalog::builtin().unwrap();
        assert!(!catalog.is_empty());
        // 10 + 8 + 6 + 6 + 6 + 6 entries across the six categories.
        assert_eq!(catalog.len(), 42);
    }

    #[test]
    fn test_weights_in_range() {
        let catalog = PatternCatalog::builtin().unwrap();
        for entry in catalog.entries() {
            assert!(
                entry.weight > 0.0 && entry.weight <= 1.0,
                "pattern '{}' weight {} out of range",
                entry.label,
                entry.weight
            );
        }
    }

    #[test]
    fn test_labels_unique() {
        let catalog = PatternCatalog::builtin().unwrap();
        let mut labels: Vec<&str> = catalog.entries().iter().map(|e| e.label).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), catalog.len());
    }

    #[test]
    fn test_category_declaration_order() {
        let catalog = PatternCatalog::builtin().unwrap();
        assert_eq!(catalog.entries()[0].category, AttackCategory::RoleOverride);
        assert_eq!(
            catalog.entries().last().unwrap().category,
            AttackCategory::ContextManipulation
        );
    }

    #[test]
    fn test_case_insensitive_matching() {
        let catalog = PatternCatalog::builtin().unwrap();
        let entry = catalog
            .entries()
            .iter()
            .find(|e| e.label == "ignore_previous")
            .unwrap();
        assert!(entry.regex.is_match("IGNORE ALL PREVIOUS INSTRUCTIONS"));
        assert!(entry.regex.is_match("ignore previous rules"));
        assert!(!entry.regex.is_match("please summarize the instructions"));
    }

    #[test]
    fn test_markdown_heading_matches_per_line() {
        let catalog = PatternCatalog::builtin().unwrap();
        let entry = catalog
            .entries()
            .iter()
            .find(|e| e.label == "markdown_heading_inject")
            .unwrap();
        assert!(entry.regex.is_match("hello\n## System\nmore text"));
    }

    #[test]
    fn test_bad_pattern_is_fatal() {
        let result = compile_patterns(AttackCategory::RoleOverride, &[("broken", r"(unclosed", 0.5)]);
        assert!(matches!(result, Err(PromptShieldError::Pattern(_))));
    }

    #[test]
    fn test_zero_weight_rejected() {
        let result = compile_patterns(AttackCategory::RoleOverride, &[("zero", r"x", 0.0)]);
        assert!(matches!(result, Err(PromptShieldError::Pattern(_))));
    }
}
