//! Core types, traits, and errors for PromptShield
//!
//! This crate contains the foundational types shared across all PromptShield
//! components: the verdict and attack-category enums, per-detector result
//! records, the terminal ensemble verdict, the [`Detector`] capability trait,
//! and the full engine configuration surface.
//!
//! Everything here is plain data. The detectors themselves live in
//! `promptshield-engine`; network serving, persistence, and audit logging are
//! external collaborators that consume these records.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Detector names
// ---------------------------------------------------------------------------

/// Name of the pattern-matching detector.
pub const DETECTOR_REGEX: &str = "regex";

/// Name of the statistical heuristic detector.
pub const DETECTOR_HEURISTIC: &str = "heuristic";

/// Name of the trained linear-classifier detector.
pub const DETECTOR_ML: &str = "ml_classifier";

// ---------------------------------------------------------------------------
// Verdict & attack categories
// ---------------------------------------------------------------------------

/// Final classification of an analyzed prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// No meaningful injection signal.
    Clean,
    /// Some signal, below the malicious band.
    Suspicious,
    /// Strong, corroborated injection signal.
    Malicious,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clean => write!(f, "CLEAN"),
            Self::Suspicious => write!(f, "SUSPICIOUS"),
            Self::Malicious => write!(f, "MALICIOUS"),
        }
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "CLEAN" | "clean" => Ok(Self::Clean),
            "SUSPICIOUS" | "suspicious" => Ok(Self::Suspicious),
            "MALICIOUS" | "malicious" => Ok(Self::Malicious),
            _ => Err(format!("unknown verdict: {s}")),
        }
    }
}

/// Closed set of prompt-injection attack categories.
///
/// Immutable at runtime; every category used anywhere in the engine must be
/// one of these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackCategory {
    /// Attempts to replace or override the model's role or instructions.
    RoleOverride,
    /// Attempts to extract the system prompt or hidden configuration.
    InstructionLeak,
    /// Payloads disguised via base64, hex, leetspeak, or similar encodings.
    EncodingEvasion,
    /// Fake role tags, XML markers, or separators that forge message structure.
    DelimiterInjection,
    /// Instructions planted for future turns or other consumers of the text.
    IndirectInjection,
    /// Fabricated conversation history or simulated tool output.
    ContextManipulation,
}

impl std::fmt::Display for AttackCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RoleOverride => "role_override",
            Self::InstructionLeak => "instruction_leak",
            Self::EncodingEvasion => "encoding_evasion",
            Self::DelimiterInjection => "delimiter_injection",
            Self::IndirectInjection => "indirect_injection",
            Self::ContextManipulation => "context_manipulation",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for AttackCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "role_override" => Ok(Self::RoleOverride),
            "instruction_leak" => Ok(Self::InstructionLeak),
            "encoding_evasion" => Ok(Self::EncodingEvasion),
            "delimiter_injection" => Ok(Self::DelimiterInjection),
            "indirect_injection" => Ok(Self::IndirectInjection),
            "context_manipulation" => Ok(Self::ContextManipulation),
            _ => Err(format!("unknown attack category: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Detection records
// ---------------------------------------------------------------------------

/// Output of a single detector for one prompt.
///
/// Produced fresh per analysis call and never mutated after construction.
/// `score` and `confidence` are always within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorResult {
    /// Which detector produced this result (`regex`, `heuristic`, `ml_classifier`).
    pub detector_name: String,
    /// Detection strength in `[0, 1]`.
    pub score: f64,
    /// How confident the detector is in its own score, in `[0, 1]`.
    pub confidence: f64,
    /// Evidence identifiers in detector-defined order: matched pattern labels,
    /// heuristic sub-score names, or the literal `"ml_classifier"`.
    pub triggered: Vec<String>,
    /// Attack category this detector attributes the signal to, if any.
    pub category: Option<AttackCategory>,
}

impl DetectorResult {
    /// Create a result carrying a detection signal.
    pub fn new(
        detector_name: &str,
        score: f64,
        confidence: f64,
        triggered: Vec<String>,
        category: Option<AttackCategory>,
    ) -> Self {
        Self {
            detector_name: detector_name.to_string(),
            score: score.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            triggered,
            category,
        }
    }

    /// Create the zero result for a detector that found nothing (or is
    /// unavailable): score 0, confidence 0, no evidence, no category.
    pub fn quiet(detector_name: &str) -> Self {
        Self {
            detector_name: detector_name.to_string(),
            score: 0.0,
            confidence: 0.0,
            triggered: Vec::new(),
            category: None,
        }
    }

    /// Whether this detector produced any evidence.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        !self.triggered.is_empty()
    }
}

/// Terminal output of one ensemble evaluation.
///
/// Immutable once constructed; serialized by the caller into its wire format
/// with exactly these field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleVerdict {
    /// Final classification.
    pub verdict: Verdict,
    /// Aggregate confidence in `[0, 1]`.
    pub confidence: f64,
    /// Results from every detector whose score exceeded the reporting
    /// threshold; detectors that contributed negligibly are omitted.
    pub triggered_detectors: Vec<DetectorResult>,
    /// The attack category most responsible for a non-clean verdict.
    pub primary_category: Option<AttackCategory>,
    /// Human-readable summary of which detectors fired and why.
    pub explanation: String,
    /// Lowercase-hex SHA-256 digest of the raw prompt text. Deterministic,
    /// suitable as a dedup/audit correlation key downstream.
    pub prompt_hash: String,
}

// ---------------------------------------------------------------------------
// Detector trait
// ---------------------------------------------------------------------------

/// Capability contract shared by all detectors.
///
/// Detectors are pure functions of the prompt and their own static
/// configuration: no I/O, no mutation, safe to call concurrently from any
/// number of threads.
pub trait Detector: Send + Sync {
    /// Analyze a prompt and return a detection result.
    fn detect(&self, prompt: &str) -> DetectorResult;

    /// Stable detector name used in results and ensemble weighting.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Ensemble weight per detector.
///
/// Weights are normalized at evaluation time, so they only need to be
/// positive; the documented defaults already sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWeights {
    /// Weight of the pattern matcher.
    #[serde(default = "default_regex_weight")]
    pub regex: f64,
    /// Weight of the heuristic analyzer.
    #[serde(default = "default_heuristic_weight")]
    pub heuristic: f64,
    /// Weight of the linear classifier.
    #[serde(default = "default_ml_weight")]
    pub ml: f64,
}

fn default_regex_weight() -> f64 {
    0.35
}

fn default_heuristic_weight() -> f64 {
    0.25
}

fn default_ml_weight() -> f64 {
    0.40
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            regex: default_regex_weight(),
            heuristic: default_heuristic_weight(),
            ml: default_ml_weight(),
        }
    }
}

impl EnsembleWeights {
    /// Validate that every weight is positive and finite.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the offending weight.
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [
            ("regex", self.regex),
            ("heuristic", self.heuristic),
            ("ml", self.ml),
        ] {
            if !w.is_finite() || w <= 0.0 {
                return Err(PromptShieldError::Config(format!(
                    "ensemble weight '{name}' must be a positive finite number, got {w}"
                )));
            }
        }
        Ok(())
    }
}

/// Aggregate-score boundaries for the three verdict bands.
///
/// Bands are inclusive on their lower bound: `aggregate < suspicious` is
/// CLEAN, `suspicious <= aggregate < malicious` is SUSPICIOUS, and
/// `aggregate >= malicious` is MALICIOUS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictThresholds {
    /// Lower bound of the SUSPICIOUS band.
    #[serde(default = "default_suspicious_threshold")]
    pub suspicious: f64,
    /// Lower bound of the MALICIOUS band.
    #[serde(default = "default_malicious_threshold")]
    pub malicious: f64,
}

fn default_suspicious_threshold() -> f64 {
    0.4
}

fn default_malicious_threshold() -> f64 {
    0.7
}

impl Default for VerdictThresholds {
    fn default() -> Self {
        Self {
            suspicious: default_suspicious_threshold(),
            malicious: default_malicious_threshold(),
        }
    }
}

impl VerdictThresholds {
    /// Validate that `0 < suspicious < malicious <= 1`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the violated ordering.
    pub fn validate(&self) -> Result<()> {
        if !self.suspicious.is_finite() || !self.malicious.is_finite() {
            return Err(PromptShieldError::Config(
                "verdict thresholds must be finite".to_string(),
            ));
        }
        if !(0.0 < self.suspicious && self.suspicious < self.malicious && self.malicious <= 1.0) {
            return Err(PromptShieldError::Config(format!(
                "verdict thresholds must satisfy 0 < suspicious < malicious <= 1, \
                 got suspicious={} malicious={}",
                self.suspicious, self.malicious
            )));
        }
        Ok(())
    }

    /// Map an aggregate score onto its verdict band.
    #[must_use]
    pub fn band(&self, aggregate: f64) -> Verdict {
        if aggregate >= self.malicious {
            Verdict::Malicious
        } else if aggregate >= self.suspicious {
            Verdict::Suspicious
        } else {
            Verdict::Clean
        }
    }
}

/// Per-sub-score weights for the heuristic analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicWeights {
    /// Weight of the entropy-deviation sub-score.
    #[serde(default = "default_entropy_weight")]
    pub entropy: f64,
    /// Weight of the instruction-token-ratio sub-score.
    #[serde(default = "default_instruction_weight")]
    pub instruction: f64,
    /// Weight of the structural-marker-density sub-score.
    #[serde(default = "default_structural_weight")]
    pub structural: f64,
    /// Weight of the special-character-density sub-score.
    #[serde(default = "default_special_weight")]
    pub special: f64,
}

fn default_entropy_weight() -> f64 {
    0.20
}

fn default_instruction_weight() -> f64 {
    0.40
}

fn default_structural_weight() -> f64 {
    0.20
}

fn default_special_weight() -> f64 {
    0.20
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            entropy: default_entropy_weight(),
            instruction: default_instruction_weight(),
            structural: default_structural_weight(),
            special: default_special_weight(),
        }
    }
}

/// Per-sub-score alert thresholds: a sub-score exceeding its threshold is
/// listed in the heuristic result's `triggered` evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicAlerts {
    /// Alert threshold for the entropy-deviation sub-score.
    #[serde(default = "default_entropy_alert")]
    pub entropy: f64,
    /// Alert threshold for the instruction-token-ratio sub-score.
    #[serde(default = "default_instruction_alert")]
    pub instruction: f64,
    /// Alert threshold for the structural-marker-density sub-score.
    #[serde(default = "default_structural_alert")]
    pub structural: f64,
    /// Alert threshold for the special-character-density sub-score.
    #[serde(default = "default_special_alert")]
    pub special: f64,
}

fn default_entropy_alert() -> f64 {
    0.30
}

fn default_instruction_alert() -> f64 {
    0.40
}

fn default_structural_alert() -> f64 {
    0.30
}

fn default_special_alert() -> f64 {
    0.40
}

impl Default for HeuristicAlerts {
    fn default() -> Self {
        Self {
            entropy: default_entropy_alert(),
            instruction: default_instruction_alert(),
            structural: default_structural_alert(),
            special: default_special_alert(),
        }
    }
}

/// Configuration for the heuristic analyzer.
///
/// Saturation values are the raw-feature magnitudes at which the
/// corresponding sub-score reaches 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicConfig {
    /// Sub-score weights (normalized at evaluation time).
    #[serde(default)]
    pub weights: HeuristicWeights,
    /// Sub-score alert thresholds.
    #[serde(default)]
    pub alerts: HeuristicAlerts,
    /// Lower edge of the expected natural-language entropy band, in bits.
    #[serde(default = "default_entropy_band_low")]
    pub entropy_band_low: f64,
    /// Upper edge of the expected natural-language entropy band, in bits.
    #[serde(default = "default_entropy_band_high")]
    pub entropy_band_high: f64,
    /// Bits of deviation outside the band at which the entropy sub-score saturates.
    #[serde(default = "default_entropy_scale")]
    pub entropy_scale: f64,
    /// Prompts shorter than this (in chars) score 0 on entropy deviation;
    /// character entropy is not meaningful on tiny samples.
    #[serde(default = "default_entropy_min_chars")]
    pub entropy_min_chars: usize,
    /// Instruction-token ratio at which that sub-score saturates.
    #[serde(default = "default_instruction_saturation")]
    pub instruction_saturation: f64,
    /// Structural markers per 100 chars at which that sub-score saturates.
    #[serde(default = "default_structural_saturation")]
    pub structural_saturation: f64,
    /// Special-character density at which that sub-score saturates.
    #[serde(default = "default_special_saturation")]
    pub special_saturation: f64,
}

fn default_entropy_band_low() -> f64 {
    3.0
}

fn default_entropy_band_high() -> f64 {
    4.5
}

fn default_entropy_scale() -> f64 {
    1.5
}

fn default_entropy_min_chars() -> usize {
    32
}

fn default_instruction_saturation() -> f64 {
    0.2
}

fn default_structural_saturation() -> f64 {
    1.0
}

fn default_special_saturation() -> f64 {
    0.15
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            weights: HeuristicWeights::default(),
            alerts: HeuristicAlerts::default(),
            entropy_band_low: default_entropy_band_low(),
            entropy_band_high: default_entropy_band_high(),
            entropy_scale: default_entropy_scale(),
            entropy_min_chars: default_entropy_min_chars(),
            instruction_saturation: default_instruction_saturation(),
            structural_saturation: default_structural_saturation(),
            special_saturation: default_special_saturation(),
        }
    }
}

impl HeuristicConfig {
    /// Validate weights, band ordering, and saturation values.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        let sum = w.entropy + w.instruction + w.structural + w.special;
        for (name, v) in [
            ("entropy", w.entropy),
            ("instruction", w.instruction),
            ("structural", w.structural),
            ("special", w.special),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(PromptShieldError::Config(format!(
                    "heuristic weight '{name}' must be a non-negative finite number, got {v}"
                )));
            }
        }
        if sum <= 0.0 {
            return Err(PromptShieldError::Config(
                "heuristic weights must sum to a positive value".to_string(),
            ));
        }
        if !(self.entropy_band_low < self.entropy_band_high) {
            return Err(PromptShieldError::Config(format!(
                "entropy band must satisfy low < high, got [{}, {}]",
                self.entropy_band_low, self.entropy_band_high
            )));
        }
        for (name, v) in [
            ("entropy_scale", self.entropy_scale),
            ("instruction_saturation", self.instruction_saturation),
            ("structural_saturation", self.structural_saturation),
            ("special_saturation", self.special_saturation),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(PromptShieldError::Config(format!(
                    "heuristic '{name}' must be a positive finite number, got {v}"
                )));
            }
        }
        Ok(())
    }
}

/// Configuration for the linear classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Path to the trained model artifact (JSON). `None`, or a path that does
    /// not exist, disables the classifier; this is a valid degraded mode, not
    /// an error. A present but malformed artifact is fatal at startup.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    /// Probability above which the classifier reports `ml_classifier` as
    /// triggered evidence.
    #[serde(default = "default_report_threshold")]
    pub report_threshold: f64,
}

fn default_report_threshold() -> f64 {
    0.5
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            report_threshold: default_report_threshold(),
        }
    }
}

impl ClassifierConfig {
    /// Validate the report threshold.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the threshold is outside `(0, 1)`.
    pub fn validate(&self) -> Result<()> {
        if !self.report_threshold.is_finite()
            || self.report_threshold <= 0.0
            || self.report_threshold >= 1.0
        {
            return Err(PromptShieldError::Config(format!(
                "classifier report_threshold must lie in (0, 1), got {}",
                self.report_threshold
            )));
        }
        Ok(())
    }
}

/// High-confidence pattern floor.
///
/// When the pattern matcher fires with confidence at or above
/// `min_confidence`, the aggregate score is floored at `floor` so that a
/// single unambiguous pattern hit cannot be diluted below the alerting bands
/// by quiet co-detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternBoostConfig {
    /// Whether the floor is applied at all.
    #[serde(default = "default_boost_enabled")]
    pub enabled: bool,
    /// Pattern-matcher confidence required to trigger the floor.
    #[serde(default = "default_boost_min_confidence")]
    pub min_confidence: f64,
    /// Minimum aggregate score once triggered.
    #[serde(default = "default_boost_floor")]
    pub floor: f64,
}

fn default_boost_enabled() -> bool {
    true
}

fn default_boost_min_confidence() -> f64 {
    0.9
}

fn default_boost_floor() -> f64 {
    0.75
}

impl Default for PatternBoostConfig {
    fn default() -> Self {
        Self {
            enabled: default_boost_enabled(),
            min_confidence: default_boost_min_confidence(),
            floor: default_boost_floor(),
        }
    }
}

impl PatternBoostConfig {
    /// Validate that both knobs lie in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the offending field.
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [("min_confidence", self.min_confidence), ("floor", self.floor)] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(PromptShieldError::Config(format!(
                    "pattern boost '{name}' must lie in [0, 1], got {v}"
                )));
            }
        }
        Ok(())
    }
}

/// Full engine configuration, loaded once at startup and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ensemble weight per detector.
    #[serde(default)]
    pub weights: EnsembleWeights,
    /// Verdict band boundaries.
    #[serde(default)]
    pub thresholds: VerdictThresholds,
    /// Heuristic analyzer tuning.
    #[serde(default)]
    pub heuristic: HeuristicConfig,
    /// Linear classifier artifact location and reporting threshold.
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// High-confidence pattern floor.
    #[serde(default)]
    pub pattern_boost: PatternBoostConfig,
    /// Detectors scoring at or below this are omitted from
    /// `triggered_detectors` evidence (they were still invoked and weighted).
    #[serde(default = "default_min_report_score")]
    pub min_report_score: f64,
}

fn default_min_report_score() -> f64 {
    0.10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: EnsembleWeights::default(),
            thresholds: VerdictThresholds::default(),
            heuristic: HeuristicConfig::default(),
            classifier: ClassifierConfig::default(),
            pattern_boost: PatternBoostConfig::default(),
            min_report_score: default_min_report_score(),
        }
    }
}

impl EngineConfig {
    /// Validate the whole configuration surface.
    ///
    /// The engine refuses to initialize on any violation rather than run with
    /// a partially-valid configuration.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        self.thresholds.validate()?;
        self.heuristic.validate()?;
        self.classifier.validate()?;
        self.pattern_boost.validate()?;
        if !self.min_report_score.is_finite() || !(0.0..1.0).contains(&self.min_report_score) {
            return Err(PromptShieldError::Config(format!(
                "min_report_score must lie in [0, 1), got {}",
                self.min_report_score
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Core error types.
#[derive(thiserror::Error, Debug)]
pub enum PromptShieldError {
    /// Invalid engine configuration; fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A catalog pattern failed to compile; fatal at startup.
    #[error("Pattern error: {0}")]
    Pattern(String),

    /// The classifier artifact was present but unusable; fatal at startup.
    /// A missing artifact is a valid degraded mode, not this error.
    #[error("Model error: {0}")]
    Model(String),

    /// The input could not be decoded as UTF-8 text. The engine refuses the
    /// analysis rather than produce a verdict on undecodable input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization / deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias for `std::result::Result<T, PromptShieldError>`.
pub type Result<T> = std::result::Result<T, PromptShieldError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_verdict_wire_names() {
        assert_eq!(serde_json::to_string(&Verdict::Clean).unwrap(), "\"CLEAN\"");
        assert_eq!(
            serde_json::to_string(&Verdict::Malicious).unwrap(),
            "\"MALICIOUS\""
        );
        let v: Verdict = serde_json::from_str("\"SUSPICIOUS\"").unwrap();
        assert_eq!(v, Verdict::Suspicious);
    }

    #[test]
    fn test_category_wire_names() {
        assert_eq!(
            serde_json::to_string(&AttackCategory::RoleOverride).unwrap(),
            "\"role_override\""
        );
        let c: AttackCategory = serde_json::from_str("\"delimiter_injection\"").unwrap();
        assert_eq!(c, AttackCategory::DelimiterInjection);
        assert_eq!(
            AttackCategory::from_str("context_manipulation").unwrap(),
            AttackCategory::ContextManipulation
        );
        assert!(AttackCategory::from_str("none").is_err());
    }

    #[test]
    fn test_detector_result_clamps_scores() {
        let r = DetectorResult::new(DETECTOR_REGEX, 1.5, -0.2, vec![], None);
        assert_eq!(r.score, 1.0);
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn test_quiet_result() {
        let r = DetectorResult::quiet(DETECTOR_ML);
        assert_eq!(r.detector_name, DETECTOR_ML);
        assert_eq!(r.score, 0.0);
        assert_eq!(r.confidence, 0.0);
        assert!(!r.is_triggered());
        assert!(r.category.is_none());
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = EnsembleWeights::default();
        assert!((w.regex + w.heuristic + w.ml - 1.0).abs() < 1e-9);
        assert!(w.validate().is_ok());
    }

    #[test]
    fn test_weights_reject_non_positive() {
        let w = EnsembleWeights {
            regex: 0.0,
            ..EnsembleWeights::default()
        };
        assert!(w.validate().is_err());
    }

    #[test]
    fn test_threshold_banding() {
        let t = VerdictThresholds::default();
        assert_eq!(t.band(0.0), Verdict::Clean);
        assert_eq!(t.band(0.39999), Verdict::Clean);
        // Lower bound of each band is inclusive.
        assert_eq!(t.band(0.4), Verdict::Suspicious);
        assert_eq!(t.band(0.69999), Verdict::Suspicious);
        assert_eq!(t.band(0.7), Verdict::Malicious);
        assert_eq!(t.band(1.0), Verdict::Malicious);
    }

    #[test]
    fn test_thresholds_reject_bad_ordering() {
        let t = VerdictThresholds {
            suspicious: 0.7,
            malicious: 0.4,
        };
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_heuristic_config_defaults_valid() {
        let h = HeuristicConfig::default();
        assert!(h.validate().is_ok());
        let w = &h.weights;
        assert!((w.entropy + w.instruction + w.structural + w.special - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_heuristic_config_rejects_inverted_band() {
        let h = HeuristicConfig {
            entropy_band_low: 5.0,
            entropy_band_high: 3.0,
            ..HeuristicConfig::default()
        };
        assert!(h.validate().is_err());
    }

    #[test]
    fn test_classifier_config_rejects_degenerate_threshold() {
        for bad in [0.0, 1.0, -0.5, f64::NAN] {
            let c = ClassifierConfig {
                model_path: None,
                report_threshold: bad,
            };
            assert!(c.validate().is_err(), "threshold {bad} should be rejected");
        }
    }

    #[test]
    fn test_engine_config_default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_engine_config_json_round_trip() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn test_ensemble_verdict_wire_fields() {
        let verdict = EnsembleVerdict {
            verdict: Verdict::Malicious,
            confidence: 0.82,
            triggered_detectors: vec![DetectorResult::new(
                DETECTOR_REGEX,
                0.95,
                0.95,
                vec!["ignore_previous".to_string()],
                Some(AttackCategory::RoleOverride),
            )],
            primary_category: Some(AttackCategory::RoleOverride),
            explanation: "Flagged by 1 detector(s).".to_string(),
            prompt_hash: "ab".repeat(32),
        };
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["verdict"], "MALICIOUS");
        assert_eq!(json["primary_category"], "role_override");
        assert!(json["triggered_detectors"].is_array());
        assert!(json["prompt_hash"].is_string());
        assert!(json["explanation"].is_string());
        assert!(json["confidence"].is_number());
    }
}
