//! Ensemble combiner merging all three detectors into one verdict.
//!
//! [`EnsembleDetector`] invokes the pattern matcher, heuristic analyzer, and
//! linear classifier independently, then reduces their results to a single
//! [`EnsembleVerdict`] with confidence, evidence, primary attack category,
//! and explanation.
//!
//! # Strategy
//!
//! 1. Run all three detectors (no data dependency between them).
//! 2. Normalize the configured weights over the *available* detectors: when
//!    the classifier has no model loaded, its weight is redistributed
//!    proportionally across the other two so the active weights re-sum to 1.
//! 3. Aggregate score = weighted sum of detector scores, floored by the
//!    high-confidence pattern boost when enabled.
//! 4. Band the aggregate into CLEAN / SUSPICIOUS / MALICIOUS.
//!
//! Every call is a pure function of the prompt and the engine's immutable
//! configuration: one engine instance can be shared across worker threads
//! without synchronization.

use promptshield_core::{
    Detector, DetectorResult, EngineConfig, EnsembleVerdict, EnsembleWeights, PromptShieldError,
    Result, DETECTOR_HEURISTIC, DETECTOR_ML, DETECTOR_REGEX,
};
use sha2::{Digest, Sha256};

use crate::classifier::LinearClassifier;
use crate::heuristic::HeuristicDetector;
use crate::patterns::PatternCatalog;
use crate::RegexDetector;

/// Ensemble detection engine.
///
/// Stateless per call; the only long-lived data are the compiled pattern
/// catalog and the optional classifier model, both read-only after
/// construction.
pub struct EnsembleDetector {
    regex: RegexDetector,
    heuristic: HeuristicDetector,
    classifier: LinearClassifier,
    config: EngineConfig,
}

impl EnsembleDetector {
    /// Build an engine from configuration: validates the config, compiles
    /// the built-in pattern catalog, and loads the classifier artifact if one
    /// is configured.
    ///
    /// # Errors
    ///
    /// Returns a configuration, pattern, or model error; the engine refuses
    /// to initialize rather than run with a partially-valid catalog or model.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let regex = RegexDetector::new()?;
        let heuristic = HeuristicDetector::new(config.heuristic.clone())?;
        let classifier = LinearClassifier::new(&config.classifier)?;
        tracing::info!(
            patterns = regex.catalog().len(),
            ml_loaded = classifier.is_loaded(),
            "ensemble detection engine initialized"
        );
        Ok(Self {
            regex,
            heuristic,
            classifier,
            config,
        })
    }

    /// Build an engine with default configuration and no classifier artifact.
    ///
    /// # Errors
    ///
    /// Returns a pattern error if the built-in catalog fails to compile.
    pub fn with_defaults() -> Result<Self> {
        Self::new(EngineConfig::default())
    }

    /// Build an engine around a custom pattern catalog, keeping the rest of
    /// the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration or model error per [`EnsembleDetector::new`].
    pub fn with_catalog(config: EngineConfig, catalog: PatternCatalog) -> Result<Self> {
        config.validate()?;
        let heuristic = HeuristicDetector::new(config.heuristic.clone())?;
        let classifier = LinearClassifier::new(&config.classifier)?;
        Ok(Self {
            regex: RegexDetector::with_catalog(catalog),
            heuristic,
            classifier,
            config,
        })
    }

    /// Names of the detectors currently contributing to verdicts.
    #[must_use]
    pub fn loaded_detectors(&self) -> Vec<&'static str> {
        let mut names = vec![DETECTOR_REGEX, DETECTOR_HEURISTIC];
        if self.classifier.is_loaded() {
            names.push(DETECTOR_ML);
        }
        names
    }

    /// The active, normalized ensemble weights.
    ///
    /// When the classifier is unavailable its weight is redistributed
    /// proportionally over the pattern matcher and heuristic analyzer; the
    /// returned weights always sum to 1.0.
    #[must_use]
    pub fn active_weights(&self) -> EnsembleWeights {
        let w = &self.config.weights;
        let ml = if self.classifier.is_loaded() { w.ml } else { 0.0 };
        let total = w.regex + w.heuristic + ml;
        EnsembleWeights {
            regex: w.regex / total,
            heuristic: w.heuristic / total,
            ml: ml / total,
        }
    }

    /// Analyze a prompt and produce the final verdict.
    ///
    /// Deterministic: identical input and identical loaded configuration
    /// yield identical output.
    #[must_use]
    pub fn evaluate(&self, prompt: &str) -> EnsembleVerdict {
        let regex_result = self.regex.detect(prompt);
        let heuristic_result = self.heuristic.detect(prompt);
        let ml_result = self.classifier.detect(prompt);

        let weights = self.active_weights();
        let mut aggregate = regex_result.score * weights.regex
            + heuristic_result.score * weights.heuristic
            + ml_result.score * weights.ml;

        // A single unambiguous pattern hit must not be diluted below the
        // alerting bands by quiet co-detectors.
        let boost = &self.config.pattern_boost;
        if boost.enabled
            && regex_result.is_triggered()
            && regex_result.confidence >= boost.min_confidence
        {
            aggregate = aggregate.max(boost.floor);
        }
        let aggregate = aggregate.clamp(0.0, 1.0);

        let verdict = self.config.thresholds.band(aggregate);
        let primary_category = Self::primary_category(
            &[
                (weights.regex, &regex_result),
                (weights.heuristic, &heuristic_result),
                (weights.ml, &ml_result),
            ],
        );

        let triggered_detectors: Vec<DetectorResult> =
            [regex_result, heuristic_result, ml_result]
                .into_iter()
                .filter(|r| r.score > self.config.min_report_score)
                .collect();

        let explanation = crate::explain::render_explanation(&triggered_detectors);

        EnsembleVerdict {
            verdict,
            confidence: aggregate,
            triggered_detectors,
            primary_category,
            explanation,
            prompt_hash: hash_prompt(prompt),
        }
    }

    /// Analyze raw bytes, refusing input that is not valid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when the bytes cannot be decoded as text; a
    /// wrong verdict on garbled input is worse than a refused analysis.
    pub fn evaluate_bytes(&self, raw: &[u8]) -> Result<EnsembleVerdict> {
        let prompt = std::str::from_utf8(raw).map_err(|e| {
            PromptShieldError::InvalidInput(format!("prompt is not valid UTF-8: {e}"))
        })?;
        Ok(self.evaluate(prompt))
    }

    /// Pick the category reported by the contributing detector with the
    /// highest `weight * score` product. Detectors are listed in priority
    /// order (regex, heuristic, ml) and the fold keeps the earlier entry on
    /// ties.
    fn primary_category(
        candidates: &[(f64, &DetectorResult)],
    ) -> Option<promptshield_core::AttackCategory> {
        candidates
            .iter()
            .filter(|(_, r)| r.category.is_some())
            .fold(None::<(f64, &DetectorResult)>, |best, &(w, r)| {
                let contribution = w * r.score;
                match best {
                    Some((best_contribution, _)) if best_contribution >= contribution => best,
                    _ => Some((contribution, r)),
                }
            })
            .and_then(|(_, r)| r.category)
    }
}

/// Lowercase-hex SHA-256 digest of the raw prompt text.
fn hash_prompt(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
