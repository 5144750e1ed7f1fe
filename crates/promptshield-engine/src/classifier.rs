//! Trained linear classifier over character n-gram TF-IDF features.
//!
//! Scores a prompt with an externally-trained logistic-regression model:
//! character n-grams are looked up in the model vocabulary, weighted by
//! sublinear term frequency times stored IDF, L2-normalized, and passed
//! through `sigmoid(dot(x, coefficients) + bias)`.
//!
//! The engine never trains. The artifact is a plain JSON file produced by an
//! offline batch job; its absence is a first-class degraded mode (the
//! classifier reports itself unavailable and the ensemble reweights), while a
//! present but malformed artifact is fatal at startup.

use std::collections::HashMap;
use std::path::Path;

use promptshield_core::{
    ClassifierConfig, Detector, DetectorResult, PromptShieldError, Result, DETECTOR_ML,
};
use serde::Deserialize;

/// On-disk artifact layout. Field names are part of the artifact contract.
#[derive(Debug, Deserialize)]
struct ModelArtifact {
    #[serde(default = "default_format_version")]
    format_version: u32,
    ngram_min: usize,
    ngram_max: usize,
    vocabulary: HashMap<String, usize>,
    idf_weights: Vec<f64>,
    coefficients: Vec<f64>,
    bias: f64,
}

fn default_format_version() -> u32 {
    1
}

/// Supported artifact format version.
const FORMAT_VERSION: u32 = 1;

/// Immutable trained-model data: vocabulary, IDF weights, coefficient vector,
/// and intercept. Read-only for the process lifetime and shareable by
/// reference across concurrent evaluations.
pub struct ClassifierModel {
    ngram_min: usize,
    ngram_max: usize,
    vocabulary: HashMap<String, usize>,
    idf_weights: Vec<f64>,
    coefficients: Vec<f64>,
    bias: f64,
}

impl ClassifierModel {
    /// Load and validate a model artifact from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns a model error if the file cannot be read, parsed, or fails
    /// validation. A *missing* file is the caller's degraded-mode branch, not
    /// this function's concern.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PromptShieldError::Model(format!(
                "failed to read model artifact {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json_str(&contents)
    }

    /// Parse and validate a model artifact from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns a model error describing the first validation failure.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let artifact: ModelArtifact = serde_json::from_str(json)
            .map_err(|e| PromptShieldError::Model(format!("failed to parse model artifact: {e}")))?;

        if artifact.format_version != FORMAT_VERSION {
            return Err(PromptShieldError::Model(format!(
                "unsupported artifact format_version {} (expected {FORMAT_VERSION})",
                artifact.format_version
            )));
        }
        if artifact.ngram_min == 0 || artifact.ngram_min > artifact.ngram_max {
            return Err(PromptShieldError::Model(format!(
                "invalid n-gram range [{}, {}]",
                artifact.ngram_min, artifact.ngram_max
            )));
        }
        let vocab_size = artifact.vocabulary.len();
        if artifact.idf_weights.len() != vocab_size || artifact.coefficients.len() != vocab_size {
            return Err(PromptShieldError::Model(format!(
                "vocabulary has {vocab_size} entries but idf_weights has {} and coefficients has {}",
                artifact.idf_weights.len(),
                artifact.coefficients.len()
            )));
        }
        let mut seen = vec![false; vocab_size];
        for (ngram, &index) in &artifact.vocabulary {
            if index >= vocab_size {
                return Err(PromptShieldError::Model(format!(
                    "vocabulary entry '{ngram}' has out-of-range index {index}"
                )));
            }
            if seen[index] {
                return Err(PromptShieldError::Model(format!(
                    "vocabulary index {index} assigned to more than one n-gram"
                )));
            }
            seen[index] = true;
        }
        if !artifact.bias.is_finite()
            || artifact.idf_weights.iter().any(|v| !v.is_finite())
            || artifact.coefficients.iter().any(|v| !v.is_finite())
        {
            return Err(PromptShieldError::Model(
                "model artifact contains non-finite values".to_string(),
            ));
        }

        Ok(Self {
            ngram_min: artifact.ngram_min,
            ngram_max: artifact.ngram_max,
            vocabulary: artifact.vocabulary,
            idf_weights: artifact.idf_weights,
            coefficients: artifact.coefficients,
            bias: artifact.bias,
        })
    }

    /// Number of features in the vocabulary.
    #[must_use]
    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Build the sparse TF-IDF vector for a prompt: sublinear term frequency
    /// times stored IDF, L2-normalized. Out-of-vocabulary n-grams contribute
    /// zero. Returns `(feature_index, value)` pairs.
    fn vectorize(&self, prompt: &str) -> Vec<(usize, f64)> {
        let lower = prompt.to_lowercase();
        let chars: Vec<char> = lower.chars().collect();

        let mut counts: HashMap<usize, usize> = HashMap::new();
        for n in self.ngram_min..=self.ngram_max {
            if chars.len() < n {
                break;
            }
            for window in chars.windows(n) {
                let gram: String = window.iter().collect();
                if let Some(&index) = self.vocabulary.get(gram.as_str()) {
                    *counts.entry(index).or_insert(0) += 1;
                }
            }
        }

        let mut vector: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(index, count)| {
                let tf = 1.0 + (count as f64).ln();
                (index, tf * self.idf_weights[index])
            })
            .collect();
        // Norm and dot product accumulate in index order; float addition is
        // order-sensitive and map iteration order is not stable.
        vector.sort_unstable_by_key(|&(index, _)| index);

        let norm = vector.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    /// Injection probability for a prompt: logistic transform of the dot
    /// product between the TF-IDF vector and the coefficient vector, plus the
    /// intercept. Deterministic for identical input.
    #[must_use]
    pub fn probability(&self, prompt: &str) -> f64 {
        let z = self
            .vectorize(prompt)
            .iter()
            .map(|&(index, value)| value * self.coefficients[index])
            .sum::<f64>()
            + self.bias;
        sigmoid(z)
    }
}

/// Standard logistic function.
fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Linear-classifier detector, polymorphic over model availability.
///
/// When no model is loaded every call returns the sentinel unavailable
/// result and [`LinearClassifier::is_loaded`] reports `false` so the
/// ensemble can redistribute this detector's weight.
pub struct LinearClassifier {
    model: Option<ClassifierModel>,
    report_threshold: f64,
}

impl LinearClassifier {
    /// Create a classifier from configuration.
    ///
    /// A `model_path` of `None`, or a path that does not exist, yields a
    /// disabled classifier (logged, not an error). A present but invalid
    /// artifact is fatal.
    ///
    /// # Errors
    ///
    /// Returns a model error if an artifact exists at the configured path but
    /// cannot be loaded or validated, or a configuration error if the
    /// reporting threshold is invalid.
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        config.validate()?;
        let model = match &config.model_path {
            None => {
                tracing::info!("no classifier artifact configured, ML detector disabled");
                None
            }
            Some(path) if !path.exists() => {
                tracing::warn!(
                    path = %path.display(),
                    "classifier artifact not found, running in degraded mode without ML detector"
                );
                None
            }
            Some(path) => {
                let model = ClassifierModel::from_json_file(path)?;
                tracing::info!(
                    path = %path.display(),
                    vocabulary_size = model.vocabulary_size(),
                    "classifier model loaded"
                );
                Some(model)
            }
        };
        Ok(Self {
            model,
            report_threshold: config.report_threshold,
        })
    }

    /// Create a classifier around an already-loaded model.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `report_threshold` lies outside
    /// `(0, 1)`, the same rule [`LinearClassifier::new`] enforces.
    pub fn with_model(model: ClassifierModel, report_threshold: f64) -> Result<Self> {
        let config = ClassifierConfig {
            model_path: None,
            report_threshold,
        };
        config.validate()?;
        Ok(Self {
            model: Some(model),
            report_threshold,
        })
    }

    /// Whether a trained model is loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }
}

impl Detector for LinearClassifier {
    fn detect(&self, prompt: &str) -> DetectorResult {
        let Some(model) = &self.model else {
            return DetectorResult::quiet(DETECTOR_ML);
        };

        let probability = model.probability(prompt);
        // Distance from the decision boundary, rescaled to [0, 1]; a
        // probability near 0.5 is a low-confidence call.
        let confidence = (probability - 0.5).abs() * 2.0;
        let triggered = if probability > self.report_threshold {
            vec![DETECTOR_ML.to_string()]
        } else {
            Vec::new()
        };

        DetectorResult::new(DETECTOR_ML, probability, confidence, triggered, None)
    }

    fn name(&self) -> &'static str {
        DETECTOR_ML
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
