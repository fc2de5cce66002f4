//! Weighted scoring rubrics for pairwise judging.
//!
//! Each tournament kind has a fixed rubric. Dimension weights are validated at
//! construction and normalized to sum to exactly 1.0, so every consumer (the
//! match executor, offline evaluation) sees the same weighting.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::types::TournamentKind;

/// How far the raw weight sum may drift from 1.0 before the rubric is rejected
/// rather than silently normalized.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.05;

/// Score assumed for a dimension the caller did not provide.
pub const NEUTRAL_SCORE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RubricError {
    #[error("rubric '{0}' has no dimensions")]
    Empty(String),
    #[error("dimension '{id}' has invalid weight {weight} (must be finite and in (0, 1])")]
    InvalidWeight { id: String, weight: f64 },
    #[error("duplicate dimension id: {0}")]
    DuplicateDimension(String),
    #[error("dimension with empty id in rubric '{0}'")]
    EmptyDimensionId(String),
    #[error("rubric '{name}' weights sum to {sum:.4}, expected 1.0 (tolerance 0.05)")]
    WeightSum { name: String, sum: f64 },
}

/// One scoring criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: String,
    pub name: String,
    pub weight: f64,
    pub scoring_criteria: String,
}

impl Dimension {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        weight: f64,
        scoring_criteria: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            weight,
            scoring_criteria: scoring_criteria.into(),
        }
    }
}

/// A validated, normalized set of dimensions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rubric {
    name: String,
    description: String,
    dimensions: Vec<Dimension>,
}

impl Rubric {
    /// Validate and normalize a rubric.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        mut dimensions: Vec<Dimension>,
    ) -> Result<Self, RubricError> {
        let name = name.into();
        if dimensions.is_empty() {
            return Err(RubricError::Empty(name));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for d in &dimensions {
            if d.id.trim().is_empty() {
                return Err(RubricError::EmptyDimensionId(name));
            }
            if !d.weight.is_finite() || d.weight <= 0.0 || d.weight > 1.0 {
                return Err(RubricError::InvalidWeight {
                    id: d.id.clone(),
                    weight: d.weight,
                });
            }
            if !seen.insert(d.id.as_str()) {
                return Err(RubricError::DuplicateDimension(d.id.clone()));
            }
        }

        let sum: f64 = dimensions.iter().map(|d| d.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(RubricError::WeightSum { name, sum });
        }
        if (sum - 1.0).abs() > 1e-9 {
            tracing::debug!(rubric = %name, sum, "normalizing rubric weights");
            for d in &mut dimensions {
                d.weight /= sum;
            }
        }

        Ok(Self {
            name,
            description: description.into(),
            dimensions,
        })
    }

    /// The built-in rubric for a tournament kind.
    pub fn for_kind(kind: TournamentKind) -> Self {
        match kind {
            TournamentKind::Intent => intent_disambiguation(),
            TournamentKind::Tool => tool_selection(),
            TournamentKind::Analysis => analysis_comparison(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimension(&self, id: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.id == id)
    }

    /// Weighted sum of per-dimension scores. Missing dimensions count as
    /// `NEUTRAL_SCORE`; scores are clamped to [0, 1].
    pub fn weighted_score(&self, scores: &HashMap<String, f64>) -> f64 {
        self.weighted_score_by(|id| scores.get(id).copied())
    }

    /// [`Rubric::weighted_score`] over any per-dimension lookup.
    pub fn weighted_score_by(&self, score: impl Fn(&str) -> Option<f64>) -> f64 {
        self.dimensions
            .iter()
            .map(|d| {
                let s = score(d.id.as_str())
                    .filter(|s| s.is_finite())
                    .unwrap_or(NEUTRAL_SCORE)
                    .clamp(0.0, 1.0);
                s * d.weight
            })
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }

    /// Stable content hash, used to tag traces.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.name.as_bytes());
        for d in &self.dimensions {
            hasher.update(b"\n");
            hasher.update(d.id.as_bytes());
            hasher.update(format!(":{:.6}:", d.weight).as_bytes());
            hasher.update(d.scoring_criteria.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Serialized form accepted from config files; validated on conversion.
#[derive(Debug, Clone, Deserialize)]
pub struct RubricSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub dimensions: Vec<Dimension>,
}

impl TryFrom<RubricSpec> for Rubric {
    type Error = RubricError;

    fn try_from(spec: RubricSpec) -> Result<Self, Self::Error> {
        Rubric::new(spec.name, spec.description, spec.dimensions)
    }
}

impl<'de> Deserialize<'de> for Rubric {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let spec = RubricSpec::deserialize(deserializer)?;
        Rubric::try_from(spec).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Built-in rubrics
// =============================================================================

fn builtin(name: &str, description: &str, dims: &[(&str, &str, f64, &str)]) -> Rubric {
    let dimensions = dims
        .iter()
        .map(|(id, name, weight, criteria)| Dimension::new(*id, *name, *weight, *criteria))
        .collect();
    Rubric {
        name: name.to_string(),
        description: description.to_string(),
        dimensions,
    }
}

/// Which intent did the user most plausibly mean?
pub fn intent_disambiguation() -> Rubric {
    builtin(
        "intent_disambiguation",
        "Which intent best captures what the user is asking for.",
        &[
            (
                "semantic_alignment",
                "Semantic alignment",
                0.30,
                "How closely the intent's meaning matches the user's request as a whole.",
            ),
            (
                "parameter_coverage",
                "Parameter coverage",
                0.25,
                "How many of the intent's expected parameters are present or inferable from the input.",
            ),
            (
                "domain_match",
                "Domain match",
                0.20,
                "Whether the intent belongs to the domain the user is operating in.",
            ),
            (
                "action_type_match",
                "Action type match",
                0.15,
                "Whether the intent performs the kind of action requested (read vs write, create vs update).",
            ),
            (
                "ambiguity_resolution",
                "Ambiguity resolution",
                0.10,
                "How well the intent resolves the ambiguous parts of the input rather than ignoring them.",
            ),
        ],
    )
}

/// Which tool should handle the request?
pub fn tool_selection() -> Rubric {
    builtin(
        "tool_selection",
        "Which tool is the best fit to fulfil the user's request.",
        &[
            (
                "capability_match",
                "Capability match",
                0.35,
                "Whether the tool can actually perform what the user asked for.",
            ),
            (
                "input_compatibility",
                "Input compatibility",
                0.25,
                "Whether the information in the request satisfies the tool's required inputs.",
            ),
            (
                "output_relevance",
                "Output relevance",
                0.20,
                "Whether the tool's output is what the user needs next.",
            ),
            (
                "specificity",
                "Specificity",
                0.10,
                "Prefer the narrowest tool that fully covers the request over a generic one.",
            ),
            (
                "reliability",
                "Reliability",
                0.10,
                "How safely and predictably the tool handles this kind of request.",
            ),
        ],
    )
}

/// Which candidate analysis best answers the request?
pub fn analysis_comparison() -> Rubric {
    builtin(
        "analysis_comparison",
        "Which analysis better answers the user's question.",
        &[
            (
                "accuracy",
                "Accuracy",
                0.30,
                "Factual and logical correctness of the analysis.",
            ),
            (
                "completeness",
                "Completeness",
                0.25,
                "Coverage of every part of the question.",
            ),
            (
                "relevance",
                "Relevance",
                0.20,
                "Focus on what was asked without drifting.",
            ),
            (
                "clarity",
                "Clarity",
                0.15,
                "How easy the analysis is to follow.",
            ),
            (
                "actionability",
                "Actionability",
                0.10,
                "Whether the reader can act on the conclusions.",
            ),
        ],
    )
}
