use serde::{Deserialize, Serialize};

use crate::schema::{Schema, SchemaViolation, ensure};

/// Scored critique of a draft artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    /// Quality score in `[0, 10]`.
    pub score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub needs_improvement: bool,
}

impl Evaluation {
    pub const MIN_SCORE: f64 = 0.0;
    pub const MAX_SCORE: f64 = 10.0;

    pub fn new(score: f64, needs_improvement: bool) -> Self {
        Self {
            score,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            suggestions: Vec::new(),
            needs_improvement,
        }
    }

    pub fn with_strength(mut self, strength: impl Into<String>) -> Self {
        self.strengths.push(strength.into());
        self
    }

    pub fn with_weakness(mut self, weakness: impl Into<String>) -> Self {
        self.weaknesses.push(weakness.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

impl Schema for Evaluation {
    fn check(&self) -> Result<(), SchemaViolation> {
        ensure(
            self.score.is_finite() && (Self::MIN_SCORE..=Self::MAX_SCORE).contains(&self.score),
            || format!("score {} is outside [0, 10]", self.score),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_score_bounds_are_inclusive() {
        assert!(Evaluation::new(0.0, true).check().is_ok());
        assert!(Evaluation::new(10.0, false).check().is_ok());
        assert!(Evaluation::new(10.01, false).check().is_err());
        assert!(Evaluation::new(-0.5, true).check().is_err());
        assert!(Evaluation::new(f64::NAN, true).check().is_err());
    }

    #[test]
    fn test_camel_case_wire_shape() {
        let evaluation = Evaluation::new(6.0, true).with_suggestion("tighten the chorus");
        let value = serde_json::to_value(&evaluation).unwrap();
        assert_eq!(value["needsImprovement"], json!(true));
        assert_eq!(value["suggestions"], json!(["tighten the chorus"]));
    }

    #[test]
    fn test_lists_default_to_empty() {
        let evaluation: Evaluation =
            serde_json::from_value(json!({"score": 8.0, "needsImprovement": false})).unwrap();
        assert!(evaluation.strengths.is_empty());
        assert!(evaluation.weaknesses.is_empty());
    }
}
