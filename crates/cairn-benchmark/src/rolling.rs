//! Exponentially weighted rolling error and the confidence mapping.

use cairn_core::{BenchmarkConfig, SourceId, SourceScore, VariableClass, ZoneId};

use crate::error::{BenchmarkError, BenchmarkResult};

/// `100 * (1 - rolling_error)`, clamped to [0, 100].
pub fn confidence_from_error(rolling_error: f64) -> f64 {
    (100.0 * (1.0 - rolling_error)).clamp(0.0, 100.0)
}

/// Rolling-error update rule and trust threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringRules {
    pub alpha: f64,
    pub min_samples: u32,
    pub neutral_confidence: f64,
}

impl ScoringRules {
    /// # Errors
    /// Returns `BenchmarkError::InvalidConfig` for an alpha outside (0, 1],
    /// a zero sample threshold or a baseline outside [0, 100].
    pub fn from_config(config: &BenchmarkConfig) -> BenchmarkResult<Self> {
        if !(config.alpha > 0.0 && config.alpha <= 1.0) {
            return Err(BenchmarkError::InvalidConfig(format!(
                "alpha {} is outside (0, 1]",
                config.alpha
            )));
        }
        if config.min_samples == 0 {
            return Err(BenchmarkError::InvalidConfig("min_samples must be at least 1".into()));
        }
        if !(0.0..=100.0).contains(&config.neutral_confidence) {
            return Err(BenchmarkError::InvalidConfig(format!(
                "neutral confidence {} is outside [0, 100]",
                config.neutral_confidence
            )));
        }

        Ok(Self {
            alpha: config.alpha,
            min_samples: config.min_samples,
            neutral_confidence: config.neutral_confidence,
        })
    }

    /// Next rolling error; the first sample seeds the estimate.
    pub fn update(&self, previous: Option<f64>, error: f64) -> f64 {
        let error = error.clamp(0.0, 1.0);
        match previous {
            None => error,
            Some(prev) => self.alpha * error + (1.0 - self.alpha) * prev,
        }
    }

    /// Confidence for a rolling error backed by `sample_count` samples.
    ///
    /// Insufficient history yields the neutral baseline exactly.
    pub fn confidence(&self, rolling_error: f64, sample_count: u32) -> f64 {
        if sample_count < self.min_samples {
            self.neutral_confidence
        } else {
            confidence_from_error(rolling_error)
        }
    }

    /// A score holding a single sample.
    pub fn seed(
        &self,
        source_id: SourceId,
        zone_id: ZoneId,
        variable_class: VariableClass,
        error: f64,
    ) -> SourceScore {
        let rolling_error = self.update(None, error);
        SourceScore {
            source_id,
            zone_id,
            variable_class,
            sample_count: 1,
            rolling_error,
            confidence_pct: self.confidence(rolling_error, 1),
        }
    }

    /// Fold one more sample into an existing score.
    pub fn absorb(&self, score: &mut SourceScore, error: f64) {
        let previous = (score.sample_count > 0).then_some(score.rolling_error);
        score.rolling_error = self.update(previous, error);
        score.sample_count = score.sample_count.saturating_add(1);
        score.confidence_pct = self.confidence(score.rolling_error, score.sample_count);
    }
}

impl Default for ScoringRules {
    fn default() -> Self {
        let config = BenchmarkConfig::default();
        Self {
            alpha: config.alpha,
            min_samples: config.min_samples,
            neutral_confidence: config.neutral_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn seed(rules: &ScoringRules, error: f64) -> SourceScore {
        rules.seed(SourceId::MetNo, ZoneId::from("glencoe"), VariableClass::Wind, error)
    }

    #[test]
    fn test_confidence_mapping() {
        assert_eq!(confidence_from_error(0.0), 100.0);
        assert_eq!(confidence_from_error(0.1), 90.0);
        assert_eq!(confidence_from_error(0.3), 70.0);
        assert_eq!(confidence_from_error(1.0), 0.0);
        assert_eq!(confidence_from_error(1.7), 0.0);
        assert_eq!(confidence_from_error(-0.2), 100.0);
    }

    #[test]
    fn test_first_sample_seeds_estimate() {
        let rules = ScoringRules::default();
        let score = seed(&rules, 0.4);
        assert_eq!(score.rolling_error, 0.4);
        assert_eq!(score.sample_count, 1);
    }

    #[test]
    fn test_exponential_update() {
        let rules = ScoringRules::default();
        let mut score = seed(&rules, 0.1);
        rules.absorb(&mut score, 0.5);
        assert!((score.rolling_error - 0.18).abs() < 1e-12);
        assert_eq!(score.sample_count, 2);
    }

    #[test]
    fn test_neutral_until_min_samples() {
        let rules = ScoringRules::default();
        let mut score = seed(&rules, 0.0);
        for _ in 0..3 {
            rules.absorb(&mut score, 0.0);
        }
        assert_eq!(score.sample_count, 4);
        assert_eq!(score.confidence_pct, 50.0);

        rules.absorb(&mut score, 0.0);
        assert_eq!(score.sample_count, 5);
        assert_eq!(score.confidence_pct, 100.0);
    }

    #[test]
    fn test_outlier_influence_is_bounded_by_alpha() {
        let rules = ScoringRules::default();
        let mut score = seed(&rules, 0.0);
        for _ in 0..9 {
            rules.absorb(&mut score, 0.0);
        }
        rules.absorb(&mut score, 1.0);
        assert!((score.rolling_error - 0.2).abs() < 1e-12);
        assert!((score.confidence_pct - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut config = BenchmarkConfig::default();
        config.alpha = 0.0;
        assert!(matches!(
            ScoringRules::from_config(&config),
            Err(BenchmarkError::InvalidConfig(_))
        ));

        let mut config = BenchmarkConfig::default();
        config.min_samples = 0;
        assert!(ScoringRules::from_config(&config).is_err());

        let config = BenchmarkConfig::default();
        assert_eq!(ScoringRules::from_config(&config).unwrap(), ScoringRules::default());
    }
}
