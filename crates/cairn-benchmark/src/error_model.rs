//! Per-variable distance and normalisation into [0, 1].

use cairn_core::{NormalizationScales, PrecipType, Variable, VariableClass, Variables};

use crate::error::PairError;

/// Normalised prediction error model.
#[derive(Debug, Clone)]
pub struct ErrorModel {
    scales: NormalizationScales,
}

impl ErrorModel {
    pub fn new(scales: NormalizationScales) -> Self {
        Self { scales }
    }

    fn scale(&self, variable: Variable) -> f64 {
        match variable {
            Variable::TempMax | Variable::TempMin => self.scales.temperature,
            Variable::WindSpeed => self.scales.wind_speed,
            Variable::PrecipitationProb => self.scales.precipitation_prob,
            Variable::Visibility => self.scales.visibility,
            Variable::PrecipType => 1.0,
        }
    }

    /// Error of one variable in [0, 1].
    ///
    /// Continuous variables use `min(|predicted - actual| / scale, 1)`;
    /// categorical ones score 0 on a match and 1 otherwise.
    pub fn variable_error(
        &self,
        variable: Variable,
        predicted: f64,
        actual: f64,
    ) -> Result<f64, PairError> {
        for value in [predicted, actual] {
            if !value.is_finite() {
                return Err(PairError::NonFinite { variable, value });
            }
        }

        if variable.is_categorical() {
            let predicted = category(variable, predicted)?;
            let actual = category(variable, actual)?;
            return Ok(if predicted == actual { 0.0 } else { 1.0 });
        }

        let diff = (predicted - actual).abs();
        let scale = self.scale(variable);
        if scale > 0.0 {
            Ok((diff / scale).min(1.0))
        } else if diff == 0.0 {
            Ok(0.0)
        } else {
            Ok(1.0)
        }
    }

    /// Mean error over the class variables present on both sides.
    ///
    /// `Ok(None)` when the two share no variable of the class.
    pub fn class_error(
        &self,
        class: VariableClass,
        predicted: &Variables,
        actual: &Variables,
    ) -> Result<Option<f64>, PairError> {
        let mut total = 0.0;
        let mut count = 0u32;
        for variable in class.variables() {
            if let (Some(p), Some(a)) = (predicted.get(&variable), actual.get(&variable)) {
                total += self.variable_error(variable, *p, *a)?;
                count += 1;
            }
        }
        Ok((count > 0).then(|| total / f64::from(count)))
    }
}

fn category(variable: Variable, code: f64) -> Result<PrecipType, PairError> {
    PrecipType::from_code(code).ok_or(PairError::UnknownCategory {
        variable,
        value: code,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn model() -> ErrorModel {
        ErrorModel::new(NormalizationScales::default())
    }

    fn vars(pairs: &[(Variable, f64)]) -> Variables {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_wind_error_saturates_at_scale() {
        let m = model();
        assert_eq!(m.variable_error(Variable::WindSpeed, 35.0, 15.0).unwrap(), 1.0);
        assert_eq!(m.variable_error(Variable::WindSpeed, 60.0, 15.0).unwrap(), 1.0);
        assert_eq!(m.variable_error(Variable::WindSpeed, 15.0, 25.0).unwrap(), 0.5);
    }

    #[test]
    fn test_temperature_uses_six_degree_scale() {
        let m = model();
        assert_eq!(m.variable_error(Variable::TempMax, 4.0, 7.0).unwrap(), 0.5);
    }

    #[test]
    fn test_categorical_mismatch() {
        let m = model();
        let snow = PrecipType::Snow.code();
        let rain = PrecipType::Rain.code();
        assert_eq!(m.variable_error(Variable::PrecipType, snow, snow).unwrap(), 0.0);
        assert_eq!(m.variable_error(Variable::PrecipType, snow, rain).unwrap(), 1.0);
        assert!(matches!(
            m.variable_error(Variable::PrecipType, 9.0, rain),
            Err(PairError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_non_finite_is_rejected() {
        let m = model();
        assert!(matches!(
            m.variable_error(Variable::TempMin, f64::NAN, 1.0),
            Err(PairError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_class_error_averages_shared_variables() {
        let m = model();
        let predicted = vars(&[(Variable::TempMax, 4.0), (Variable::TempMin, -2.0)]);
        let actual = vars(&[(Variable::TempMax, 7.0)]);
        // only temp_max overlaps
        assert_eq!(m.class_error(VariableClass::Temp, &predicted, &actual).unwrap(), Some(0.5));

        let actual = vars(&[(Variable::TempMax, 7.0), (Variable::TempMin, -2.0)]);
        assert_eq!(m.class_error(VariableClass::Temp, &predicted, &actual).unwrap(), Some(0.25));

        assert_eq!(m.class_error(VariableClass::Wind, &predicted, &actual).unwrap(), None);
    }

    #[test]
    fn test_precip_class_mixes_probability_and_type() {
        let m = model();
        let predicted = vars(&[
            (Variable::PrecipitationProb, 80.0),
            (Variable::PrecipType, PrecipType::Rain.code()),
        ]);
        let actual = vars(&[
            (Variable::PrecipitationProb, 100.0),
            (Variable::PrecipType, PrecipType::Snow.code()),
        ]);
        let err = m.class_error(VariableClass::Precip, &predicted, &actual).unwrap().unwrap();
        assert!((err - 0.6).abs() < 1e-12);
    }
}
