//! Properties of the suitability scorer over arbitrary forecasts.

use cairn_briefing::{score, score_all, Activity, Suitability};
use cairn_core::{SuitabilityConfig, Variable, Variables};
use proptest::prelude::*;

fn forecast() -> impl Strategy<Value = Variables> {
    (
        prop::option::of(-20.0f64..30.0),
        prop::option::of(-25.0f64..25.0),
        prop::option::of(0.0f64..40.0),
        prop::option::of(0.0f64..=100.0),
        prop::option::of(0.0f64..50.0),
        prop::option::of(0u8..4),
    )
        .prop_map(|(tmax, tmin, wind, prob, vis, kind)| {
            let mut vars = Variables::new();
            let mut put = |v: Variable, x: Option<f64>| {
                if let Some(x) = x {
                    vars.insert(v, x);
                }
            };
            put(Variable::TempMax, tmax);
            put(Variable::TempMin, tmin);
            put(Variable::WindSpeed, wind);
            put(Variable::PrecipitationProb, prob);
            put(Variable::Visibility, vis);
            put(Variable::PrecipType, kind.map(f64::from));
            vars
        })
}

proptest! {
    #[test]
    fn prop_skiing_is_poor_above_freezing(mut vars in forecast(), tmin in 0.01f64..20.0) {
        vars.insert(Variable::TempMin, tmin);
        prop_assert_eq!(score(&vars, Activity::Skiing, &SuitabilityConfig::default()), Suitability::Poor);
    }

    #[test]
    fn prop_scoring_is_deterministic_and_total(vars in forecast()) {
        let rules = SuitabilityConfig::default();
        let first = score_all(&vars, &rules);
        prop_assert_eq!(first.len(), Activity::ALL.len());
        prop_assert_eq!(first, score_all(&vars, &rules));
    }

    #[test]
    fn prop_more_wind_never_helps_cycling(vars in forecast(), a in 0.0f64..40.0, b in 0.0f64..40.0) {
        let rules = SuitabilityConfig::default();
        let (calm, windy) = if a <= b { (a, b) } else { (b, a) };
        let mut calm_vars = vars.clone();
        calm_vars.insert(Variable::WindSpeed, calm);
        let mut windy_vars = vars;
        windy_vars.insert(Variable::WindSpeed, windy);
        // Good < Fair < Poor in declaration order
        prop_assert!(
            score(&calm_vars, Activity::Cycling, &rules) <= score(&windy_vars, Activity::Cycling, &rules)
        );
    }
}
