//! Activity suitability from forecast variables.
//!
//! A pure, threshold-based scorer: each activity starts from a base score,
//! the variables nudge it up or down, and the total maps onto a label.

use std::collections::BTreeMap;
use std::fmt;

use cairn_core::{PrecipType, SuitabilityConfig, Variable, Variables};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Activity {
    Cycling,
    Hiking,
    Skiing,
}

impl Activity {
    pub const ALL: [Activity; 3] = [Activity::Cycling, Activity::Hiking, Activity::Skiing];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Cycling => "Cycling",
            Self::Hiking => "Hiking",
            Self::Skiing => "Skiing",
        }
    }

    fn base_score(&self) -> i32 {
        match self {
            Self::Cycling | Self::Hiking => 1,
            Self::Skiing => -1,
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Suitability {
    Good,
    Fair,
    Poor,
}

impl Suitability {
    pub fn from_score(score: i32) -> Self {
        if score >= 2 {
            Self::Good
        } else if score >= 0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        }
    }
}

impl fmt::Display for Suitability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Adjustments for (cycling, hiking, skiing)
#[derive(Default)]
struct Tally {
    cycling: i32,
    hiking: i32,
    skiing: i32,
}

impl Tally {
    fn add(&mut self, cycling: i32, hiking: i32, skiing: i32) {
        self.cycling += cycling;
        self.hiking += hiking;
        self.skiing += skiing;
    }

    fn get(&self, activity: Activity) -> i32 {
        match activity {
            Activity::Cycling => self.cycling,
            Activity::Hiking => self.hiking,
            Activity::Skiing => self.skiing,
        }
    }
}

fn adjustments(vars: &Variables, rules: &SuitabilityConfig) -> Tally {
    let get = |v: Variable| vars.get(&v).copied().filter(|x| x.is_finite());
    let mut tally = Tally::default();

    if let Some(wind) = get(Variable::WindSpeed) {
        if wind >= rules.gale_wind_ms {
            tally.add(-3, -2, -1);
        } else if wind >= rules.breezy_wind_ms {
            tally.add(-2, -1, 0);
        } else if wind <= rules.calm_wind_ms {
            tally.add(1, 1, 0);
        }
    }

    if let (Some(tmin), Some(tmax)) = (get(Variable::TempMin), get(Variable::TempMax)) {
        if tmax >= rules.warm_temp_c {
            tally.add(-1, -1, -2);
        }
        if tmin <= rules.hard_frost_c {
            tally.add(-2, -1, 1);
        }
        if tmax <= rules.ski_cold_max_c {
            tally.add(0, 0, 2);
        } else if tmax <= rules.ski_cool_max_c {
            tally.add(0, 0, 1);
        } else if tmax >= rules.ski_thaw_max_c {
            tally.add(0, 0, -2);
        }
        if (rules.comfortable_min_c..=rules.comfortable_max_c).contains(&tmax)
            && tmin >= rules.comfortable_floor_c
        {
            tally.add(1, 1, 0);
        }
    }

    if let Some(prob) = get(Variable::PrecipitationProb) {
        let kind = get(Variable::PrecipType).and_then(PrecipType::from_code);
        if prob >= rules.wet_precip_pct {
            tally.add(-2, -1, 0);
        } else if prob >= rules.showery_precip_pct {
            tally.add(-1, 0, 0);
        }
        if prob >= rules.showery_precip_pct && kind == Some(PrecipType::Rain) {
            tally.add(0, 0, -1);
        }
    }

    if let Some(visibility) = get(Variable::Visibility) {
        if visibility < rules.poor_visibility_km {
            tally.add(-1, -2, 0);
        } else if visibility < rules.hazy_visibility_km {
            tally.add(0, -1, 0);
        }
    }

    tally
}

/// Skiing needs a freezing minimum and workable visibility.
fn skiing_ruled_out(vars: &Variables, rules: &SuitabilityConfig) -> bool {
    let too_warm = match vars.get(&Variable::TempMin) {
        Some(tmin) if tmin.is_finite() => *tmin > rules.ski_freezing_c,
        _ => true,
    };
    let too_murky = vars
        .get(&Variable::Visibility)
        .is_some_and(|v| *v < rules.ski_min_visibility_km);
    too_warm || too_murky
}

/// Suitability of `activity` under the given forecast.
pub fn score(vars: &Variables, activity: Activity, rules: &SuitabilityConfig) -> Suitability {
    if activity == Activity::Skiing && skiing_ruled_out(vars, rules) {
        return Suitability::Poor;
    }
    let total = activity.base_score() + adjustments(vars, rules).get(activity);
    Suitability::from_score(total)
}

/// Suitability of every tracked activity.
pub fn score_all(vars: &Variables, rules: &SuitabilityConfig) -> BTreeMap<Activity, Suitability> {
    Activity::ALL
        .into_iter()
        .map(|activity| (activity, score(vars, activity, rules)))
        .collect()
}
