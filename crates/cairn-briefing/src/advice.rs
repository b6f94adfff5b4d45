//! Plain-language advisories derived from the headline variables.

use std::collections::BTreeMap;

use cairn_core::{PrecipType, SuitabilityConfig, Variable, Variables};

use crate::suitability::{Activity, Suitability};

const LIGHT_WIND_MS: f64 = 4.2;
const MODERATE_WIND_MS: f64 = 8.3;
const STRONG_WIND_MS: f64 = 12.5;

/// Headline values a briefing talks about
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Conditions {
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    /// m/s
    pub wind: Option<f64>,
    pub precipitation_prob: Option<f64>,
    pub precip_type: Option<PrecipType>,
    /// km
    pub visibility: Option<f64>,
}

impl Conditions {
    pub fn from_variables(vars: &Variables) -> Self {
        let get = |v: Variable| vars.get(&v).copied().filter(|x| x.is_finite());
        Self {
            temp_min: get(Variable::TempMin),
            temp_max: get(Variable::TempMax),
            wind: get(Variable::WindSpeed),
            precipitation_prob: get(Variable::PrecipitationProb),
            precip_type: get(Variable::PrecipType).and_then(PrecipType::from_code),
            visibility: get(Variable::Visibility),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.temp_min.is_none() && self.temp_max.is_none() && self.wind.is_none()
    }
}

pub fn wind_band(wind_ms: Option<f64>) -> &'static str {
    match wind_ms {
        None => "unknown wind",
        Some(w) if w < LIGHT_WIND_MS => "light wind",
        Some(w) if w < MODERATE_WIND_MS => "moderate wind",
        Some(w) if w < STRONG_WIND_MS => "strong wind",
        Some(_) => "very strong wind",
    }
}

pub fn best_window(c: &Conditions) -> &'static str {
    match c.wind {
        None => "best window uncertain due to limited wind data",
        Some(w) if w >= STRONG_WIND_MS => "best window is brief lower-level outings only",
        Some(w) if w >= MODERATE_WIND_MS => {
            "best window is late morning to early afternoon on sheltered routes"
        }
        Some(_) if c.temp_min.is_some_and(|t| t <= -2.0) => {
            "best window is late morning through afternoon after early cold"
        }
        Some(_) => "best window is mid-morning through mid-afternoon",
    }
}

/// Frost or freezing note for higher ground, if any.
pub fn freezing_note(c: &Conditions) -> Option<&'static str> {
    if c.temp_max.is_some_and(|t| t <= 1.0) {
        Some("Temperatures stay near/below freezing on higher ground.")
    } else if c.temp_min.is_some_and(|t| t <= 0.0) {
        Some("Early frost/ice risk on exposed sections.")
    } else {
        None
    }
}

fn sentence(parts: Vec<&str>) -> String {
    let joined = parts.join("; ");
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

pub fn go_line(c: &Conditions, ratings: &BTreeMap<Activity, Suitability>) -> &'static str {
    let good = |a: Activity| ratings.get(&a) == Some(&Suitability::Good);
    if c.wind.is_some_and(|w| w >= STRONG_WIND_MS) {
        "Go only if you are comfortable with very exposed, windy terrain."
    } else if c.temp_max.is_some_and(|t| t <= 2.0) {
        "Go if you are equipped for wintry ground; skiing is favoured over cycling."
    } else if good(Activity::Cycling) && good(Activity::Hiking) {
        "Go if you are fine with cool, potentially damp conditions; layered kit keeps it comfortable."
    } else {
        "Go with standard hill caution; conditions are generally manageable on sheltered routes."
    }
}

pub fn cautions_line(c: &Conditions, rules: &SuitabilityConfig) -> String {
    let mut cautions = Vec::new();
    if c.temp_min.is_some_and(|t| t <= 0.0) {
        cautions.push("freeze/thaw patches can make paths and roads slick early/late");
    }
    if c.wind.is_some_and(|w| w >= MODERATE_WIND_MS) {
        cautions.push("exposed ridges and plateaus will feel significantly windier");
    }
    if c.temp_max.is_some_and(|t| t >= 18.0) {
        cautions.push("unexpected warm spells can soften snowpack and increase slush");
    }
    if c.precipitation_prob.is_some_and(|p| p >= rules.wet_precip_pct) {
        cautions.push(match c.precip_type {
            Some(PrecipType::Snow) => "snowfall likely; expect drifting and buried paths",
            _ => "persistent precipitation likely; streams may be hard to cross",
        });
    }
    if c.visibility.is_some_and(|v| v < rules.poor_visibility_km) {
        cautions.push("summits likely in cloud; navigation skills essential");
    }

    if cautions.is_empty() {
        "No major wind/temperature hazards indicated; still verify local rain and visibility before departure."
            .to_string()
    } else {
        sentence(cautions)
    }
}

pub fn adjustments_line(c: &Conditions, ratings: &BTreeMap<Activity, Suitability>) -> String {
    let mut adjustments = Vec::new();
    if c.wind.is_some_and(|w| w >= MODERATE_WIND_MS) {
        adjustments.push("pack a windproof shell and full-finger gloves");
    }
    if c.temp_min.is_some_and(|t| t <= 0.0) {
        adjustments.push("carry traction aid for icy sections");
    }
    if ratings.get(&Activity::Cycling) != Some(&Suitability::Good) {
        adjustments.push("reduce tyre pressure slightly and leave extra braking margin on descents");
    }
    if ratings.get(&Activity::Skiing) == Some(&Suitability::Good) {
        adjustments.push("bring goggles and cold-weather layers for exposed sections");
    }
    if adjustments.is_empty() {
        adjustments.push("carry a light shell and one dry spare layer for after activity");
    }
    sentence(adjustments)
}

/// Advisory lines for one zone
#[derive(Debug, Clone, PartialEq)]
pub struct Advice {
    pub go: String,
    pub cautions: String,
    pub adjustments: String,
}

impl Advice {
    pub fn new(
        c: &Conditions,
        ratings: &BTreeMap<Activity, Suitability>,
        rules: &SuitabilityConfig,
    ) -> Self {
        Self {
            go: go_line(c, ratings).to_string(),
            cautions: cautions_line(c, rules),
            adjustments: adjustments_line(c, ratings),
        }
    }
}
