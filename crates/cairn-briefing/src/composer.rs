//! Per-zone briefing assembly.
//!
//! The composer picks the forecast of the most trusted source for each zone,
//! blends every available forecast into a confidence-weighted consensus and
//! derives suitability and advisories from the chosen forecast.

use std::collections::BTreeMap;

use cairn_benchmark::{best, ensemble_weights, standing, standings, LatestBenchmark, Standing};
use cairn_core::{
    ForecastRecord, PrecipType, SourceId, SourceScore, SuitabilityConfig, Variable, Variables,
    Zone, ZoneId,
};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::advice::{Advice, Conditions};
use crate::suitability::{score_all, Activity, Suitability};

/// Temperature spread worth a note, °C
const TEMP_SPREAD_NOTE_C: f64 = 4.0;
/// Wind spread worth a note, m/s (15 km/h)
const WIND_SPREAD_NOTE_MS: f64 = 15.0 / 3.6;

/// Max minus min of one variable across sources
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    pub variable: Variable,
    pub value: f64,
}

impl Spread {
    /// Whether the sources disagree enough to mention it
    pub fn is_notable(&self) -> bool {
        match self.variable {
            Variable::TempMax | Variable::TempMin => self.value >= TEMP_SPREAD_NOTE_C,
            Variable::WindSpeed => self.value >= WIND_SPREAD_NOTE_MS,
            _ => false,
        }
    }

    pub fn note(&self) -> Option<&'static str> {
        if !self.is_notable() {
            return None;
        }
        match self.variable {
            Variable::WindSpeed => Some("higher model spread on wind"),
            _ => Some("higher model spread on temperature"),
        }
    }
}

/// Briefing for one zone
#[derive(Debug, Clone, PartialEq)]
pub struct Briefing {
    pub zone_id: ZoneId,
    pub zone_name: String,
    pub generated_at: DateTime<Utc>,
    /// Prediction of the highest-ranked source, if any source produced one
    pub chosen_forecast: Option<ForecastRecord>,
    /// Zone confidence of the chosen source
    pub source_confidence_pct: Option<f64>,
    /// Confidence-weighted blend of every available forecast
    pub consensus: Variables,
    pub spreads: Vec<Spread>,
    pub weights: BTreeMap<SourceId, f64>,
    pub suitability: BTreeMap<Activity, Suitability>,
    pub advice: Option<Advice>,
    pub pdf_links: Vec<String>,
}

impl Briefing {
    /// No source produced a usable forecast for this zone
    pub fn is_unavailable(&self) -> bool {
        self.chosen_forecast.is_none()
    }

    pub fn chosen_source(&self) -> Option<SourceId> {
        self.chosen_forecast.as_ref().map(|f| f.source_id)
    }

    /// Headline values: the consensus, falling back to the chosen forecast
    pub fn headline(&self) -> Conditions {
        if self.consensus.is_empty() {
            self.chosen_forecast
                .as_ref()
                .map(|f| Conditions::from_variables(&f.variables))
                .unwrap_or_default()
        } else {
            Conditions::from_variables(&self.consensus)
        }
    }

    pub fn spread_notes(&self) -> Vec<&'static str> {
        self.spreads.iter().filter_map(Spread::note).collect()
    }
}

/// Run-wide standing of one source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSummary {
    pub source_id: SourceId,
    /// Mean of the per-zone confidences
    pub confidence_pct: f64,
    /// Ensemble weight across sources that produced a forecast this run
    pub weight: f64,
    /// Scored samples summed across zones
    pub sample_count: u32,
}

/// Everything one run hands to the delivery layer
#[derive(Debug, Clone, PartialEq)]
pub struct BriefingReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Zone-local day the briefings describe
    pub target_date: NaiveDate,
    pub briefings: Vec<Briefing>,
    pub latest_benchmark: Option<LatestBenchmark>,
    pub sources: Vec<SourceSummary>,
    /// Sources that produced nothing this run, with their first failure note
    pub failed_sources: Vec<(SourceId, String)>,
    /// Sources skipped for missing credentials, with the variable to set
    pub not_configured: Vec<(SourceId, String)>,
    /// Links from the shared catalog, appended after the zone links
    pub shared_links: Vec<String>,
}

impl BriefingReport {
    /// Zone catalog links first, then shared links, without duplicates
    pub fn pdf_links(&self) -> Vec<&str> {
        let mut links: Vec<&str> = Vec::new();
        let zone_links = self.briefings.iter().flat_map(|b| b.pdf_links.iter());
        for link in zone_links.chain(self.shared_links.iter()) {
            if !links.contains(&link.as_str()) {
                links.push(link);
            }
        }
        links
    }
}

#[derive(Debug, Clone)]
pub struct Composer {
    rules: SuitabilityConfig,
    priority: Vec<SourceId>,
    neutral_confidence: f64,
}

impl Composer {
    pub fn new(rules: SuitabilityConfig, priority: Vec<SourceId>, neutral_confidence: f64) -> Self {
        Self {
            rules,
            priority,
            neutral_confidence,
        }
    }

    /// Compose the briefing of one zone.
    ///
    /// `predictions` are the latest-issued records per source for the target
    /// instant; `scores` the zone's current source scores.
    pub fn compose_zone(
        &self,
        zone: &Zone,
        predictions: &[ForecastRecord],
        scores: &[SourceScore],
        generated_at: DateTime<Utc>,
    ) -> Briefing {
        let usable: Vec<&ForecastRecord> = predictions
            .iter()
            .filter(|r| r.zone_id == zone.id && !r.variables.is_empty())
            .collect();

        let candidates: Vec<Standing> = usable
            .iter()
            .map(|r| standing(scores, r.source_id, self.neutral_confidence))
            .collect();
        let weights = ensemble_weights(&candidates);

        let chosen = best(&candidates, &self.priority).and_then(|winner| {
            usable
                .iter()
                .find(|r| r.source_id == winner.source_id)
                .map(|r| ((*r).clone(), winner.confidence_pct))
        });

        let (chosen_forecast, source_confidence_pct) = match chosen {
            Some((record, confidence)) => {
                debug!(
                    "Zone {}: chose {} at {:.1}% confidence",
                    zone.id, record.source_id, confidence
                );
                (Some(record), Some(confidence))
            }
            None => (None, None),
        };

        let (suitability, advice) = match &chosen_forecast {
            Some(record) => {
                let ratings = score_all(&record.variables, &self.rules);
                let conditions = Conditions::from_variables(&record.variables);
                let advice = Advice::new(&conditions, &ratings, &self.rules);
                (ratings, Some(advice))
            }
            None => (BTreeMap::new(), None),
        };

        Briefing {
            zone_id: zone.id.clone(),
            zone_name: zone.name.clone(),
            generated_at,
            chosen_forecast,
            source_confidence_pct,
            consensus: consensus(&usable, &weights),
            spreads: spreads(&usable),
            weights,
            suitability,
            advice,
            pdf_links: zone.pdf_links.clone(),
        }
    }

    /// Run-wide summary of `sources`.
    ///
    /// Confidence is averaged over `zones`; weights are spread over the
    /// sources in `available` and are zero for the rest.
    pub fn summarize_sources(
        &self,
        sources: &[SourceId],
        available: &[SourceId],
        scores_by_zone: &BTreeMap<ZoneId, Vec<SourceScore>>,
        zones: &[ZoneId],
    ) -> Vec<SourceSummary> {
        let per_zone: Vec<Vec<Standing>> = zones
            .iter()
            .map(|z| {
                let scores = scores_by_zone.get(z).map(Vec::as_slice).unwrap_or(&[]);
                standings(scores, sources, self.neutral_confidence)
            })
            .collect();

        let overall: Vec<Standing> = sources
            .iter()
            .map(|source| {
                let own: Vec<&Standing> = per_zone
                    .iter()
                    .flatten()
                    .filter(|s| s.source_id == *source)
                    .collect();
                let confidence_pct = if own.is_empty() {
                    self.neutral_confidence
                } else {
                    own.iter().map(|s| s.confidence_pct).sum::<f64>() / own.len() as f64
                };
                Standing {
                    source_id: *source,
                    confidence_pct,
                    sample_count: own.iter().map(|s| s.sample_count).sum(),
                }
            })
            .collect();

        let eligible: Vec<Standing> = overall
            .iter()
            .filter(|s| available.contains(&s.source_id))
            .cloned()
            .collect();
        let weights = ensemble_weights(&eligible);

        overall
            .into_iter()
            .map(|s| SourceSummary {
                source_id: s.source_id,
                confidence_pct: s.confidence_pct,
                weight: weights.get(&s.source_id).copied().unwrap_or(0.0),
                sample_count: s.sample_count,
            })
            .collect()
    }
}

/// Weighted mean of each continuous variable; weighted vote for categories.
fn consensus(records: &[&ForecastRecord], weights: &BTreeMap<SourceId, f64>) -> Variables {
    let mut out = Variables::new();
    for variable in Variable::ALL {
        let present: Vec<(f64, f64)> = records
            .iter()
            .filter_map(|r| {
                let value = r.get(variable).filter(|v| v.is_finite())?;
                Some((value, weights.get(&r.source_id).copied().unwrap_or(0.0)))
            })
            .collect();
        if present.is_empty() {
            continue;
        }

        let merged = if variable.is_categorical() {
            let mut votes: BTreeMap<PrecipType, f64> = BTreeMap::new();
            for (value, weight) in &present {
                if let Some(kind) = PrecipType::from_code(*value) {
                    *votes.entry(kind).or_insert(0.0) += weight;
                }
            }
            votes
                .into_iter()
                .fold(None, |acc: Option<(PrecipType, f64)>, (kind, w)| match acc {
                    Some((_, best_w)) if best_w >= w => acc,
                    _ => Some((kind, w)),
                })
                .map(|(kind, _)| kind.code())
        } else {
            let total: f64 = present.iter().map(|(_, w)| w).sum();
            if total > 0.0 {
                Some(present.iter().map(|(v, w)| v * w).sum::<f64>() / total)
            } else {
                Some(present.iter().map(|(v, _)| v).sum::<f64>() / present.len() as f64)
            }
        };

        if let Some(value) = merged {
            out.insert(variable, value);
        }
    }
    out
}

fn spreads(records: &[&ForecastRecord]) -> Vec<Spread> {
    [Variable::TempMax, Variable::WindSpeed]
        .into_iter()
        .filter_map(|variable| {
            let values: Vec<f64> = records
                .iter()
                .filter_map(|r| r.get(variable).filter(|v| v.is_finite()))
                .collect();
            if values.len() < 2 {
                return None;
            }
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            Some(Spread {
                variable,
                value: max - min,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use cairn_core::VariableClass;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap()
    }

    fn zone() -> Zone {
        Zone {
            id: ZoneId::from("glencoe"),
            name: "Glencoe".to_string(),
            latitude: 56.68,
            longitude: -5.10,
            pdf_links: vec!["https://example.org/west-highlands.pdf".to_string()],
        }
    }

    fn record(source: SourceId, tmax: f64, wind: f64) -> ForecastRecord {
        let valid = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();
        ForecastRecord {
            source_id: source,
            zone_id: ZoneId::from("glencoe"),
            issued_at: now(),
            valid_at: valid,
            variables: [
                (Variable::TempMax, tmax),
                (Variable::TempMin, tmax - 6.0),
                (Variable::WindSpeed, wind),
            ]
            .into_iter()
            .collect(),
            raw_confidence: None,
        }
    }

    fn score(source: SourceId, samples: u32, error: f64) -> SourceScore {
        SourceScore {
            source_id: source,
            zone_id: ZoneId::from("glencoe"),
            variable_class: VariableClass::Wind,
            sample_count: samples,
            rolling_error: error,
            confidence_pct: 100.0 * (1.0 - error),
        }
    }

    fn composer() -> Composer {
        Composer::new(SuitabilityConfig::default(), SourceId::ALL.to_vec(), 50.0)
    }

    #[test]
    fn test_more_confident_source_is_chosen() {
        let predictions = vec![
            record(SourceId::MetOffice, 8.0, 12.0),
            record(SourceId::OpenMeteo, 10.0, 6.0),
        ];
        let scores = vec![
            score(SourceId::OpenMeteo, 10, 0.1),
            score(SourceId::MetOffice, 10, 0.3),
        ];

        let briefing = composer().compose_zone(&zone(), &predictions, &scores, now());
        assert_eq!(briefing.chosen_source(), Some(SourceId::OpenMeteo));
        assert!((briefing.source_confidence_pct.unwrap() - 90.0).abs() < 1e-9);
        assert_eq!(briefing.suitability.len(), 3);
        assert!(briefing.advice.is_some());
    }

    #[test]
    fn test_unscored_sources_fall_back_to_priority() {
        let predictions = vec![
            record(SourceId::OpenWeather, 8.0, 5.0),
            record(SourceId::MetNo, 9.0, 5.0),
        ];
        let briefing = composer().compose_zone(&zone(), &predictions, &[], now());
        assert_eq!(briefing.chosen_source(), Some(SourceId::MetNo));
        assert_eq!(briefing.source_confidence_pct, Some(50.0));
        assert_eq!(briefing.weights[&SourceId::MetNo], 0.5);
    }

    #[test]
    fn test_zone_without_forecasts_is_unavailable() {
        let briefing = composer().compose_zone(&zone(), &[], &[], now());
        assert!(briefing.is_unavailable());
        assert!(briefing.suitability.is_empty());
        assert!(briefing.consensus.is_empty());
        assert_eq!(briefing.pdf_links, zone().pdf_links);
    }

    #[test]
    fn test_consensus_and_spread() {
        let predictions = vec![
            record(SourceId::MetNo, 4.0, 4.0),
            record(SourceId::OpenMeteo, 10.0, 10.0),
        ];
        let briefing = composer().compose_zone(&zone(), &predictions, &[], now());
        // equal weights
        assert!((briefing.consensus[&Variable::TempMax] - 7.0).abs() < 1e-9);
        assert!((briefing.consensus[&Variable::WindSpeed] - 7.0).abs() < 1e-9);
        assert_eq!(
            briefing.spread_notes(),
            vec!["higher model spread on temperature", "higher model spread on wind"]
        );
    }

    #[test]
    fn test_precip_type_consensus_is_a_weighted_vote() {
        let mut snow = record(SourceId::MetNo, 1.0, 4.0);
        snow.variables.insert(Variable::PrecipType, PrecipType::Snow.code());
        let mut rain = record(SourceId::OpenMeteo, 3.0, 4.0);
        rain.variables.insert(Variable::PrecipType, PrecipType::Rain.code());
        let scores = vec![score(SourceId::MetNo, 10, 0.1), score(SourceId::OpenMeteo, 10, 0.4)];

        let briefing = composer().compose_zone(&zone(), &[snow, rain], &scores, now());
        assert_eq!(briefing.consensus[&Variable::PrecipType], PrecipType::Snow.code());
    }

    #[test]
    fn test_source_summary_averages_zones_and_sums_samples() {
        let glencoe = vec![score(SourceId::MetNo, 10, 0.2)];
        let mut glenshee_score = score(SourceId::MetNo, 6, 0.4);
        glenshee_score.zone_id = ZoneId::from("glenshee");
        let scores_by_zone: BTreeMap<ZoneId, Vec<SourceScore>> = [
            (ZoneId::from("glencoe"), glencoe),
            (ZoneId::from("glenshee"), vec![glenshee_score]),
        ]
        .into_iter()
        .collect();
        let zones = [ZoneId::from("glencoe"), ZoneId::from("glenshee")];

        let summary = composer().summarize_sources(
            &[SourceId::MetNo, SourceId::OpenMeteo],
            &[SourceId::MetNo],
            &scores_by_zone,
            &zones,
        );
        assert_eq!(summary.len(), 2);
        assert!((summary[0].confidence_pct - 70.0).abs() < 1e-9);
        assert_eq!(summary[0].sample_count, 16);
        assert_eq!(summary[0].weight, 1.0);
        assert_eq!(summary[1].confidence_pct, 50.0);
        assert_eq!(summary[1].weight, 0.0);
    }
}
