//! Source standings, tie-break ordering and ensemble weights.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use cairn_core::{SourceId, SourceScore};

/// Where a source stands for one zone.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub source_id: SourceId,
    pub confidence_pct: f64,
    pub sample_count: u32,
}

/// Standing of `source_id` from its per-class scores.
///
/// Confidence is the mean over the source's class scores and the sample
/// count the largest class count. Without scores the source stands at the
/// neutral baseline with no samples.
pub fn standing(scores: &[SourceScore], source_id: SourceId, neutral_confidence: f64) -> Standing {
    let own: Vec<&SourceScore> = scores.iter().filter(|s| s.source_id == source_id).collect();
    if own.is_empty() {
        return Standing {
            source_id,
            confidence_pct: neutral_confidence,
            sample_count: 0,
        };
    }

    let confidence_pct = own.iter().map(|s| s.confidence_pct).sum::<f64>() / own.len() as f64;
    let sample_count = own.iter().map(|s| s.sample_count).max().unwrap_or(0);
    Standing {
        source_id,
        confidence_pct,
        sample_count,
    }
}

/// Standings of `sources`, in the order given.
pub fn standings(scores: &[SourceScore], sources: &[SourceId], neutral_confidence: f64) -> Vec<Standing> {
    sources
        .iter()
        .map(|source| standing(scores, *source, neutral_confidence))
        .collect()
}

fn priority_rank(priority: &[SourceId], source: SourceId) -> usize {
    priority
        .iter()
        .position(|s| *s == source)
        .unwrap_or(priority.len())
}

/// Best first: higher confidence, then more samples, then earlier in `priority`.
pub fn compare(a: &Standing, b: &Standing, priority: &[SourceId]) -> Ordering {
    b.confidence_pct
        .total_cmp(&a.confidence_pct)
        .then_with(|| b.sample_count.cmp(&a.sample_count))
        .then_with(|| priority_rank(priority, a.source_id).cmp(&priority_rank(priority, b.source_id)))
        .then_with(|| a.source_id.cmp(&b.source_id))
}

/// Sort standings best first.
pub fn rank(mut standings: Vec<Standing>, priority: &[SourceId]) -> Vec<Standing> {
    standings.sort_by(|a, b| compare(a, b, priority));
    standings
}

/// The single best standing, if any.
pub fn best<'a>(standings: &'a [Standing], priority: &[SourceId]) -> Option<&'a Standing> {
    standings.iter().min_by(|a, b| compare(a, b, priority))
}

/// Ensemble weights `∝ exp((confidence - 50) / 20)`, normalised to sum to 1.
pub fn ensemble_weights(standings: &[Standing]) -> BTreeMap<SourceId, f64> {
    if standings.is_empty() {
        return BTreeMap::new();
    }

    let raw: Vec<(SourceId, f64)> = standings
        .iter()
        .map(|s| (s.source_id, ((s.confidence_pct - 50.0) / 20.0).exp()))
        .collect();
    let total: f64 = raw.iter().map(|(_, w)| w).sum();

    if !(total.is_finite() && total > 0.0) {
        let uniform = 1.0 / standings.len() as f64;
        return standings.iter().map(|s| (s.source_id, uniform)).collect();
    }
    raw.into_iter().map(|(source, w)| (source, w / total)).collect()
}
