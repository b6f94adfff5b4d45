//! Plain-text rendering of a [`BriefingReport`].
//!
//! Section order is fixed: forecast by zone, latest benchmark, suitability,
//! source confidence, PDF links. The delivery layer splits messages on these
//! headings.

use std::fmt::Write;

use cairn_core::Variable;

use crate::advice::{best_window, freezing_note, wind_band, Conditions};
use crate::composer::{Briefing, BriefingReport};
use crate::suitability::Activity;

pub const SECTION_TITLES: [&str; 5] = [
    "1) Latest forecast by zone (with briefing)",
    "2) Latest benchmark",
    "3) Suitability for Cycling/Hiking/Skiing",
    "4) Forecasting source with confidence %",
    "5) Latest Full PDF links",
];

const MS_TO_KMH: f64 = 3.6;
const KMH_TO_MPH: f64 = 0.621_371;

fn fmt(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.1}"),
        None => "?".to_string(),
    }
}

fn capitalise(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn zone_line(briefing: &Briefing) -> String {
    let c: Conditions = briefing.headline();
    if briefing.is_unavailable() || c.is_empty() {
        return format!("- {}: forecast unavailable from current source set.", briefing.zone_name);
    }

    let kmh = c.wind.map(|w| w * MS_TO_KMH);
    let mph = kmh.map(|k| k * KMH_TO_MPH);

    let mut line = format!(
        "- {} - {} -> {} C. {}, peaking near {} km/h ({} mph)",
        briefing.zone_name,
        fmt(c.temp_min),
        fmt(c.temp_max),
        capitalise(wind_band(c.wind)),
        fmt(kmh),
        fmt(mph),
    );
    let notes = briefing.spread_notes();
    if !notes.is_empty() {
        let _ = write!(line, "; {}", notes.join(", "));
    }
    let _ = write!(line, ". {}.", capitalise(best_window(&c)));
    if let Some(note) = freezing_note(&c) {
        let _ = write!(line, " {note}");
    }
    if let Some(prob) = c.precipitation_prob {
        let kind = c.precip_type.map(|k| k.description()).unwrap_or("precipitation");
        let _ = write!(line, " Precipitation {prob:.0}% ({kind}).");
    }
    if let Some(vis) = c.visibility {
        let _ = write!(line, " Visibility down to {vis:.1} km.");
    }
    line
}

fn render_forecasts(report: &BriefingReport, out: &mut Vec<String>) {
    out.push(SECTION_TITLES[0].to_string());
    for briefing in &report.briefings {
        out.push(zone_line(briefing));
    }
}

fn render_benchmark(report: &BriefingReport, out: &mut Vec<String>) {
    match &report.latest_benchmark {
        Some(latest) if !latest.rows.is_empty() => {
            out.push(format!(
                "{} ({})",
                SECTION_TITLES[1],
                latest.observed_at.format("%Y-%m-%d")
            ));
            for row in &latest.rows {
                out.push(format!(
                    "- {}: conf {}%, MAE Tmax {}C, Tmin {}C, Wind {} km/h",
                    row.source_id.label(),
                    fmt(Some(row.confidence_pct)),
                    fmt(row.mae(Variable::TempMax)),
                    fmt(row.mae(Variable::TempMin)),
                    fmt(row.mae(Variable::WindSpeed).map(|w| w * MS_TO_KMH)),
                ));
            }
        }
        _ => {
            out.push(SECTION_TITLES[1].to_string());
            out.push("- Not enough history yet (scores start filling after 1 full day).".to_string());
        }
    }
}

fn render_suitability(report: &BriefingReport, out: &mut Vec<String>) {
    out.push(SECTION_TITLES[2].to_string());
    for briefing in &report.briefings {
        out.push(format!("- {}", briefing.zone_name));
        match &briefing.advice {
            Some(advice) => {
                out.push(format!("  Go: {}", advice.go));
                out.push(format!("  Cautions: {}", advice.cautions));
                out.push(format!("  Nice-to-have adjustments: {}", advice.adjustments));
                let ratings: Vec<String> = Activity::ALL
                    .iter()
                    .filter_map(|a| briefing.suitability.get(a).map(|s| format!("{a} {s}")))
                    .collect();
                out.push(format!("  Ratings: {}", ratings.join(", ")));
            }
            None => out.push("  No usable forecast; suitability not rated.".to_string()),
        }
    }
}

fn render_sources(report: &BriefingReport, out: &mut Vec<String>) {
    out.push(SECTION_TITLES[3].to_string());
    for briefing in &report.briefings {
        match (briefing.chosen_source(), briefing.source_confidence_pct) {
            (Some(source), Some(confidence)) => out.push(format!(
                "- {}: {} ({}% confidence)",
                briefing.zone_name,
                source.label(),
                fmt(Some(confidence))
            )),
            _ => out.push(format!("- {}: no source available", briefing.zone_name)),
        }
    }

    let reporting: Vec<_> = report.sources.iter().filter(|s| s.weight > 0.0).collect();
    if reporting.is_empty() {
        out.push("- No source produced usable metrics for this run.".to_string());
    }
    for summary in reporting {
        out.push(format!(
            "- {}: {}% confidence (weight {}%, samples {})",
            summary.source_id.label(),
            fmt(Some(summary.confidence_pct)),
            fmt(Some(summary.weight * 100.0)),
            summary.sample_count
        ));
    }

    if !report.failed_sources.is_empty() {
        let labels: Vec<&str> = report.failed_sources.iter().map(|(s, _)| s.label()).collect();
        out.push(format!("- Skipped errored sources this run: {}", labels.join(", ")));
        for (source, note) in &report.failed_sources {
            out.push(format!("  {}: {}", source.label(), note));
        }
    }

    for (source, env) in &report.not_configured {
        out.push(format!("- {}: not configured ({} missing)", source.label(), env));
    }
}

fn render_links(report: &BriefingReport, out: &mut Vec<String>) {
    out.push(SECTION_TITLES[4].to_string());
    let links = report.pdf_links();
    if links.is_empty() {
        out.push("- No PDF links found in this run.".to_string());
    }
    for link in links {
        out.push(format!("- {link}"));
    }
}

/// Render the report as the five-section text block.
pub fn render_text(report: &BriefingReport) -> String {
    let mut out = vec![
        format!(
            "Scottish mountains forecast (adaptive) - {} (UK)",
            report.target_date.format("%Y-%m-%d")
        ),
        "Sources benchmarked daily; ensemble weights auto-updated.".to_string(),
        String::new(),
    ];

    let sections: [fn(&BriefingReport, &mut Vec<String>); 5] = [
        render_forecasts,
        render_benchmark,
        render_suitability,
        render_sources,
        render_links,
    ];
    for (i, section) in sections.iter().enumerate() {
        if i > 0 {
            out.push(String::new());
        }
        section(report, &mut out);
    }

    out.join("\n")
}
