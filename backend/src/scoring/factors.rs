// Score Factors - Five capped sub-scores computed from lead data

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

use realty_shared::{Lead, ScoreFactors};

use super::config::ScoringConfig;
use super::ScoringInputs;

static BUDGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)budget[^0-9]{0,24}?([0-9][0-9,]*(?:\.[0-9]+)?)\s*(crores?|cr|lakhs?|lacs?|million|mn|m|k)?\b",
    )
    .expect("budget pattern")
});

/// First amount mentioned after the word "budget" in free-text notes.
///
/// Accepts thousands separators and the suffixes k, m/mn/million,
/// lakh/lac and crore/cr.
pub fn extract_budget(notes: Option<&str>) -> Option<f64> {
    let caps = BUDGET.captures(notes?)?;
    let amount: f64 = caps[1].replace(',', "").parse().ok()?;

    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        None => 1.0,
        Some(suffix) => match suffix.as_str() {
            "k" => 1e3,
            "m" | "mn" | "million" => 1e6,
            "lakh" | "lakhs" | "lac" | "lacs" => 1e5,
            _ => 1e7,
        },
    };

    Some(amount * multiplier).filter(|b| b.is_finite() && *b > 0.0)
}

pub fn budget_score(budget: f64, average_price: f64, config: &ScoringConfig) -> f64 {
    let average = if average_price > 0.0 {
        average_price
    } else {
        config.default_average_price
    };
    let ratio = budget / average;

    config
        .budget_tiers
        .iter()
        .find(|tier| ratio >= tier.min_ratio)
        .map_or(config.budget_floor, |tier| tier.points)
        .clamp(0.0, config.caps.budget)
}

/// Fractional days between `since` and `now`; never negative.
pub fn days_since(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    ((now - since).num_seconds() as f64 / 86_400.0).max(0.0)
}

pub fn timeline_score(days_inactive: f64, config: &ScoringConfig) -> f64 {
    config
        .timeline_bands
        .iter()
        .find(|band| days_inactive < band.max_days)
        .map_or(config.timeline_floor, |band| band.points)
        .clamp(0.0, config.caps.timeline)
}

pub fn engagement_score(email_opens: i64, clicks: i64, site_visits: i64, config: &ScoringConfig) -> f64 {
    let w = &config.engagement;
    let opens = (email_opens.max(0) as f64 * w.points_per_open).min(w.opens_cap);
    let clicks = (clicks.max(0) as f64 * w.points_per_click).min(w.clicks_cap);
    let visits = (site_visits.max(0) as f64 * w.points_per_visit).min(w.visits_cap);

    (opens + clicks + visits).min(config.caps.engagement)
}

/// Lowercase with `-` and spaces folded to `_`, so "Walk-in" matches `walk_in`.
pub fn normalise_source(source: &str) -> String {
    source
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
        .collect()
}

pub fn source_score(source: Option<&str>, config: &ScoringConfig) -> f64 {
    source
        .map(normalise_source)
        .and_then(|s| config.source_scores.get(&s).copied())
        .unwrap_or(config.default_source_score)
        .clamp(0.0, config.caps.source)
}

pub fn demographics_score(lead: &Lead, config: &ScoringConfig) -> f64 {
    let w = &config.demographics;
    let mut score = 0.0;

    if lead.email.as_deref().is_some_and(|e| !e.trim().is_empty()) {
        score += w.has_email;
    }

    let digits = lead
        .phone
        .as_deref()
        .map_or(0, |p| p.chars().filter(char::is_ascii_digit).count());
    if digits >= w.min_phone_digits {
        score += w.has_phone;
    }

    if !lead.status.trim().eq_ignore_ascii_case("new") {
        score += w.progressed_status;
    }

    score.min(config.caps.demographics)
}

pub fn compute_factors(
    inputs: &ScoringInputs,
    average_price: f64,
    now: DateTime<Utc>,
    config: &ScoringConfig,
) -> ScoreFactors {
    let lead = &inputs.lead;
    let budget = extract_budget(lead.notes.as_deref()).unwrap_or(config.default_budget);
    let last_activity = inputs.last_activity_at.unwrap_or(lead.created_at);

    ScoreFactors {
        budget: budget_score(budget, average_price, config),
        timeline: timeline_score(days_since(last_activity, now), config),
        engagement: engagement_score(
            inputs.email_opens,
            inputs.clicks,
            inputs.completed_site_visits,
            config,
        ),
        source: source_score(lead.source.as_deref(), config),
        demographics: demographics_score(lead, config),
    }
}
