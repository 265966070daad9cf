//! Scoring tables and routing limits.
//!
//! Every weight, band and threshold lives here so a deployment can swap the
//! whole table from a JSON file without touching code. Values are read once
//! at startup and shared immutably.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Upper bound for each factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorCaps {
    pub budget: f64,
    pub timeline: f64,
    pub engagement: f64,
    pub source: f64,
    pub demographics: f64,
}

impl Default for FactorCaps {
    fn default() -> Self {
        Self {
            budget: 30.0,
            timeline: 20.0,
            engagement: 25.0,
            source: 15.0,
            demographics: 10.0,
        }
    }
}

/// Budget-to-average-price ratio at or above which `points` apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetTier {
    pub min_ratio: f64,
    pub points: f64,
}

/// Days since last activity strictly below which `points` apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineBand {
    pub max_days: f64,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementWeights {
    pub points_per_open: f64,
    pub opens_cap: f64,
    pub points_per_click: f64,
    pub clicks_cap: f64,
    pub points_per_visit: f64,
    pub visits_cap: f64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            points_per_open: 2.0,
            opens_cap: 8.0,
            points_per_click: 3.0,
            clicks_cap: 9.0,
            points_per_visit: 4.0,
            visits_cap: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemographicWeights {
    pub has_email: f64,
    pub has_phone: f64,
    pub min_phone_digits: usize,
    pub progressed_status: f64,
}

impl Default for DemographicWeights {
    fn default() -> Self {
        Self {
            has_email: 3.0,
            has_phone: 3.0,
            min_phone_digits: 10,
            progressed_status: 4.0,
        }
    }
}

/// Lower bounds (inclusive) of grades A-D; anything below `d` is E
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeThresholds {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self {
            a: 85.0,
            b: 70.0,
            c: 55.0,
            d: 40.0,
        }
    }
}

/// Score-tier side effects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Agents holding this many open leads are skipped for grade A
    pub max_open_leads: i64,
    pub grade_a_follow_up_hours: i64,
    pub grade_b_follow_up_hours: i64,
    pub nurture_campaign: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_open_leads: 20,
            grade_a_follow_up_hours: 1,
            grade_b_follow_up_hours: 24,
            nurture_campaign: "nurture".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub caps: FactorCaps,
    /// Checked in order, highest ratio first
    pub budget_tiers: Vec<BudgetTier>,
    pub budget_floor: f64,
    /// Checked in order, shortest band first
    pub timeline_bands: Vec<TimelineBand>,
    pub timeline_floor: f64,
    pub engagement: EngagementWeights,
    pub source_scores: HashMap<String, f64>,
    pub default_source_score: f64,
    pub demographics: DemographicWeights,
    pub grades: GradeThresholds,
    pub default_budget: f64,
    pub default_average_price: f64,
    pub routing: RoutingConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let tier = |min_ratio, points| BudgetTier { min_ratio, points };
        let band = |max_days, points| TimelineBand { max_days, points };

        Self {
            caps: FactorCaps::default(),
            budget_tiers: vec![tier(2.0, 30.0), tier(1.5, 25.0), tier(1.0, 20.0), tier(0.7, 15.0), tier(0.5, 10.0)],
            budget_floor: 5.0,
            timeline_bands: vec![band(1.0, 20.0), band(3.0, 18.0), band(7.0, 15.0), band(14.0, 10.0), band(30.0, 5.0)],
            timeline_floor: 2.0,
            engagement: EngagementWeights::default(),
            source_scores: [
                ("referral", 15.0),
                ("website", 12.0),
                ("walk_in", 10.0),
                ("facebook", 8.0),
                ("instagram", 8.0),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
            default_source_score: 5.0,
            demographics: DemographicWeights::default(),
            grades: GradeThresholds::default(),
            default_budget: 500_000.0,
            default_average_price: 500_000.0,
            routing: RoutingConfig::default(),
        }
    }
}

impl ScoringConfig {
    /// Built-in tables, or the JSON file at `path` layered over them.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(Path::new(path))
            .map_err(|e| anyhow::anyhow!("cannot read scoring config {}: {}", path, e))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("invalid scoring config {}: {}", path, e))?;
        config.validate()?;

        tracing::info!("Loaded scoring config from {}", path);
        Ok(config)
    }

    /// Rejects unordered tables, caps above the factor maxima (which keep the
    /// total at 100) and any point value above its factor's cap.
    pub fn validate(&self) -> anyhow::Result<()> {
        let max = FactorCaps::default();
        let caps = &self.caps;
        within("caps.budget", caps.budget, max.budget)?;
        within("caps.timeline", caps.timeline, max.timeline)?;
        within("caps.engagement", caps.engagement, max.engagement)?;
        within("caps.source", caps.source, max.source)?;
        within("caps.demographics", caps.demographics, max.demographics)?;

        for tier in &self.budget_tiers {
            within("budget_tiers.points", tier.points, caps.budget)?;
        }
        within("budget_floor", self.budget_floor, caps.budget)?;
        for band in &self.timeline_bands {
            within("timeline_bands.points", band.points, caps.timeline)?;
        }
        within("timeline_floor", self.timeline_floor, caps.timeline)?;

        let e = &self.engagement;
        within("engagement.opens_cap", e.opens_cap, caps.engagement)?;
        within("engagement.clicks_cap", e.clicks_cap, caps.engagement)?;
        within("engagement.visits_cap", e.visits_cap, caps.engagement)?;
        within("engagement.points_per_open", e.points_per_open, e.opens_cap)?;
        within("engagement.points_per_click", e.points_per_click, e.clicks_cap)?;
        within("engagement.points_per_visit", e.points_per_visit, e.visits_cap)?;

        for (source, points) in &self.source_scores {
            within(&format!("source_scores.{}", source), *points, caps.source)?;
        }
        within("default_source_score", self.default_source_score, caps.source)?;

        let d = &self.demographics;
        within("demographics.has_email", d.has_email, caps.demographics)?;
        within("demographics.has_phone", d.has_phone, caps.demographics)?;
        within("demographics.progressed_status", d.progressed_status, caps.demographics)?;

        if self
            .budget_tiers
            .windows(2)
            .any(|w| w[0].min_ratio <= w[1].min_ratio)
        {
            anyhow::bail!("budget_tiers must be ordered by descending min_ratio");
        }
        if self
            .timeline_bands
            .windows(2)
            .any(|w| w[0].max_days >= w[1].max_days)
        {
            anyhow::bail!("timeline_bands must be ordered by ascending max_days");
        }
        let g = &self.grades;
        if !(g.a > g.b && g.b > g.c && g.c > g.d) {
            anyhow::bail!("grade thresholds must strictly decrease from A to D");
        }
        Ok(())
    }
}

fn within(name: &str, value: f64, cap: f64) -> anyhow::Result<()> {
    if !(0.0..=cap).contains(&value) {
        anyhow::bail!("{} must be between 0 and {}, got {}", name, cap, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScoringConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.source_scores["referral"], 15.0);
    }

    #[test]
    fn test_partial_json_overrides_defaults() {
        let config: ScoringConfig = serde_json::from_value(serde_json::json!({
            "default_budget": 1_000_000.0,
            "routing": { "nurture_campaign": "drip" }
        }))
        .unwrap();

        assert_eq!(config.default_budget, 1_000_000.0);
        assert_eq!(config.routing.nurture_campaign, "drip");
        assert_eq!(config.routing.max_open_leads, 20);
        assert_eq!(config.caps.engagement, 25.0);
    }

    #[test]
    fn test_unordered_tiers_rejected() {
        let mut config = ScoringConfig::default();
        config.budget_tiers.reverse();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_caps_above_factor_maxima_rejected() {
        let raises: [fn(&mut FactorCaps); 5] = [
            |c| c.budget = 31.0,
            |c| c.timeline = 21.0,
            |c| c.engagement = 26.0,
            |c| c.source = 500.0,
            |c| c.demographics = 11.0,
        ];
        for raise in raises {
            let mut config = ScoringConfig::default();
            raise(&mut config.caps);
            assert!(config.validate().is_err(), "caps: {:?}", config.caps);
        }
    }

    #[test]
    fn test_points_above_their_cap_rejected() {
        let mut config = ScoringConfig::default();
        config.source_scores.insert("referral".to_string(), 500.0);
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("source_scores.referral"), "{err}");

        let mut config = ScoringConfig::default();
        config.budget_tiers[0].points = 35.0;
        assert!(config.validate().is_err());

        let mut config = ScoringConfig::default();
        config.timeline_floor = -1.0;
        assert!(config.validate().is_err());

        let mut config = ScoringConfig::default();
        config.engagement.visits_cap = 30.0;
        assert!(config.validate().is_err());

        let mut config = ScoringConfig::default();
        config.caps.source = 10.0;
        assert!(config.validate().is_err(), "referral scores 15 against a cap of 10");
    }

    #[test]
    fn test_oversized_file_is_rejected_on_load() {
        let path = std::env::temp_dir().join(format!("scoring-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{ "caps": { "source": 500.0 } }"#).unwrap();

        let loaded = ScoringConfig::load(path.to_str());
        std::fs::remove_file(&path).unwrap();

        assert!(loaded.is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(ScoringConfig::load(Some("/nonexistent/scoring.json")).is_err());
        assert!(ScoringConfig::load(None).is_ok());
    }
}
