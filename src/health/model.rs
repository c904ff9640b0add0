//! Domain records produced by a health-export import.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source tag stamped on every record that came from a health export.
pub const APPLE_HEALTH_SOURCE: &str = "apple_health";

/// Category of the single block an imported session carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockCategory {
    Cardio,
    Strength,
    Conditioning,
    Cooldown,
}

impl BlockCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockCategory::Cardio => "cardio",
            BlockCategory::Strength => "strength",
            BlockCategory::Conditioning => "conditioning",
            BlockCategory::Cooldown => "cooldown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cardio" => Some(BlockCategory::Cardio),
            "strength" => Some(BlockCategory::Strength),
            "conditioning" => Some(BlockCategory::Conditioning),
            "cooldown" => Some(BlockCategory::Cooldown),
            _ => None,
        }
    }
}

impl fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cardio machine / modality for sessions logged as cardio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardioType {
    Run,
    Walk,
    Hike,
    Bike,
    Swim,
    Row,
    Elliptical,
    Stairs,
}

impl CardioType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardioType::Run => "run",
            CardioType::Walk => "walk",
            CardioType::Hike => "hike",
            CardioType::Bike => "bike",
            CardioType::Swim => "swim",
            CardioType::Row => "row",
            CardioType::Elliptical => "elliptical",
            CardioType::Stairs => "stairs",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "run" => Some(CardioType::Run),
            "walk" => Some(CardioType::Walk),
            "hike" => Some(CardioType::Hike),
            "bike" => Some(CardioType::Bike),
            "swim" => Some(CardioType::Swim),
            "row" => Some(CardioType::Row),
            "elliptical" => Some(CardioType::Elliptical),
            "stairs" => Some(CardioType::Stairs),
            _ => None,
        }
    }
}

/// The synthetic block wrapping an imported session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutBlock {
    pub id: String,
    pub category: BlockCategory,
}

/// One completed exercise session recovered from the export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedWorkout {
    /// Freshly generated UUID v4, never derived from the source.
    pub id: String,
    pub name: String,
    pub block: WorkoutBlock,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Whole seconds.
    pub total_duration: u64,
    /// 1-10, present only when the export recorded energy for the session.
    pub effort: Option<u8>,
    pub cardio_type: Option<CardioType>,
    /// Miles, two decimals.
    pub distance: Option<f64>,
}

/// One calendar day's body measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyMetric {
    pub date: NaiveDate,
    /// Pounds, one decimal.
    pub weight: Option<f64>,
    /// Percent, one decimal.
    pub body_fat: Option<f64>,
    pub source: String,
}

impl BodyMetric {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            weight: None,
            body_fat: None,
            source: APPLE_HEALTH_SOURCE.to_string(),
        }
    }
}

/// One calendar day's activity totals, all rounded to whole units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDay {
    pub date: NaiveDate,
    pub active_energy: i64,
    pub exercise_minutes: i64,
    pub stand_hours: i64,
}

/// Everything one import extracted, each list in ascending time order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthImportResult {
    pub workouts: Vec<ExtractedWorkout>,
    pub body_metrics: Vec<BodyMetric>,
    pub activity_days: Vec<ActivityDay>,
    /// Records that matched but failed conversion and were dropped.
    #[serde(default)]
    pub skipped_records: usize,
}

impl HealthImportResult {
    pub fn is_empty(&self) -> bool {
        self.workouts.is_empty() && self.body_metrics.is_empty() && self.activity_days.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} workouts, {} body metrics, {} activity days",
            self.workouts.len(),
            self.body_metrics.len(),
            self.activity_days.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip_names() {
        for category in [
            BlockCategory::Cardio,
            BlockCategory::Strength,
            BlockCategory::Conditioning,
            BlockCategory::Cooldown,
        ] {
            assert_eq!(BlockCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(BlockCategory::parse("yoga"), None);
        assert_eq!(CardioType::parse("run"), Some(CardioType::Run));
        assert_eq!(CardioType::parse("skate"), None);
    }

    #[test]
    fn test_serialized_tags_match_storage_names() {
        let json = serde_json::to_string(&BlockCategory::Conditioning).unwrap();
        assert_eq!(json, "\"conditioning\"");
        let json = serde_json::to_string(&CardioType::Elliptical).unwrap();
        assert_eq!(json, "\"elliptical\"");
    }

    #[test]
    fn test_result_summary() {
        let mut result = HealthImportResult::default();
        assert!(result.is_empty());
        result.activity_days.push(ActivityDay {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            active_energy: 450,
            exercise_minutes: 32,
            stand_hours: 10,
        });
        assert!(!result.is_empty());
        assert_eq!(result.summary(), "0 workouts, 0 body metrics, 1 activity days");
    }
}
