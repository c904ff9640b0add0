use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Mutex;

use super::HealthStore;
use crate::error::{LiftlogError, Result};
use crate::health::model::{ActivityDay, BodyMetric, ExtractedWorkout};

/// In-memory store for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    workouts: Mutex<Vec<ExtractedWorkout>>,
    body_metrics: Mutex<Vec<BodyMetric>>,
    activity_days: Mutex<Vec<ActivityDay>>,
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> LiftlogError {
    LiftlogError::StoreWrite {
        category: "memory",
        reason: "store lock poisoned".to_string(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workouts(&self) -> Vec<ExtractedWorkout> {
        self.workouts.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn body_metrics(&self) -> Vec<BodyMetric> {
        self.body_metrics.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn activity_days(&self) -> Vec<ActivityDay> {
        self.activity_days.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HealthStore for MemoryStore {
    async fn existing_workout_starts(&self) -> Result<HashSet<DateTime<Utc>>> {
        Ok(self.workouts.lock().map_err(poisoned)?.iter().map(|w| w.start).collect())
    }

    async fn insert_workouts(&self, workouts: &[ExtractedWorkout]) -> Result<usize> {
        self.workouts.lock().map_err(poisoned)?.extend_from_slice(workouts);
        Ok(workouts.len())
    }

    async fn existing_body_metric_dates(&self) -> Result<HashSet<NaiveDate>> {
        Ok(self.body_metrics.lock().map_err(poisoned)?.iter().map(|m| m.date).collect())
    }

    async fn insert_body_metrics(&self, metrics: &[BodyMetric]) -> Result<usize> {
        self.body_metrics.lock().map_err(poisoned)?.extend_from_slice(metrics);
        Ok(metrics.len())
    }

    async fn existing_activity_dates(&self) -> Result<HashSet<NaiveDate>> {
        Ok(self.activity_days.lock().map_err(poisoned)?.iter().map(|d| d.date).collect())
    }

    async fn insert_activity_days(&self, days: &[ActivityDay]) -> Result<usize> {
        self.activity_days.lock().map_err(poisoned)?.extend_from_slice(days);
        Ok(days.len())
    }
}
