//! Persistence for imported health records.
//!
//! [`HealthStore`] is the narrow interface the merge step needs: load the
//! identity keys already stored, and insert new records per category.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{ImportRun, SqliteStore, StoreTotals};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;

use crate::error::Result;
use crate::health::model::{ActivityDay, BodyMetric, ExtractedWorkout};

#[async_trait]
pub trait HealthStore: Send + Sync {
    /// Start instants of every stored workout session
    async fn existing_workout_starts(&self) -> Result<HashSet<DateTime<Utc>>>;

    /// Returns the number of sessions written
    async fn insert_workouts(&self, workouts: &[ExtractedWorkout]) -> Result<usize>;

    async fn existing_body_metric_dates(&self) -> Result<HashSet<NaiveDate>>;

    async fn insert_body_metrics(&self, metrics: &[BodyMetric]) -> Result<usize>;

    async fn existing_activity_dates(&self) -> Result<HashSet<NaiveDate>>;

    async fn insert_activity_days(&self, days: &[ActivityDay]) -> Result<usize>;
}
