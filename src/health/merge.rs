//! Import-to-store step.
//!
//! Each category is merged on its own: load the identity keys already
//! stored, drop incoming records whose key is stored or was already seen in
//! this batch, and insert the rest. A failure in one category does not stop
//! the others.

use std::collections::HashSet;
use std::hash::Hash;

use crate::error::{LiftlogError, Result};
use crate::health::model::{ActivityDay, BodyMetric, ExtractedWorkout, HealthImportResult};
use crate::store::HealthStore;

const WORKOUTS: &str = "workouts";
const BODY_METRICS: &str = "body_metrics";
const ACTIVITY_DAYS: &str = "activity_days";

/// Newly inserted record counts, per category
#[derive(Debug)]
pub struct MergeReport {
    pub workouts: Result<usize>,
    pub body_metrics: Result<usize>,
    pub activity_days: Result<usize>,
}

impl MergeReport {
    pub fn is_complete(&self) -> bool {
        self.failures().is_empty()
    }

    /// Sum over the categories that succeeded
    pub fn total_inserted(&self) -> usize {
        [&self.workouts, &self.body_metrics, &self.activity_days]
            .into_iter()
            .filter_map(|r| r.as_ref().ok())
            .sum()
    }

    pub fn failures(&self) -> Vec<(&'static str, &LiftlogError)> {
        [
            (WORKOUTS, &self.workouts),
            (BODY_METRICS, &self.body_metrics),
            (ACTIVITY_DAYS, &self.activity_days),
        ]
        .into_iter()
        .filter_map(|(category, r)| r.as_ref().err().map(|e| (category, e)))
        .collect()
    }

    /// One line for the user: counts on success, the failed categories otherwise.
    pub fn summary_message(&self) -> String {
        let describe = |r: &Result<usize>, label: &str| match r {
            Ok(n) => format!("{} {}", n, label),
            Err(_) => format!("{} not saved", label),
        };
        let parts = [
            describe(&self.workouts, "workouts"),
            describe(&self.body_metrics, "body metrics"),
            describe(&self.activity_days, "activity days"),
        ];

        if self.is_complete() {
            format!("Imported {}", parts.join(", "))
        } else {
            let failed: Vec<&str> = self.failures().into_iter().map(|(c, _)| c).collect();
            format!(
                "Import incomplete (write failure: {}): {}",
                failed.join(", "),
                parts.join(", ")
            )
        }
    }
}

/// Keep records whose key is neither stored nor repeated earlier in `incoming`.
fn select_new<T, K, F>(incoming: &[T], existing: &HashSet<K>, key: F) -> Vec<T>
where
    T: Clone,
    K: Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    incoming
        .iter()
        .filter(|item| {
            let k = key(item);
            !existing.contains(&k) && seen.insert(k)
        })
        .cloned()
        .collect()
}

fn store_write(category: &'static str, err: LiftlogError) -> LiftlogError {
    match err {
        LiftlogError::StoreWrite { reason, .. } => LiftlogError::StoreWrite { category, reason },
        other => LiftlogError::StoreWrite {
            category,
            reason: other.to_string(),
        },
    }
}

fn log_outcome(category: &str, incoming: usize, outcome: &Result<usize>) {
    match outcome {
        Ok(added) => log::info!(
            "Merged {}: {} new of {} extracted",
            category,
            added,
            incoming
        ),
        Err(e) => log::warn!("Failed to merge {}: {}", category, e),
    }
}

/// Workouts are the same event when their start instants are equal.
pub async fn merge_workouts<S: HealthStore>(
    store: &S,
    workouts: &[ExtractedWorkout],
) -> Result<usize> {
    let existing = store
        .existing_workout_starts()
        .await
        .map_err(|e| store_write(WORKOUTS, e))?;
    let fresh = select_new(workouts, &existing, |w| w.start);
    if fresh.is_empty() {
        return Ok(0);
    }
    store
        .insert_workouts(&fresh)
        .await
        .map_err(|e| store_write(WORKOUTS, e))
}

/// A stored date wins outright; no field-level merge against stored rows.
pub async fn merge_body_metrics<S: HealthStore>(
    store: &S,
    metrics: &[BodyMetric],
) -> Result<usize> {
    let existing = store
        .existing_body_metric_dates()
        .await
        .map_err(|e| store_write(BODY_METRICS, e))?;
    let fresh = select_new(metrics, &existing, |m| m.date);
    if fresh.is_empty() {
        return Ok(0);
    }
    store
        .insert_body_metrics(&fresh)
        .await
        .map_err(|e| store_write(BODY_METRICS, e))
}

pub async fn merge_activity_days<S: HealthStore>(
    store: &S,
    days: &[ActivityDay],
) -> Result<usize> {
    let existing = store
        .existing_activity_dates()
        .await
        .map_err(|e| store_write(ACTIVITY_DAYS, e))?;
    let fresh = select_new(days, &existing, |d| d.date);
    if fresh.is_empty() {
        return Ok(0);
    }
    store
        .insert_activity_days(&fresh)
        .await
        .map_err(|e| store_write(ACTIVITY_DAYS, e))
}

/// Merge all three categories of `result` into `store`.
pub async fn merge_into_store<S: HealthStore>(store: &S, result: &HealthImportResult) -> MergeReport {
    let workouts = merge_workouts(store, &result.workouts).await;
    log_outcome(WORKOUTS, result.workouts.len(), &workouts);

    let body_metrics = merge_body_metrics(store, &result.body_metrics).await;
    log_outcome(BODY_METRICS, result.body_metrics.len(), &body_metrics);

    let activity_days = merge_activity_days(store, &result.activity_days).await;
    log_outcome(ACTIVITY_DAYS, result.activity_days.len(), &activity_days);

    MergeReport {
        workouts,
        body_metrics,
        activity_days,
    }
}
