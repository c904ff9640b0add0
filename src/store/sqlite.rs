use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

use super::HealthStore;
use crate::db::{migrate, Db};
use crate::error::{LiftlogError, Result};
use crate::health::model::{
    ActivityDay, BlockCategory, BodyMetric, CardioType, ExtractedWorkout, HealthImportResult,
    WorkoutBlock, APPLE_HEALTH_SOURCE,
};
use crate::health::MergeReport;

/// SQLite-backed health store; identity keys are enforced by unique indexes too.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Db,
}

/// One completed import, as kept in `import_runs`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRun {
    pub run_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub workouts_found: usize,
    pub workouts_added: Option<usize>,
    pub body_metrics_found: usize,
    pub body_metrics_added: Option<usize>,
    pub activity_days_found: usize,
    pub activity_days_added: Option<usize>,
    pub skipped_records: usize,
    pub imported_at: DateTime<Utc>,
}

impl ImportRun {
    /// Added counts stay `None` for categories whose merge failed
    pub fn new(file_name: &str, file_size: u64, result: &HealthImportResult, report: &MergeReport) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            file_name: file_name.to_string(),
            file_size,
            workouts_found: result.workouts.len(),
            workouts_added: report.workouts.as_ref().ok().copied(),
            body_metrics_found: result.body_metrics.len(),
            body_metrics_added: report.body_metrics.as_ref().ok().copied(),
            activity_days_found: result.activity_days.len(),
            activity_days_added: report.activity_days.as_ref().ok().copied(),
            skipped_records: result.skipped_records,
            imported_at: Utc::now(),
        }
    }
}

/// Row counts per stored category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreTotals {
    pub workouts: usize,
    pub body_metrics: usize,
    pub activity_days: usize,
    pub import_runs: usize,
}

/// Keeps sub-second digits when present so stored starts compare exactly
fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Raw `workout_sessions` row
struct StoredSession {
    id: String,
    name: String,
    block_id: String,
    block_category: String,
    cardio_type: Option<String>,
    started_at: String,
    ended_at: String,
    total_duration_secs: i64,
    effort: Option<i64>,
    distance_mi: Option<f64>,
}

impl StoredSession {
    fn into_workout(self) -> Option<ExtractedWorkout> {
        let cardio_type = match self.cardio_type {
            Some(raw) => Some(CardioType::parse(&raw)?),
            None => None,
        };
        Some(ExtractedWorkout {
            id: self.id,
            name: self.name,
            block: WorkoutBlock {
                id: self.block_id,
                category: BlockCategory::parse(&self.block_category)?,
            },
            start: parse_instant(&self.started_at)?,
            end: parse_instant(&self.ended_at)?,
            total_duration: u64::try_from(self.total_duration_secs).ok()?,
            effort: self.effort.and_then(|e| u8::try_from(e).ok()),
            cardio_type,
            distance: self.distance_mi,
        })
    }
}

fn load_dates(conn: &Connection, sql: &str) -> Result<HashSet<NaiveDate>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut dates = HashSet::new();
    for row in rows {
        let raw = row?;
        match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
            Ok(date) => {
                dates.insert(date);
            }
            Err(_) => log::warn!("Ignoring stored row with unreadable date {:?}", raw),
        }
    }
    Ok(dates)
}

impl SqliteStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Open the database at `db_path` and bring its schema up to date
    pub async fn open(db_path: &Path, migrations_dir: &Path) -> Result<Self> {
        let db = Db::new(db_path);
        let migrations_dir = migrations_dir.to_path_buf();
        db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
            .await?;
        Ok(Self::new(db))
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub async fn record_import_run(&self, run: &ImportRun) -> Result<()> {
        let run = run.clone();
        self.db.with_connection(move |conn| {
            conn.execute(
                r#"
                INSERT INTO import_runs (
                    run_id, file_name, file_size,
                    workouts_found, workouts_added,
                    body_metrics_found, body_metrics_added,
                    activity_days_found, activity_days_added,
                    skipped_records, imported_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    run.run_id,
                    run.file_name,
                    run.file_size as i64,
                    run.workouts_found as i64,
                    run.workouts_added.map(|n| n as i64),
                    run.body_metrics_found as i64,
                    run.body_metrics_added.map(|n| n as i64),
                    run.activity_days_found as i64,
                    run.activity_days_added.map(|n| n as i64),
                    run.skipped_records as i64,
                    format_instant(&run.imported_at),
                ],
            )?;
            Ok::<(), LiftlogError>(())
        }).await
    }

    /// Most recent imports first
    pub async fn recent_import_runs(&self, limit: usize) -> Result<Vec<ImportRun>> {
        self.db.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT run_id, file_name, file_size,
                       workouts_found, workouts_added,
                       body_metrics_found, body_metrics_added,
                       activity_days_found, activity_days_added,
                       skipped_records, imported_at
                FROM import_runs
                ORDER BY imported_at DESC
                LIMIT ?1
                "#,
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                let imported_at: String = row.get(10)?;
                Ok(ImportRun {
                    run_id: row.get(0)?,
                    file_name: row.get(1)?,
                    file_size: row.get::<_, i64>(2)? as u64,
                    workouts_found: row.get::<_, i64>(3)? as usize,
                    workouts_added: row.get::<_, Option<i64>>(4)?.map(|n| n as usize),
                    body_metrics_found: row.get::<_, i64>(5)? as usize,
                    body_metrics_added: row.get::<_, Option<i64>>(6)?.map(|n| n as usize),
                    activity_days_found: row.get::<_, i64>(7)? as usize,
                    activity_days_added: row.get::<_, Option<i64>>(8)?.map(|n| n as usize),
                    skipped_records: row.get::<_, i64>(9)? as usize,
                    imported_at: parse_instant(&imported_at).unwrap_or_default(),
                })
            })?;
            let runs = rows.collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
            Ok::<Vec<ImportRun>, LiftlogError>(runs)
        }).await
    }

    /// Latest stored sessions, newest first. Rows that no longer decode are skipped.
    pub async fn recent_workouts(&self, limit: usize) -> Result<Vec<ExtractedWorkout>> {
        self.db.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, name, block_id, block_category, cardio_type,
                       started_at, ended_at, total_duration_secs, effort, distance_mi
                FROM workout_sessions
                ORDER BY started_at DESC
                LIMIT ?1
                "#,
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok(StoredSession {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    block_id: row.get(2)?,
                    block_category: row.get(3)?,
                    cardio_type: row.get(4)?,
                    started_at: row.get(5)?,
                    ended_at: row.get(6)?,
                    total_duration_secs: row.get(7)?,
                    effort: row.get(8)?,
                    distance_mi: row.get(9)?,
                })
            })?;

            let mut workouts = Vec::new();
            for row in rows {
                let stored = row?;
                match stored.into_workout() {
                    Some(workout) => workouts.push(workout),
                    None => log::warn!("Ignoring stored session that no longer decodes"),
                }
            }
            Ok::<Vec<ExtractedWorkout>, LiftlogError>(workouts)
        }).await
    }

    pub async fn totals(&self) -> Result<StoreTotals> {
        self.db.with_connection(|conn| {
            let count = |table: &str| -> Result<usize> {
                let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
                Ok(n as usize)
            };
            Ok(StoreTotals {
                workouts: count("workout_sessions")?,
                body_metrics: count("body_metrics")?,
                activity_days: count("activity_days")?,
                import_runs: count("import_runs")?,
            })
        }).await
    }
}

#[async_trait]
impl HealthStore for SqliteStore {
    async fn existing_workout_starts(&self) -> Result<HashSet<DateTime<Utc>>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT started_at FROM workout_sessions")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut starts = HashSet::new();
            for row in rows {
                let raw = row?;
                match parse_instant(&raw) {
                    Some(start) => {
                        starts.insert(start);
                    }
                    None => log::warn!("Ignoring stored session with unreadable start {:?}", raw),
                }
            }
            Ok::<HashSet<DateTime<Utc>>, LiftlogError>(starts)
        }).await
    }

    async fn insert_workouts(&self, workouts: &[ExtractedWorkout]) -> Result<usize> {
        if workouts.is_empty() {
            return Ok(0);
        }

        let workouts = workouts.to_vec();
        self.db.with_connection(move |conn| {
            let tx = conn.transaction()?;
            let mut count = 0;
            {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT OR IGNORE INTO workout_sessions (
                        id, name, block_id, block_category, cardio_type,
                        started_at, ended_at, total_duration_secs,
                        effort, distance_mi, source
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    "#,
                )?;
                for w in &workouts {
                    count += stmt.execute(params![
                        w.id,
                        w.name,
                        w.block.id,
                        w.block.category.as_str(),
                        w.cardio_type.map(|c| c.as_str()),
                        format_instant(&w.start),
                        format_instant(&w.end),
                        w.total_duration as i64,
                        w.effort.map(i64::from),
                        w.distance,
                        APPLE_HEALTH_SOURCE,
                    ])?;
                }
            }
            tx.commit()?;
            Ok::<usize, LiftlogError>(count)
        }).await
    }

    async fn existing_body_metric_dates(&self) -> Result<HashSet<NaiveDate>> {
        self.db.with_connection(|conn| load_dates(conn, "SELECT date FROM body_metrics")).await
    }

    async fn insert_body_metrics(&self, metrics: &[BodyMetric]) -> Result<usize> {
        if metrics.is_empty() {
            return Ok(0);
        }

        let metrics = metrics.to_vec();
        self.db.with_connection(move |conn| {
            let tx = conn.transaction()?;
            let mut count = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO body_metrics (date, weight_lb, body_fat_pct, source) \
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for m in &metrics {
                    count += stmt.execute(params![m.date.to_string(), m.weight, m.body_fat, m.source])?;
                }
            }
            tx.commit()?;
            Ok::<usize, LiftlogError>(count)
        }).await
    }

    async fn existing_activity_dates(&self) -> Result<HashSet<NaiveDate>> {
        self.db.with_connection(|conn| load_dates(conn, "SELECT date FROM activity_days")).await
    }

    async fn insert_activity_days(&self, days: &[ActivityDay]) -> Result<usize> {
        if days.is_empty() {
            return Ok(0);
        }

        let days = days.to_vec();
        self.db.with_connection(move |conn| {
            let tx = conn.transaction()?;
            let mut count = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO activity_days (date, active_energy_kcal, exercise_minutes, stand_hours) \
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for d in &days {
                    count += stmt.execute(params![
                        d.date.to_string(),
                        d.active_energy,
                        d.exercise_minutes,
                        d.stand_hours,
                    ])?;
                }
            }
            tx.commit()?;
            Ok::<usize, LiftlogError>(count)
        }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::model::{BlockCategory, CardioType, WorkoutBlock};
    use chrono::TimeZone;
    use std::path::PathBuf;
    use tempfile::TempDir;

    async fn setup_test_store() -> (SqliteStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let migrations_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations");
        let store = SqliteStore::open(&temp_dir.path().join("test.db"), &migrations_dir)
            .await
            .unwrap();
        (store, temp_dir)
    }

    fn workout(hour: u32) -> ExtractedWorkout {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap();
        ExtractedWorkout {
            id: Uuid::new_v4().to_string(),
            name: "Running".to_string(),
            block: WorkoutBlock {
                id: Uuid::new_v4().to_string(),
                category: BlockCategory::Cardio,
            },
            start,
            end: start + chrono::Duration::minutes(30),
            total_duration: 1800,
            effort: Some(5),
            cardio_type: Some(CardioType::Run),
            distance: Some(3.11),
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[tokio::test]
    async fn test_workouts_round_trip_start_keys() {
        let (store, _temp_dir) = setup_test_store().await;
        let inserted = store.insert_workouts(&[workout(6), workout(18)]).await.unwrap();
        assert_eq!(inserted, 2);

        let starts = store.existing_workout_starts().await.unwrap();
        assert_eq!(starts.len(), 2);
        assert!(starts.contains(&workout(6).start));
    }

    #[tokio::test]
    async fn test_unique_start_enforced_by_schema() {
        let (store, _temp_dir) = setup_test_store().await;
        store.insert_workouts(&[workout(6)]).await.unwrap();
        let inserted = store.insert_workouts(&[workout(6)]).await.unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(store.totals().await.unwrap().workouts, 1);
    }

    #[tokio::test]
    async fn test_body_metrics_and_activity_days() {
        let (store, _temp_dir) = setup_test_store().await;
        let mut metric = BodyMetric::empty(date(15));
        metric.weight = Some(154.3);
        assert_eq!(store.insert_body_metrics(&[metric.clone()]).await.unwrap(), 1);
        assert_eq!(store.insert_body_metrics(&[metric]).await.unwrap(), 0);

        let day = ActivityDay {
            date: date(16),
            active_energy: 452,
            exercise_minutes: 32,
            stand_hours: 9,
        };
        assert_eq!(store.insert_activity_days(&[day]).await.unwrap(), 1);

        assert!(store.existing_body_metric_dates().await.unwrap().contains(&date(15)));
        assert!(store.existing_activity_dates().await.unwrap().contains(&date(16)));

        let totals = store.totals().await.unwrap();
        assert_eq!(totals.body_metrics, 1);
        assert_eq!(totals.activity_days, 1);
    }

    #[tokio::test]
    async fn test_import_runs_recorded() {
        let (store, _temp_dir) = setup_test_store().await;
        let result = HealthImportResult {
            workouts: vec![workout(6)],
            skipped_records: 2,
            ..Default::default()
        };
        let report = MergeReport {
            workouts: Ok(1),
            body_metrics: Ok(0),
            activity_days: Err(LiftlogError::StoreWrite {
                category: "activity_days",
                reason: "locked".to_string(),
            }),
        };
        let run = ImportRun::new("export.xml", 1234, &result, &report);
        store.record_import_run(&run).await.unwrap();

        let runs = store.recent_import_runs(5).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].file_name, "export.xml");
        assert_eq!(runs[0].workouts_added, Some(1));
        assert_eq!(runs[0].activity_days_added, None);
        assert_eq!(runs[0].skipped_records, 2);
        assert_eq!(store.totals().await.unwrap().import_runs, 1);
    }

    #[tokio::test]
    async fn test_fractional_start_matches_stored_key() {
        let (store, _temp_dir) = setup_test_store().await;
        let mut w = workout(6);
        w.start = w.start + chrono::Duration::milliseconds(250);
        store.insert_workouts(&[w.clone()]).await.unwrap();

        let starts = store.existing_workout_starts().await.unwrap();
        assert!(starts.contains(&w.start));
        assert!(!starts.contains(&workout(6).start));

        // The whole-second start is a different instant and is kept
        assert_eq!(store.insert_workouts(&[workout(6)]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recent_workouts_decode_stored_rows() {
        let (store, _temp_dir) = setup_test_store().await;
        let mut strength = workout(18);
        strength.block.category = BlockCategory::Strength;
        strength.cardio_type = None;
        strength.distance = None;
        store.insert_workouts(&[workout(6), strength.clone()]).await.unwrap();

        let recent = store.recent_workouts(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0], strength);
        assert_eq!(recent[1].cardio_type, Some(CardioType::Run));
        assert_eq!(recent[1].block.category, BlockCategory::Cardio);
        assert_eq!(recent[1].distance, Some(3.11));

        assert_eq!(store.recent_workouts(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reimporting_same_export_adds_nothing() {
        use crate::health::{merge_into_store, parse_export, ImportOptions, MemorySource};

        let doc = r#"<?xml version="1.0" encoding="UTF-8"?>
<HealthData locale="en_US">
 <Record type="HKQuantityTypeIdentifierBodyMass" unit="kg" value="70" startDate="2024-01-15 08:00:00 +0000"/>
 <Record type="HKQuantityTypeIdentifierBodyFatPercentage" unit="%" value="0.18" startDate="2024-01-16 08:00:00 +0000"/>
 <Workout workoutActivityType="HKWorkoutActivityTypeRunning" duration="30" durationUnit="min" startDate="2024-01-15 07:00:00 +0000" endDate="2024-01-15 07:30:00 +0000">
  <WorkoutStatistics type="HKQuantityTypeIdentifierActiveEnergyBurned" sum="240" unit="kcal"/>
  <WorkoutStatistics type="HKQuantityTypeIdentifierDistanceWalkingRunning" sum="5" unit="km"/>
 </Workout>
 <Workout workoutActivityType="HKWorkoutActivityTypeYoga" duration="20" durationUnit="min" startDate="2024-01-16 18:00:00 -0500" endDate="2024-01-16 18:20:00 -0500"/>
 <ActivitySummary dateComponents="2024-01-15" activeEnergyBurned="400" appleExerciseTime="30" appleStandHours="12"/>
 <ActivitySummary dateComponents="2024-01-16" activeEnergyBurned="350" appleExerciseTime="20" appleStandHours="10"/>
</HealthData>
"#;
        let (store, _temp_dir) = setup_test_store().await;
        let options = ImportOptions {
            chunk_size: 256,
            ..ImportOptions::default()
        };

        let first = parse_export(MemorySource::new("export.xml", doc), &options, |_| {})
            .await
            .unwrap();
        let report = merge_into_store(&store, &first).await;
        assert_eq!(report.workouts.as_ref().ok(), Some(&2));
        assert_eq!(report.body_metrics.as_ref().ok(), Some(&2));
        assert_eq!(report.activity_days.as_ref().ok(), Some(&2));

        // Fresh ids on every parse; identity is the start instant and the date
        let second = parse_export(MemorySource::new("export.xml", doc), &options, |_| {})
            .await
            .unwrap();
        assert_ne!(first.workouts[0].id, second.workouts[0].id);
        let report = merge_into_store(&store, &second).await;
        assert_eq!(report.workouts.as_ref().ok(), Some(&0));
        assert_eq!(report.body_metrics.as_ref().ok(), Some(&0));
        assert_eq!(report.activity_days.as_ref().ok(), Some(&0));

        let totals = store.totals().await.unwrap();
        assert_eq!(totals.workouts, 2);
        assert_eq!(totals.body_metrics, 2);
        assert_eq!(totals.activity_days, 2);
    }
}
