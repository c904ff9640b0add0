use liftlog::Config;
use liftlog::db::{Db, migrate};
use liftlog::error::LiftlogError;
use anyhow::Result;

const EXPECTED_TABLES: &[&str] = &[
    "activity_days",
    "body_metrics",
    "import_runs",
    "schema_migrations",
    "workout_sessions",
];

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    log::info!("Starting Liftlog v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    log::info!("Configuration loaded successfully");
    log::info!("Database path: {}", config.db_path().display());
    log::info!(
        "Import chunk size: {} bytes (carry-over limit {} chunks)",
        config.import.chunk_size_bytes,
        config.import.max_carry_over_chunks
    );

    let db = Db::new(config.db_path());

    let migrations_dir = config.migrations_dir().to_path_buf();
    db.with_connection(move |conn| {
        migrate::run_migrations(conn, &migrations_dir)
    }).await?;

    log::info!("Database initialized successfully");

    verify_database_schema(&db).await?;

    log::info!("Ready to import: run `import <path/to/export.xml>`");

    Ok(())
}

/// Verify that all expected database objects exist
async fn verify_database_schema(db: &Db) -> Result<()> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt.query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let mut all_tables_exist = true;
        for table in EXPECTED_TABLES {
            if !tables.iter().any(|t| t == table) {
                log::error!("Missing table: {}", table);
                all_tables_exist = false;
            } else {
                log::debug!("✓ Table exists: {}", table);
            }
        }

        if !all_tables_exist {
            return Err(LiftlogError::Config("Not all required tables exist".to_string()));
        }

        // Workout dedupe relies on this one
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type='index' AND name='idx_workout_sessions_started_at'",
        )?;
        if !stmt.exists([])? {
            return Err(LiftlogError::Config(
                "Unique index on workout_sessions.started_at does not exist".to_string(),
            ));
        }
        log::debug!("✓ Workout start index exists");

        let applied = migrate::get_applied_migrations(conn)?;
        if applied.len() < 2 {
            return Err(LiftlogError::Config(format!("Expected at least 2 migrations, found {}", applied.len())));
        }
        log::debug!("✓ {} migrations applied", applied.len());

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            return Err(LiftlogError::Config(format!("Journal mode is not WAL: {}", journal_mode)));
        }
        log::debug!("✓ Journal mode: WAL");

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(LiftlogError::Config(format!("Database integrity check failed: {}", integrity)));
        }
        log::info!("✓ Database integrity: OK");

        Ok(())
    }).await?;

    log::info!("✓ Database schema verification complete");
    Ok(())
}
