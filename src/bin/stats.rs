use clap::Parser;
use liftlog::{config::Config, error::LiftlogError, store::SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "stats")]
#[command(about = "Show stored health totals and recent imports")]
struct Args {
    /// Number of recent workouts and import runs to list
    #[arg(short, long, default_value_t = 10)]
    limit: usize,
}

fn added(count: Option<usize>) -> String {
    count.map(|n| n.to_string()).unwrap_or_else(|| "failed".to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load()?;
    let store = SqliteStore::open(config.db_path(), config.migrations_dir()).await?;

    println!("\n=== Liftlog Health Data Statistics ===\n");
    println!("Database: {}\n", store.db().path().display());

    let totals = store.totals().await?;
    println!("{:-<50}", "");
    println!("{:<30} {:>15}", "Category", "Stored");
    println!("{:-<50}", "");
    println!("{:<30} {:>15}", "Workout sessions", totals.workouts);
    println!("{:<30} {:>15}", "Body metric days", totals.body_metrics);
    println!("{:<30} {:>15}", "Activity days", totals.activity_days);
    println!("{:-<50}", "");

    // Date span of stored sessions
    let span = store.db().with_connection(|conn| {
        conn.query_row(
            "SELECT MIN(started_at), MAX(started_at) FROM workout_sessions",
            [],
            |row| Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<String>>(1)?,
            ))
        ).map_err(LiftlogError::from)
    }).await?;

    if let (Some(first), Some(last)) = span {
        println!("\nWorkouts span {} to {}", first, last);
    }

    let workouts = store.recent_workouts(args.limit).await?;
    if !workouts.is_empty() {
        println!("\nLatest Workouts:\n");
        println!("{:-<100}", "");
        println!(
            "{:<22} {:<24} {:<14} {:>10} {:>8} {:>10}",
            "Started (UTC)", "Name", "Block", "Minutes", "Effort", "Miles"
        );
        println!("{:-<100}", "");
        for w in &workouts {
            let block = match w.cardio_type {
                Some(cardio) => format!("{}/{}", w.block.category, cardio.as_str()),
                None => w.block.category.to_string(),
            };
            println!(
                "{:<22} {:<24} {:<14} {:>10} {:>8} {:>10}",
                w.start.format("%Y-%m-%d %H:%M:%S").to_string(),
                w.name,
                block,
                w.total_duration / 60,
                w.effort.map(|e| e.to_string()).unwrap_or_else(|| "-".to_string()),
                w.distance.map(|d| format!("{:.2}", d)).unwrap_or_else(|| "-".to_string()),
            );
        }
        println!("{:-<100}", "");
    }

    let runs = store.recent_import_runs(args.limit).await?;
    if runs.is_empty() {
        println!("\nNo imports recorded yet.");
        println!("\nRun `import <path/to/export.xml>` to load a Health export.");
        println!();
        return Ok(());
    }

    println!("\nRecent Imports ({} of {}):\n", runs.len(), totals.import_runs);
    println!("{:-<100}", "");
    println!(
        "{:<22} {:<20} {:>12} {:>12} {:>12} {:>10}",
        "Imported (UTC)", "File", "Workouts", "Body", "Activity", "Skipped"
    );
    println!("{:-<100}", "");

    for run in &runs {
        println!(
            "{:<22} {:<20} {:>12} {:>12} {:>12} {:>10}",
            run.imported_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            run.file_name,
            format!("{}/{}", added(run.workouts_added), run.workouts_found),
            format!("{}/{}", added(run.body_metrics_added), run.body_metrics_found),
            format!("{}/{}", added(run.activity_days_added), run.activity_days_found),
            run.skipped_records,
        );
    }
    println!("{:-<100}", "");
    println!("Counts are added/found per category.");
    println!();

    Ok(())
}
