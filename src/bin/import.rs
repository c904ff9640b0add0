use clap::Parser;
use liftlog::Config;
use liftlog::health::{self, CancelFlag, ImportPhase, ImportProgress};
use liftlog::store::{ImportRun, MemoryStore, SqliteStore};
use liftlog::{merge_into_store, HealthImportResult, LiftlogError, MergeReport};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use anyhow::Result;

#[derive(Parser, Debug)]
#[command(name = "import")]
#[command(about = "Import an Apple Health export.xml into the Liftlog database")]
struct Args {
    /// Path to the export.xml file
    path: PathBuf,

    /// Parse and deduplicate without writing to the database
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,

    /// Override import.chunk_size_bytes from config.toml
    #[arg(long, value_name = "BYTES")]
    chunk_size: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", &config.liftlog.log_level)
    ).init();

    let mut options = config.import.to_options();
    if let Some(chunk_size) = args.chunk_size {
        if chunk_size == 0 {
            anyhow::bail!("--chunk-size must be greater than 0");
        }
        options.chunk_size = chunk_size;
    }

    // Ctrl-C stops the scan at the next chunk boundary
    let cancel: CancelFlag = Arc::new(AtomicBool::new(false));
    options.cancel = Some(cancel.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, cancelling import");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    log::info!("Importing {}", args.path.display());
    let start = Instant::now();
    let mut last_percent = None;

    let parsed = health::parse_export_file(&args.path, &options, |progress: &ImportProgress| {
        if last_percent != Some(progress.percent) || progress.phase == ImportPhase::Done {
            log::info!("[{:>3}%] {}", progress.percent, progress.detail);
            last_percent = Some(progress.percent);
        }
    })
    .await;

    let result = match parsed {
        Ok(result) => result,
        Err(e) => fail(&e),
    };

    if result.is_empty() {
        log::warn!("No workouts, body metrics or activity days found in {}", args.path.display());
    }

    let report = if args.dry_run {
        log::info!("Dry run: nothing is written to {}", config.db_path().display());
        merge_into_store(&MemoryStore::new(), &result).await
    } else {
        let store = match SqliteStore::open(config.db_path(), config.migrations_dir()).await {
            Ok(store) => store,
            Err(e) => fail(&e),
        };
        let report = merge_into_store(&store, &result).await;

        let file_name = args
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let file_size = std::fs::metadata(&args.path).map(|m| m.len()).unwrap_or(0);
        let run = ImportRun::new(&file_name, file_size, &result, &report);
        if let Err(e) = store.record_import_run(&run).await {
            log::warn!("Failed to record import history: {}", e);
        }
        report
    };

    log::info!("Import finished in {:.2}s", start.elapsed().as_secs_f64());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome_json(&result, &report, args.dry_run))?);
    } else {
        println!("{}", report.summary_message());
        if result.skipped_records > 0 {
            println!("Skipped {} malformed records", result.skipped_records);
        }
    }

    if !report.is_complete() {
        std::process::exit(2);
    }

    Ok(())
}

/// Single summary line naming the problem category, then a non-zero exit
fn fail(err: &LiftlogError) -> ! {
    log::debug!("Import error detail: {:?}", err);
    eprintln!("Import failed ({}): {}", err.category(), err);
    std::process::exit(1);
}

fn outcome_json(result: &HealthImportResult, report: &MergeReport, dry_run: bool) -> serde_json::Value {
    let added = |r: &liftlog::Result<usize>| match r {
        Ok(n) => serde_json::json!(n),
        Err(e) => serde_json::json!({ "error": e.to_string() }),
    };

    serde_json::json!({
        "dry_run": dry_run,
        "found": {
            "workouts": result.workouts.len(),
            "body_metrics": result.body_metrics.len(),
            "activity_days": result.activity_days.len(),
        },
        "added": {
            "workouts": added(&report.workouts),
            "body_metrics": added(&report.body_metrics),
            "activity_days": added(&report.activity_days),
        },
        "skipped_records": result.skipped_records,
        "complete": report.is_complete(),
        "message": report.summary_message(),
    })
}
