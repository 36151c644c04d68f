use anyhow::{bail, Result};
use rusqlite::Connection;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Use library instead of local modules
use hospital_revenue::{
    config, insert_records, load_csv, setup_database, verify_count, Config, Deadline,
    QueryFilter, RevenueEngine, SqliteStore,
};

/// Months shown by the verification report
const VERIFY_RECENT_MONTHS: usize = 6;

fn main() -> Result<()> {
    config::init_logging();

    let args: Vec<String> = env::args().collect();
    let config = Config::from_env();

    match args.get(1).map(String::as_str) {
        Some("import") => {
            let Some(csv_path) = args.get(2) else {
                print_usage();
                bail!("import needs a CSV path");
            };
            let db_path = args.get(3).map(PathBuf::from).unwrap_or(config.db_path.clone());
            run_import(Path::new(csv_path), &db_path)
        }
        Some("verify") => {
            let db_path = args.get(2).map(PathBuf::from).unwrap_or(config.db_path.clone());
            run_verify(&config, &db_path, args.get(3), args.get(4))
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("hospital-revenue {}", hospital_revenue::VERSION);
    println!();
    println!("USAGE:");
    println!("  hospital-revenue import <csv> [db]               Load a revenue CSV into SQLite");
    println!("  hospital-revenue verify [db] [region] [category] Print a data verification report");
    println!();
    println!("The database path defaults to ${} or {}", config::ENV_DB_PATH, config::DEFAULT_DB_PATH);
}

fn run_import(csv_path: &Path, db_path: &Path) -> Result<()> {
    println!("🗄️  Revenue Import - CSV → SQLite + WAL");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load CSV
    println!("\n📂 Loading CSV...");
    let (records, rejected) = load_csv(csv_path)?;
    println!("✓ Loaded {} records ({} rejected)", records.len(), rejected);

    // 2. Setup database
    println!("\n🔧 Setting up database...");
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut conn = Connection::open(db_path)?;
    setup_database(&conn)?;
    println!("✓ Database initialized at {}", db_path.display());

    // 3. Insert records
    println!("\n💾 Inserting records...");
    let inserted = insert_records(&mut conn, &records)?;
    println!("✓ Inserted: {} records", inserted);
    println!("✓ Skipped duplicates: {}", records.len() - inserted);

    // 4. Verify count
    println!("\n🔍 Verifying database...");
    let count = verify_count(&conn)?;
    println!("✓ Database contains {} records", count);

    Ok(())
}

fn run_verify(
    config: &Config,
    db_path: &Path,
    region: Option<&String>,
    category: Option<&String>,
) -> Result<()> {
    let store = Arc::new(SqliteStore::open(db_path));
    let engine = RevenueEngine::new(store, config.query);
    let deadline = Deadline::none();

    let health = engine.health(&deadline);
    if !health.is_healthy() {
        bail!("database {} is {} ({})", db_path.display(), health.database, health.status);
    }

    let mut filter = QueryFilter::new();
    if let Some(region) = region {
        filter = filter.region(region);
    }
    if let Some(category) = category {
        filter = filter.category(category);
    }

    println!("📊 Revenue Data Verification");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Database:      {}", db_path.display());
    println!("Total records: {}", health.total_records);
    println!(
        "Filter:        region={} category={}",
        filter.region.as_deref().unwrap_or("*"),
        filter.category.as_deref().unwrap_or("*")
    );

    let stats = engine.stats(&filter, &deadline)?;
    println!("\nOverall:");
    println!("{}", serde_json::to_string_pretty(&stats)?);

    let monthly = engine.monthly_stats(&filter, &deadline)?;
    let points = monthly.data();
    let recent = &points[points.len().saturating_sub(VERIFY_RECENT_MONTHS)..];

    println!("\nLast {} months:", recent.len());
    for point in recent {
        println!(
            "  {}  records={:>5}  avg revenue={:>14.2}  transactions={:>8}",
            point.period.dashed(),
            point.stats.get("count").unwrap_or(0.0),
            point.stats.get("avgRevenue").unwrap_or(0.0),
            point.stats.get("totalTransactions").unwrap_or(0.0),
        );
    }

    Ok(())
}
