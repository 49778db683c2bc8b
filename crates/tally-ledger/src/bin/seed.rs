//! # Demo Ledger Seeder
//!
//! Populates a ledger database with a small back-office catalog and posts
//! an opening receipt per warehouse, so the workflows have stock to move.
//!
//! ## Usage
//! ```bash
//! # Database from the config file / TALLY_DB_PATH
//! cargo run -p tally-ledger --bin seed
//!
//! # Explicit database and config
//! cargo run -p tally-ledger --bin seed -- --db ./data/tally.db --config ./ledger.toml
//! ```
//!
//! ## Seeded Data
//! - Warehouses `MAIN` (store room) and `BAR`
//! - Categories: Beverages, Dry goods, and Cocktails (a preparation
//!   category, so its products are never stock-tracked)
//! - One confirmed receipt per warehouse dated today

use chrono::Utc;
use std::env;
use std::path::PathBuf;

use tally_core::pricing::LineInput;
use tally_core::{Money, NewReceipt, Quantity};
use tally_ledger::telemetry::init_tracing;
use tally_ledger::{Ledger, LedgerConfig};

/// (category, is_preparation, [(sku, name, unit, price_cents, opening_whole)])
const CATALOG: &[(&str, bool, &[(&str, &str, &str, i64, i64)])] = &[
    (
        "Beverages",
        false,
        &[
            ("BEV-001", "Cola 330ml", "can", 250, 48),
            ("BEV-002", "Mineral Water 600ml", "btl", 150, 60),
            ("BEV-003", "Lager 330ml", "btl", 450, 36),
            ("BEV-004", "Orange Juice 1L", "carton", 380, 12),
        ],
    ),
    (
        "Dry goods",
        false,
        &[
            ("DRY-001", "Arabica Beans", "kg", 2400, 5),
            ("DRY-002", "Cane Sugar", "kg", 180, 10),
            ("DRY-003", "Jasmine Rice", "kg", 220, 25),
        ],
    ),
    (
        "Cocktails",
        true,
        &[
            ("CKT-001", "Mojito", "glass", 900, 0),
            ("CKT-002", "Negroni", "glass", 1100, 0),
        ],
    ),
];

const WAREHOUSES: &[(&str, &str)] = &[("MAIN", "Main store room"), ("BAR", "Bar")];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Ledger Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (overrides config)");
                println!("  -c, --config <PATH>   Ledger config file (default: platform config dir)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = LedgerConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    init_tracing(&config.logging);

    // The platform data dir may not exist yet
    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    println!("Tally Ledger Seeder");
    println!("===================");
    println!("Database: {}", config.database.path.display());
    println!();

    let ledger = Ledger::open(&config).await?;
    let catalog = ledger.database().catalog();

    println!("✓ Connected, migrations applied");

    let existing = catalog.list_warehouses().await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} warehouses", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let mut warehouses = Vec::new();
    for (code, name) in WAREHOUSES {
        let wh = catalog.create_warehouse(code, name).await?;
        println!("  Warehouse {} ({})", wh.code, wh.id);
        warehouses.push(wh);
    }

    let mut opening: Vec<LineInput> = Vec::new();
    let mut products = 0usize;
    for (category_name, is_preparation, items) in CATALOG {
        let category = catalog.create_category(category_name, *is_preparation).await?;

        for (sku, name, unit, price_cents, opening_whole) in items.iter() {
            let price = Money::from_cents(*price_cents);
            let product = catalog.create_product(sku, name, unit, Some(category.id.as_str()), price).await?;
            products += 1;

            if *opening_whole > 0 {
                opening.push(LineInput::new(product.id, Quantity::from_whole(*opening_whole), price));
            }
        }
    }
    println!("✓ Created {} products in {} categories", products, CATALOG.len());

    let today = Utc::now().date_naive();
    for wh in &warehouses {
        let receipt = ledger
            .create_receipt(&NewReceipt {
                doc_date: today,
                warehouse_id: wh.id.clone(),
                supplier_id: Some("opening-balance".to_string()),
                notes: Some("Opening stock".to_string()),
                lines: opening.clone(),
                created_by: "seed".to_string(),
            })
            .await?;
        let confirmed = ledger.confirm_receipt(&receipt.header.id, "seed").await?;
        println!(
            "✓ {} confirmed at {}: {} lines, total {}",
            confirmed.header.number,
            wh.code,
            confirmed.lines.len(),
            confirmed.header.grand_total()
        );
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
