//! # Seed Data Generator
//!
//! Populates the database with a demo merchant for development.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p meridian-db --bin seed
//!
//! # Specify database path and merchant id
//! cargo run -p meridian-db --bin seed -- --db ./data/meridian.db --merchant m-demo
//! ```
//!
//! ## Generated Data
//! - Two locations (Downtown, Airport)
//! - A coffee-shop catalog: one variation per (drink, size), plus bakery
//!   items only sold Downtown
//! - An item-scoped sales tax, an order-scoped city tax (Downtown only)
//! - A 10% staff discount and a $1.00 coupon
//! - Initial stock: a `reset_stock` adjustment per count

use chrono::Utc;
use std::env;
use uuid::Uuid;

use meridian_core::inventory::replay;
use meridian_core::ports::{CatalogBatch, CatalogRepository, InventoryRepository};
use meridian_core::{
    available_at, AdjustmentOp, CatalogStatus, Currency, Discount, DiscountKind,
    InventoryAdjustment, ItemVariation, Location, Money, Percentage, Tax, TaxScope,
};
use meridian_db::{Database, DbConfig};

const DRINKS: &[(&str, i64)] = &[
    ("Espresso", 300),
    ("Americano", 350),
    ("Latte", 450),
    ("Cappuccino", 450),
    ("Mocha", 500),
    ("Chai Latte", 475),
    ("Cold Brew", 425),
];

/// (size, price addon in cents)
const SIZES: &[(&str, i64)] = &[("Small", 0), ("Medium", 50), ("Large", 100)];

const BAKERY: &[(&str, i64)] = &[
    ("Croissant", 325),
    ("Blueberry Muffin", 350),
    ("Bagel", 275),
    ("Cinnamon Roll", 400),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./meridian_dev.db");
    let mut merchant_id = String::from("m-demo");
    let mut stock: i64 = 50;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--merchant" | "-m" => {
                if i + 1 < args.len() {
                    merchant_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--stock" | "-s" => {
                if i + 1 < args.len() {
                    stock = args[i + 1].parse().unwrap_or(50);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Meridian Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: ./meridian_dev.db)");
                println!("  -m, --merchant <ID>    Merchant id to seed (default: m-demo)");
                println!("  -s, --stock <N>        Initial stock per count (default: 50)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Meridian Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!("Merchant: {}", merchant_id);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if db.catalog().get_location(&merchant_id, "loc-downtown").await?.is_some() {
        println!("⚠ Merchant {} is already seeded", merchant_id);
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let batch = demo_catalog(&merchant_id);

    println!();
    println!("Writing catalog...");
    db.catalog().put_batch(&merchant_id, &batch).await?;
    println!(
        "  {} locations, {} variations, {} taxes, {} discounts",
        batch.locations.len(),
        batch.variations.len(),
        batch.taxes.len(),
        batch.discounts.len()
    );

    println!();
    println!("Stocking counts...");
    let inventory = db.inventory();
    let mut stocked = 0;
    for variation in &batch.variations {
        for location in &batch.locations {
            if !available_at(&variation.location_ids, &location.id) {
                continue;
            }
            let Some(mut count) = inventory
                .get_count(&merchant_id, &variation.id, &location.id)
                .await?
            else {
                eprintln!("Missing count for {} at {}", variation.id, location.id);
                continue;
            };

            let now = Utc::now();
            let adjustment = InventoryAdjustment {
                id: format!("seed-{}", Uuid::new_v4()),
                item_variation_id: variation.id.clone(),
                location_id: location.id.clone(),
                merchant_id: merchant_id.clone(),
                op: AdjustmentOp::ResetStock,
                quantity: stock,
                created_at: now,
            };
            count.apply(&adjustment, now);
            count.version += 1;

            if let Err(e) = inventory.commit(&[count], &[adjustment]).await {
                eprintln!("Failed to stock {} at {}: {}", variation.id, location.id, e);
                continue;
            }
            stocked += 1;
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Stocked {} counts in {:?}", stocked, elapsed);

    // Verify the ledger replays to the stored count
    println!();
    println!("Verifying ledger...");
    if let Some(first) = batch.variations.first() {
        let ledger = inventory
            .list_adjustments(&merchant_id, &first.id, "loc-downtown")
            .await?;
        println!("  {} @ loc-downtown: {} on hand", first.name, replay(&ledger));
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds the demo catalog for one merchant.
fn demo_catalog(merchant_id: &str) -> CatalogBatch {
    let usd = |amount| Money::new(amount, Currency::Usd);
    let location = |id: &str, name: &str| Location {
        id: id.to_string(),
        merchant_id: merchant_id.to_string(),
        name: name.to_string(),
        currency: Currency::Usd,
        status: CatalogStatus::Active,
    };

    let mut variations = Vec::new();
    for (drink, base) in DRINKS {
        let item_id = slug(drink);
        for (size, addon) in SIZES {
            variations.push(ItemVariation {
                id: format!("{}-{}", item_id, slug(size)),
                item_id: item_id.clone(),
                merchant_id: merchant_id.to_string(),
                name: format!("{}, {}", drink, size),
                price: usd(base + addon),
                location_ids: vec![],
                status: CatalogStatus::Active,
            });
        }
    }
    for (name, price) in BAKERY {
        variations.push(ItemVariation {
            id: slug(name),
            item_id: slug(name),
            merchant_id: merchant_id.to_string(),
            name: name.to_string(),
            price: usd(*price),
            location_ids: vec!["loc-downtown".to_string()],
            status: CatalogStatus::Active,
        });
    }

    CatalogBatch {
        locations: vec![
            location("loc-downtown", "Downtown"),
            location("loc-airport", "Airport"),
        ],
        variations,
        taxes: vec![
            Tax {
                id: "sales-tax".to_string(),
                merchant_id: merchant_id.to_string(),
                name: "Sales tax".to_string(),
                percentage: Percentage::from_bps(825),
                scope: TaxScope::Item,
                location_ids: vec![],
                status: CatalogStatus::Active,
            },
            Tax {
                id: "city-tax".to_string(),
                merchant_id: merchant_id.to_string(),
                name: "City tax".to_string(),
                percentage: Percentage::from_bps(50),
                scope: TaxScope::Order,
                location_ids: vec!["loc-downtown".to_string()],
                status: CatalogStatus::Active,
            },
        ],
        discounts: vec![
            Discount {
                id: "staff".to_string(),
                merchant_id: merchant_id.to_string(),
                name: "Staff discount".to_string(),
                kind: DiscountKind::Percentage {
                    percentage: Percentage::from_bps(1000),
                },
                location_ids: vec![],
                status: CatalogStatus::Active,
            },
            Discount {
                id: "coupon-100".to_string(),
                merchant_id: merchant_id.to_string(),
                name: "$1 off".to_string(),
                kind: DiscountKind::Fixed { amount: usd(100) },
                location_ids: vec![],
                status: CatalogStatus::Active,
            },
        ],
    }
}

fn slug(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}
