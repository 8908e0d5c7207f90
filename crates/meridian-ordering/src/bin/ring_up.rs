//! # Ring Up
//!
//! Rings up a sale against a seeded database: creates the order, takes a
//! single payment for the full total and completes it.
//!
//! ## Usage
//! ```bash
//! # Seed first, then sell one of a variation id printed by the seeder
//! cargo run -p meridian-db --bin seed -- --db ./meridian_dev.db
//! MERIDIAN_DB_PATH=./meridian_dev.db \
//!     cargo run -p meridian-ordering --bin ring-up -- --variation <ID> --cash
//! ```
//!
//! Policies and the database come from `OrderingConfig` (TOML file and
//! `MERIDIAN_*` environment); log output follows `RUST_LOG`.

use std::env;
use std::path::PathBuf;

use meridian_core::{Money, OrderSchema, PaymentType, SchemaLineItem};
use meridian_db::Database;
use meridian_ordering::{telemetry, NewPayment, OrderingConfig, OrderingService, Stores};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();

    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut merchant_id = String::from("m-demo");
    let mut location_id = String::from("loc-downtown");
    let mut variations: Vec<String> = Vec::new();
    let mut payment_type = PaymentType::Card;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--merchant" | "-m" => {
                if i + 1 < args.len() {
                    merchant_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--location" | "-l" => {
                if i + 1 < args.len() {
                    location_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--variation" | "-v" => {
                if i + 1 < args.len() {
                    variations.push(args[i + 1].clone());
                    i += 1;
                }
            }
            "--cash" => payment_type = PaymentType::Cash,
            "--help" | "-h" => {
                println!("Meridian Ring Up");
                println!();
                println!("Usage: ring-up [OPTIONS] --variation <ID>...");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>     Ordering config file");
                println!("  -m, --merchant <ID>     Merchant id (default: m-demo)");
                println!("  -l, --location <ID>     Location id (default: loc-downtown)");
                println!("  -v, --variation <ID>    Variation to sell, repeat for more lines");
                println!("      --cash              Pay in cash (default: card)");
                println!("  -h, --help              Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    if variations.is_empty() {
        eprintln!("At least one --variation is required");
        std::process::exit(2);
    }

    let config = OrderingConfig::load(config_path)?;
    let db = Database::new(config.db_config()?).await?;
    let service = OrderingService::new(Stores::sqlite(&db), &config.ordering);

    let location = service
        .catalog()
        .location("ring_up", &merchant_id, &location_id)
        .await?
        .ok_or_else(|| format!("Unknown location {} for merchant {}", location_id, merchant_id))?;

    let schema = OrderSchema {
        location_id: location.id.clone(),
        merchant_id: merchant_id.clone(),
        customer_id: None,
        employee_id: None,
        currency: location.currency,
        line_items: variations
            .iter()
            .enumerate()
            .map(|(n, variation_id)| SchemaLineItem {
                uid: format!("line-{}", n + 1),
                variation_id: variation_id.clone(),
                quantity: 1,
            })
            .collect(),
        taxes: vec![],
        discounts: vec![],
    };

    let order = service.create_order(&merchant_id, &schema).await?;
    println!("Order {}", order.id);
    for item in &order.items {
        println!("  {:<28} {}", item.name, item.total_amount);
    }
    println!("  {:<28} {}", "Total", order.total_amount);

    let payment = service
        .create_payment(
            &merchant_id,
            NewPayment {
                order_id: order.id.clone(),
                payment_type,
                amount: order.total_amount,
                tip_amount: Money::zero(order.currency),
            },
        )
        .await?;
    let paid = service
        .pay_order(&merchant_id, &order.id, &[payment.id])
        .await?;
    println!("Order is {}", paid.state);

    if payment_type == PaymentType::Cash {
        let drawer = service.cash_drawer(&merchant_id, &location.id).await?;
        println!("Cash drawer {}: {}", drawer.id, drawer.amount);
    }

    db.close().await;
    Ok(())
}
