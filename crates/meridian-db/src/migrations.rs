//! # Database Migrations
//!
//! Embedded SQL migrations for the ordering schema.
//!
//! ## 001_initial_schema.sql
//! ```text
//!   catalog    locations, item_variations, taxes, discounts
//!   orders     orders (items/taxes/discounts as JSON text, version column)
//!   payments   payments
//!   stock      inventory_counts ◄── inventory_adjustments (append-only)
//!   cash       cash_drawers     ◄── cash_drawer_adjustments (append-only)
//! ```
//! Every table is keyed by `(merchant_id, id)`; no query reads across
//! merchants.
//!
//! Applied migrations are checksummed by sqlx. Changes go into a new
//! `NNN_description.sql` file, never into an applied one.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Embedded at compile time from `migrations/sqlite` at the workspace root.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns `(embedded, applied)` migration counts for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;

    Ok((total, applied as usize))
}
