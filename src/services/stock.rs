//! Stock ledger primitives.
//!
//! Every quantity mutation in the engine funnels through [`apply_movement`];
//! nothing else writes `stock_levels.quantity`. The functions are generic
//! over [`ConnectionTrait`] so they compose inside a caller-owned
//! transaction.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use tracing::debug;

use crate::entities::stock_level::{self, Entity as StockLevel};
use crate::errors::ServiceError;

/// Applies a signed quantity delta to the (warehouse, product) stock level
/// and returns the resulting quantity.
///
/// A missing row is created lazily with `max(delta, 0)`. A present row is set
/// to `max(current + delta, 0)`: quantity is floor-clamped at zero rather
/// than erroring, which mirrors the ledger's write-side policy (stock can
/// never go negative, silently).
pub async fn apply_movement<C: ConnectionTrait>(
    db: &C,
    warehouse_id: i64,
    product_id: i64,
    delta: Decimal,
) -> Result<Decimal, ServiceError> {
    let existing = StockLevel::find()
        .filter(stock_level::Column::WarehouseId.eq(warehouse_id))
        .filter(stock_level::Column::ProductId.eq(product_id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)?;

    match existing {
        Some(level) => {
            let mut next = level.quantity + delta;
            if next < Decimal::ZERO {
                next = Decimal::ZERO;
            }

            let mut active: stock_level::ActiveModel = level.into();
            active.quantity = Set(next);
            active.updated_at = Set(Utc::now().into());
            active.update(db).await.map_err(ServiceError::db_error)?;

            debug!(
                warehouse_id,
                product_id,
                %delta,
                new_quantity = %next,
                "Applied stock movement"
            );

            Ok(next)
        }
        None => {
            let initial = if delta < Decimal::ZERO {
                Decimal::ZERO
            } else {
                delta
            };

            let now = Utc::now();
            let active = stock_level::ActiveModel {
                warehouse_id: Set(warehouse_id),
                product_id: Set(product_id),
                quantity: Set(initial),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
                ..Default::default()
            };
            active.insert(db).await.map_err(ServiceError::db_error)?;

            debug!(
                warehouse_id,
                product_id,
                %delta,
                new_quantity = %initial,
                "Created stock level on first movement"
            );

            Ok(initial)
        }
    }
}

/// Returns the quantity at a single warehouse, or `None` when the product has
/// never been stocked there.
pub async fn quantity_at<C: ConnectionTrait>(
    db: &C,
    warehouse_id: i64,
    product_id: i64,
) -> Result<Option<Decimal>, ServiceError> {
    let level = StockLevel::find()
        .filter(stock_level::Column::WarehouseId.eq(warehouse_id))
        .filter(stock_level::Column::ProductId.eq(product_id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(level.map(|l| l.quantity))
}

/// Sums the product's quantity across all warehouses.
///
/// This is the denominator of every weighted-average cost update, so callers
/// must have applied (or, when reverting, not yet reverted) the relevant
/// stock movements before calling it.
pub async fn total_quantity<C: ConnectionTrait>(
    db: &C,
    product_id: i64,
) -> Result<Decimal, ServiceError> {
    let levels = StockLevel::find()
        .filter(stock_level::Column::ProductId.eq(product_id))
        .all(db)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(levels.iter().fold(Decimal::ZERO, |acc, l| acc + l.quantity))
}
