//! Weighted-average cost revaluation.
//!
//! Two mechanisms adjust a product's running cost while a transfer is
//! Completed: shipping allocation (always) and line-price revaluation
//! (behind a settings toggle). Both share one formula,
//! `new_cost = (total_qty * old_cost + delta) / total_qty`, so reverting an
//! effect is reapplying it with the delta negated.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use tracing::{debug, info};

use crate::entities::product::{self, Entity as Product};
use crate::entities::transfer::TransferStatus;
use crate::entities::transfer_item;
use crate::errors::ServiceError;
use crate::services::stock;

/// Costing behavior toggles, sourced from [`crate::config::AppConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CostingSettings {
    /// When true, each Completed transfer's line subtotals replace
    /// `old_cost * qty` as the acquisition cost of the moved quantity.
    pub line_revalue_enabled: bool,
}

impl CostingSettings {
    pub fn is_line_revaluation_enabled(&self) -> bool {
        self.line_revalue_enabled
    }
}

/// How a transfer's status changed across an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
    /// Pending before and after: no stock or cost effect either way.
    StayPending,
    /// Pending -> Completed: effects newly activated, applied in full.
    Activated,
    /// Completed -> Pending: effects fully reverted.
    Deactivated,
    /// Completed before and after: only the old/new difference applies.
    StayCompleted,
}

impl StatusTransition {
    pub fn between(old: TransferStatus, new: TransferStatus) -> Self {
        match (old, new) {
            (TransferStatus::Pending, TransferStatus::Pending) => Self::StayPending,
            (TransferStatus::Pending, TransferStatus::Completed) => Self::Activated,
            (TransferStatus::Completed, TransferStatus::Pending) => Self::Deactivated,
            (TransferStatus::Completed, TransferStatus::Completed) => Self::StayCompleted,
        }
    }

    /// Scales a shipping amount change by the transition category.
    pub fn shipping_delta(&self, old_shipping: Decimal, new_shipping: Decimal) -> Decimal {
        match self {
            Self::StayCompleted => new_shipping - old_shipping,
            Self::Activated => new_shipping,
            Self::Deactivated => -old_shipping,
            Self::StayPending => Decimal::ZERO,
        }
    }
}

/// Per-product aggregate of a transfer's line effects: moved quantity and
/// the line subtotal standing in for its acquisition cost.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineEffect {
    pub quantity: Decimal,
    pub amount: Decimal,
}

/// A cost write performed by one of the appliers, reported back so the
/// service can emit events after commit.
#[derive(Debug, Clone, Copy)]
pub struct CostChange {
    pub product_id: i64,
    pub old_cost: i64,
    pub new_cost: i64,
}

/// Sums quantity and subtotal per product over a transfer's items.
pub fn aggregate_line_effects<'a, I>(items: I) -> HashMap<i64, LineEffect>
where
    I: IntoIterator<Item = &'a transfer_item::Model>,
{
    let mut effects: HashMap<i64, LineEffect> = HashMap::new();
    for item in items {
        let entry = effects.entry(item.product_id).or_default();
        entry.quantity += item.quantity;
        entry.amount += item.sub_total;
    }
    effects
}

/// Computes per-product effect deltas between the old and new aggregates,
/// scaled by the status transition, over the union of products touched
/// before and after. Pure; unit-testable without persistence.
pub fn reconcile(
    old: &HashMap<i64, LineEffect>,
    new: &HashMap<i64, LineEffect>,
    transition: StatusTransition,
) -> HashMap<i64, LineEffect> {
    let mut deltas: HashMap<i64, LineEffect> = HashMap::new();

    match transition {
        StatusTransition::StayPending => {}
        StatusTransition::Activated => {
            for (pid, effect) in new {
                deltas.insert(*pid, *effect);
            }
        }
        StatusTransition::Deactivated => {
            for (pid, effect) in old {
                deltas.insert(
                    *pid,
                    LineEffect {
                        quantity: -effect.quantity,
                        amount: -effect.amount,
                    },
                );
            }
        }
        StatusTransition::StayCompleted => {
            for pid in old.keys().chain(new.keys()) {
                if deltas.contains_key(pid) {
                    continue;
                }
                let before = old.get(pid).copied().unwrap_or_default();
                let after = new.get(pid).copied().unwrap_or_default();
                deltas.insert(
                    *pid,
                    LineEffect {
                        quantity: after.quantity - before.quantity,
                        amount: after.amount - before.amount,
                    },
                );
            }
        }
    }

    deltas
}

/// Rounds a cost to the storage precision (whole currency units,
/// half away from zero, matching the persisted integer column).
pub fn round_cost(value: Decimal) -> i64 {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

/// Distributes a shipping cost change across the moved quantity,
/// proportionally per product, into each product's running cost.
///
/// `shipping_delta` may be negative (revert). `floor_at_zero` clamps the
/// unrounded result at zero and is only set on the delete path. Products
/// with no system-wide stock are skipped; the denominator is the
/// post-movement total quantity, so stock must already be up to date.
pub async fn apply_shipping_allocation<C: ConnectionTrait>(
    db: &C,
    per_product_qty: &HashMap<i64, Decimal>,
    total_qty_moved: Decimal,
    shipping_delta: Decimal,
    floor_at_zero: bool,
) -> Result<Vec<CostChange>, ServiceError> {
    let mut changes = Vec::new();

    if total_qty_moved <= Decimal::ZERO || shipping_delta == Decimal::ZERO {
        return Ok(changes);
    }

    for (&product_id, &qty_moved) in per_product_qty {
        let Some(prod) = Product::find_by_id(product_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
        else {
            continue;
        };

        let total_qty = stock::total_quantity(db, product_id).await?;
        if total_qty <= Decimal::ZERO {
            debug!(product_id, "Skipping shipping allocation: no stock on hand");
            continue;
        }

        let old_cost = Decimal::from(prod.cost);
        let allocated = shipping_delta * (qty_moved / total_qty_moved);
        let mut new_cost = (total_qty * old_cost + allocated) / total_qty;
        if floor_at_zero && new_cost < Decimal::ZERO {
            new_cost = Decimal::ZERO;
        }

        changes.push(write_cost(db, prod, new_cost).await?);
    }

    Ok(changes)
}

/// Applies reconciled line-price effect deltas to each product's running
/// cost: `delta = d_amount - old_cost * d_qty` against the system-wide
/// quantity. Zero deltas are skipped, which makes an unchanged update a
/// no-op.
pub async fn apply_line_revaluation<C: ConnectionTrait>(
    db: &C,
    deltas: &HashMap<i64, LineEffect>,
) -> Result<Vec<CostChange>, ServiceError> {
    let mut changes = Vec::new();

    for (&product_id, delta) in deltas {
        let Some(prod) = Product::find_by_id(product_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
        else {
            continue;
        };

        let total_qty = stock::total_quantity(db, product_id).await?;
        if total_qty <= Decimal::ZERO {
            debug!(product_id, "Skipping line revaluation: no stock on hand");
            continue;
        }

        let old_cost = Decimal::from(prod.cost);
        let delta_effect = delta.amount - old_cost * delta.quantity;
        if delta_effect == Decimal::ZERO {
            continue;
        }

        let new_cost = (total_qty * old_cost + delta_effect) / total_qty;
        changes.push(write_cost(db, prod, new_cost).await?);
    }

    Ok(changes)
}

async fn write_cost<C: ConnectionTrait>(
    db: &C,
    prod: product::Model,
    unrounded: Decimal,
) -> Result<CostChange, ServiceError> {
    let old_cost = prod.cost;
    let new_cost = round_cost(unrounded);

    let mut active: product::ActiveModel = prod.into();
    active.cost = Set(new_cost);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(db).await.map_err(ServiceError::db_error)?;

    info!(
        product_id = updated.id,
        old_cost, new_cost, "Revalued product running cost"
    );

    Ok(CostChange {
        product_id: updated.id,
        old_cost,
        new_cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use TransferStatus::{Completed, Pending};

    fn effect(quantity: Decimal, amount: Decimal) -> LineEffect {
        LineEffect { quantity, amount }
    }

    #[rstest]
    #[case(Pending, Pending, StatusTransition::StayPending)]
    #[case(Pending, Completed, StatusTransition::Activated)]
    #[case(Completed, Pending, StatusTransition::Deactivated)]
    #[case(Completed, Completed, StatusTransition::StayCompleted)]
    fn transition_categories(
        #[case] old: TransferStatus,
        #[case] new: TransferStatus,
        #[case] expected: StatusTransition,
    ) {
        assert_eq!(StatusTransition::between(old, new), expected);
    }

    #[test]
    fn shipping_delta_scales_with_transition() {
        let old = dec!(50);
        let new = dec!(80);
        assert_eq!(
            StatusTransition::StayCompleted.shipping_delta(old, new),
            dec!(30)
        );
        assert_eq!(StatusTransition::Activated.shipping_delta(old, new), dec!(80));
        assert_eq!(
            StatusTransition::Deactivated.shipping_delta(old, new),
            dec!(-50)
        );
        assert_eq!(
            StatusTransition::StayPending.shipping_delta(old, new),
            Decimal::ZERO
        );
    }

    #[test]
    fn reconcile_diffs_over_union_of_products() {
        let mut old = HashMap::new();
        old.insert(1, effect(dec!(10), dec!(100)));
        old.insert(2, effect(dec!(5), dec!(60)));

        let mut new = HashMap::new();
        new.insert(1, effect(dec!(12), dec!(130)));
        new.insert(3, effect(dec!(7), dec!(70)));

        let deltas = reconcile(&old, &new, StatusTransition::StayCompleted);
        assert_eq!(deltas.len(), 3);
        assert_eq!(deltas[&1], effect(dec!(2), dec!(30)));
        assert_eq!(deltas[&2], effect(dec!(-5), dec!(-60)));
        assert_eq!(deltas[&3], effect(dec!(7), dec!(70)));
    }

    #[test]
    fn reconcile_identical_aggregates_is_zero() {
        let mut old = HashMap::new();
        old.insert(1, effect(dec!(10), dec!(100)));
        let new = old.clone();

        let deltas = reconcile(&old, &new, StatusTransition::StayCompleted);
        assert_eq!(deltas[&1], effect(Decimal::ZERO, Decimal::ZERO));
    }

    #[test]
    fn reconcile_activation_applies_new_in_full() {
        let old = HashMap::new();
        let mut new = HashMap::new();
        new.insert(1, effect(dec!(10), dec!(100)));

        let deltas = reconcile(&old, &new, StatusTransition::Activated);
        assert_eq!(deltas[&1], effect(dec!(10), dec!(100)));
    }

    #[test]
    fn reconcile_deactivation_negates_old() {
        let mut old = HashMap::new();
        old.insert(1, effect(dec!(10), dec!(100)));
        let new = HashMap::new();

        let deltas = reconcile(&old, &new, StatusTransition::Deactivated);
        assert_eq!(deltas[&1], effect(dec!(-10), dec!(-100)));
    }

    #[test]
    fn reconcile_stay_pending_is_empty() {
        let mut old = HashMap::new();
        old.insert(1, effect(dec!(10), dec!(100)));
        let mut new = HashMap::new();
        new.insert(1, effect(dec!(99), dec!(999)));

        assert!(reconcile(&old, &new, StatusTransition::StayPending).is_empty());
    }

    #[test]
    fn aggregate_merges_duplicate_products() {
        use crate::entities::transfer_item::{DiscountType, Model, TaxType};
        let now = chrono::Utc::now().into();
        let item = |product_id: i64, quantity: Decimal, sub_total: Decimal| Model {
            id: 0,
            transfer_id: 1,
            product_id,
            quantity,
            unit_price: dec!(10),
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            tax_type: TaxType::Exclusive,
            tax_value: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            net_unit_price: dec!(10),
            sub_total,
            created_at: now,
            updated_at: now,
        };

        let items = vec![
            item(1, dec!(3), dec!(30)),
            item(1, dec!(2), dec!(20)),
            item(2, dec!(4), dec!(40)),
        ];
        let effects = aggregate_line_effects(&items);
        assert_eq!(effects[&1], effect(dec!(5), dec!(50)));
        assert_eq!(effects[&2], effect(dec!(4), dec!(40)));
    }

    #[test]
    fn cost_rounds_half_away_from_zero() {
        assert_eq!(round_cost(dec!(10.5)), 11);
        assert_eq!(round_cost(dec!(10.4)), 10);
        assert_eq!(round_cost(dec!(-10.5)), -11);
        assert_eq!(round_cost(dec!(0)), 0);
    }
}
