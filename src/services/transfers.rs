//! Transfer lifecycle: create, update, delete.
//!
//! Each operation runs inside one database transaction; any failure rolls
//! the whole operation back, so callers never observe partial stock or cost
//! mutation. Editing or deleting a transfer first undoes its previous
//! effects (by applying negated deltas) before the new state takes effect.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use validator::Validate;

use crate::db::DbPool;
use crate::entities::transfer::{self, Entity as Transfer, TransferStatus};
use crate::entities::transfer_item::{self, Entity as TransferItem};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::costing::{self, CostChange, CostingSettings, StatusTransition};
use crate::services::line_items::{calculate_line, TransferItemInput};
use crate::services::stock;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Raw input for creating or updating a transfer.
///
/// On update, lines carrying a `transfer_item_id` modify the existing item;
/// lines without one are appended; existing items absent from the input are
/// removed. Warehouses are fixed at creation and cannot change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransferInput {
    pub from_warehouse_id: i64,
    pub to_warehouse_id: i64,
    /// Defaults to today when omitted.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub status: TransferStatus,
    pub discount: Decimal,
    pub tax_rate: Decimal,
    pub shipping: Decimal,
    #[serde(default)]
    pub note: Option<String>,
    #[validate(length(min = 1, message = "A transfer requires at least one item"))]
    pub items: Vec<TransferItemInput>,
}

/// A transfer header together with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct TransferAggregate {
    pub transfer: transfer::Model,
    pub items: Vec<transfer_item::Model>,
}

#[derive(Debug, Serialize)]
pub struct TransferListPage {
    pub transfers: Vec<transfer::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service owning the transfer lifecycle and its stock/cost side effects.
#[derive(Clone)]
pub struct TransferService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    settings: CostingSettings,
}

impl TransferService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        settings: CostingSettings,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            settings,
        }
    }

    /// Creates a transfer, moving stock and revaluing cost when the initial
    /// status is Completed.
    #[instrument(skip(self, input), fields(from_warehouse = input.from_warehouse_id, to_warehouse = input.to_warehouse_id))]
    pub async fn create_transfer(
        &self,
        input: TransferInput,
    ) -> Result<TransferAggregate, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if input.from_warehouse_id == input.to_warehouse_id {
            return Err(ServiceError::ValidationError(
                "Source and destination warehouse must differ.".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for transfer creation");
            ServiceError::DatabaseError(e)
        })?;
        let mut pending_events: Vec<Event> = Vec::new();

        let now = Utc::now();
        let header = transfer::ActiveModel {
            from_warehouse_id: Set(input.from_warehouse_id),
            to_warehouse_id: Set(input.to_warehouse_id),
            date: Set(input.date.unwrap_or_else(|| now.date_naive())),
            status: Set(input.status),
            discount: Set(Decimal::ZERO),
            tax_rate: Set(Decimal::ZERO),
            tax_amount: Set(Decimal::ZERO),
            shipping: Set(Decimal::ZERO),
            grand_total: Set(Decimal::ZERO),
            reference_code: Set(None),
            note: Set(input.note.clone()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let transfer = header.insert(&txn).await.map_err(ServiceError::db_error)?;

        let move_now = transfer.status == TransferStatus::Completed;
        let mut items = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let item =
                insert_new_line(&txn, &transfer, line, move_now, &mut pending_events).await?;
            items.push(item);
        }

        let subtotal: Decimal = items.iter().map(|i| i.sub_total).sum();
        let (tax_amount, grand_total) = compute_totals(subtotal, &input)?;

        let mut active: transfer::ActiveModel = transfer.clone().into();
        active.discount = Set(input.discount);
        active.tax_rate = Set(input.tax_rate);
        active.tax_amount = Set(tax_amount);
        active.shipping = Set(input.shipping);
        active.grand_total = Set(grand_total);
        active.reference_code = Set(Some(format!("TR_111{}", transfer.id)));
        active.updated_at = Set(Utc::now().into());
        let transfer = active.update(&txn).await.map_err(ServiceError::db_error)?;

        // Stock is already moved; revaluation must read the post-movement
        // system-wide quantities.
        if move_now && input.shipping > Decimal::ZERO {
            let (per_product_qty, total_moved) = per_product_quantities(&items);
            let changes = costing::apply_shipping_allocation(
                &txn,
                &per_product_qty,
                total_moved,
                input.shipping,
                false,
            )
            .await?;
            record_cost_events(&mut pending_events, &changes);
        }

        if move_now && self.settings.is_line_revaluation_enabled() {
            let effects = costing::aggregate_line_effects(&items);
            let deltas = costing::reconcile(&HashMap::new(), &effects, StatusTransition::Activated);
            let changes = costing::apply_line_revaluation(&txn, &deltas).await?;
            record_cost_events(&mut pending_events, &changes);
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        pending_events.insert(
            0,
            Event::TransferCreated {
                transfer_id: transfer.id,
                reference_code: transfer.reference_code.clone().unwrap_or_default(),
            },
        );
        self.emit(pending_events).await;

        info!(transfer_id = transfer.id, status = ?transfer.status, "Created transfer");
        Ok(TransferAggregate { transfer, items })
    }

    /// Updates a transfer, applying only the difference between its old and
    /// new state to stock and cost. An update with identical input is a
    /// no-op for both.
    #[instrument(skip(self, input), fields(transfer_id = id))]
    pub async fn update_transfer(
        &self,
        id: i64,
        input: TransferInput,
    ) -> Result<TransferAggregate, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for transfer update");
            ServiceError::DatabaseError(e)
        })?;
        let mut pending_events: Vec<Event> = Vec::new();

        let existing = Transfer::find_by_id(id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Transfer {} not found", id)))?;

        if input.from_warehouse_id != existing.from_warehouse_id
            || input.to_warehouse_id != existing.to_warehouse_id
        {
            return Err(ServiceError::ValidationError(
                "Transfer warehouses cannot be changed after creation.".to_string(),
            ));
        }

        let old_status = existing.status;
        let old_shipping = existing.shipping;
        let was_completed = old_status == TransferStatus::Completed;

        let old_items = TransferItem::find()
            .filter(transfer_item::Column::TransferId.eq(id))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let old_effects = if self.settings.is_line_revaluation_enabled() {
            costing::aggregate_line_effects(&old_items)
        } else {
            HashMap::new()
        };

        let mut seen_ids: HashSet<i64> = HashSet::new();

        for line in &input.items {
            match line.transfer_item_id {
                Some(item_id) => {
                    let item = old_items
                        .iter()
                        .find(|i| i.id == item_id)
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Transfer item {} not found", item_id))
                        })?;
                    if item.product_id != line.product_id {
                        return Err(ServiceError::ValidationError(
                            "Transfer item product cannot be changed; remove the line and add a new one."
                                .to_string(),
                        ));
                    }
                    // Each occurrence diffs against the pre-update snapshot,
                    // so a repeated id would apply its movement twice.
                    if !seen_ids.insert(item_id) {
                        return Err(ServiceError::ValidationError(format!(
                            "Transfer item {} is listed more than once.",
                            item_id
                        )));
                    }

                    let totals = calculate_line(line)?;

                    // Stock moves by the signed quantity difference only,
                    // and only while the previous state was Completed.
                    if was_completed {
                        let qty_diff = line.quantity - item.quantity;
                        if qty_diff != Decimal::ZERO {
                            let available = stock::quantity_at(
                                &txn,
                                existing.from_warehouse_id,
                                item.product_id,
                            )
                            .await?
                            .ok_or_else(|| {
                                ServiceError::ValidationError(
                                    "Product stock is not available in selected warehouse."
                                        .to_string(),
                                )
                            })?;
                            if available - qty_diff < Decimal::ZERO {
                                return Err(ServiceError::InsufficientStock(
                                    "Quantity should not be greater than available quantity."
                                        .to_string(),
                                ));
                            }
                            move_and_record(
                                &txn,
                                &mut pending_events,
                                existing.from_warehouse_id,
                                item.product_id,
                                -qty_diff,
                            )
                            .await?;
                            move_and_record(
                                &txn,
                                &mut pending_events,
                                existing.to_warehouse_id,
                                item.product_id,
                                qty_diff,
                            )
                            .await?;
                        }
                    }

                    let mut active: transfer_item::ActiveModel = item.clone().into();
                    active.quantity = Set(line.quantity);
                    active.unit_price = Set(line.unit_price);
                    active.discount_type = Set(line.discount_type);
                    active.discount_value = Set(line.discount_value);
                    active.discount_amount = Set(totals.discount_amount);
                    active.tax_type = Set(line.tax_type);
                    active.tax_value = Set(line.tax_value);
                    active.tax_amount = Set(totals.tax_amount);
                    active.net_unit_price = Set(totals.net_unit_price);
                    active.sub_total = Set(totals.sub_total);
                    active.updated_at = Set(Utc::now().into());
                    active.update(&txn).await.map_err(ServiceError::db_error)?;
                }
                None => {
                    insert_new_line(&txn, &existing, line, was_completed, &mut pending_events)
                        .await?;
                }
            }
        }

        // Existing items missing from the input are removals: fully revert
        // their movement before deleting.
        for item in &old_items {
            if seen_ids.contains(&item.id) {
                continue;
            }
            if was_completed {
                if stock::quantity_at(&txn, existing.to_warehouse_id, item.product_id)
                    .await?
                    .is_some()
                {
                    move_and_record(
                        &txn,
                        &mut pending_events,
                        existing.to_warehouse_id,
                        item.product_id,
                        -item.quantity,
                    )
                    .await?;
                }
                move_and_record(
                    &txn,
                    &mut pending_events,
                    existing.from_warehouse_id,
                    item.product_id,
                    item.quantity,
                )
                .await?;
            }
            TransferItem::delete_by_id(item.id)
                .exec(&txn)
                .await
                .map_err(ServiceError::db_error)?;
        }

        let current_items = TransferItem::find()
            .filter(transfer_item::Column::TransferId.eq(id))
            .order_by_asc(transfer_item::Column::Id)
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let subtotal: Decimal = current_items.iter().map(|i| i.sub_total).sum();
        let (tax_amount, grand_total) = compute_totals(subtotal, &input)?;

        let mut active: transfer::ActiveModel = existing.clone().into();
        active.date = Set(input.date.unwrap_or(existing.date));
        active.status = Set(input.status);
        active.discount = Set(input.discount);
        active.tax_rate = Set(input.tax_rate);
        active.tax_amount = Set(tax_amount);
        active.shipping = Set(input.shipping);
        active.grand_total = Set(grand_total);
        active.note = Set(input.note.clone());
        active.updated_at = Set(Utc::now().into());
        let transfer = active.update(&txn).await.map_err(ServiceError::db_error)?;

        // A Pending<->Completed flip moves every current item's full
        // quantity; the per-item diffs above only covered edits within an
        // already-Completed transfer.
        let transition = StatusTransition::between(old_status, transfer.status);
        match transition {
            StatusTransition::Activated => {
                for item in &current_items {
                    move_and_record(
                        &txn,
                        &mut pending_events,
                        transfer.to_warehouse_id,
                        item.product_id,
                        item.quantity,
                    )
                    .await?;
                    move_and_record(
                        &txn,
                        &mut pending_events,
                        transfer.from_warehouse_id,
                        item.product_id,
                        -item.quantity,
                    )
                    .await?;
                }
            }
            StatusTransition::Deactivated => {
                for item in &current_items {
                    move_and_record(
                        &txn,
                        &mut pending_events,
                        transfer.to_warehouse_id,
                        item.product_id,
                        -item.quantity,
                    )
                    .await?;
                    move_and_record(
                        &txn,
                        &mut pending_events,
                        transfer.from_warehouse_id,
                        item.product_id,
                        item.quantity,
                    )
                    .await?;
                }
            }
            StatusTransition::StayPending | StatusTransition::StayCompleted => {}
        }

        let shipping_delta = transition.shipping_delta(old_shipping, input.shipping);
        if shipping_delta != Decimal::ZERO {
            let (per_product_qty, total_moved) = per_product_quantities(&current_items);
            let changes = costing::apply_shipping_allocation(
                &txn,
                &per_product_qty,
                total_moved,
                shipping_delta,
                false,
            )
            .await?;
            record_cost_events(&mut pending_events, &changes);
        }

        if self.settings.is_line_revaluation_enabled() {
            let new_effects = costing::aggregate_line_effects(&current_items);
            let deltas = costing::reconcile(&old_effects, &new_effects, transition);
            let changes = costing::apply_line_revaluation(&txn, &deltas).await?;
            record_cost_events(&mut pending_events, &changes);
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        pending_events.insert(0, Event::TransferUpdated { transfer_id: id });
        self.emit(pending_events).await;

        info!(transfer_id = id, status = ?transfer.status, "Updated transfer");
        Ok(TransferAggregate {
            transfer,
            items: current_items,
        })
    }

    /// Deletes a transfer, first undoing its cost and stock effects when it
    /// was Completed. Cost reverts run before the stock revert so they read
    /// the same system-wide quantities the apply side saw.
    #[instrument(skip(self))]
    pub async fn delete_transfer(&self, id: i64) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for transfer deletion");
            ServiceError::DatabaseError(e)
        })?;
        let mut pending_events: Vec<Event> = Vec::new();

        let transfer = Transfer::find_by_id(id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Transfer {} not found", id)))?;

        let items = TransferItem::find()
            .filter(transfer_item::Column::TransferId.eq(id))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        if transfer.status == TransferStatus::Completed {
            if self.settings.is_line_revaluation_enabled() && !items.is_empty() {
                let effects = costing::aggregate_line_effects(&items);
                let deltas =
                    costing::reconcile(&effects, &HashMap::new(), StatusTransition::Deactivated);
                let changes = costing::apply_line_revaluation(&txn, &deltas).await?;
                record_cost_events(&mut pending_events, &changes);
            }

            if transfer.shipping > Decimal::ZERO {
                let (per_product_qty, total_moved) = per_product_quantities(&items);
                let changes = costing::apply_shipping_allocation(
                    &txn,
                    &per_product_qty,
                    total_moved,
                    -transfer.shipping,
                    true,
                )
                .await?;
                record_cost_events(&mut pending_events, &changes);
            }

            for item in &items {
                if stock::quantity_at(&txn, transfer.to_warehouse_id, item.product_id)
                    .await?
                    .is_some()
                {
                    move_and_record(
                        &txn,
                        &mut pending_events,
                        transfer.to_warehouse_id,
                        item.product_id,
                        -item.quantity,
                    )
                    .await?;
                }
                move_and_record(
                    &txn,
                    &mut pending_events,
                    transfer.from_warehouse_id,
                    item.product_id,
                    item.quantity,
                )
                .await?;
            }
        }

        TransferItem::delete_many()
            .filter(transfer_item::Column::TransferId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        Transfer::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        pending_events.insert(0, Event::TransferDeleted { transfer_id: id });
        self.emit(pending_events).await;

        info!(transfer_id = id, "Deleted transfer");
        Ok(())
    }

    /// Fetches a transfer with its items.
    #[instrument(skip(self))]
    pub async fn get_transfer(&self, id: i64) -> Result<TransferAggregate, ServiceError> {
        let db = &*self.db_pool;

        let transfer = Transfer::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Transfer {} not found", id)))?;

        let items = TransferItem::find()
            .filter(transfer_item::Column::TransferId.eq(id))
            .order_by_asc(transfer_item::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(TransferAggregate { transfer, items })
    }

    /// Lists transfer headers, newest first, with pagination.
    #[instrument(skip(self))]
    pub async fn list_transfers(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<TransferListPage, ServiceError> {
        let db = &*self.db_pool;

        let paginator = Transfer::find()
            .order_by_desc(transfer::Column::Id)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let transfers = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok(TransferListPage {
            transfers,
            total,
            page,
            per_page: limit,
        })
    }

    async fn emit(&self, events: Vec<Event>) {
        if let Some(sender) = &self.event_sender {
            for event in events {
                sender.send_or_log(event).await;
            }
        }
    }
}

/// Validates availability at the source warehouse and inserts one new line,
/// moving stock when the transfer is (or stays) Completed.
async fn insert_new_line(
    txn: &DatabaseTransaction,
    transfer: &transfer::Model,
    line: &TransferItemInput,
    move_now: bool,
    events: &mut Vec<Event>,
) -> Result<transfer_item::Model, ServiceError> {
    let available = stock::quantity_at(txn, transfer.from_warehouse_id, line.product_id)
        .await?
        .ok_or_else(|| {
            ServiceError::ValidationError(
                "Product stock is not available in selected warehouse.".to_string(),
            )
        })?;
    if line.quantity > available {
        return Err(ServiceError::InsufficientStock(
            "Quantity should not be greater than available quantity.".to_string(),
        ));
    }

    if move_now {
        move_and_record(txn, events, transfer.to_warehouse_id, line.product_id, line.quantity)
            .await?;
        move_and_record(
            txn,
            events,
            transfer.from_warehouse_id,
            line.product_id,
            -line.quantity,
        )
        .await?;
    }

    let totals = calculate_line(line)?;

    let now = Utc::now();
    let active = transfer_item::ActiveModel {
        transfer_id: Set(transfer.id),
        product_id: Set(line.product_id),
        quantity: Set(line.quantity),
        unit_price: Set(line.unit_price),
        discount_type: Set(line.discount_type),
        discount_value: Set(line.discount_value),
        discount_amount: Set(totals.discount_amount),
        tax_type: Set(line.tax_type),
        tax_value: Set(line.tax_value),
        tax_amount: Set(totals.tax_amount),
        net_unit_price: Set(totals.net_unit_price),
        sub_total: Set(totals.sub_total),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    active.insert(txn).await.map_err(ServiceError::db_error)
}

/// Moves stock and records the movement for post-commit event emission.
async fn move_and_record<C: ConnectionTrait>(
    db: &C,
    events: &mut Vec<Event>,
    warehouse_id: i64,
    product_id: i64,
    delta: Decimal,
) -> Result<(), ServiceError> {
    let new_quantity = stock::apply_movement(db, warehouse_id, product_id, delta).await?;
    events.push(Event::StockMoved {
        warehouse_id,
        product_id,
        delta,
        new_quantity,
    });
    Ok(())
}

/// Derives header totals from the item subtotal sum, validating each
/// accumulation step: discount against the subtotal, tax rate against
/// [0, 100], shipping against the running grand total.
fn compute_totals(subtotal: Decimal, input: &TransferInput) -> Result<(Decimal, Decimal), ServiceError> {
    if input.discount < Decimal::ZERO || input.discount > subtotal {
        return Err(ServiceError::InvalidDiscount(
            "Discount amount should not be greater than total.".to_string(),
        ));
    }
    let mut grand_total = subtotal - input.discount;

    if input.tax_rate < Decimal::ZERO || input.tax_rate > HUNDRED {
        return Err(ServiceError::InvalidTaxRate(
            "Please enter tax value between 0 to 100.".to_string(),
        ));
    }
    let tax_amount = grand_total * input.tax_rate / HUNDRED;
    grand_total += tax_amount;

    if input.shipping < Decimal::ZERO || input.shipping > grand_total {
        return Err(ServiceError::InvalidShipping(
            "Shipping amount should not be greater than grand total.".to_string(),
        ));
    }
    grand_total += input.shipping;

    Ok((tax_amount, grand_total))
}

fn per_product_quantities(items: &[transfer_item::Model]) -> (HashMap<i64, Decimal>, Decimal) {
    let mut per_product: HashMap<i64, Decimal> = HashMap::new();
    let mut total = Decimal::ZERO;
    for item in items {
        *per_product.entry(item.product_id).or_insert(Decimal::ZERO) += item.quantity;
        total += item.quantity;
    }
    (per_product, total)
}

fn record_cost_events(events: &mut Vec<Event>, changes: &[CostChange]) {
    for change in changes {
        events.push(Event::ProductCostRevalued {
            product_id: change.product_id,
            old_cost: change.old_cost,
            new_cost: change.new_cost,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::entities::transfer_item::{DiscountType, TaxType};

    fn input_with(discount: Decimal, tax_rate: Decimal, shipping: Decimal) -> TransferInput {
        TransferInput {
            from_warehouse_id: 1,
            to_warehouse_id: 2,
            date: None,
            status: TransferStatus::Pending,
            discount,
            tax_rate,
            shipping,
            note: None,
            items: vec![TransferItemInput {
                transfer_item_id: None,
                product_id: 1,
                quantity: dec!(1),
                unit_price: dec!(100),
                discount_type: DiscountType::Percentage,
                discount_value: Decimal::ZERO,
                tax_type: TaxType::Exclusive,
                tax_value: Decimal::ZERO,
            }],
        }
    }

    #[test]
    fn totals_stack_discount_tax_then_shipping() {
        let input = input_with(dec!(100), dec!(10), dec!(50));
        let (tax_amount, grand_total) = compute_totals(dec!(1000), &input).unwrap();
        assert_eq!(tax_amount, dec!(90));
        assert_eq!(grand_total, dec!(1040));
    }

    #[test]
    fn totals_reject_discount_above_subtotal() {
        let input = input_with(dec!(1001), Decimal::ZERO, Decimal::ZERO);
        assert!(matches!(
            compute_totals(dec!(1000), &input),
            Err(ServiceError::InvalidDiscount(_))
        ));
    }

    #[test]
    fn totals_reject_tax_rate_above_hundred() {
        let input = input_with(Decimal::ZERO, dec!(101), Decimal::ZERO);
        assert!(matches!(
            compute_totals(dec!(1000), &input),
            Err(ServiceError::InvalidTaxRate(_))
        ));
    }

    #[test]
    fn totals_reject_shipping_above_running_total() {
        let input = input_with(dec!(900), Decimal::ZERO, dec!(200));
        assert!(matches!(
            compute_totals(dec!(1000), &input),
            Err(ServiceError::InvalidShipping(_))
        ));
    }

    #[test]
    fn per_product_quantities_merges_lines() {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let item = |product_id: i64, quantity: Decimal| transfer_item::Model {
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
            sub_total: dec!(100),
            created_at: now,
            updated_at: now,
        };

        let items = vec![item(1, dec!(3)), item(1, dec!(2)), item(2, dec!(5))];
        let (per_product, total) = per_product_quantities(&items);
        assert_eq!(per_product[&1], dec!(5));
        assert_eq!(per_product[&2], dec!(5));
        assert_eq!(total, dec!(10));
    }
}
