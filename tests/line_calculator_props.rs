//! Property-based tests for the pure line calculator and the cost
//! reconciliation algebra.

use std::collections::HashMap;

use proptest::prelude::*;
use rust_decimal::Decimal;
use stockflow::entities::transfer_item::{DiscountType, TaxType};
use stockflow::errors::ServiceError;
use stockflow::services::costing::{reconcile, LineEffect, StatusTransition};
use stockflow::services::line_items::{calculate_line, TransferItemInput};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=1_000).prop_map(Decimal::from)
}

fn price_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=1_000_000, 0u32..100)
        .prop_map(|(units, cents)| Decimal::from(units) + Decimal::new(cents as i64, 2))
}

fn percent_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=100).prop_map(Decimal::from)
}

fn plain_item(quantity: Decimal, unit_price: Decimal) -> TransferItemInput {
    TransferItemInput {
        transfer_item_id: None,
        product_id: 1,
        quantity,
        unit_price,
        discount_type: DiscountType::Percentage,
        discount_value: Decimal::ZERO,
        tax_type: TaxType::Exclusive,
        tax_value: Decimal::ZERO,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn percentage_discount_scales_linearly(
        qty in quantity_strategy(),
        price in price_strategy(),
        pct in percent_strategy(),
    ) {
        let mut item = plain_item(qty, price);
        item.discount_value = pct;

        let totals = calculate_line(&item).unwrap();
        prop_assert_eq!(totals.discount_amount, pct / HUNDRED * price * qty);
        prop_assert_eq!(totals.sub_total, (price - pct / HUNDRED * price) * qty);
    }

    #[test]
    fn fixed_discount_within_unit_price_is_per_unit(
        qty in quantity_strategy(),
        price in price_strategy(),
        ratio in percent_strategy(),
    ) {
        let discount = price * ratio / HUNDRED;
        let mut item = plain_item(qty, price);
        item.discount_type = DiscountType::Fixed;
        item.discount_value = discount;

        let totals = calculate_line(&item).unwrap();
        prop_assert_eq!(totals.discount_amount, discount * qty);
        prop_assert_eq!(totals.sub_total, (price - discount) * qty);
    }

    #[test]
    fn exclusive_tax_adds_on_top_of_net(
        qty in quantity_strategy(),
        price in price_strategy(),
        rate in percent_strategy(),
    ) {
        let mut item = plain_item(qty, price);
        item.tax_value = rate;

        let totals = calculate_line(&item).unwrap();
        prop_assert_eq!(totals.net_unit_price, price);
        prop_assert_eq!(totals.tax_amount, price * rate / HUNDRED * qty);
        prop_assert_eq!(totals.sub_total, price * qty + totals.tax_amount);
    }

    #[test]
    fn inclusive_tax_never_changes_the_line_total(
        qty in quantity_strategy(),
        price in price_strategy(),
        rate in percent_strategy(),
    ) {
        let mut item = plain_item(qty, price);
        item.tax_type = TaxType::Inclusive;
        item.tax_value = rate;

        let totals = calculate_line(&item).unwrap();
        prop_assert_eq!(totals.sub_total, price * qty);
        prop_assert_eq!(
            totals.net_unit_price + totals.tax_amount / qty,
            price
        );
    }

    #[test]
    fn percentage_above_hundred_is_rejected(
        qty in quantity_strategy(),
        price in price_strategy(),
        pct in (101i64..=10_000).prop_map(Decimal::from),
    ) {
        let mut item = plain_item(qty, price);
        item.discount_value = pct;
        prop_assert!(matches!(
            calculate_line(&item),
            Err(ServiceError::InvalidDiscount(_))
        ));
    }

    #[test]
    fn tax_rate_above_hundred_is_rejected(
        qty in quantity_strategy(),
        price in price_strategy(),
        rate in (101i64..=10_000).prop_map(Decimal::from),
    ) {
        let mut item = plain_item(qty, price);
        item.tax_value = rate;
        prop_assert!(matches!(
            calculate_line(&item),
            Err(ServiceError::InvalidTaxRate(_))
        ));
    }

    #[test]
    fn non_positive_quantity_is_rejected(
        qty in (-1_000i64..=0).prop_map(Decimal::from),
        price in price_strategy(),
    ) {
        let item = plain_item(qty, price);
        prop_assert!(matches!(
            calculate_line(&item),
            Err(ServiceError::ValidationError(_))
        ));
    }
}

fn effects_strategy() -> impl Strategy<Value = HashMap<i64, LineEffect>> {
    proptest::collection::hash_map(
        1i64..=50,
        (1i64..=1_000, 0i64..=1_000_000).prop_map(|(q, a)| LineEffect {
            quantity: Decimal::from(q),
            amount: Decimal::new(a, 2),
        }),
        0..8,
    )
}

proptest! {
    #[test]
    fn reconciling_identical_states_yields_zero_deltas(effects in effects_strategy()) {
        let deltas = reconcile(&effects, &effects, StatusTransition::StayCompleted);
        for delta in deltas.values() {
            prop_assert_eq!(delta.quantity, Decimal::ZERO);
            prop_assert_eq!(delta.amount, Decimal::ZERO);
        }
    }

    #[test]
    fn deactivation_is_the_negation_of_activation(effects in effects_strategy()) {
        let applied = reconcile(&HashMap::new(), &effects, StatusTransition::Activated);
        let reverted = reconcile(&effects, &HashMap::new(), StatusTransition::Deactivated);

        prop_assert_eq!(applied.len(), reverted.len());
        for (pid, delta) in &applied {
            let back = reverted[pid];
            prop_assert_eq!(back.quantity, -delta.quantity);
            prop_assert_eq!(back.amount, -delta.amount);
        }
    }

    #[test]
    fn stay_pending_produces_no_deltas(
        old in effects_strategy(),
        new in effects_strategy(),
    ) {
        prop_assert!(reconcile(&old, &new, StatusTransition::StayPending).is_empty());
    }
}
