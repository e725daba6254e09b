//! Pure per-line calculation of discount, tax and subtotal.
//!
//! Invoked once per item on every create/update path; has no side effects.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::transfer_item::{DiscountType, TaxType};
use crate::errors::ServiceError;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Raw input for a single transfer line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferItemInput {
    /// Present when updating an existing line, `None` for a new line.
    #[serde(default)]
    pub transfer_item_id: Option<i64>,
    pub product_id: i64,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub tax_type: TaxType,
    pub tax_value: Decimal,
}

/// Computed monetary values for one line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineTotals {
    pub net_unit_price: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub sub_total: Decimal,
}

/// Computes net unit price, discount, tax and subtotal for one line.
///
/// Discount is applied to the base price first; tax applies to the
/// discounted price. An inclusive tax is backed out of the price, an
/// exclusive tax is added on top; either way
/// `sub_total = (net_unit_price + tax_per_unit) * quantity`.
pub fn calculate_line(item: &TransferItemInput) -> Result<LineTotals, ServiceError> {
    if item.quantity <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Quantity must be greater than zero.".to_string(),
        ));
    }
    if item.unit_price < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Price must not be negative.".to_string(),
        ));
    }

    let mut net_unit_price = item.unit_price;

    let discount_amount = match item.discount_type {
        DiscountType::Percentage => {
            if item.discount_value < Decimal::ZERO || item.discount_value > HUNDRED {
                return Err(ServiceError::InvalidDiscount(
                    "Please enter discount value between 0 to 100.".to_string(),
                ));
            }
            item.discount_value / HUNDRED * item.unit_price * item.quantity
        }
        DiscountType::Fixed => {
            if item.discount_value < Decimal::ZERO || item.discount_value > item.unit_price {
                return Err(ServiceError::InvalidDiscount(
                    "Please enter discount value between 0 and the unit price.".to_string(),
                ));
            }
            item.discount_value * item.quantity
        }
    };
    net_unit_price -= discount_amount / item.quantity;

    if item.tax_value < Decimal::ZERO || item.tax_value > HUNDRED {
        return Err(ServiceError::InvalidTaxRate(
            "Please enter tax value between 0 to 100.".to_string(),
        ));
    }

    let tax_amount = match item.tax_type {
        TaxType::Exclusive => net_unit_price * item.tax_value / HUNDRED * item.quantity,
        TaxType::Inclusive => {
            let amount =
                net_unit_price * item.tax_value / (HUNDRED + item.tax_value) * item.quantity;
            net_unit_price -= amount / item.quantity;
            amount
        }
    };

    let sub_total = (net_unit_price + tax_amount / item.quantity) * item.quantity;

    Ok(LineTotals {
        net_unit_price,
        discount_amount,
        tax_amount,
        sub_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn base_item() -> TransferItemInput {
        TransferItemInput {
            transfer_item_id: None,
            product_id: 1,
            quantity: dec!(10),
            unit_price: dec!(100),
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::ZERO,
            tax_type: TaxType::Exclusive,
            tax_value: Decimal::ZERO,
        }
    }

    #[test]
    fn plain_line_has_no_discount_or_tax() {
        let totals = calculate_line(&base_item()).unwrap();
        assert_eq!(totals.net_unit_price, dec!(100));
        assert_eq!(totals.discount_amount, dec!(0));
        assert_eq!(totals.tax_amount, dec!(0));
        assert_eq!(totals.sub_total, dec!(1000));
    }

    #[test]
    fn percentage_discount_reduces_net_price() {
        let mut item = base_item();
        item.discount_value = dec!(10);

        let totals = calculate_line(&item).unwrap();
        assert_eq!(totals.discount_amount, dec!(100));
        assert_eq!(totals.net_unit_price, dec!(90));
        assert_eq!(totals.sub_total, dec!(900));
    }

    #[test]
    fn fixed_discount_is_per_unit() {
        let mut item = base_item();
        item.discount_type = DiscountType::Fixed;
        item.discount_value = dec!(5);

        let totals = calculate_line(&item).unwrap();
        assert_eq!(totals.discount_amount, dec!(50));
        assert_eq!(totals.net_unit_price, dec!(95));
        assert_eq!(totals.sub_total, dec!(950));
    }

    #[test]
    fn exclusive_tax_adds_on_top() {
        let mut item = base_item();
        item.tax_value = dec!(10);

        let totals = calculate_line(&item).unwrap();
        assert_eq!(totals.net_unit_price, dec!(100));
        assert_eq!(totals.tax_amount, dec!(100));
        assert_eq!(totals.sub_total, dec!(1100));
    }

    #[test]
    fn inclusive_tax_is_backed_out_of_price() {
        let mut item = base_item();
        item.tax_type = TaxType::Inclusive;
        item.tax_value = dec!(10);
        item.unit_price = dec!(110);

        let totals = calculate_line(&item).unwrap();
        assert_eq!(totals.net_unit_price, dec!(100));
        assert_eq!(totals.tax_amount, dec!(100));
        // Inclusive tax never changes what the line costs overall.
        assert_eq!(totals.sub_total, dec!(1100));
    }

    #[test]
    fn discount_then_inclusive_tax_compose() {
        let mut item = base_item();
        item.unit_price = dec!(220);
        item.discount_value = dec!(50);
        item.tax_type = TaxType::Inclusive;
        item.tax_value = dec!(10);

        let totals = calculate_line(&item).unwrap();
        assert_eq!(totals.discount_amount, dec!(1100));
        assert_eq!(totals.net_unit_price, dec!(100));
        assert_eq!(totals.tax_amount, dec!(100));
        assert_eq!(totals.sub_total, dec!(1100));
    }

    #[test]
    fn rejects_zero_quantity() {
        let mut item = base_item();
        item.quantity = Decimal::ZERO;
        assert_matches!(calculate_line(&item), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn rejects_percentage_discount_over_hundred() {
        let mut item = base_item();
        item.discount_value = dec!(101);
        assert_matches!(calculate_line(&item), Err(ServiceError::InvalidDiscount(_)));
    }

    #[test]
    fn rejects_fixed_discount_above_unit_price() {
        let mut item = base_item();
        item.discount_type = DiscountType::Fixed;
        item.discount_value = dec!(101);
        assert_matches!(calculate_line(&item), Err(ServiceError::InvalidDiscount(_)));
    }

    #[test]
    fn rejects_out_of_range_tax() {
        let mut item = base_item();
        item.tax_value = dec!(120);
        assert_matches!(calculate_line(&item), Err(ServiceError::InvalidTaxRate(_)));
    }
}
