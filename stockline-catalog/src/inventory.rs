use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A dated, priced lot of one product received from one supplier.
///
/// `current_quantity` is signed: manual corrections may push it below zero,
/// allocation never does.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    pub batch_id: String,
    pub product_id: String,
    pub supplier_id: String,
    pub supplier_name: Option<String>,
    pub batch_number: String,
    pub manufacturing_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub received_date: NaiveDate,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub initial_quantity: i32,
    pub current_quantity: i32,
    pub is_active: bool,
}

impl Batch {
    /// Active and holding something to give out.
    pub fn is_allocatable(&self) -> bool {
        self.is_active && self.current_quantity > 0
    }

    /// Compare-and-decrement: takes `quantity` only if the batch still holds it.
    /// Returns the remaining quantity.
    pub fn consume(&mut self, quantity: i32) -> Result<i32, InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }

        if self.current_quantity < quantity {
            return Err(InventoryError::InsufficientBatchQuantity {
                product_id: self.product_id.clone(),
                batch_id: self.batch_id.clone(),
                requested: quantity,
                available: self.current_quantity,
            });
        }

        self.current_quantity -= quantity;
        Ok(self.current_quantity)
    }

    /// Put previously consumed units back (cancellation, returns).
    pub fn restock(&mut self, quantity: i32) -> Result<i32, InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }

        self.current_quantity = self
            .current_quantity
            .checked_add(quantity)
            .ok_or_else(|| InventoryError::QuantityOverflow(self.batch_id.clone()))?;
        Ok(self.current_quantity)
    }
}

/// FEFO ordering: earliest expiry first, batches without expiry last,
/// then oldest receipt, then batch id.
pub fn fefo_order(a: &Batch, b: &Batch) -> Ordering {
    let expiry = match (a.expiry_date, b.expiry_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    expiry
        .then_with(|| a.received_date.cmp(&b.received_date))
        .then_with(|| a.batch_id.cmp(&b.batch_id))
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    #[error("Quantity of batch {0} would overflow")]
    QuantityOverflow(String),

    #[error("Insufficient quantity in batch {batch_id}: requested {requested}, available {available}")]
    InsufficientBatchQuantity {
        product_id: String,
        batch_id: String,
        requested: i32,
        available: i32,
    },
}


#[cfg(test)]
mod tests {
    use super::fixtures::batch;
    use super::*;

    #[test]
    fn test_consume_and_restock() {
        let mut b = batch("B1", 10, Some((2025, 1, 1)), 250);

        assert_eq!(b.consume(4).unwrap(), 6);
        assert_eq!(b.consume(6).unwrap(), 0);

        let err = b.consume(1).unwrap_err();
        assert!(matches!(
            err,
            InventoryError::InsufficientBatchQuantity { requested: 1, available: 0, .. }
        ));
        assert_eq!(b.current_quantity, 0);

        assert_eq!(b.restock(10).unwrap(), 10);
    }

    #[test]
    fn test_restock_overflow_leaves_batch_untouched() {
        let mut b = batch("B1", i32::MAX, None, 250);
        let err = b.restock(1).unwrap_err();
        assert!(matches!(err, InventoryError::QuantityOverflow(_)));
        assert_eq!(b.current_quantity, i32::MAX);
    }

    #[test]
    fn test_non_positive_quantities_rejected() {
        let mut b = batch("B1", 10, None, 250);
        assert!(b.consume(0).is_err());
        assert!(b.restock(-3).is_err());
        assert_eq!(b.current_quantity, 10);
    }

    #[test]
    fn test_fefo_order_puts_missing_expiry_last() {
        let mut batches = vec![
            batch("B3", 5, None, 100),
            batch("B2", 5, Some((2025, 3, 1)), 100),
            batch("B1", 5, Some((2025, 1, 1)), 100),
        ];
        batches.sort_by(fefo_order);

        let ids: Vec<&str> = batches.iter().map(|b| b.batch_id.as_str()).collect();
        assert_eq!(ids, vec!["B1", "B2", "B3"]);
    }

    #[test]
    fn test_fefo_tie_break_on_receipt_then_id() {
        let mut late = batch("A9", 5, Some((2025, 1, 1)), 100);
        late.received_date = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        let early_b = batch("B2", 5, Some((2025, 1, 1)), 100);
        let early_a = batch("B1", 5, Some((2025, 1, 1)), 100);

        let mut batches = vec![late, early_b, early_a];
        batches.sort_by(fefo_order);

        let ids: Vec<&str> = batches.iter().map(|b| b.batch_id.as_str()).collect();
        assert_eq!(ids, vec!["B1", "B2", "A9"]);
    }

    #[test]
    fn test_negative_quantity_is_not_allocatable() {
        let mut b = batch("B1", -2, None, 100);
        assert!(!b.is_allocatable());
        b.current_quantity = 1;
        b.is_active = false;
        assert!(!b.is_allocatable());
    }
}
