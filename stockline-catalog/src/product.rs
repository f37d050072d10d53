use serde::{Deserialize, Serialize};
use crate::inventory::{fefo_order, Batch};

/// Catalog entry as far as fulfillment cares about it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub reorder_level: i32,
    pub is_active: bool,
}

/// Stock aggregate of one product, derived from its active batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: String,
    pub product_name: String,
    pub total_quantity: i64,
    pub reorder_level: i32,
    pub below_reorder_level: bool,
    /// Allocatable batches in FEFO order.
    pub batches: Vec<Batch>,
}

impl StockLevel {
    pub fn from_batches(product: &Product, batches: &[Batch]) -> Self {
        let active: Vec<&Batch> = batches
            .iter()
            .filter(|b| b.is_active && b.product_id == product.product_id)
            .collect();

        // Negative corrections count against the aggregate.
        let total_quantity: i64 = active.iter().map(|b| b.current_quantity as i64).sum();

        let mut allocatable: Vec<Batch> = active
            .into_iter()
            .filter(|b| b.is_allocatable())
            .cloned()
            .collect();
        allocatable.sort_by(fefo_order);

        Self {
            product_id: product.product_id.clone(),
            product_name: product.name.clone(),
            total_quantity,
            reorder_level: product.reorder_level,
            below_reorder_level: total_quantity <= product.reorder_level as i64,
            batches: allocatable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::fixtures::batch;

    fn product(reorder_level: i32) -> Product {
        Product {
            product_id: "PRD001".to_string(),
            name: "Tomato Paste 400g".to_string(),
            reorder_level,
            is_active: true,
        }
    }

    #[test]
    fn test_stock_level_sums_active_batches() {
        let mut inactive = batch("B3", 100, None, 100);
        inactive.is_active = false;
        let batches = vec![
            batch("B2", 10, Some((2025, 2, 1)), 100),
            batch("B1", 5, Some((2025, 1, 1)), 100),
            batch("B4", -2, Some((2025, 1, 1)), 100),
            inactive,
        ];

        let level = StockLevel::from_batches(&product(20), &batches);

        assert_eq!(level.total_quantity, 13);
        assert!(level.below_reorder_level);
        let ids: Vec<&str> = level.batches.iter().map(|b| b.batch_id.as_str()).collect();
        assert_eq!(ids, vec!["B1", "B2"]);
    }

    #[test]
    fn test_stock_level_above_reorder() {
        let batches = vec![batch("B1", 50, None, 100)];
        let level = StockLevel::from_batches(&product(10), &batches);
        assert!(!level.below_reorder_level);
    }
}
