//! First-Expired-First-Out allocation of a requested quantity across batches.
//!
//! The allocator is read-only: it produces a quote. Consuming the quoted
//! quantities happens later, inside the order transaction, which re-checks
//! every batch because stock may have moved in between.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stockline_shared::money::{line_amount, round_cents};

use crate::inventory::{fefo_order, Batch};

/// One (batch, quantity) pair of an allocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocatedLine {
    pub batch_id: String,
    pub batch_number: String,
    pub expiry_date: Option<NaiveDate>,
    pub quantity: i32,
    /// The batch's own selling price; split lines may differ.
    pub unit_price: Decimal,
    pub discount: Decimal,
}

impl AllocatedLine {
    pub fn gross_amount(&self) -> Decimal {
        line_amount(self.quantity, self.unit_price)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub product_id: String,
    pub requested_quantity: i32,
    pub lines: Vec<AllocatedLine>,
    pub split_across_batches: bool,
}

impl Allocation {
    pub fn gross_amount(&self) -> Decimal {
        self.lines.iter().map(AllocatedLine::gross_amount).sum()
    }

    pub fn total_discount(&self) -> Decimal {
        self.lines.iter().map(|l| l.discount).sum()
    }

    /// Spread a discount for the whole request over the lines, pro rata to
    /// each line's gross value.
    pub fn apply_discount(&mut self, discount: Decimal) -> Result<(), AllocationError> {
        let gross = self.gross_amount();
        if discount < Decimal::ZERO || discount > gross {
            return Err(AllocationError::InvalidDiscount { discount, gross });
        }

        let grosses: Vec<Decimal> = self.lines.iter().map(AllocatedLine::gross_amount).collect();
        for (line, share) in self.lines.iter_mut().zip(apportion_discount(&grosses, discount)) {
            line.discount = share;
        }
        Ok(())
    }
}

/// Greedy FEFO allocator.
pub struct FefoAllocator;

impl FefoAllocator {
    /// Partition `quantity` over `batches`, earliest expiry first.
    ///
    /// Batches of other products, inactive batches and batches with nothing
    /// left are skipped. Fails without producing any line when the total
    /// supply is short.
    pub fn allocate(
        product_id: &str,
        batches: &[Batch],
        quantity: i32,
    ) -> Result<Allocation, AllocationError> {
        if quantity <= 0 {
            return Err(AllocationError::InvalidQuantity(quantity));
        }

        let mut candidates: Vec<&Batch> = batches
            .iter()
            .filter(|b| b.product_id == product_id && b.is_allocatable())
            .collect();
        candidates.sort_by(|a, b| fefo_order(a, b));

        let available: i64 = candidates.iter().map(|b| b.current_quantity as i64).sum();
        if available < quantity as i64 {
            return Err(AllocationError::InsufficientStock {
                product_id: product_id.to_string(),
                requested: quantity,
                available,
            });
        }

        let mut remaining = quantity;
        let mut lines = Vec::new();
        for batch in candidates {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(batch.current_quantity);
            lines.push(AllocatedLine {
                batch_id: batch.batch_id.clone(),
                batch_number: batch.batch_number.clone(),
                expiry_date: batch.expiry_date,
                quantity: take,
                unit_price: batch.selling_price,
                discount: Decimal::ZERO,
            });
            remaining -= take;
        }

        Ok(Allocation {
            product_id: product_id.to_string(),
            requested_quantity: quantity,
            split_across_batches: lines.len() > 1,
            lines,
        })
    }
}

/// Pro-rata shares of `discount`, rounded to cents. The rounding remainder
/// goes to the largest line so the shares always sum to `discount`.
pub fn apportion_discount(grosses: &[Decimal], discount: Decimal) -> Vec<Decimal> {
    let total: Decimal = grosses.iter().copied().sum();
    if grosses.is_empty() || discount.is_zero() || total.is_zero() {
        return vec![Decimal::ZERO; grosses.len()];
    }

    let mut shares: Vec<Decimal> = grosses
        .iter()
        .map(|g| round_cents(discount * *g / total))
        .collect();

    let remainder = discount - shares.iter().copied().sum::<Decimal>();
    if !remainder.is_zero() {
        let largest = grosses
            .iter()
            .enumerate()
            .fold(0, |best, (i, g)| if *g > grosses[best] { i } else { best });
        shares[largest] += remainder;
    }
    shares
}

#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("Requested quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: i32,
        available: i64,
    },

    #[error("Discount {discount} must be between 0 and the gross amount {gross}")]
    InvalidDiscount {
        discount: Decimal,
        gross: Decimal,
    },
}
