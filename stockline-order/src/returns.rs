use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stockline_shared::money::round_cents;

use crate::manager::{restock_by_batch, OrderError, Restock};
use crate::models::{OrderDetail, OrderReturn, OrderStatus, PaymentStatus, PaymentType, ReturnItem};

/// One requested (product, batch, quantity) return.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReturnLine {
    pub product_id: String,
    pub batch_id: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedReturnItem {
    pub product_id: String,
    pub batch_id: String,
    pub quantity: i32,
    /// Net unit price of the original line(s), after their discount.
    pub unit_price: Decimal,
    pub total_amount: Decimal,
}

/// A validated return, with all of its compensation worked out.
#[derive(Debug, Clone)]
pub struct ReturnPlan {
    pub order_id: String,
    pub customer_id: String,
    pub processed_by: String,
    pub reason: String,
    pub items: Vec<PlannedReturnItem>,
    pub total_return_amount: Decimal,
    pub final_amount: Decimal,
    /// Taken off the customer's credit balance (clamped at zero by the store).
    pub credit_reversal: Decimal,
}

impl ReturnPlan {
    /// Units going back onto each batch, in lock order.
    pub fn restocks(&self) -> Result<Vec<Restock>, OrderError> {
        restock_by_batch(
            self.items
                .iter()
                .map(|i| (i.product_id.as_str(), i.batch_id.as_str(), i.quantity)),
        )
    }

    /// Build the rows to insert, given codes issued by the store.
    pub fn into_record(
        self,
        return_id: String,
        item_ids: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<OrderReturn, OrderError> {
        if item_ids.len() != self.items.len() {
            return Err(OrderError::Validation(format!(
                "expected {} return item ids, got {}",
                self.items.len(),
                item_ids.len()
            )));
        }

        let items = self
            .items
            .into_iter()
            .zip(item_ids)
            .map(|(item, return_item_id)| ReturnItem {
                return_item_id,
                return_id: return_id.clone(),
                product_id: item.product_id,
                batch_id: item.batch_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_amount: item.total_amount,
            })
            .collect();

        Ok(OrderReturn {
            return_id,
            order_id: self.order_id,
            processed_by: self.processed_by,
            reason: self.reason,
            total_return_amount: self.total_return_amount,
            returned_at: now,
            items,
        })
    }
}

/// Validates returns against what was actually ordered
pub struct ReturnProcessor;

impl ReturnProcessor {
    pub fn plan_return(
        detail: &OrderDetail,
        processed_by: &str,
        reason: &str,
        lines: &[ReturnLine],
    ) -> Result<ReturnPlan, OrderError> {
        let order = &detail.order;

        if order.status != OrderStatus::Delivered {
            return Err(OrderError::InvalidState {
                order_id: order.order_id.clone(),
                reason: format!("returns need a delivered order, status is {}", order.status),
            });
        }
        if detail.order_return.is_some() {
            return Err(OrderError::InvalidState {
                order_id: order.order_id.clone(),
                reason: "a return has already been processed".to_string(),
            });
        }
        if lines.is_empty() {
            return Err(OrderError::Validation("return must contain at least one item".to_string()));
        }

        // Merge duplicate pairs so the bound applies to the whole request.
        let mut requested: Vec<ReturnLine> = Vec::new();
        for line in lines {
            if line.quantity <= 0 {
                return Err(OrderError::Validation(format!(
                    "return quantity for batch {} must be positive, got {}",
                    line.batch_id, line.quantity
                )));
            }
            match requested
                .iter_mut()
                .find(|r| r.product_id == line.product_id && r.batch_id == line.batch_id)
            {
                Some(existing) => {
                    existing.quantity = existing.quantity.checked_add(line.quantity).ok_or_else(|| {
                        OrderError::Validation(format!("return quantity for batch {} is too large", line.batch_id))
                    })?;
                }
                None => requested.push(line.clone()),
            }
        }

        let mut items = Vec::with_capacity(requested.len());
        for line in requested {
            let (ordered_qty, ordered_total) = detail
                .items
                .iter()
                .filter(|i| i.product_id == line.product_id && i.batch_id == line.batch_id)
                .try_fold((0i32, Decimal::ZERO), |(q, t), i| {
                    Some((q.checked_add(i.quantity)?, t.checked_add(i.total_price)?))
                })
                .ok_or_else(|| {
                    OrderError::Validation(format!("ordered quantity for batch {} is too large", line.batch_id))
                })?;

            if ordered_qty == 0 {
                return Err(OrderError::Validation(format!(
                    "product {} from batch {} is not part of order {}",
                    line.product_id, line.batch_id, order.order_id
                )));
            }

            let already_returned: i32 = detail
                .order_return
                .iter()
                .flat_map(|r| r.items.iter())
                .filter(|i| i.product_id == line.product_id && i.batch_id == line.batch_id)
                .map(|i| i.quantity)
                .sum();

            let returnable = ordered_qty - already_returned;
            if line.quantity > returnable {
                return Err(OrderError::Validation(format!(
                    "cannot return {} of product {} from batch {}: only {} returnable",
                    line.quantity, line.product_id, line.batch_id, returnable
                )));
            }

            let ordered_qty = Decimal::from(ordered_qty);
            items.push(PlannedReturnItem {
                unit_price: round_cents(ordered_total / ordered_qty),
                total_amount: round_cents(ordered_total * Decimal::from(line.quantity) / ordered_qty),
                product_id: line.product_id,
                batch_id: line.batch_id,
                quantity: line.quantity,
            });
        }

        let total_return_amount: Decimal = items.iter().map(|i| i.total_amount).sum();
        let credit_reversal = if order.payment_type == PaymentType::Credit
            && order.payment_status != PaymentStatus::Paid
        {
            total_return_amount
        } else {
            Decimal::ZERO
        };

        Ok(ReturnPlan {
            order_id: order.order_id.clone(),
            customer_id: order.customer_id.clone(),
            processed_by: processed_by.to_string(),
            reason: reason.to_string(),
            items,
            total_return_amount,
            final_amount: order.total_amount - total_return_amount,
            credit_reversal,
        })
    }
}
