use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stockline_shared::money::{is_whole_cents, line_amount, MAX_AMOUNT};

use crate::manager::OrderError;
use crate::models::{Order, OrderItem, OrderStatus, PaymentStatus, PaymentType};

/// An allocated line handed to order creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    pub product_id: String,
    pub batch_id: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
}

impl OrderLine {
    pub fn gross_amount(&self) -> Decimal {
        line_amount(self.quantity, self.unit_price)
    }

    pub fn total_price(&self) -> Decimal {
        self.gross_amount() - self.discount
    }
}

/// A validated cart, priced and ready to be committed.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub customer_id: String,
    pub sales_rep_id: String,
    pub payment_type: PaymentType,
    pub notes: Option<String>,
    pub lines: Vec<OrderLine>,
    pub total_amount: Decimal,
    pub discount_amount: Decimal,
    batch_totals: Vec<(String, String, i32)>,
}

impl OrderDraft {
    pub fn new(
        customer_id: String,
        sales_rep_id: String,
        payment_type: PaymentType,
        lines: Vec<OrderLine>,
        notes: Option<String>,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::Validation("order must contain at least one line".to_string()));
        }

        for (idx, line) in lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(OrderError::Validation(format!(
                    "line {}: quantity must be positive, got {}",
                    idx + 1,
                    line.quantity
                )));
            }
            if line.unit_price < Decimal::ZERO || line.unit_price > MAX_AMOUNT {
                return Err(OrderError::Validation(format!(
                    "line {}: unit price must be between 0 and {}",
                    idx + 1,
                    MAX_AMOUNT
                )));
            }
            if !is_whole_cents(line.unit_price) || !is_whole_cents(line.discount) {
                return Err(OrderError::Validation(format!(
                    "line {}: unit price and discount must be whole cents",
                    idx + 1
                )));
            }
            if line.discount < Decimal::ZERO || line.discount > line.gross_amount() {
                return Err(OrderError::Validation(format!(
                    "line {}: discount {} must be between 0 and {}",
                    idx + 1,
                    line.discount,
                    line.gross_amount()
                )));
            }
        }

        let gross = lines
            .iter()
            .try_fold(Decimal::ZERO, |acc, l| acc.checked_add(l.gross_amount()))
            .filter(|gross| *gross <= MAX_AMOUNT)
            .ok_or_else(|| OrderError::Validation(format!("order value exceeds {}", MAX_AMOUNT)))?;
        let discount_amount: Decimal = lines.iter().map(|l| l.discount).sum();
        let batch_totals = merge_by_batch(&lines)?;

        Ok(Self {
            customer_id,
            sales_rep_id,
            payment_type,
            notes,
            lines,
            total_amount: gross - discount_amount,
            discount_amount,
            batch_totals,
        })
    }

    /// Amount granted on the customer's credit when the order commits.
    pub fn credit_increment(&self) -> Decimal {
        match self.payment_type {
            PaymentType::Credit => self.total_amount,
            _ => Decimal::ZERO,
        }
    }

    /// Total quantity per (product, batch), ordered by batch id so every
    /// writer locks batch rows in the same order.
    pub fn quantities_by_batch(&self) -> Vec<(String, String, i32)> {
        self.batch_totals.clone()
    }

    /// Build the rows to insert, given codes issued by the store.
    pub fn into_order(
        self,
        order_id: String,
        item_ids: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<(Order, Vec<OrderItem>), OrderError> {
        if item_ids.len() != self.lines.len() {
            return Err(OrderError::Validation(format!(
                "expected {} item ids, got {}",
                self.lines.len(),
                item_ids.len()
            )));
        }

        let items = self
            .lines
            .iter()
            .zip(item_ids)
            .enumerate()
            .map(|(idx, (line, order_item_id))| OrderItem {
                order_item_id,
                order_id: order_id.clone(),
                line_no: idx as i32 + 1,
                product_id: line.product_id.clone(),
                batch_id: line.batch_id.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                discount: line.discount,
                total_price: line.total_price(),
            })
            .collect();

        let order = Order {
            order_id,
            customer_id: self.customer_id,
            sales_rep_id: self.sales_rep_id,
            order_date: now,
            delivery_date: None,
            payment_type: self.payment_type,
            payment_status: PaymentStatus::Pending,
            status: OrderStatus::Pending,
            total_amount: self.total_amount,
            discount_amount: self.discount_amount,
            final_amount: self.total_amount,
            notes: self.notes,
            updated_at: now,
        };

        Ok((order, items))
    }
}

fn merge_by_batch(lines: &[OrderLine]) -> Result<Vec<(String, String, i32)>, OrderError> {
    let mut out: Vec<(String, String, i32)> = Vec::new();
    for line in lines {
        match out
            .iter_mut()
            .find(|(product, batch, _)| *product == line.product_id && *batch == line.batch_id)
        {
            Some(entry) => {
                entry.2 = entry.2.checked_add(line.quantity).ok_or_else(|| {
                    OrderError::Validation(format!("total quantity for batch {} is too large", line.batch_id))
                })?;
            }
            None => out.push((line.product_id.clone(), line.batch_id.clone(), line.quantity)),
        }
    }
    out.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    Ok(out)
}
