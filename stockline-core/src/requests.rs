//! Request and response bodies of the fulfillment operations.
//!
//! Requests are deserialized at the edge and checked with `validate()` before
//! anything touches the store.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stockline_order::{
    OrderDraft, OrderItem, OrderLine, OrderStatus, PaymentMethod, PaymentStatus, PaymentType, ReturnLine,
};
use stockline_shared::money::{is_whole_cents, MAX_AMOUNT};

use crate::{CoreError, CoreResult};

fn require(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::ValidationError(format!("{} is required", field)));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub product_id: String,
    pub quantity: i32,
    #[serde(default)]
    pub discount: Decimal,
}

impl AllocationRequest {
    pub fn validate(&self) -> CoreResult<()> {
        require("product_id", &self.product_id)?;
        if self.quantity <= 0 {
            return Err(CoreError::ValidationError(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }
        if self.discount < Decimal::ZERO {
            return Err(CoreError::ValidationError("discount must not be negative".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: String,
    pub sales_rep_id: String,
    pub payment_type: PaymentType,
    pub lines: Vec<OrderLine>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateOrderRequest {
    pub fn validate(&self) -> CoreResult<()> {
        require("customer_id", &self.customer_id)?;
        require("sales_rep_id", &self.sales_rep_id)?;
        if self.lines.is_empty() {
            return Err(CoreError::ValidationError("order must contain at least one line".to_string()));
        }
        for (idx, line) in self.lines.iter().enumerate() {
            require(&format!("lines[{}].product_id", idx), &line.product_id)?;
            require(&format!("lines[{}].batch_id", idx), &line.batch_id)?;
        }
        Ok(())
    }

    /// Price and check the lines. Quantity, price and discount ranges are
    /// enforced here.
    pub fn into_draft(self) -> CoreResult<OrderDraft> {
        let notes = self.notes.filter(|n| !n.trim().is_empty());
        Ok(OrderDraft::new(
            self.customer_id,
            self.sales_rep_id,
            self.payment_type,
            self.lines,
            notes,
        )?)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub total_amount: Decimal,
    pub items: Vec<OrderItem>,
}

/// The target status is typed, so an unknown value never gets past deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdateResponse {
    pub order_id: String,
    pub previous_status: OrderStatus,
    pub status: OrderStatus,
    pub inventory_restored: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub received_by: String,
}

impl RecordPaymentRequest {
    pub fn validate(&self) -> CoreResult<()> {
        require("received_by", &self.received_by)?;
        if self.amount <= Decimal::ZERO || self.amount > MAX_AMOUNT {
            return Err(CoreError::ValidationError(format!(
                "payment amount must be between 0 and {}, got {}",
                MAX_AMOUNT, self.amount
            )));
        }
        if !is_whole_cents(self.amount) {
            return Err(CoreError::ValidationError(format!(
                "payment amount {} has fractions of a cent",
                self.amount
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub order_id: String,
    pub payment_id: String,
    pub amount: Decimal,
    pub total_paid: Decimal,
    pub new_payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessReturnRequest {
    pub processed_by: String,
    #[serde(default)]
    pub reason: String,
    pub items: Vec<ReturnLine>,
}

impl ProcessReturnRequest {
    pub fn validate(&self) -> CoreResult<()> {
        require("processed_by", &self.processed_by)?;
        if self.items.is_empty() {
            return Err(CoreError::ValidationError("return must contain at least one item".to_string()));
        }
        for (idx, item) in self.items.iter().enumerate() {
            require(&format!("items[{}].product_id", idx), &item.product_id)?;
            require(&format!("items[{}].batch_id", idx), &item.batch_id)?;
            if item.quantity <= 0 {
                return Err(CoreError::ValidationError(format!(
                    "items[{}]: quantity must be positive, got {}",
                    idx, item.quantity
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnResponse {
    pub order_id: String,
    pub return_id: String,
    pub total_return_amount: Decimal,
    pub final_amount: Decimal,
}
