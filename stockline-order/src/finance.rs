use crate::manager::OrderError;
use crate::models::{OrderDetail, OrderStatus, PaymentMethod, PaymentStatus, PaymentType};
use rust_decimal::Decimal;

/// Outcome of adding one payment to an order, before it is written.
#[derive(Debug, Clone)]
pub struct PaymentPlan {
    pub order_id: String,
    pub customer_id: String,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub received_by: String,
    pub total_paid: Decimal,
    pub new_status: PaymentStatus,
    /// Taken off the customer's credit balance (clamped at zero by the store).
    pub credit_decrement: Decimal,
    pub overpaid_by: Option<Decimal>,
}

/// Handles money movements on orders
pub struct FinancialManager;

impl FinancialManager {
    /// Status for a cumulative `paid` amount against `total`.
    ///
    /// Within `tolerance` of the total counts as paid; so does anything above it.
    pub fn resolve_status(total: Decimal, paid: Decimal, tolerance: Decimal) -> PaymentStatus {
        if paid <= Decimal::ZERO {
            PaymentStatus::Pending
        } else if paid + tolerance >= total {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Partial
        }
    }

    /// Work out the effect of recording `amount` against `detail`.
    pub fn plan_payment(
        detail: &OrderDetail,
        amount: Decimal,
        method: PaymentMethod,
        received_by: &str,
        tolerance: Decimal,
    ) -> Result<PaymentPlan, OrderError> {
        let order = &detail.order;

        if amount <= Decimal::ZERO {
            return Err(OrderError::Validation(format!(
                "payment amount must be positive, got {}",
                amount
            )));
        }
        if order.status == OrderStatus::Cancelled {
            return Err(OrderError::Validation(format!(
                "order {} is cancelled and cannot take payments",
                order.order_id
            )));
        }

        let total_paid = detail.total_paid() + amount;
        let resolved = Self::resolve_status(order.total_amount, total_paid, tolerance);
        // Never moves backwards.
        let new_status = if order.payment_status == PaymentStatus::Paid {
            PaymentStatus::Paid
        } else {
            resolved
        };

        let overpaid_by = if total_paid > order.total_amount + tolerance {
            Some(total_paid - order.total_amount)
        } else {
            None
        };

        let credit_decrement = match order.payment_type {
            PaymentType::Credit => amount,
            _ => Decimal::ZERO,
        };

        Ok(PaymentPlan {
            order_id: order.order_id.clone(),
            customer_id: order.customer_id.clone(),
            amount,
            method,
            received_by: received_by.to_string(),
            total_paid,
            new_status,
            credit_decrement,
            overpaid_by,
        })
    }

    /// `GREATEST(balance - amount, 0)`.
    pub fn reduce_credit(balance: Decimal, amount: Decimal) -> Decimal {
        (balance - amount).max(Decimal::ZERO)
    }
}
