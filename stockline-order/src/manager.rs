use crate::models::{DeliveryStatus, Order, OrderDetail, OrderStatus, PaymentStatus, PaymentType};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

/// Units going back onto a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Restock {
    pub product_id: String,
    pub batch_id: String,
    pub quantity: i32,
}

/// Delivery record to close when an order is delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryCompletion {
    pub delivery_id: String,
    pub vehicle_id: Option<String>,
    pub delivered_at: DateTime<Utc>,
}

/// Everything a status change does, worked out before anything is written.
#[derive(Debug, Clone)]
pub struct TransitionPlan {
    pub order_id: String,
    pub customer_id: String,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub restock: Vec<Restock>,
    /// Taken off the customer's credit balance (clamped at zero by the store).
    pub credit_reversal: Decimal,
    pub note: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub complete_delivery: Option<DeliveryCompletion>,
}

impl TransitionPlan {
    pub fn inventory_restored(&self) -> bool {
        !self.restock.is_empty()
    }

    /// Apply the order-row part of the plan.
    pub fn apply_to(&self, order: &mut Order, now: DateTime<Utc>) {
        order.status = self.to;
        if let Some(note) = &self.note {
            order.append_note(note);
        }
        if let Some(date) = self.delivery_date {
            order.delivery_date = Some(date);
        }
        order.updated_at = now;
    }
}

/// Drives the order status state machine
///
/// `pending → processing → delivered`, and `pending | processing → cancelled`.
/// `delivered` and `cancelled` are terminal.
pub struct OrderManager;

impl OrderManager {
    pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
        matches!(
            (from, to),
            (OrderStatus::Pending, OrderStatus::Processing)
                | (OrderStatus::Processing, OrderStatus::Delivered)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Processing, OrderStatus::Cancelled)
        )
    }

    /// Work out the side effects of moving `detail` to `to`.
    pub fn plan_transition(
        detail: &OrderDetail,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<TransitionPlan, OrderError> {
        let order = &detail.order;

        if !Self::can_transition(order.status, to) {
            return Err(OrderError::InvalidTransition {
                from: order.status.to_string(),
                to: to.to_string(),
            });
        }

        let mut plan = TransitionPlan {
            order_id: order.order_id.clone(),
            customer_id: order.customer_id.clone(),
            from: order.status,
            to,
            restock: Vec::new(),
            credit_reversal: Decimal::ZERO,
            note: None,
            delivery_date: None,
            complete_delivery: None,
        };

        match to {
            OrderStatus::Cancelled => {
                plan.restock = restock_by_batch(
                    detail
                        .items
                        .iter()
                        .map(|item| (item.product_id.as_str(), item.batch_id.as_str(), item.quantity)),
                )?;

                if order.payment_type == PaymentType::Credit
                    && order.payment_status != PaymentStatus::Paid
                {
                    plan.credit_reversal = order.total_amount;
                }

                // Payments stay on record; refunds are handled by hand.
                let paid = detail.total_paid();
                plan.note = Some(if paid > Decimal::ZERO {
                    format!("Cancelled: manual refund required for {} already paid", paid)
                } else {
                    "Cancelled".to_string()
                });
            }
            OrderStatus::Delivered => {
                if order.delivery_date.is_none() {
                    plan.delivery_date = Some(now.date_naive());
                }
                plan.complete_delivery = detail
                    .delivery
                    .as_ref()
                    .filter(|d| d.status != DeliveryStatus::Delivered)
                    .map(|d| DeliveryCompletion {
                        delivery_id: d.delivery_id.clone(),
                        vehicle_id: d.vehicle_id.clone(),
                        delivered_at: now,
                    });
            }
            OrderStatus::Processing | OrderStatus::Pending => {}
        }

        Ok(plan)
    }
}

/// One restock per (product, batch), ordered by batch id so every writer
/// locks batch rows in the same order.
pub fn restock_by_batch<'a>(
    units: impl IntoIterator<Item = (&'a str, &'a str, i32)>,
) -> Result<Vec<Restock>, OrderError> {
    let mut out: Vec<Restock> = Vec::new();
    for (product_id, batch_id, quantity) in units {
        match out
            .iter_mut()
            .find(|r| r.product_id == product_id && r.batch_id == batch_id)
        {
            Some(existing) => {
                existing.quantity = existing.quantity.checked_add(quantity).ok_or_else(|| {
                    OrderError::Validation(format!("restock for batch {} is too large", batch_id))
                })?;
            }
            None => out.push(Restock {
                product_id: product_id.to_string(),
                batch_id: batch_id.to_string(),
                quantity,
            }),
        }
    }
    out.sort_by(|a, b| a.batch_id.cmp(&b.batch_id).then_with(|| a.product_id.cmp(&b.product_id)));
    Ok(out)
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Invalid order: {0}")]
    Validation(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: String,
        to: String,
    },

    #[error("Order {order_id} cannot accept this operation: {reason}")]
    InvalidState {
        order_id: String,
        reason: String,
    },
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_order_lifecycle() {
        let now = Utc::now();
        let mut d = detail(PaymentType::Cash, OrderStatus::Pending, vec![item(1, "B1", 5, 100, 0)]);

        // Pending → Processing
        let plan = OrderManager::plan_transition(&d, OrderStatus::Processing, now).unwrap();
        assert!(!plan.inventory_restored());
        plan.apply_to(&mut d.order, now);
        assert_eq!(d.order.status, OrderStatus::Processing);

        // Processing → Delivered
        let plan = OrderManager::plan_transition(&d, OrderStatus::Delivered, now).unwrap();
        plan.apply_to(&mut d.order, now);
        assert_eq!(d.order.status, OrderStatus::Delivered);
        assert_eq!(d.order.delivery_date, Some(now.date_naive()));
    }

    #[test]
    fn test_invalid_transition() {
        let now = Utc::now();
        let d = detail(PaymentType::Cash, OrderStatus::Pending, vec![]);

        // Cannot skip processing
        let err = OrderManager::plan_transition(&d, OrderStatus::Delivered, now).unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));

        // Nor stay put
        assert!(OrderManager::plan_transition(&d, OrderStatus::Pending, now).is_err());
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        let now = Utc::now();
        for terminal in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            let d = detail(PaymentType::Credit, terminal, vec![item(1, "B1", 5, 100, 0)]);
            for to in [
                OrderStatus::Pending,
                OrderStatus::Processing,
                OrderStatus::Delivered,
                OrderStatus::Cancelled,
            ] {
                let err = OrderManager::plan_transition(&d, to, now).unwrap_err();
                assert!(matches!(err, OrderError::InvalidTransition { .. }));
            }
        }
    }

    #[test]
    fn test_cancel_restocks_every_item_and_reverses_credit() {
        let d = detail(
            PaymentType::Credit,
            OrderStatus::Processing,
            vec![item(1, "B1", 5, 100, 0), item(2, "B2", 3, 120, 0)],
        );

        let plan = OrderManager::plan_transition(&d, OrderStatus::Cancelled, Utc::now()).unwrap();

        assert!(plan.inventory_restored());
        assert_eq!(plan.restock.len(), 2);
        assert_eq!(plan.restock[0].batch_id, "B1");
        assert_eq!(plan.restock[0].quantity, 5);
        assert_eq!(plan.restock[1].quantity, 3);
        assert_eq!(plan.credit_reversal, Decimal::new(860, 2));
        assert_eq!(plan.note.as_deref(), Some("Cancelled"));
    }

    #[test]
    fn test_cancel_restocks_in_batch_order() {
        let d = detail(
            PaymentType::Cash,
            OrderStatus::Pending,
            vec![item(1, "B2", 3, 120, 0), item(2, "B1", 5, 100, 0), item(3, "B2", 2, 120, 0)],
        );

        let plan = OrderManager::plan_transition(&d, OrderStatus::Cancelled, Utc::now()).unwrap();

        let restock: Vec<(&str, i32)> = plan.restock.iter().map(|r| (r.batch_id.as_str(), r.quantity)).collect();
        assert_eq!(restock, vec![("B1", 5), ("B2", 5)]);
    }

    #[test]
    fn test_cancel_paid_credit_order_keeps_credit() {
        let mut d = detail(PaymentType::Credit, OrderStatus::Pending, vec![item(1, "B1", 1, 1000, 0)]);
        d.order.payment_status = PaymentStatus::Paid;
        d.payments.push(payment(1, 1000));

        let plan = OrderManager::plan_transition(&d, OrderStatus::Cancelled, Utc::now()).unwrap();
        assert_eq!(plan.credit_reversal, Decimal::ZERO);
        assert_eq!(
            plan.note.as_deref(),
            Some("Cancelled: manual refund required for 10.00 already paid")
        );
    }

    #[test]
    fn test_cancel_cash_order_has_no_credit_effect() {
        let d = detail(PaymentType::Cash, OrderStatus::Pending, vec![item(1, "B1", 1, 1000, 0)]);
        let plan = OrderManager::plan_transition(&d, OrderStatus::Cancelled, Utc::now()).unwrap();
        assert_eq!(plan.credit_reversal, Decimal::ZERO);
    }

    #[test]
    fn test_deliver_closes_delivery_and_frees_vehicle() {
        let mut d = detail(PaymentType::Cash, OrderStatus::Processing, vec![]);
        d.delivery = Some(delivery(Some("VEH01")));

        let plan = OrderManager::plan_transition(&d, OrderStatus::Delivered, Utc::now()).unwrap();
        let completion = plan.complete_delivery.unwrap();
        assert_eq!(completion.delivery_id, "DEL001");
        assert_eq!(completion.vehicle_id.as_deref(), Some("VEH01"));
    }

    #[test]
    fn test_cancel_note_appends_to_existing_notes() {
        let mut d = detail(PaymentType::Cash, OrderStatus::Pending, vec![]);
        d.order.notes = Some("Leave at back door".to_string());

        let now = Utc::now();
        let plan = OrderManager::plan_transition(&d, OrderStatus::Cancelled, now).unwrap();
        plan.apply_to(&mut d.order, now);

        assert_eq!(d.order.notes.as_deref(), Some("Leave at back door\nCancelled"));
    }
}
