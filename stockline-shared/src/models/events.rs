use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderPlacedEvent {
    pub event_id: Uuid,
    pub order_id: String,
    pub customer_id: String,
    pub sales_rep_id: String,
    pub payment_type: String,
    pub total_amount: Decimal,
    pub line_count: usize,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderStatusChangedEvent {
    pub event_id: Uuid,
    pub order_id: String,
    pub previous_status: String,
    pub new_status: String,
    pub inventory_restored: bool,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PaymentRecordedEvent {
    pub event_id: Uuid,
    pub order_id: String,
    pub payment_id: String,
    pub amount: Decimal,
    pub payment_status: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ReturnProcessedEvent {
    pub event_id: Uuid,
    pub order_id: String,
    pub return_id: String,
    pub total_return_amount: Decimal,
    pub final_amount: Decimal,
    pub timestamp: i64,
}

/// Everything the fulfillment core announces after a successful commit.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentEvent {
    OrderPlaced(OrderPlacedEvent),
    OrderStatusChanged(OrderStatusChangedEvent),
    PaymentRecorded(PaymentRecordedEvent),
    ReturnProcessed(ReturnProcessedEvent),
}

impl FulfillmentEvent {
    /// Name used as the SSE event type.
    pub fn kind(&self) -> &'static str {
        match self {
            FulfillmentEvent::OrderPlaced(_) => "order_placed",
            FulfillmentEvent::OrderStatusChanged(_) => "order_status_changed",
            FulfillmentEvent::PaymentRecorded(_) => "payment_recorded",
            FulfillmentEvent::ReturnProcessed(_) => "return_processed",
        }
    }

    pub fn order_id(&self) -> &str {
        match self {
            FulfillmentEvent::OrderPlaced(e) => &e.order_id,
            FulfillmentEvent::OrderStatusChanged(e) => &e.order_id,
            FulfillmentEvent::PaymentRecorded(e) => &e.order_id,
            FulfillmentEvent::ReturnProcessed(e) => &e.order_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_tagged_by_type() {
        let event = FulfillmentEvent::PaymentRecorded(PaymentRecordedEvent {
            event_id: Uuid::new_v4(),
            order_id: "ORD-000001".to_string(),
            payment_id: "PAY-000001".to_string(),
            amount: Decimal::new(2500, 2),
            payment_status: "partial".to_string(),
            timestamp: 0,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PAYMENT_RECORDED");
        assert_eq!(json["order_id"], "ORD-000001");
        assert_eq!(event.kind(), "payment_recorded");
        assert_eq!(event.order_id(), "ORD-000001");
    }
}
