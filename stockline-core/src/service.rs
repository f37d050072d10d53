use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use stockline_catalog::{Allocation, FefoAllocator, StockLevel};
use stockline_order::OrderDetail;
use stockline_shared::models::events::{
    OrderPlacedEvent, OrderStatusChangedEvent, PaymentRecordedEvent, ReturnProcessedEvent,
};
use stockline_shared::{FulfillmentEvent, MONEY_TOLERANCE};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::repository::{BatchLedger, FulfillmentStore};
use crate::requests::{
    AllocationRequest, CreateOrderRequest, CreateOrderResponse, PaymentResponse, ProcessReturnRequest,
    RecordPaymentRequest, ReturnResponse, StatusUpdateRequest, StatusUpdateResponse,
};
use crate::{CoreError, CoreResult};

/// Tunables of the fulfillment core.
#[derive(Debug, Deserialize, Clone)]
pub struct FulfillmentRules {
    /// How close the paid sum must get to the order total to count as paid.
    #[serde(default = "default_tolerance")]
    pub payment_tolerance: Decimal,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_tolerance() -> Decimal { MONEY_TOLERANCE }
fn default_event_buffer() -> usize { 100 }

impl Default for FulfillmentRules {
    fn default() -> Self {
        Self {
            payment_tolerance: default_tolerance(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Entry point for every fulfillment operation.
///
/// Validates requests, hands the transactional work to the store and
/// announces what was committed.
pub struct FulfillmentService {
    ledger: Arc<dyn BatchLedger>,
    store: Arc<dyn FulfillmentStore>,
    events: broadcast::Sender<FulfillmentEvent>,
    rules: FulfillmentRules,
}

impl FulfillmentService {
    pub fn new(ledger: Arc<dyn BatchLedger>, store: Arc<dyn FulfillmentStore>, rules: FulfillmentRules) -> Self {
        let (events, _) = broadcast::channel(rules.event_buffer.max(1));
        Self { ledger, store, events, rules }
    }

    pub fn rules(&self) -> &FulfillmentRules {
        &self.rules
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FulfillmentEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: FulfillmentEvent) {
        // No subscriber is fine.
        let _ = self.events.send(event);
    }

    /// Quote a FEFO allocation. Reads only.
    pub async fn allocate(&self, req: AllocationRequest) -> CoreResult<Allocation> {
        req.validate()?;

        let product = self
            .ledger
            .get_product(&req.product_id)
            .await?
            .ok_or_else(|| CoreError::not_found("product", &req.product_id))?;
        if !product.is_active {
            return Err(CoreError::ValidationError(format!(
                "product {} is not active",
                req.product_id
            )));
        }

        let batches = self.ledger.list_active_batches(&req.product_id).await?;
        let mut allocation = match FefoAllocator::allocate(&req.product_id, &batches, req.quantity) {
            Ok(allocation) => allocation,
            Err(e) => {
                warn!("Allocation rejected for product {}: {}", req.product_id, e);
                return Err(e.into());
            }
        };
        allocation.apply_discount(req.discount)?;

        info!(
            "Allocated {} of product {} across {} batch(es)",
            req.quantity,
            req.product_id,
            allocation.lines.len()
        );
        Ok(allocation)
    }

    pub async fn create_order(&self, req: CreateOrderRequest) -> CoreResult<CreateOrderResponse> {
        req.validate()?;
        let draft = req.into_draft()?;

        let detail = match self.store.place_order(draft).await {
            Ok(detail) => detail,
            Err(e @ CoreError::InsufficientStock { .. }) => {
                warn!("Order rejected: {}", e);
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        let order = &detail.order;

        info!(
            "Order {} placed for customer {}: {} item(s), total {}",
            order.order_id,
            order.customer_id,
            detail.items.len(),
            order.total_amount
        );

        self.publish(FulfillmentEvent::OrderPlaced(OrderPlacedEvent {
            event_id: Uuid::new_v4(),
            order_id: order.order_id.clone(),
            customer_id: order.customer_id.clone(),
            sales_rep_id: order.sales_rep_id.clone(),
            payment_type: order.payment_type.to_string(),
            total_amount: order.total_amount,
            line_count: detail.items.len(),
            timestamp: Utc::now().timestamp(),
        }));

        Ok(CreateOrderResponse {
            order_id: order.order_id.clone(),
            total_amount: order.total_amount,
            items: detail.items,
        })
    }

    pub async fn get_order(&self, order_id: &str) -> CoreResult<OrderDetail> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("order", order_id))
    }

    pub async fn update_order_status(
        &self,
        order_id: &str,
        req: StatusUpdateRequest,
    ) -> CoreResult<StatusUpdateResponse> {
        let outcome = self.store.transition_order(order_id, req.status).await?;

        info!(
            "Order {} moved {} -> {} (inventory restored: {})",
            order_id, outcome.previous_status, outcome.order.status, outcome.inventory_restored
        );

        self.publish(FulfillmentEvent::OrderStatusChanged(OrderStatusChangedEvent {
            event_id: Uuid::new_v4(),
            order_id: order_id.to_string(),
            previous_status: outcome.previous_status.to_string(),
            new_status: outcome.order.status.to_string(),
            inventory_restored: outcome.inventory_restored,
            timestamp: Utc::now().timestamp(),
        }));

        Ok(StatusUpdateResponse {
            order_id: order_id.to_string(),
            previous_status: outcome.previous_status,
            status: outcome.order.status,
            inventory_restored: outcome.inventory_restored,
        })
    }

    pub async fn record_payment(&self, order_id: &str, req: RecordPaymentRequest) -> CoreResult<PaymentResponse> {
        req.validate()?;

        let outcome = self
            .store
            .record_payment(order_id, &req, self.rules.payment_tolerance)
            .await?;

        if let Some(excess) = outcome.overpaid_by {
            warn!("Order {} overpaid by {}", order_id, excess);
        }
        info!(
            "Payment {} of {} recorded on order {} ({})",
            outcome.payment.payment_id, outcome.payment.amount, order_id, outcome.payment_status
        );

        self.publish(FulfillmentEvent::PaymentRecorded(PaymentRecordedEvent {
            event_id: Uuid::new_v4(),
            order_id: order_id.to_string(),
            payment_id: outcome.payment.payment_id.clone(),
            amount: outcome.payment.amount,
            payment_status: outcome.payment_status.to_string(),
            timestamp: Utc::now().timestamp(),
        }));

        Ok(PaymentResponse {
            order_id: order_id.to_string(),
            payment_id: outcome.payment.payment_id,
            amount: outcome.payment.amount,
            total_paid: outcome.total_paid,
            new_payment_status: outcome.payment_status,
        })
    }

    pub async fn process_return(&self, order_id: &str, req: ProcessReturnRequest) -> CoreResult<ReturnResponse> {
        req.validate()?;

        let outcome = self.store.process_return(order_id, &req).await?;
        let record = &outcome.order_return;

        info!(
            "Return {} processed on order {}: {} item(s), amount {}, final amount {}",
            record.return_id,
            order_id,
            record.items.len(),
            record.total_return_amount,
            outcome.final_amount
        );

        self.publish(FulfillmentEvent::ReturnProcessed(ReturnProcessedEvent {
            event_id: Uuid::new_v4(),
            order_id: order_id.to_string(),
            return_id: record.return_id.clone(),
            total_return_amount: record.total_return_amount,
            final_amount: outcome.final_amount,
            timestamp: Utc::now().timestamp(),
        }));

        Ok(ReturnResponse {
            order_id: order_id.to_string(),
            return_id: record.return_id.clone(),
            total_return_amount: record.total_return_amount,
            final_amount: outcome.final_amount,
        })
    }

    pub async fn stock_level(&self, product_id: &str) -> CoreResult<StockLevel> {
        let product = self
            .ledger
            .get_product(product_id)
            .await?
            .ok_or_else(|| CoreError::not_found("product", product_id))?;
        let batches = self.ledger.list_product_batches(product_id).await?;
        Ok(StockLevel::from_batches(&product, &batches))
    }
}
