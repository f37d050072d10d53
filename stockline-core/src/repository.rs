use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use stockline_catalog::{Batch, Product};
use stockline_order::{Order, OrderDetail, OrderDraft, OrderReturn, OrderStatus, Payment, PaymentStatus};

use crate::requests::{ProcessReturnRequest, RecordPaymentRequest};
use crate::CoreResult;

/// Read access to products and their batches.
#[async_trait]
pub trait BatchLedger: Send + Sync {
    async fn get_product(&self, product_id: &str) -> CoreResult<Option<Product>>;

    /// Active batches of the product still holding stock, in FEFO order.
    async fn list_active_batches(&self, product_id: &str) -> CoreResult<Vec<Batch>>;

    /// Every active batch of the product, including emptied or corrected-negative ones.
    async fn list_product_batches(&self, product_id: &str) -> CoreResult<Vec<Batch>>;
}

/// Transactional order writes.
///
/// Each method is one atomic unit: either every write it implies is applied,
/// or none is. Implementations load the order under a lock, run the domain
/// planner against it and apply the resulting plan.
#[async_trait]
pub trait FulfillmentStore: Send + Sync {
    /// Consume every line's batch, insert the order and its items, and grant
    /// credit for credit orders.
    async fn place_order(&self, draft: OrderDraft) -> CoreResult<OrderDetail>;

    async fn get_order(&self, order_id: &str) -> CoreResult<Option<OrderDetail>>;

    async fn transition_order(&self, order_id: &str, to: OrderStatus) -> CoreResult<TransitionOutcome>;

    async fn record_payment(
        &self,
        order_id: &str,
        payment: &RecordPaymentRequest,
        tolerance: Decimal,
    ) -> CoreResult<PaymentOutcome>;

    async fn process_return(&self, order_id: &str, request: &ProcessReturnRequest) -> CoreResult<ReturnOutcome>;
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub order: Order,
    pub previous_status: OrderStatus,
    pub inventory_restored: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub payment_status: PaymentStatus,
    pub total_paid: Decimal,
    pub overpaid_by: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnOutcome {
    pub order_return: OrderReturn,
    pub final_amount: Decimal,
}
