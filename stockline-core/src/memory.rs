//! In-process implementation of the storage traits.
//!
//! Every write works on a staged copy of the whole state, which replaces the
//! live state only when the operation succeeds. Holding the mutex across the
//! operation serializes writers the way row locks do in PostgreSQL.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use stockline_catalog::{fefo_order, Batch, Product};
use stockline_order::{
    Customer, Delivery, DeliveryStatus, FinancialManager, Order, OrderDetail, OrderDraft, OrderItem,
    OrderManager, OrderReturn, OrderStatus, Payment, ReturnProcessor, Vehicle,
};
use stockline_shared::{CodeKind, DisplayCode};
use tokio::sync::Mutex;

use crate::repository::{BatchLedger, FulfillmentStore, PaymentOutcome, ReturnOutcome, TransitionOutcome};
use crate::requests::{ProcessReturnRequest, RecordPaymentRequest};
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: BTreeMap<String, Product>,
    batches: BTreeMap<String, Batch>,
    customers: BTreeMap<String, Customer>,
    vehicles: BTreeMap<String, Vehicle>,
    orders: BTreeMap<String, Order>,
    items: Vec<OrderItem>,
    payments: Vec<Payment>,
    /// Keyed by order id; one return per order.
    returns: BTreeMap<String, OrderReturn>,
    /// Keyed by order id.
    deliveries: BTreeMap<String, Delivery>,
    sequences: HashMap<CodeKind, i64>,
}

impl MemoryState {
    fn next_code(&mut self, kind: CodeKind) -> String {
        let seq = self.sequences.entry(kind).or_insert(0);
        *seq += 1;
        DisplayCode::new(kind, *seq).to_string()
    }

    fn detail(&self, order_id: &str) -> Option<OrderDetail> {
        let order = self.orders.get(order_id)?.clone();

        let mut items: Vec<OrderItem> = self
            .items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.line_no);

        Some(OrderDetail {
            order,
            items,
            payments: self
                .payments
                .iter()
                .filter(|p| p.order_id == order_id)
                .cloned()
                .collect(),
            order_return: self.returns.get(order_id).cloned(),
            delivery: self.deliveries.get(order_id).cloned(),
        })
    }

    fn load(&self, order_id: &str) -> CoreResult<OrderDetail> {
        self.detail(order_id)
            .ok_or_else(|| CoreError::not_found("order", order_id))
    }

    fn batch_mut(&mut self, batch_id: &str) -> CoreResult<&mut Batch> {
        self.batches
            .get_mut(batch_id)
            .ok_or_else(|| CoreError::not_found("batch", batch_id))
    }

    fn customer_mut(&mut self, customer_id: &str) -> CoreResult<&mut Customer> {
        self.customers
            .get_mut(customer_id)
            .ok_or_else(|| CoreError::not_found("customer", customer_id))
    }

    fn order_mut(&mut self, order_id: &str) -> CoreResult<&mut Order> {
        self.orders
            .get_mut(order_id)
            .ok_or_else(|| CoreError::not_found("order", order_id))
    }

    fn reduce_credit(&mut self, customer_id: &str, amount: Decimal) -> CoreResult<()> {
        if amount > Decimal::ZERO {
            let customer = self.customer_mut(customer_id)?;
            customer.credit_balance = FinancialManager::reduce_credit(customer.credit_balance, amount);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` against a staged copy and keep the result only on success.
    async fn transact<T>(&self, op: impl FnOnce(&mut MemoryState) -> CoreResult<T>) -> CoreResult<T> {
        let mut guard = self.state.lock().await;
        let mut staged = guard.clone();
        let out = op(&mut staged)?;
        *guard = staged;
        Ok(out)
    }

    pub async fn add_product(&self, product: Product) {
        let mut state = self.state.lock().await;
        state.products.insert(product.product_id.clone(), product);
    }

    pub async fn add_batch(&self, batch: Batch) {
        let mut state = self.state.lock().await;
        state.batches.insert(batch.batch_id.clone(), batch);
    }

    pub async fn add_customer(&self, customer: Customer) {
        let mut state = self.state.lock().await;
        state.customers.insert(customer.customer_id.clone(), customer);
    }

    pub async fn add_vehicle(&self, vehicle: Vehicle) {
        let mut state = self.state.lock().await;
        state.vehicles.insert(vehicle.vehicle_id.clone(), vehicle);
    }

    /// Attach a delivery to an existing order. Its vehicle, if any, becomes busy.
    pub async fn add_delivery(&self, delivery: Delivery) -> CoreResult<()> {
        self.transact(|state| {
            if !state.orders.contains_key(&delivery.order_id) {
                return Err(CoreError::not_found("order", &delivery.order_id));
            }
            if let Some(vehicle_id) = &delivery.vehicle_id {
                let vehicle = state
                    .vehicles
                    .get_mut(vehicle_id)
                    .ok_or_else(|| CoreError::not_found("vehicle", vehicle_id))?;
                vehicle.is_available = false;
            }
            state.deliveries.insert(delivery.order_id.clone(), delivery);
            Ok(())
        })
        .await
    }

    pub async fn batch(&self, batch_id: &str) -> Option<Batch> {
        self.state.lock().await.batches.get(batch_id).cloned()
    }

    pub async fn customer(&self, customer_id: &str) -> Option<Customer> {
        self.state.lock().await.customers.get(customer_id).cloned()
    }

    pub async fn vehicle(&self, vehicle_id: &str) -> Option<Vehicle> {
        self.state.lock().await.vehicles.get(vehicle_id).cloned()
    }

    /// A small catalog for running the service without a database.
    pub fn demo() -> Self {
        let mut state = MemoryState::default();
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
        let received = Utc::now().date_naive();

        for (id, name, reorder_level) in [("PRD001", "Tea 100g", 20), ("PRD002", "Biscuits 200g", 10)] {
            state.products.insert(
                id.to_string(),
                Product {
                    product_id: id.to_string(),
                    name: name.to_string(),
                    reorder_level,
                    is_active: true,
                },
            );
        }

        let lots = [
            ("B1", "PRD001", 5, date(2025, 1, 1), Decimal::new(100, 2)),
            ("B2", "PRD001", 10, date(2025, 2, 1), Decimal::new(120, 2)),
            ("B3", "PRD002", 40, None, Decimal::new(250, 2)),
        ];
        for (id, product_id, quantity, expiry_date, selling_price) in lots {
            state.batches.insert(
                id.to_string(),
                Batch {
                    batch_id: id.to_string(),
                    product_id: product_id.to_string(),
                    supplier_id: "SUP001".to_string(),
                    supplier_name: Some("Lanka Wholesale".to_string()),
                    batch_number: format!("LOT-{}", id),
                    manufacturing_date: None,
                    expiry_date,
                    received_date: received,
                    cost_price: selling_price * Decimal::new(8, 1),
                    selling_price,
                    initial_quantity: quantity,
                    current_quantity: quantity,
                    is_active: true,
                },
            );
        }

        state.customers.insert(
            "CUS001".to_string(),
            Customer {
                customer_id: "CUS001".to_string(),
                name: "Corner Store".to_string(),
                credit_balance: Decimal::ZERO,
            },
        );
        state.vehicles.insert(
            "VEH001".to_string(),
            Vehicle {
                vehicle_id: "VEH001".to_string(),
                registration: "WP-1234".to_string(),
                is_available: true,
            },
        );

        Self { state: Mutex::new(state) }
    }
}

#[async_trait]
impl BatchLedger for MemoryStore {
    async fn get_product(&self, product_id: &str) -> CoreResult<Option<Product>> {
        Ok(self.state.lock().await.products.get(product_id).cloned())
    }

    async fn list_active_batches(&self, product_id: &str) -> CoreResult<Vec<Batch>> {
        let state = self.state.lock().await;
        let mut batches: Vec<Batch> = state
            .batches
            .values()
            .filter(|b| b.product_id == product_id && b.is_allocatable())
            .cloned()
            .collect();
        batches.sort_by(fefo_order);
        Ok(batches)
    }

    async fn list_product_batches(&self, product_id: &str) -> CoreResult<Vec<Batch>> {
        let state = self.state.lock().await;
        Ok(state
            .batches
            .values()
            .filter(|b| b.product_id == product_id && b.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl FulfillmentStore for MemoryStore {
    async fn place_order(&self, draft: OrderDraft) -> CoreResult<OrderDetail> {
        self.transact(|state| {
            if !state.customers.contains_key(&draft.customer_id) {
                return Err(CoreError::not_found("customer", &draft.customer_id));
            }

            for (product_id, batch_id, quantity) in draft.quantities_by_batch() {
                let batch = state.batch_mut(&batch_id)?;
                if batch.product_id != product_id {
                    return Err(CoreError::ValidationError(format!(
                        "batch {} does not belong to product {}",
                        batch_id, product_id
                    )));
                }
                if !batch.is_active {
                    return Err(CoreError::ValidationError(format!("batch {} is inactive", batch_id)));
                }
                batch.consume(quantity)?;
            }

            let credit = draft.credit_increment();
            if credit > Decimal::ZERO {
                state.customer_mut(&draft.customer_id)?.credit_balance += credit;
            }

            let order_id = state.next_code(CodeKind::Order);
            let item_ids = (0..draft.lines.len())
                .map(|_| state.next_code(CodeKind::OrderItem))
                .collect();
            let (order, items) = draft.into_order(order_id.clone(), item_ids, Utc::now())?;

            state.orders.insert(order_id.clone(), order);
            state.items.extend(items);
            state.load(&order_id)
        })
        .await
    }

    async fn get_order(&self, order_id: &str) -> CoreResult<Option<OrderDetail>> {
        Ok(self.state.lock().await.detail(order_id))
    }

    async fn transition_order(&self, order_id: &str, to: OrderStatus) -> CoreResult<TransitionOutcome> {
        self.transact(|state| {
            let detail = state.load(order_id)?;
            let now = Utc::now();
            let plan = OrderManager::plan_transition(&detail, to, now)?;

            for restock in &plan.restock {
                state.batch_mut(&restock.batch_id)?.restock(restock.quantity)?;
            }
            state.reduce_credit(&plan.customer_id, plan.credit_reversal)?;

            if let Some(done) = &plan.complete_delivery {
                if let Some(delivery) = state.deliveries.get_mut(order_id) {
                    delivery.status = DeliveryStatus::Delivered;
                    delivery.delivered_at = Some(done.delivered_at);
                }
                if let Some(vehicle) = done.vehicle_id.as_ref().and_then(|v| state.vehicles.get_mut(v)) {
                    vehicle.is_available = true;
                }
            }

            let order = state.order_mut(order_id)?;
            plan.apply_to(order, now);

            Ok(TransitionOutcome {
                order: order.clone(),
                previous_status: plan.from,
                inventory_restored: plan.inventory_restored(),
            })
        })
        .await
    }

    async fn record_payment(
        &self,
        order_id: &str,
        payment: &RecordPaymentRequest,
        tolerance: Decimal,
    ) -> CoreResult<PaymentOutcome> {
        self.transact(|state| {
            let detail = state.load(order_id)?;
            let plan = FinancialManager::plan_payment(
                &detail,
                payment.amount,
                payment.method,
                &payment.received_by,
                tolerance,
            )?;

            let now = Utc::now();
            let record = Payment {
                payment_id: state.next_code(CodeKind::Payment),
                order_id: order_id.to_string(),
                amount: plan.amount,
                method: plan.method,
                received_by: plan.received_by.clone(),
                paid_at: now,
            };
            state.payments.push(record.clone());
            state.reduce_credit(&plan.customer_id, plan.credit_decrement)?;

            let order = state.order_mut(order_id)?;
            order.payment_status = plan.new_status;
            order.updated_at = now;

            Ok(PaymentOutcome {
                payment: record,
                payment_status: plan.new_status,
                total_paid: plan.total_paid,
                overpaid_by: plan.overpaid_by,
            })
        })
        .await
    }

    async fn process_return(&self, order_id: &str, request: &ProcessReturnRequest) -> CoreResult<ReturnOutcome> {
        self.transact(|state| {
            let detail = state.load(order_id)?;
            let plan = ReturnProcessor::plan_return(&detail, &request.processed_by, &request.reason, &request.items)?;

            for restock in plan.restocks()? {
                state.batch_mut(&restock.batch_id)?.restock(restock.quantity)?;
            }
            state.reduce_credit(&plan.customer_id, plan.credit_reversal)?;

            let now = Utc::now();
            let final_amount = plan.final_amount;
            let order = state.order_mut(order_id)?;
            order.final_amount = final_amount;
            order.updated_at = now;

            let return_id = state.next_code(CodeKind::Return);
            let item_ids = (0..plan.items.len())
                .map(|_| state.next_code(CodeKind::ReturnItem))
                .collect();
            let record = plan.into_record(return_id, item_ids, now)?;
            state.returns.insert(order_id.to_string(), record.clone());

            Ok(ReturnOutcome { order_return: record, final_amount })
        })
        .await
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use stockline_order::{PaymentMethod, PaymentStatus, PaymentType, ReturnLine};
    use stockline_shared::MONEY_TOLERANCE;

    async fn quantity(store: &MemoryStore, batch_id: &str) -> i32 {
        store.batch(batch_id).await.unwrap().current_quantity
    }

    async fn credit(store: &MemoryStore) -> Decimal {
        store.customer("CUS001").await.unwrap().credit_balance
    }

    #[tokio::test]
    async fn test_ledger_lists_fefo_and_skips_empty() {
        let store = seeded_store().await;
        let mut empty = batch("B0", "PRD001", 0, Some((2024, 12, 1)), 100);
        store.add_batch(empty.clone()).await;
        empty.batch_id = "B_OFF".to_string();
        empty.current_quantity = 7;
        empty.is_active = false;
        store.add_batch(empty).await;

        let ids: Vec<String> = store
            .list_active_batches("PRD001")
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.batch_id)
            .collect();
        assert_eq!(ids, vec!["B1", "B2"]);

        // Emptied batches still count toward the aggregate; inactive ones do not.
        assert_eq!(store.list_product_batches("PRD001").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_place_order_decrements_and_grants_credit() {
        let store = seeded_store().await;
        let detail = store
            .place_order(draft(PaymentType::Credit, &[("PRD001", "B1", 5, 100), ("PRD001", "B2", 3, 120)]))
            .await
            .unwrap();

        assert_eq!(detail.order.order_id, "ORD-000001");
        assert_eq!(detail.items[0].order_item_id, "OI-000001");
        assert_eq!(detail.items[1].order_item_id, "OI-000002");
        assert_eq!(quantity(&store, "B1").await, 0);
        assert_eq!(quantity(&store, "B2").await, 7);
        assert_eq!(credit(&store).await, Decimal::new(860, 2));
    }

    #[tokio::test]
    async fn test_failed_order_leaves_no_trace() {
        let store = seeded_store().await;

        // B1 would succeed, B2 is short: nothing may survive.
        let err = store
            .place_order(draft(PaymentType::Credit, &[("PRD001", "B1", 2, 100), ("PRD001", "B2", 11, 120)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock { ref batch_id, requested: 11, available: 10, .. } if batch_id.as_deref() == Some("B2")
        ));

        assert_eq!(quantity(&store, "B1").await, 5);
        assert_eq!(quantity(&store, "B2").await, 10);
        assert_eq!(credit(&store).await, Decimal::ZERO);
        assert!(store.get_order("ORD-000001").await.unwrap().is_none());

        // The counter did not move either.
        let detail = store
            .place_order(draft(PaymentType::Cash, &[("PRD001", "B1", 1, 100)]))
            .await
            .unwrap();
        assert_eq!(detail.order.order_id, "ORD-000001");
    }

    #[tokio::test]
    async fn test_duplicate_batch_lines_are_checked_together() {
        let store = seeded_store().await;
        let err = store
            .place_order(draft(PaymentType::Cash, &[("PRD001", "B1", 3, 100), ("PRD001", "B1", 3, 100)]))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { requested: 6, available: 5, .. }));
        assert_eq!(quantity(&store, "B1").await, 5);
    }

    #[tokio::test]
    async fn test_place_order_reference_errors() {
        let store = seeded_store().await;

        let err = store
            .place_order(draft(PaymentType::Cash, &[("PRD001", "NOPE", 1, 100)]))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "batch", .. }));

        let err = store
            .place_order(draft(PaymentType::Cash, &[("PRD002", "B1", 1, 100)]))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));

        let mut unknown = draft(PaymentType::Cash, &[("PRD001", "B1", 1, 100)]);
        unknown.customer_id = "CUS404".to_string();
        let err = store.place_order(unknown).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "customer", .. }));
    }

    #[tokio::test]
    async fn test_cancel_is_inverse_of_creation() {
        let store = seeded_store().await;
        let detail = store
            .place_order(draft(PaymentType::Credit, &[("PRD001", "B1", 5, 100), ("PRD001", "B2", 3, 120)]))
            .await
            .unwrap();
        let id = detail.order.order_id;

        store.transition_order(&id, OrderStatus::Processing).await.unwrap();
        let outcome = store.transition_order(&id, OrderStatus::Cancelled).await.unwrap();

        assert_eq!(outcome.previous_status, OrderStatus::Processing);
        assert!(outcome.inventory_restored);
        assert_eq!(quantity(&store, "B1").await, 5);
        assert_eq!(quantity(&store, "B2").await, 10);
        assert_eq!(credit(&store).await, Decimal::ZERO);
        assert_eq!(outcome.order.notes.as_deref(), Some("Cancelled"));

        // Terminal: a second cancel must not restock again.
        let err = store.transition_order(&id, OrderStatus::Cancelled).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        assert_eq!(quantity(&store, "B1").await, 5);
        assert_eq!(quantity(&store, "B2").await, 10);
    }

    #[tokio::test]
    async fn test_deliver_completes_delivery_and_frees_vehicle() {
        let store = seeded_store().await;
        let id = store
            .place_order(draft(PaymentType::Cash, &[("PRD002", "B9", 4, 300)]))
            .await
            .unwrap()
            .order
            .order_id;
        store
            .add_delivery(Delivery {
                delivery_id: "DEL001".to_string(),
                order_id: id.clone(),
                vehicle_id: Some("VEH01".to_string()),
                status: DeliveryStatus::Scheduled,
                delivered_at: None,
            })
            .await
            .unwrap();
        assert!(!store.vehicle("VEH01").await.unwrap().is_available);

        store.transition_order(&id, OrderStatus::Processing).await.unwrap();
        let outcome = store.transition_order(&id, OrderStatus::Delivered).await.unwrap();
        assert!(!outcome.inventory_restored);
        assert!(outcome.order.delivery_date.is_some());

        let detail = store.get_order(&id).await.unwrap().unwrap();
        let delivery = detail.delivery.unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Delivered);
        assert!(delivery.delivered_at.is_some());
        assert!(store.vehicle("VEH01").await.unwrap().is_available);
    }

    #[tokio::test]
    async fn test_payments_move_status_and_credit() {
        let store = seeded_store().await;
        let id = store
            .place_order(draft(PaymentType::Credit, &[("PRD001", "B2", 10, 120)]))
            .await
            .unwrap()
            .order
            .order_id;
        assert_eq!(credit(&store).await, Decimal::new(1200, 2));

        let pay = |cents: i64| RecordPaymentRequest {
            amount: Decimal::new(cents, 2),
            method: PaymentMethod::Cash,
            received_by: "REP001".to_string(),
        };

        let first = store.record_payment(&id, &pay(500), MONEY_TOLERANCE).await.unwrap();
        assert_eq!(first.payment.payment_id, "PAY-000001");
        assert_eq!(first.payment_status, PaymentStatus::Partial);
        assert_eq!(credit(&store).await, Decimal::new(700, 2));

        let second = store.record_payment(&id, &pay(800), MONEY_TOLERANCE).await.unwrap();
        assert_eq!(second.payment_status, PaymentStatus::Paid);
        assert_eq!(second.overpaid_by, Some(Decimal::new(100, 2)));
        assert_eq!(credit(&store).await, Decimal::ZERO);

        let detail = store.get_order(&id).await.unwrap().unwrap();
        assert_eq!(detail.payments.len(), 2);
        assert_eq!(detail.order.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_cancel_with_payments_keeps_them_and_notes_refund() {
        let store = seeded_store().await;
        let id = store
            .place_order(draft(PaymentType::Cash, &[("PRD001", "B1", 2, 100)]))
            .await
            .unwrap()
            .order
            .order_id;
        let payment = RecordPaymentRequest {
            amount: Decimal::new(150, 2),
            method: PaymentMethod::Cheque,
            received_by: "REP001".to_string(),
        };
        store.record_payment(&id, &payment, MONEY_TOLERANCE).await.unwrap();

        let outcome = store.transition_order(&id, OrderStatus::Cancelled).await.unwrap();
        assert_eq!(
            outcome.order.notes.as_deref(),
            Some("Cancelled: manual refund required for 1.50 already paid")
        );
        assert_eq!(outcome.order.payment_status, PaymentStatus::Partial);

        let err = store.record_payment(&id, &payment, MONEY_TOLERANCE).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
        assert_eq!(store.get_order(&id).await.unwrap().unwrap().payments.len(), 1);
    }

    #[tokio::test]
    async fn test_return_restocks_and_reverses_credit() {
        let store = seeded_store().await;
        let id = store
            .place_order(draft(PaymentType::Credit, &[("PRD001", "B1", 5, 100), ("PRD001", "B2", 3, 120)]))
            .await
            .unwrap()
            .order
            .order_id;
        store.transition_order(&id, OrderStatus::Processing).await.unwrap();
        store.transition_order(&id, OrderStatus::Delivered).await.unwrap();

        let request = ProcessReturnRequest {
            processed_by: "REP001".to_string(),
            reason: "damaged".to_string(),
            items: vec![
                ReturnLine { product_id: "PRD001".to_string(), batch_id: "B1".to_string(), quantity: 2 },
                ReturnLine { product_id: "PRD001".to_string(), batch_id: "B2".to_string(), quantity: 1 },
            ],
        };
        let outcome = store.process_return(&id, &request).await.unwrap();

        assert_eq!(outcome.order_return.return_id, "RET-000001");
        assert_eq!(outcome.order_return.items[1].return_item_id, "RI-000002");
        assert_eq!(outcome.order_return.total_return_amount, Decimal::new(320, 2));
        assert_eq!(outcome.final_amount, Decimal::new(540, 2));
        assert_eq!(quantity(&store, "B1").await, 2);
        assert_eq!(quantity(&store, "B2").await, 8);
        assert_eq!(credit(&store).await, Decimal::new(540, 2));

        let err = store.process_return(&id, &request).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_return_over_bound_is_all_or_nothing() {
        let store = seeded_store().await;
        let id = store
            .place_order(draft(PaymentType::Cash, &[("PRD001", "B1", 5, 100), ("PRD001", "B2", 3, 120)]))
            .await
            .unwrap()
            .order
            .order_id;
        store.transition_order(&id, OrderStatus::Processing).await.unwrap();
        store.transition_order(&id, OrderStatus::Delivered).await.unwrap();

        let request = ProcessReturnRequest {
            processed_by: "REP001".to_string(),
            reason: String::new(),
            items: vec![
                ReturnLine { product_id: "PRD001".to_string(), batch_id: "B1".to_string(), quantity: 1 },
                ReturnLine { product_id: "PRD001".to_string(), batch_id: "B2".to_string(), quantity: 4 },
            ],
        };
        let err = store.process_return(&id, &request).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
        assert_eq!(quantity(&store, "B1").await, 0);

        let detail = store.get_order(&id).await.unwrap().unwrap();
        assert!(detail.order_return.is_none());
        assert_eq!(detail.order.final_amount, detail.order.total_amount);
    }

    #[tokio::test]
    async fn test_return_requires_delivered_order() {
        let store = seeded_store().await;
        let id = store
            .place_order(draft(PaymentType::Cash, &[("PRD001", "B1", 1, 100)]))
            .await
            .unwrap()
            .order
            .order_id;
        let request = ProcessReturnRequest {
            processed_by: "REP001".to_string(),
            reason: String::new(),
            items: vec![ReturnLine { product_id: "PRD001".to_string(), batch_id: "B1".to_string(), quantity: 1 }],
        };
        let err = store.process_return(&id, &request).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));

        let err = store.process_return("ORD-999999", &request).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "order", .. }));
    }

    #[tokio::test]
    async fn test_add_delivery_needs_known_order() {
        let store = seeded_store().await;
        let err = store
            .add_delivery(Delivery {
                delivery_id: "DEL001".to_string(),
                order_id: "ORD-000404".to_string(),
                vehicle_id: None,
                status: DeliveryStatus::Scheduled,
                delivered_at: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "order", .. }));
    }

    #[tokio::test]
    async fn test_demo_catalog_is_usable() {
        let store = MemoryStore::demo();
        assert_eq!(store.list_active_batches("PRD001").await.unwrap().len(), 2);
        assert!(store.customer("CUS001").await.is_some());
    }
}
