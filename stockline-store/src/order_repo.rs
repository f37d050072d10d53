use std::fmt::Display;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use stockline_core::repository::{FulfillmentStore, PaymentOutcome, ReturnOutcome, TransitionOutcome};
use stockline_core::requests::{ProcessReturnRequest, RecordPaymentRequest};
use stockline_core::{CoreError, CoreResult};
use stockline_order::{
    Delivery, DeliveryStatus, FinancialManager, Order, OrderDetail, OrderDraft, OrderItem, OrderManager,
    OrderReturn, OrderStatus, Payment, ReturnItem, ReturnProcessor,
};
use stockline_shared::{CodeKind, DisplayCode};

use crate::storage_error;

pub struct PgFulfillmentStore {
    pool: PgPool,
}

impl PgFulfillmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse<T>(value: &str) -> CoreResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e: T::Err| CoreError::StorageError(e.to_string()))
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    order_id: String,
    customer_id: String,
    sales_rep_id: String,
    order_date: DateTime<Utc>,
    delivery_date: Option<NaiveDate>,
    payment_type: String,
    payment_status: String,
    status: String,
    total_amount: Decimal,
    discount_amount: Decimal,
    final_amount: Decimal,
    notes: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = CoreError;

    fn try_from(row: OrderRow) -> CoreResult<Self> {
        Ok(Order {
            order_id: row.order_id,
            customer_id: row.customer_id,
            sales_rep_id: row.sales_rep_id,
            order_date: row.order_date,
            delivery_date: row.delivery_date,
            payment_type: parse(&row.payment_type)?,
            payment_status: parse(&row.payment_status)?,
            status: parse(&row.status)?,
            total_amount: row.total_amount,
            discount_amount: row.discount_amount,
            final_amount: row.final_amount,
            notes: row.notes,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_item_id: String,
    order_id: String,
    line_no: i32,
    product_id: String,
    batch_id: String,
    quantity: i32,
    unit_price: Decimal,
    discount: Decimal,
    total_price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            order_item_id: row.order_item_id,
            order_id: row.order_id,
            line_no: row.line_no,
            product_id: row.product_id,
            batch_id: row.batch_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            discount: row.discount,
            total_price: row.total_price,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    payment_id: String,
    order_id: String,
    amount: Decimal,
    method: String,
    received_by: String,
    paid_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ReturnRow {
    return_id: String,
    order_id: String,
    processed_by: String,
    reason: String,
    total_return_amount: Decimal,
    returned_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ReturnItemRow {
    return_item_id: String,
    return_id: String,
    product_id: String,
    batch_id: String,
    quantity: i32,
    unit_price: Decimal,
    total_amount: Decimal,
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
    delivery_id: String,
    order_id: String,
    vehicle_id: Option<String>,
    status: String,
    delivered_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct BatchStateRow {
    product_id: String,
    is_active: bool,
    current_quantity: i32,
}

/// Load an order with its children. With `lock`, the order row stays locked
/// until the surrounding transaction ends.
async fn load_detail(conn: &mut PgConnection, order_id: &str, lock: bool) -> CoreResult<Option<OrderDetail>> {
    let sql = format!(
        "SELECT order_id, customer_id, sales_rep_id, order_date, delivery_date, payment_type, \
         payment_status, status, total_amount, discount_amount, final_amount, notes, updated_at \
         FROM orders WHERE order_id = $1{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

    let order = match row {
        Some(row) => Order::try_from(row)?,
        None => return Ok(None),
    };

    let items = sqlx::query_as::<_, OrderItemRow>(
        "SELECT order_item_id, order_id, line_no, product_id, batch_id, quantity, unit_price, discount, total_price \
         FROM order_items WHERE order_id = $1 ORDER BY line_no",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(storage_error)?
    .into_iter()
    .map(OrderItem::from)
    .collect();

    let payments = sqlx::query_as::<_, PaymentRow>(
        "SELECT payment_id, order_id, amount, method, received_by, paid_at \
         FROM payments WHERE order_id = $1 ORDER BY paid_at, payment_id",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(storage_error)?
    .into_iter()
    .map(|row| {
        Ok(Payment {
            payment_id: row.payment_id,
            order_id: row.order_id,
            amount: row.amount,
            method: parse(&row.method)?,
            received_by: row.received_by,
            paid_at: row.paid_at,
        })
    })
    .collect::<CoreResult<Vec<_>>>()?;

    let order_return = match sqlx::query_as::<_, ReturnRow>(
        "SELECT return_id, order_id, processed_by, reason, total_return_amount, returned_at \
         FROM returns WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(storage_error)?
    {
        Some(row) => {
            let items = sqlx::query_as::<_, ReturnItemRow>(
                "SELECT return_item_id, return_id, product_id, batch_id, quantity, unit_price, total_amount \
                 FROM return_items WHERE return_id = $1 ORDER BY return_item_id",
            )
            .bind(&row.return_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(storage_error)?
            .into_iter()
            .map(|i| ReturnItem {
                return_item_id: i.return_item_id,
                return_id: i.return_id,
                product_id: i.product_id,
                batch_id: i.batch_id,
                quantity: i.quantity,
                unit_price: i.unit_price,
                total_amount: i.total_amount,
            })
            .collect();

            Some(OrderReturn {
                return_id: row.return_id,
                order_id: row.order_id,
                processed_by: row.processed_by,
                reason: row.reason,
                total_return_amount: row.total_return_amount,
                returned_at: row.returned_at,
                items,
            })
        }
        None => None,
    };

    let delivery = match sqlx::query_as::<_, DeliveryRow>(
        "SELECT delivery_id, order_id, vehicle_id, status, delivered_at FROM deliveries WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(storage_error)?
    {
        Some(row) => Some(Delivery {
            delivery_id: row.delivery_id,
            order_id: row.order_id,
            vehicle_id: row.vehicle_id,
            status: parse::<DeliveryStatus>(&row.status)?,
            delivered_at: row.delivered_at,
        }),
        None => None,
    };

    Ok(Some(OrderDetail {
        order,
        items,
        payments,
        order_return,
        delivery,
    }))
}

async fn lock_detail(tx: &mut Transaction<'_, Postgres>, order_id: &str) -> CoreResult<OrderDetail> {
    load_detail(&mut **tx, order_id, true)
        .await?
        .ok_or_else(|| CoreError::not_found("order", order_id))
}

/// Bump the counter for `kind` and format the new code.
async fn next_code(tx: &mut Transaction<'_, Postgres>, kind: CodeKind) -> CoreResult<String> {
    let seq: i64 = sqlx::query_scalar(
        "UPDATE id_sequences SET last_value = last_value + 1 WHERE name = $1 RETURNING last_value",
    )
    .bind(kind.sequence_name())
    .fetch_one(&mut **tx)
    .await
    .map_err(storage_error)?;

    Ok(DisplayCode::new(kind, seq).to_string())
}

/// Compare-and-decrement. A miss is diagnosed afterwards so the caller learns
/// which batch failed and why.
async fn consume_batch(
    tx: &mut Transaction<'_, Postgres>,
    product_id: &str,
    batch_id: &str,
    quantity: i32,
) -> CoreResult<()> {
    let remaining: Option<i32> = sqlx::query_scalar(
        "UPDATE product_batches SET current_quantity = current_quantity - $1, updated_at = NOW() \
         WHERE batch_id = $2 AND product_id = $3 AND is_active AND current_quantity >= $1 \
         RETURNING current_quantity",
    )
    .bind(quantity)
    .bind(batch_id)
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(storage_error)?;

    if remaining.is_some() {
        return Ok(());
    }

    let state = sqlx::query_as::<_, BatchStateRow>(
        "SELECT product_id, is_active, current_quantity FROM product_batches WHERE batch_id = $1",
    )
    .bind(batch_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(storage_error)?;

    Err(match state {
        None => CoreError::not_found("batch", batch_id),
        Some(b) if b.product_id != product_id => CoreError::ValidationError(format!(
            "batch {} does not belong to product {}",
            batch_id, product_id
        )),
        Some(b) if !b.is_active => CoreError::ValidationError(format!("batch {} is inactive", batch_id)),
        Some(b) => CoreError::InsufficientStock {
            product_id: b.product_id,
            batch_id: Some(batch_id.to_string()),
            requested: quantity as i64,
            available: b.current_quantity as i64,
        },
    })
}

async fn restock_batch(tx: &mut Transaction<'_, Postgres>, batch_id: &str, quantity: i32) -> CoreResult<()> {
    let result = sqlx::query(
        "UPDATE product_batches SET current_quantity = current_quantity + $1, updated_at = NOW() \
         WHERE batch_id = $2",
    )
    .bind(quantity)
    .bind(batch_id)
    .execute(&mut **tx)
    .await
    .map_err(storage_error)?;

    if result.rows_affected() == 0 {
        return Err(CoreError::not_found("batch", batch_id));
    }
    Ok(())
}

/// `GREATEST(balance - amount, 0)`; a no-op for zero amounts.
async fn reduce_credit(tx: &mut Transaction<'_, Postgres>, customer_id: &str, amount: Decimal) -> CoreResult<()> {
    if amount <= Decimal::ZERO {
        return Ok(());
    }
    let result = sqlx::query(
        "UPDATE customers SET credit_balance = GREATEST(credit_balance - $1, 0) WHERE customer_id = $2",
    )
    .bind(amount)
    .bind(customer_id)
    .execute(&mut **tx)
    .await
    .map_err(storage_error)?;

    if result.rows_affected() == 0 {
        return Err(CoreError::not_found("customer", customer_id));
    }
    Ok(())
}

#[async_trait]
impl FulfillmentStore for PgFulfillmentStore {
    async fn place_order(&self, draft: OrderDraft) -> CoreResult<OrderDetail> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let customer: Option<String> = sqlx::query_scalar("SELECT customer_id FROM customers WHERE customer_id = $1")
            .bind(&draft.customer_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage_error)?;
        if customer.is_none() {
            return Err(CoreError::not_found("customer", &draft.customer_id));
        }

        // Sorted by batch id, so concurrent writers take row locks in one order.
        for (product_id, batch_id, quantity) in draft.quantities_by_batch() {
            consume_batch(&mut tx, &product_id, &batch_id, quantity).await?;
        }

        let credit = draft.credit_increment();
        if credit > Decimal::ZERO {
            sqlx::query("UPDATE customers SET credit_balance = credit_balance + $1 WHERE customer_id = $2")
                .bind(credit)
                .bind(&draft.customer_id)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
        }

        let order_id = next_code(&mut tx, CodeKind::Order).await?;
        let mut item_ids = Vec::with_capacity(draft.lines.len());
        for _ in 0..draft.lines.len() {
            item_ids.push(next_code(&mut tx, CodeKind::OrderItem).await?);
        }
        let (order, items) = draft.into_order(order_id, item_ids, Utc::now())?;

        sqlx::query(
            r#"
            INSERT INTO orders (order_id, customer_id, sales_rep_id, order_date, delivery_date, payment_type,
                                payment_status, status, total_amount, discount_amount, final_amount, notes, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(&order.order_id)
        .bind(&order.customer_id)
        .bind(&order.sales_rep_id)
        .bind(order.order_date)
        .bind(order.delivery_date)
        .bind(order.payment_type.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.status.as_str())
        .bind(order.total_amount)
        .bind(order.discount_amount)
        .bind(order.final_amount)
        .bind(&order.notes)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_item_id, order_id, line_no, product_id, batch_id, quantity,
                                         unit_price, discount, total_price)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(&item.order_item_id)
            .bind(&item.order_id)
            .bind(item.line_no)
            .bind(&item.product_id)
            .bind(&item.batch_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.discount)
            .bind(item.total_price)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        }

        tx.commit().await.map_err(storage_error)?;

        Ok(OrderDetail {
            order,
            items,
            payments: Vec::new(),
            order_return: None,
            delivery: None,
        })
    }

    async fn get_order(&self, order_id: &str) -> CoreResult<Option<OrderDetail>> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        load_detail(&mut conn, order_id, false).await
    }

    async fn transition_order(&self, order_id: &str, to: OrderStatus) -> CoreResult<TransitionOutcome> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        let detail = lock_detail(&mut tx, order_id).await?;

        let now = Utc::now();
        let plan = OrderManager::plan_transition(&detail, to, now)?;

        for restock in &plan.restock {
            restock_batch(&mut tx, &restock.batch_id, restock.quantity).await?;
        }
        reduce_credit(&mut tx, &plan.customer_id, plan.credit_reversal).await?;

        if let Some(done) = &plan.complete_delivery {
            sqlx::query("UPDATE deliveries SET status = $1, delivered_at = $2 WHERE delivery_id = $3")
                .bind(DeliveryStatus::Delivered.as_str())
                .bind(done.delivered_at)
                .bind(&done.delivery_id)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;

            if let Some(vehicle_id) = &done.vehicle_id {
                sqlx::query("UPDATE vehicles SET is_available = TRUE WHERE vehicle_id = $1")
                    .bind(vehicle_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(storage_error)?;
            }
        }

        let mut order = detail.order;
        plan.apply_to(&mut order, now);

        sqlx::query(
            "UPDATE orders SET status = $1, notes = $2, delivery_date = $3, updated_at = $4 WHERE order_id = $5",
        )
        .bind(order.status.as_str())
        .bind(&order.notes)
        .bind(order.delivery_date)
        .bind(order.updated_at)
        .bind(order_id)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;

        Ok(TransitionOutcome {
            order,
            previous_status: plan.from,
            inventory_restored: plan.inventory_restored(),
        })
    }

    async fn record_payment(
        &self,
        order_id: &str,
        payment: &RecordPaymentRequest,
        tolerance: Decimal,
    ) -> CoreResult<PaymentOutcome> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        let detail = lock_detail(&mut tx, order_id).await?;

        let plan = FinancialManager::plan_payment(
            &detail,
            payment.amount,
            payment.method,
            &payment.received_by,
            tolerance,
        )?;

        let now = Utc::now();
        let record = Payment {
            payment_id: next_code(&mut tx, CodeKind::Payment).await?,
            order_id: order_id.to_string(),
            amount: plan.amount,
            method: plan.method,
            received_by: plan.received_by.clone(),
            paid_at: now,
        };

        sqlx::query(
            "INSERT INTO payments (payment_id, order_id, amount, method, received_by, paid_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&record.payment_id)
        .bind(&record.order_id)
        .bind(record.amount)
        .bind(record.method.as_str())
        .bind(&record.received_by)
        .bind(record.paid_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        sqlx::query("UPDATE orders SET payment_status = $1, updated_at = $2 WHERE order_id = $3")
            .bind(plan.new_status.as_str())
            .bind(now)
            .bind(order_id)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        reduce_credit(&mut tx, &plan.customer_id, plan.credit_decrement).await?;

        tx.commit().await.map_err(storage_error)?;

        Ok(PaymentOutcome {
            payment: record,
            payment_status: plan.new_status,
            total_paid: plan.total_paid,
            overpaid_by: plan.overpaid_by,
        })
    }

    async fn process_return(&self, order_id: &str, request: &ProcessReturnRequest) -> CoreResult<ReturnOutcome> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        let detail = lock_detail(&mut tx, order_id).await?;

        let plan = ReturnProcessor::plan_return(&detail, &request.processed_by, &request.reason, &request.items)?;

        for restock in plan.restocks()? {
            restock_batch(&mut tx, &restock.batch_id, restock.quantity).await?;
        }
        reduce_credit(&mut tx, &plan.customer_id, plan.credit_reversal).await?;

        let now = Utc::now();
        let final_amount = plan.final_amount;
        sqlx::query("UPDATE orders SET final_amount = $1, updated_at = $2 WHERE order_id = $3")
            .bind(final_amount)
            .bind(now)
            .bind(order_id)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        let return_id = next_code(&mut tx, CodeKind::Return).await?;
        let mut item_ids = Vec::with_capacity(plan.items.len());
        for _ in 0..plan.items.len() {
            item_ids.push(next_code(&mut tx, CodeKind::ReturnItem).await?);
        }
        let record = plan.into_record(return_id, item_ids, now)?;

        sqlx::query(
            "INSERT INTO returns (return_id, order_id, processed_by, reason, total_return_amount, returned_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&record.return_id)
        .bind(&record.order_id)
        .bind(&record.processed_by)
        .bind(&record.reason)
        .bind(record.total_return_amount)
        .bind(record.returned_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        for item in &record.items {
            sqlx::query(
                r#"
                INSERT INTO return_items (return_item_id, return_id, product_id, batch_id, quantity, unit_price, total_amount)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(&item.return_item_id)
            .bind(&item.return_id)
            .bind(&item.product_id)
            .bind(&item.batch_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.total_amount)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        }

        tx.commit().await.map_err(storage_error)?;

        Ok(ReturnOutcome { order_return: record, final_amount })
    }
}
