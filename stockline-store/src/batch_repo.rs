use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use stockline_catalog::{Batch, Product};
use stockline_core::repository::BatchLedger;
use stockline_core::CoreResult;

use crate::storage_error;

pub struct PgBatchLedger {
    pool: PgPool,
}

impl PgBatchLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    product_id: String,
    name: String,
    reorder_level: i32,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct BatchRow {
    batch_id: String,
    product_id: String,
    supplier_id: String,
    supplier_name: Option<String>,
    batch_number: String,
    manufacturing_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
    received_date: NaiveDate,
    cost_price: Decimal,
    selling_price: Decimal,
    initial_quantity: i32,
    current_quantity: i32,
    is_active: bool,
}

impl From<BatchRow> for Batch {
    fn from(row: BatchRow) -> Self {
        Batch {
            batch_id: row.batch_id,
            product_id: row.product_id,
            supplier_id: row.supplier_id,
            supplier_name: row.supplier_name,
            batch_number: row.batch_number,
            manufacturing_date: row.manufacturing_date,
            expiry_date: row.expiry_date,
            received_date: row.received_date,
            cost_price: row.cost_price,
            selling_price: row.selling_price,
            initial_quantity: row.initial_quantity,
            current_quantity: row.current_quantity,
            is_active: row.is_active,
        }
    }
}

const BATCH_COLUMNS: &str = r#"
    b.batch_id, b.product_id, b.supplier_id, s.name AS supplier_name, b.batch_number,
    b.manufacturing_date, b.expiry_date, b.received_date, b.cost_price, b.selling_price,
    b.initial_quantity, b.current_quantity, b.is_active
"#;

const FEFO_ORDER: &str = "ORDER BY b.expiry_date ASC NULLS LAST, b.received_date ASC, b.batch_id ASC";

#[async_trait]
impl BatchLedger for PgBatchLedger {
    async fn get_product(&self, product_id: &str) -> CoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT product_id, name, reorder_level, is_active FROM products WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(row.map(|r| Product {
            product_id: r.product_id,
            name: r.name,
            reorder_level: r.reorder_level,
            is_active: r.is_active,
        }))
    }

    async fn list_active_batches(&self, product_id: &str) -> CoreResult<Vec<Batch>> {
        let sql = format!(
            "SELECT {} FROM product_batches b LEFT JOIN suppliers s ON s.supplier_id = b.supplier_id \
             WHERE b.product_id = $1 AND b.is_active AND b.current_quantity > 0 {}",
            BATCH_COLUMNS, FEFO_ORDER
        );
        let rows = sqlx::query_as::<_, BatchRow>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(rows.into_iter().map(Batch::from).collect())
    }

    async fn list_product_batches(&self, product_id: &str) -> CoreResult<Vec<Batch>> {
        let sql = format!(
            "SELECT {} FROM product_batches b LEFT JOIN suppliers s ON s.supplier_id = b.supplier_id \
             WHERE b.product_id = $1 AND b.is_active {}",
            BATCH_COLUMNS, FEFO_ORDER
        );
        let rows = sqlx::query_as::<_, BatchRow>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(rows.into_iter().map(Batch::from).collect())
    }
}
