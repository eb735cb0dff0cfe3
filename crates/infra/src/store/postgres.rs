//! Postgres-backed catalog + purchasing store.
//!
//! Schema lives in `crates/infra/migrations/` and is applied by
//! [`PostgresStore::migrate`].
//!
//! ## Error Mapping
//!
//! | SQLx Error                       | Code    | StoreError    |
//! |----------------------------------|---------|---------------|
//! | Database (unique violation)      | `23505` | `Concurrency` |
//! | Database (other)                 | any     | `Backend`     |
//! | PoolClosed / network / decoding  | N/A     | `Backend`     |
//!
//! ## Concurrency
//!
//! Writes to an existing order lock its row (`SELECT ... FOR UPDATE`) and
//! compare the stored version with the caller's [`ExpectedVersion`] before
//! changing anything. Stock increments are `UPDATE ... SET stock = stock + $n`
//! inside the same transaction, so increments from different orders on the
//! same product serialize on the product row.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use procure_catalog::{Product, ProductId, ProductStatus, Supplier, SupplierId, SupplierStatus};
use procure_core::{AggregateId, ExpectedVersion};
use procure_inventory::{MovementKind, StockMovement, StockMovementId};
use procure_invoicing::{InvoiceId, InvoiceLine, InvoiceSnapshot, InvoiceStatus};
use procure_purchasing::{
    DeliveryStatus, PurchaseOrderId, PurchaseOrderLine, PurchaseOrderSnapshot, PurchaseOrderStatus,
};

use super::{CatalogStore, DeliveryCommit, PurchasingStore, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_purchasing.sql");

/// Postgres-backed store.
///
/// Uses the SQLx connection pool, which is `Send + Sync`; every multi-row
/// write runs in a single transaction.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect a pool to `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the schema. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn load_lines(&self, order_id: PurchaseOrderId) -> Result<Vec<PurchaseOrderLine>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT line_no, product_id, requested_quantity, requested_unit_price,
                   unit_price, simulated_quantity, simulated_status
            FROM purchase_order_lines
            WHERE order_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_order_lines", e))?;

        rows.iter()
            .map(|row| -> Result<PurchaseOrderLine, StoreError> {
                let simulated_status: Option<String> = row.try_get("simulated_status").map_err(decode)?;
                let simulated_status = simulated_status
                    .map(|s| {
                        DeliveryStatus::parse(&s)
                            .ok_or_else(|| StoreError::Backend(format!("unknown delivery status '{s}'")))
                    })
                    .transpose()?;
                Ok(PurchaseOrderLine {
                    line_no: to_u32(row.try_get::<i32, _>("line_no").map_err(decode)?)?,
                    product_id: ProductId::from(row.try_get::<Uuid, _>("product_id").map_err(decode)?),
                    requested_quantity: row.try_get("requested_quantity").map_err(decode)?,
                    requested_unit_price: row.try_get("requested_unit_price").map_err(decode)?,
                    unit_price: row.try_get("unit_price").map_err(decode)?,
                    simulated_quantity: row.try_get("simulated_quantity").map_err(decode)?,
                    simulated_status,
                })
            })
            .collect()
    }

    async fn assemble_order(&self, row: &PgRow) -> Result<PurchaseOrderSnapshot, StoreError> {
        let id = PurchaseOrderId::from(row.try_get::<Uuid, _>("id").map_err(decode)?);
        let status: String = row.try_get("status").map_err(decode)?;
        let expected_delay_days: Option<i32> = row.try_get("expected_delay_days").map_err(decode)?;
        let invoice_id: Option<Uuid> = row.try_get("invoice_id").map_err(decode)?;

        Ok(PurchaseOrderSnapshot {
            id,
            supplier_id: SupplierId::from(row.try_get::<Uuid, _>("supplier_id").map_err(decode)?),
            ordered_at: row.try_get::<DateTime<Utc>, _>("ordered_at").map_err(decode)?,
            status: PurchaseOrderStatus::parse(&status).map_err(|e| StoreError::Backend(e.to_string()))?,
            lines: self.load_lines(id).await?,
            expected_delay_days: expected_delay_days.map(to_u32).transpose()?,
            invoice_id: invoice_id.map(AggregateId::from_uuid),
            version: to_u64(row.try_get::<i64, _>("version").map_err(decode)?)?,
        })
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    #[instrument(skip(self), fields(supplier_id = %id), err)]
    async fn supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError> {
        let row = sqlx::query("SELECT id, name, contact_email, status FROM suppliers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_supplier", e))?;

        row.map(|row| -> Result<Supplier, StoreError> {
            let status: String = row.try_get("status").map_err(decode)?;
            Ok(Supplier {
                id,
                name: row.try_get("name").map_err(decode)?,
                contact_email: row.try_get("contact_email").map_err(decode)?,
                status: SupplierStatus::parse(&status).map_err(|e| StoreError::Backend(e.to_string()))?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query("SELECT id, name, stock, unit_cost, status FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_product", e))?;

        row.map(|row| -> Result<Product, StoreError> {
            let status: String = row.try_get("status").map_err(decode)?;
            Ok(Product {
                id,
                name: row.try_get("name").map_err(decode)?,
                stock: row.try_get("stock").map_err(decode)?,
                unit_cost: row.try_get::<Decimal, _>("unit_cost").map_err(decode)?,
                status: ProductStatus::parse(&status).map_err(|e| StoreError::Backend(e.to_string()))?,
            })
        })
        .transpose()
    }

    #[instrument(
        skip(self),
        fields(product_id = %product_id, movement_count = tracing::field::Empty),
        err
    )]
    async fn stock_movements(&self, product_id: ProductId) -> Result<Vec<StockMovement>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, quantity, kind, reference, occurred_at
            FROM stock_movements
            WHERE product_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_stock_movements", e))?;

        Span::current().record("movement_count", rows.len());

        rows.iter()
            .map(|row| -> Result<StockMovement, StoreError> {
                let kind: String = row.try_get("kind").map_err(decode)?;
                let reference: Option<Uuid> = row.try_get("reference").map_err(decode)?;
                Ok(StockMovement {
                    id: StockMovementId::from(row.try_get::<Uuid, _>("id").map_err(decode)?),
                    product_id,
                    quantity: row.try_get("quantity").map_err(decode)?,
                    kind: MovementKind::parse(&kind).map_err(|e| StoreError::Backend(e.to_string()))?,
                    reference: reference.map(AggregateId::from_uuid),
                    occurred_at: row.try_get("occurred_at").map_err(decode)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl PurchasingStore for PostgresStore {
    #[instrument(skip(self, order), fields(order_id = %order.id, line_count = order.lines.len()), err)]
    async fn insert_order(&self, order: &PurchaseOrderSnapshot) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO purchase_orders (
                id, supplier_id, ordered_at, status, expected_delay_days, invoice_id, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.supplier_id.as_uuid())
        .bind(order.ordered_at)
        .bind(order.status.as_str())
        .bind(order.expected_delay_days.map(|d| d as i32))
        .bind(order.invoice_id.map(Uuid::from))
        .bind(to_i64(order.version)?)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        for line in &order.lines {
            sqlx::query(
                r#"
                INSERT INTO purchase_order_lines (
                    order_id, line_no, product_id, requested_quantity, requested_unit_price,
                    unit_price, simulated_quantity, simulated_status
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(line.line_no as i32)
            .bind(line.product_id.as_uuid())
            .bind(line.requested_quantity)
            .bind(line.requested_unit_price)
            .bind(line.unit_price)
            .bind(line.simulated_quantity)
            .bind(line.simulated_status.map(|s| s.as_str()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_line", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn order(&self, id: PurchaseOrderId) -> Result<Option<PurchaseOrderSnapshot>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, supplier_id, ordered_at, status, expected_delay_days, invoice_id, version
            FROM purchase_orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_order", e))?;

        match row {
            Some(row) => Ok(Some(self.assemble_order(&row).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), err)]
    async fn list_orders(&self) -> Result<Vec<PurchaseOrderSnapshot>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, supplier_id, ordered_at, status, expected_delay_days, invoice_id, version
            FROM purchase_orders
            ORDER BY ordered_at ASC, id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_orders", e))?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            orders.push(self.assemble_order(row).await?);
        }
        Ok(orders)
    }

    #[instrument(
        skip(self, order),
        fields(order_id = %order.id, expected_version = ?expected_version),
        err
    )]
    async fn save_order(
        &self,
        order: &PurchaseOrderSnapshot,
        expected_version: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        lock_order_version(&mut tx, order.id, expected_version).await?;
        update_order(&mut tx, order).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), fields(order_id = %order_id), err)]
    async fn invoice_for_order(
        &self,
        order_id: PurchaseOrderId,
    ) -> Result<Option<InvoiceSnapshot>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, supplier_id, issued_at, status, total_amount, version
            FROM invoices
            WHERE purchase_order_id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_invoice", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id = InvoiceId::from(row.try_get::<Uuid, _>("id").map_err(decode)?);
        let status: String = row.try_get("status").map_err(decode)?;

        let line_rows = sqlx::query(
            r#"
            SELECT line_no, product_id, requested_quantity, received_quantity, unit_price
            FROM invoice_lines
            WHERE invoice_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_invoice_lines", e))?;

        let lines = line_rows
            .iter()
            .map(|l| -> Result<InvoiceLine, StoreError> {
                Ok(InvoiceLine {
                    line_no: to_u32(l.try_get::<i32, _>("line_no").map_err(decode)?)?,
                    product_id: ProductId::from(l.try_get::<Uuid, _>("product_id").map_err(decode)?),
                    requested_quantity: l.try_get("requested_quantity").map_err(decode)?,
                    received_quantity: l.try_get("received_quantity").map_err(decode)?,
                    unit_price: l.try_get("unit_price").map_err(decode)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Some(InvoiceSnapshot {
            id,
            purchase_order_id: order_id,
            supplier_id: SupplierId::from(row.try_get::<Uuid, _>("supplier_id").map_err(decode)?),
            issued_at: row.try_get("issued_at").map_err(decode)?,
            status: InvoiceStatus::parse(&status).map_err(|e| StoreError::Backend(e.to_string()))?,
            lines,
            total_amount: row.try_get("total_amount").map_err(decode)?,
            version: to_u64(row.try_get::<i64, _>("version").map_err(decode)?)?,
        }))
    }

    #[instrument(
        skip(self, commit),
        fields(
            order_id = %commit.order.id,
            invoice_id = %commit.invoice.id,
            expected_version = ?commit.expected_version,
            increment_count = commit.stock_increments.len()
        ),
        err
    )]
    async fn commit_delivery(&self, commit: DeliveryCommit) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        lock_order_version(&mut tx, commit.order.id, commit.expected_version).await?;
        update_order(&mut tx, &commit.order).await?;

        for (product_id, delta) in &commit.stock_increments {
            let updated = sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1 RETURNING stock")
                .bind(product_id.as_uuid())
                .bind(*delta)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("increment_stock", e))?;
            if updated.is_none() {
                return Err(StoreError::NotFound(format!("product {product_id}")));
            }
        }

        for movement in &commit.movements {
            sqlx::query(
                r#"
                INSERT INTO stock_movements (id, product_id, quantity, kind, reference, occurred_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(movement.id.as_uuid())
            .bind(movement.product_id.as_uuid())
            .bind(movement.quantity)
            .bind(movement.kind.as_str())
            .bind(movement.reference.map(Uuid::from))
            .bind(movement.occurred_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_stock_movement", e))?;
        }

        let invoice = &commit.invoice;
        sqlx::query(
            r#"
            INSERT INTO invoices (id, purchase_order_id, supplier_id, issued_at, status, total_amount, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(invoice.id.as_uuid())
        .bind(invoice.purchase_order_id.as_uuid())
        .bind(invoice.supplier_id.as_uuid())
        .bind(invoice.issued_at)
        .bind(invoice.status.as_str())
        .bind(invoice.total_amount)
        .bind(to_i64(invoice.version)?)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_invoice", e))?;

        for line in &invoice.lines {
            sqlx::query(
                r#"
                INSERT INTO invoice_lines (
                    invoice_id, line_no, product_id, requested_quantity, received_quantity, unit_price
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(invoice.id.as_uuid())
            .bind(line.line_no as i32)
            .bind(line.product_id.as_uuid())
            .bind(line.requested_quantity)
            .bind(line.received_quantity)
            .bind(line.unit_price)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_invoice_line", e))?;
        }

        // Dropping `tx` on any early return above rolls everything back.
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

/// Lock the order row and check its version against `expected`.
async fn lock_order_version(
    tx: &mut Transaction<'_, Postgres>,
    order_id: PurchaseOrderId,
    expected: ExpectedVersion,
) -> Result<(), StoreError> {
    let row = sqlx::query("SELECT version FROM purchase_orders WHERE id = $1 FOR UPDATE")
        .bind(order_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_order", e))?
        .ok_or_else(|| StoreError::NotFound(format!("purchase order {order_id}")))?;

    let current = to_u64(row.try_get::<i64, _>("version").map_err(decode)?)?;
    if !expected.matches(current) {
        return Err(StoreError::Concurrency(format!(
            "purchase order {order_id}: expected {expected:?}, found {current}"
        )));
    }
    Ok(())
}

async fn update_order(
    tx: &mut Transaction<'_, Postgres>,
    order: &PurchaseOrderSnapshot,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE purchase_orders
        SET status = $2, expected_delay_days = $3, invoice_id = $4, version = $5
        WHERE id = $1
        "#,
    )
    .bind(order.id.as_uuid())
    .bind(order.status.as_str())
    .bind(order.expected_delay_days.map(|d| d as i32))
    .bind(order.invoice_id.map(Uuid::from))
    .bind(to_i64(order.version)?)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_order", e))?;

    for line in &order.lines {
        sqlx::query(
            r#"
            UPDATE purchase_order_lines
            SET simulated_quantity = $3, simulated_status = $4
            WHERE order_id = $1 AND line_no = $2
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(line.line_no as i32)
        .bind(line.simulated_quantity)
        .bind(line.simulated_status.map(|s| s.as_str()))
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("update_order_line", e))?;
    }
    Ok(())
}

fn decode(err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to decode row: {err}"))
}

fn to_u32(value: i32) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Backend(format!("negative column value {value}")))
}

fn to_u64(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Backend(format!("negative column value {value}")))
}

fn to_i64(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Backend(format!("version {value} out of range")))
}

/// Map SQLx errors to store errors.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation: another writer got there first.
                Some("23505") => StoreError::Concurrency(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}
