use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::catalog::find_product;
use crate::error::{PosError, PosResult};
use crate::models::{InventoryMovement, MovementKind, Product, StockReconciliation};
use crate::money::Money;

const MOVEMENT_COLUMNS: &str =
    "id, product_id, kind, quantity, delta, stock_after, unit_cost, reason, order_id, created_at";

fn movement_from_row(row: &Row<'_>) -> rusqlite::Result<InventoryMovement> {
    Ok(InventoryMovement {
        id: row.get(0)?,
        product_id: row.get(1)?,
        kind: row.get(2)?,
        quantity: row.get(3)?,
        delta: row.get(4)?,
        stock_after: row.get(5)?,
        unit_cost: row.get(6)?,
        reason: row.get(7)?,
        order_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn require_tracked(product: &Product) -> PosResult<()> {
    if product.stock_tracked {
        Ok(())
    } else {
        Err(PosError::invalid(format!(
            "product {} does not track stock",
            product.name
        )))
    }
}

fn require_positive(quantity: i64) -> PosResult<()> {
    if quantity <= 0 {
        return Err(PosError::invalid(format!(
            "movement quantity must be positive, got {}",
            quantity
        )));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn append_movement(
    conn: &Connection,
    product_id: i64,
    kind: MovementKind,
    delta: i64,
    stock_after: i64,
    unit_cost: Money,
    reason: &str,
    order_id: Option<i64>,
) -> PosResult<InventoryMovement> {
    let created_at = Utc::now();
    let quantity = delta.abs();

    conn.execute(
        "INSERT INTO inventory_movements
             (product_id, kind, quantity, delta, stock_after, unit_cost, reason, order_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![product_id, kind, quantity, delta, stock_after, unit_cost, reason, order_id, created_at],
    )?;

    Ok(InventoryMovement {
        id: conn.last_insert_rowid(),
        product_id,
        kind,
        quantity,
        delta,
        stock_after,
        unit_cost,
        reason: reason.to_string(),
        order_id,
        created_at,
    })
}

/// Takes `quantity` units out of stock and records an OUT movement.
///
/// Products that do not track stock are skipped and yield `None`.
pub fn debit(
    conn: &Connection,
    product_id: i64,
    quantity: i64,
    reason: &str,
    order_id: Option<i64>,
) -> PosResult<Option<InventoryMovement>> {
    require_positive(quantity)?;

    let product = find_product(conn, product_id)?;
    if !product.stock_tracked {
        return Ok(None);
    }

    let stock_after: Option<i64> = conn
        .query_row(
            "UPDATE products SET stock = stock - ?1
             WHERE id = ?2 AND stock >= ?1
             RETURNING stock",
            params![quantity, product_id],
            |row| row.get(0),
        )
        .optional()?;

    let Some(stock_after) = stock_after else {
        return Err(PosError::InsufficientStock {
            product_id,
            name: product.name,
            requested: quantity,
            available: product.stock,
        });
    };

    debug!(product_id, quantity, stock_after, "Stock debited");
    append_movement(
        conn,
        product_id,
        MovementKind::Out,
        -quantity,
        stock_after,
        product.cost,
        reason,
        order_id,
    )
    .map(Some)
}

/// Puts `quantity` units into stock and records an IN movement.
///
/// When `unit_cost` is given it becomes the product's cost (last cost wins).
pub fn credit(
    conn: &Connection,
    product_id: i64,
    quantity: i64,
    unit_cost: Option<Money>,
    reason: &str,
    order_id: Option<i64>,
) -> PosResult<InventoryMovement> {
    require_positive(quantity)?;
    if unit_cost.is_some_and(Money::is_negative) {
        return Err(PosError::invalid("unit cost must not be negative"));
    }

    let product = find_product(conn, product_id)?;
    require_tracked(&product)?;

    let stock_after: i64 = conn.query_row(
        "UPDATE products SET stock = stock + ?1, cost = COALESCE(?2, cost)
         WHERE id = ?3
         RETURNING stock",
        params![quantity, unit_cost, product_id],
        |row| row.get(0),
    )?;

    debug!(product_id, quantity, stock_after, "Stock credited");
    append_movement(
        conn,
        product_id,
        MovementKind::In,
        quantity,
        stock_after,
        unit_cost.unwrap_or(product.cost),
        reason,
        order_id,
    )
}

/// Sets stock to a physically counted level and records the difference.
pub fn adjust(
    conn: &Connection,
    product_id: i64,
    counted: i64,
    reason: &str,
) -> PosResult<InventoryMovement> {
    if counted < 0 {
        return Err(PosError::invalid(format!(
            "counted stock must not be negative, got {}",
            counted
        )));
    }

    let product = find_product(conn, product_id)?;
    require_tracked(&product)?;

    let delta = counted - product.stock;
    if delta == 0 {
        return Err(PosError::invalid(format!(
            "stock of {} is already {}",
            product.name, counted
        )));
    }

    let changed = conn.execute(
        "UPDATE products SET stock = ?1 WHERE id = ?2 AND stock = ?3",
        params![counted, product_id, product.stock],
    )?;
    if changed == 0 {
        return Err(PosError::Internal(format!(
            "stock of product {} changed during adjustment",
            product_id
        )));
    }

    debug!(product_id, delta, counted, "Stock adjusted");
    append_movement(
        conn,
        product_id,
        MovementKind::Adjust,
        delta,
        counted,
        product.cost,
        reason,
        None,
    )
}

/// Kardex of one product, newest first.
pub fn movements(conn: &Connection, product_id: i64) -> PosResult<Vec<InventoryMovement>> {
    find_product(conn, product_id)?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM inventory_movements WHERE product_id = ?1 ORDER BY id DESC",
        MOVEMENT_COLUMNS
    ))?;

    let movements = stmt
        .query_map([product_id], movement_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(movements)
}

/// Movements recorded against one order, oldest first.
pub fn order_movements(conn: &Connection, order_id: i64) -> PosResult<Vec<InventoryMovement>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM inventory_movements WHERE order_id = ?1 ORDER BY id ASC",
        MOVEMENT_COLUMNS
    ))?;

    let movements = stmt
        .query_map([order_id], movement_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(movements)
}

/// Compares the materialized stock with the sum of its kardex.
pub fn reconcile(conn: &Connection, product_id: i64) -> PosResult<StockReconciliation> {
    let product = find_product(conn, product_id)?;

    let ledger_stock: i64 = conn.query_row(
        "SELECT COALESCE(SUM(delta), 0) FROM inventory_movements WHERE product_id = ?1",
        [product_id],
        |row| row.get(0),
    )?;

    Ok(StockReconciliation {
        product_id,
        stock: product.stock,
        ledger_stock,
        consistent: ledger_stock == product.stock,
    })
}
