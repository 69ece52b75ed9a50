use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::assembly::{self, AssembledOrder};
use crate::catalog::lookup_products;
use crate::commands::tables;
use crate::db::Database;
use crate::error::{PosError, PosResult};
use crate::ledger::{credit, inventory};
use crate::models::{
    Caller, CreateOrder, FulfillmentKind, MovementKind, Order, OrderLine, OrderLineNode,
    OrderStatus, OrderWithLines,
};
use crate::money::Money;

const ORDER_COLUMNS: &str = "id, kind, table_id, customer_id, company_id, is_credit, status, total, created_by, created_at, closed_at";

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: row.get(0)?,
        kind: row.get(1)?,
        table_id: row.get(2)?,
        customer_id: row.get(3)?,
        company_id: row.get(4)?,
        is_credit: row.get(5)?,
        status: row.get(6)?,
        total: row.get(7)?,
        created_by: row.get(8)?,
        created_at: row.get(9)?,
        closed_at: row.get(10)?,
    })
}

pub(crate) fn find_order(conn: &Connection, id: i64) -> PosResult<Order> {
    conn.query_row(
        &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS),
        [id],
        order_from_row,
    )
    .optional()?
    .ok_or(PosError::OrderNotFound(id))
}

/// Fails unless the order can still change.
pub(crate) fn require_pending(order: &Order) -> PosResult<()> {
    match order.status {
        OrderStatus::Pending => Ok(()),
        OrderStatus::Closed => Err(PosError::OrderAlreadyClosed(order.id)),
        OrderStatus::Cancelled => Err(PosError::OrderCancelled(order.id)),
    }
}

pub(crate) fn paid_amount(conn: &Connection, order_id: i64) -> PosResult<Money> {
    let paid = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE order_id = ?1",
        [order_id],
        |row| row.get(0),
    )?;
    Ok(paid)
}

fn load_lines(conn: &Connection, order_id: i64) -> PosResult<Vec<OrderLine>> {
    let mut stmt = conn.prepare(
        "SELECT ol.id, ol.order_id, ol.product_id, p.name, ol.quantity, ol.unit_price, ol.note, ol.parent_line_id
         FROM order_lines ol
         LEFT JOIN products p ON ol.product_id = p.id
         WHERE ol.order_id = ?1
         ORDER BY ol.id",
    )?;

    let lines = stmt
        .query_map([order_id], |row| {
            Ok(OrderLine {
                id: row.get(0)?,
                order_id: row.get(1)?,
                product_id: row.get(2)?,
                product_name: row.get(3)?,
                quantity: row.get(4)?,
                unit_price: row.get(5)?,
                note: row.get(6)?,
                parent_line_id: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(lines)
}

/// Nests flat rows under their parent lines, keeping insertion order.
fn build_tree(lines: Vec<OrderLine>) -> Vec<OrderLineNode> {
    fn attach(
        parent: Option<i64>,
        by_parent: &mut HashMap<Option<i64>, Vec<OrderLine>>,
    ) -> Vec<OrderLineNode> {
        by_parent
            .remove(&parent)
            .unwrap_or_default()
            .into_iter()
            .map(|line| OrderLineNode {
                children: attach(Some(line.id), by_parent),
                line,
            })
            .collect()
    }

    let mut by_parent: HashMap<Option<i64>, Vec<OrderLine>> = HashMap::new();
    for line in lines {
        by_parent.entry(line.parent_line_id).or_default().push(line);
    }
    attach(None, &mut by_parent)
}

pub(crate) fn load_order(conn: &Connection, id: i64) -> PosResult<OrderWithLines> {
    let order = find_order(conn, id)?;
    let lines = build_tree(load_lines(conn, id)?);
    let paid = paid_amount(conn, id)?;

    Ok(OrderWithLines { order, lines, paid })
}

fn validate_header(order: &CreateOrder) -> PosResult<()> {
    match (order.kind, order.table_id) {
        (FulfillmentKind::DineIn, None) => {
            return Err(PosError::invalid("dine-in orders require a table"));
        }
        (FulfillmentKind::Takeaway | FulfillmentKind::Delivery, Some(_)) => {
            return Err(PosError::invalid(format!(
                "{} orders cannot reference a table",
                order.kind
            )));
        }
        _ => {}
    }

    match (order.is_credit, order.company_id) {
        (true, None) => Err(PosError::invalid("credit orders require a company")),
        (false, Some(_)) => Err(PosError::invalid(
            "a company can only be attached to a credit order",
        )),
        _ => Ok(()),
    }
}

fn insert_lines(conn: &Connection, order_id: i64, assembled: &AssembledOrder) -> PosResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO order_lines (order_id, product_id, quantity, unit_price, note, parent_line_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    // Parents precede their children, so every parent id is already known.
    let mut line_ids: Vec<i64> = Vec::with_capacity(assembled.lines.len());
    for line in &assembled.lines {
        let parent_line_id = line.parent.map(|index| line_ids[index]);
        let id = stmt.insert(rusqlite::params![
            order_id,
            line.product_id,
            line.quantity,
            line.unit_price,
            line.note,
            parent_line_id
        ])?;
        line_ids.push(id);
    }
    Ok(())
}

/// Creates an order as one unit of work: reserve the table, price the cart,
/// debit stock, charge company credit, insert order and lines. Any failure
/// leaves no trace. An order totalling zero is closed on creation.
pub fn create_order(db: &Database, caller: &Caller, order: CreateOrder) -> PosResult<OrderWithLines> {
    validate_header(&order)?;
    assembly::validate(&order.items)?;

    let result = db.transaction(|tx| {
        if let Some(table_id) = order.table_id {
            tables::occupy(tx, table_id)?;
        }

        let catalog = lookup_products(tx, &assembly::collect_product_ids(&order.items))?;
        let assembled = assembly::assemble(&order.items, &catalog)?;

        let company_id = order.company_id;
        if let Some(company_id) = company_id {
            credit::authorize(tx, company_id, assembled.total)?;
        }

        tx.execute(
            "INSERT INTO orders (kind, table_id, customer_id, company_id, is_credit, status, total, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                order.kind,
                order.table_id,
                order.customer_id,
                company_id,
                order.is_credit,
                OrderStatus::Pending,
                assembled.total,
                caller.user_id,
                Utc::now()
            ],
        )?;
        let order_id = tx.last_insert_rowid();

        insert_lines(tx, order_id, &assembled)?;

        let reason = format!("Sale order #{}", order_id);
        for debit in &assembled.debits {
            inventory::debit(tx, debit.product_id, debit.quantity, &reason, Some(order_id))?;
        }

        if let Some(company_id) = company_id {
            credit::commit(tx, company_id, assembled.total)?;
        }

        // Nothing to collect: settle now so the table does not stay held.
        if assembled.total == Money::ZERO {
            close_order(tx, &find_order(tx, order_id)?)?;
        }

        load_order(tx, order_id)
    });

    match &result {
        Ok(created) => info!(
            order_id = created.order.id,
            kind = %created.order.kind,
            table_id = ?created.order.table_id,
            total = %created.order.total,
            credit = created.order.is_credit,
            "Order created"
        ),
        Err(e) => warn!(kind = e.kind(), error = %e, "Order rejected"),
    }
    result
}

/// PENDING -> CLOSED, freeing the table. Only settlement calls this.
pub(crate) fn close_order(conn: &Connection, order: &Order) -> PosResult<()> {
    require_pending(order)?;

    conn.execute(
        "UPDATE orders SET status = ?1, closed_at = ?2 WHERE id = ?3 AND status = ?4",
        rusqlite::params![OrderStatus::Closed, Utc::now(), order.id, OrderStatus::Pending],
    )?;

    if let Some(table_id) = order.table_id {
        tables::release(conn, table_id)?;
    }
    Ok(())
}

/// PENDING -> CANCELLED for an order nobody has paid anything on yet.
/// Stock sold by the order goes back, committed credit still in use is
/// released and the table is freed.
pub fn cancel_order(
    db: &Database,
    caller: &Caller,
    id: i64,
    reason: Option<String>,
) -> PosResult<OrderWithLines> {
    let cancelled = db.transaction(|tx| {
        let order = find_order(tx, id)?;
        require_pending(&order)?;

        let paid = paid_amount(tx, id)?;
        if paid.is_positive() {
            return Err(PosError::OrderHasPayments { order_id: id, paid });
        }

        let restock_reason = match reason.as_deref().map(str::trim) {
            Some(r) if !r.is_empty() => format!("Cancelled order #{}: {}", id, r),
            _ => format!("Cancelled order #{}", id),
        };
        for movement in inventory::order_movements(tx, id)? {
            if movement.kind == MovementKind::Out {
                inventory::credit(
                    tx,
                    movement.product_id,
                    movement.quantity,
                    None,
                    &restock_reason,
                    Some(id),
                )?;
            }
        }

        // Repayments may already have reduced the balance below the order total.
        if let (true, Some(company_id)) = (order.is_credit, order.company_id) {
            let used = credit::find_company(tx, company_id)?.credit_used;
            let refund = order.total.min(used);
            if refund.is_positive() {
                credit::release(tx, company_id, refund)?;
            }
        }

        tx.execute(
            "UPDATE orders SET status = ?1, closed_at = ?2 WHERE id = ?3",
            rusqlite::params![OrderStatus::Cancelled, Utc::now(), id],
        )?;

        if let Some(table_id) = order.table_id {
            tables::release(tx, table_id)?;
        }

        load_order(tx, id)
    })?;

    info!(order_id = id, cancelled_by = caller.user_id, "Order cancelled");
    Ok(cancelled)
}

pub fn get_order(db: &Database, id: i64) -> PosResult<OrderWithLines> {
    db.read(|conn| load_order(conn, id))
}

pub fn get_open_orders(db: &Database) -> PosResult<Vec<OrderWithLines>> {
    db.read(|conn| {
        let mut stmt = conn
            .prepare("SELECT id FROM orders WHERE status = ?1 ORDER BY created_at ASC, id ASC")?;
        let ids = stmt
            .query_map([OrderStatus::Pending], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        ids.into_iter().map(|id| load_order(conn, id)).collect()
    })
}
