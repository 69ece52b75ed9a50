//! Catalog lookup: product records as the order pipeline sees them.

use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::collections::{BTreeSet, HashMap};

use crate::error::{PosError, PosResult};
use crate::models::Product;

pub(crate) const PRODUCT_COLUMNS: &str =
    "id, name, price, cost, stock_tracked, stock, available, created_at";

pub(crate) fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        cost: row.get(3)?,
        stock_tracked: row.get(4)?,
        stock: row.get(5)?,
        available: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn find_product(conn: &Connection, id: i64) -> PosResult<Product> {
    conn.query_row(
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS),
        [id],
        product_from_row,
    )
    .optional()?
    .ok_or(PosError::ProductNotFound(id))
}

/// Resolves a set of product ids in one query.
///
/// Ids with no product are simply absent from the map; callers decide how to
/// report the gap.
pub fn lookup_products(conn: &Connection, ids: &BTreeSet<i64>) -> PosResult<HashMap<i64, Product>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM products WHERE id IN ({})",
        PRODUCT_COLUMNS, placeholders
    ))?;

    let products = stmt
        .query_map(params_from_iter(ids.iter()), product_from_row)?
        .map(|r| r.map(|p| (p.id, p)))
        .collect::<rusqlite::Result<HashMap<_, _>>>()?;

    Ok(products)
}
