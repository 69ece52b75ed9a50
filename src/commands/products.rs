use chrono::Utc;
use tracing::info;

use crate::catalog::{find_product, product_from_row, PRODUCT_COLUMNS};
use crate::db::Database;
use crate::error::{PosError, PosResult};
use crate::ledger::inventory;
use crate::models::{CreateProduct, Product, UpdateProduct};
use crate::money::Money;

fn validate_prices(name: &str, price: Money, cost: Money) -> PosResult<()> {
    if name.trim().is_empty() {
        return Err(PosError::invalid("product name is required"));
    }
    if price.is_negative() || cost.is_negative() {
        return Err(PosError::invalid("price and cost must not be negative"));
    }
    Ok(())
}

pub fn get_products(db: &Database) -> PosResult<Vec<Product>> {
    db.read(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM products ORDER BY name",
            PRODUCT_COLUMNS
        ))?;

        let products = stmt
            .query_map([], product_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(products)
    })
}

pub fn get_product(db: &Database, id: i64) -> PosResult<Product> {
    db.read(|conn| find_product(conn, id))
}

/// Creates a product. Opening stock goes through the kardex as an IN
/// movement; products that do not track stock keep stock and cost at zero.
pub fn create_product(db: &Database, product: CreateProduct) -> PosResult<Product> {
    validate_prices(&product.name, product.price, product.cost)?;
    if product.stock < 0 {
        return Err(PosError::invalid("opening stock must not be negative"));
    }

    let (cost, opening_stock) = if product.stock_tracked {
        (product.cost, product.stock)
    } else {
        (Money::ZERO, 0)
    };

    let created = db.transaction(|tx| {
        tx.execute(
            "INSERT INTO products (name, price, cost, stock_tracked, stock, available, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
            rusqlite::params![
                product.name.trim(),
                product.price,
                cost,
                product.stock_tracked,
                product.available,
                Utc::now()
            ],
        )?;

        let id = tx.last_insert_rowid();
        if opening_stock > 0 {
            inventory::credit(tx, id, opening_stock, Some(cost), "Initial stock", None)?;
        }

        find_product(tx, id)
    })?;

    info!(product_id = created.id, name = %created.name, "Product created");
    Ok(created)
}

/// Updates name, price and cost. Stock only moves through the kardex, and
/// order lines keep the price they were sold at.
pub fn update_product(db: &Database, id: i64, product: UpdateProduct) -> PosResult<Product> {
    validate_prices(&product.name, product.price, product.cost)?;

    db.transaction(|tx| {
        let current = find_product(tx, id)?;
        let cost = if current.stock_tracked {
            product.cost
        } else {
            Money::ZERO
        };

        tx.execute(
            "UPDATE products SET name = ?1, price = ?2, cost = ?3 WHERE id = ?4",
            rusqlite::params![product.name.trim(), product.price, cost, id],
        )?;

        find_product(tx, id)
    })
}

pub fn toggle_availability(db: &Database, id: i64) -> PosResult<Product> {
    db.transaction(|tx| {
        find_product(tx, id)?;
        tx.execute(
            "UPDATE products SET available = NOT available WHERE id = ?1",
            [id],
        )?;
        find_product(tx, id)
    })
}
