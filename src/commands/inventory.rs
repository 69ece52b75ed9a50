use tracing::info;

use crate::db::Database;
use crate::error::{PosError, PosResult};
use crate::ledger::inventory;
use crate::models::{AdjustInventory, InventoryMovement, MovementKind, StockReconciliation};

/// Manual kardex entry: goods received (IN), waste or internal use (OUT), or
/// a physical count (ADJUST, where `quantity` is the counted level).
pub fn adjust_inventory(db: &Database, input: AdjustInventory) -> PosResult<InventoryMovement> {
    if input.unit_cost.is_some() && input.kind != MovementKind::In {
        return Err(PosError::invalid("unit cost applies to IN movements only"));
    }

    let reason = input
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(match input.kind {
            MovementKind::In => "Stock received",
            MovementKind::Out => "Stock withdrawn",
            MovementKind::Adjust => "Physical count",
        })
        .to_string();

    let movement = db.transaction(|tx| match input.kind {
        MovementKind::In => inventory::credit(
            tx,
            input.product_id,
            input.quantity,
            input.unit_cost,
            &reason,
            None,
        ),
        MovementKind::Out => inventory::debit(tx, input.product_id, input.quantity, &reason, None)?
            .ok_or_else(|| {
                PosError::invalid(format!(
                    "product {} does not track stock",
                    input.product_id
                ))
            }),
        MovementKind::Adjust => inventory::adjust(tx, input.product_id, input.quantity, &reason),
    })?;

    info!(
        product_id = movement.product_id,
        kind = %movement.kind,
        delta = movement.delta,
        stock_after = movement.stock_after,
        "Inventory movement recorded"
    );
    Ok(movement)
}

pub fn get_movements(db: &Database, product_id: i64) -> PosResult<Vec<InventoryMovement>> {
    db.read(|conn| inventory::movements(conn, product_id))
}

pub fn reconcile_stock(db: &Database, product_id: i64) -> PosResult<StockReconciliation> {
    db.read(|conn| inventory::reconcile(conn, product_id))
}
