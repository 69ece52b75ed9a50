use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{PosError, PosResult};
use crate::models::{Caller, CashShift, CloseShift, MethodTotal, PaymentMethod, ShiftSummary};
use crate::money::Money;

const SHIFT_COLUMNS: &str =
    "id, cashier_id, opening_float, opened_at, closed_at, counted_amount, notes, is_open";

fn shift_from_row(row: &Row<'_>) -> rusqlite::Result<CashShift> {
    Ok(CashShift {
        id: row.get(0)?,
        cashier_id: row.get(1)?,
        opening_float: row.get(2)?,
        opened_at: row.get(3)?,
        closed_at: row.get(4)?,
        counted_amount: row.get(5)?,
        notes: row.get(6)?,
        is_open: row.get(7)?,
    })
}

fn find_shift(conn: &Connection, id: i64) -> PosResult<CashShift> {
    conn.query_row(
        &format!("SELECT {} FROM cash_shifts WHERE id = ?1", SHIFT_COLUMNS),
        [id],
        shift_from_row,
    )
    .optional()?
    .ok_or(PosError::ShiftNotFound(id))
}

pub(crate) fn find_open_shift(conn: &Connection, cashier_id: i64) -> PosResult<Option<CashShift>> {
    let shift = conn
        .query_row(
            &format!(
                "SELECT {} FROM cash_shifts WHERE cashier_id = ?1 AND is_open = 1",
                SHIFT_COLUMNS
            ),
            [cashier_id],
            shift_from_row,
        )
        .optional()?;
    Ok(shift)
}

/// The caller's open shift, or `NoOpenShift`.
pub(crate) fn require_open_shift(conn: &Connection, cashier_id: i64) -> PosResult<CashShift> {
    find_open_shift(conn, cashier_id)?.ok_or(PosError::NoOpenShift(cashier_id))
}

pub fn open_shift(db: &Database, caller: &Caller, opening_float: Money) -> PosResult<CashShift> {
    if opening_float.is_negative() {
        return Err(PosError::invalid("opening float must not be negative"));
    }

    let shift = db.transaction(|tx| {
        if let Some(open) = find_open_shift(tx, caller.user_id)? {
            return Err(PosError::ShiftAlreadyOpen {
                cashier_id: caller.user_id,
                shift_id: open.id,
            });
        }

        tx.execute(
            "INSERT INTO cash_shifts (cashier_id, opening_float, opened_at, is_open)
             VALUES (?1, ?2, ?3, 1)",
            rusqlite::params![caller.user_id, opening_float, Utc::now()],
        )?;

        find_shift(tx, tx.last_insert_rowid())
    })?;

    info!(shift_id = shift.id, cashier_id = shift.cashier_id, opening_float = %shift.opening_float, "Shift opened");
    Ok(shift)
}

/// Closes the caller's open shift with the counted cash.
pub fn close_shift(db: &Database, caller: &Caller, close: CloseShift) -> PosResult<CashShift> {
    if close.counted_amount.is_negative() {
        return Err(PosError::invalid("counted amount must not be negative"));
    }

    let shift = db.transaction(|tx| {
        let open = require_open_shift(tx, caller.user_id)?;

        tx.execute(
            "UPDATE cash_shifts SET is_open = 0, closed_at = ?1, counted_amount = ?2, notes = ?3
             WHERE id = ?4 AND is_open = 1",
            rusqlite::params![Utc::now(), close.counted_amount, close.notes, open.id],
        )?;

        find_shift(tx, open.id)
    })?;

    let summary = get_shift_summary(db, shift.id)?;
    match summary.difference {
        Some(diff) if diff != Money::ZERO => warn!(
            shift_id = shift.id,
            expected = %summary.expected_cash,
            counted = %close.counted_amount,
            difference = %diff,
            "Shift closed with cash difference"
        ),
        _ => info!(shift_id = shift.id, counted = %close.counted_amount, "Shift closed"),
    }

    Ok(shift)
}

pub fn get_open_shift(db: &Database, caller: &Caller) -> PosResult<Option<CashShift>> {
    db.read(|conn| find_open_shift(conn, caller.user_id))
}

/// Payments taken during a shift, grouped by method.
pub fn get_shift_summary(db: &Database, shift_id: i64) -> PosResult<ShiftSummary> {
    db.read(|conn| {
        let shift = find_shift(conn, shift_id)?;

        let mut stmt = conn.prepare(
            "SELECT method, COUNT(*), SUM(amount) FROM payments
             WHERE shift_id = ?1
             GROUP BY method
             ORDER BY method",
        )?;
        let totals = stmt
            .query_map([shift_id], |row| {
                Ok(MethodTotal {
                    method: row.get(0)?,
                    count: row.get(1)?,
                    amount: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // Company credit is billed later, not collected at the till.
        let total_collected = totals
            .iter()
            .filter(|t| t.method != PaymentMethod::CompanyCredit)
            .map(|t| t.amount)
            .sum();
        let cash_taken: Money = totals
            .iter()
            .filter(|t| t.method == PaymentMethod::Cash)
            .map(|t| t.amount)
            .sum();
        let expected_cash = shift.opening_float + cash_taken;
        let difference = shift.counted_amount.map(|counted| counted - expected_cash);

        Ok(ShiftSummary {
            shift,
            totals,
            total_collected,
            expected_cash,
            difference,
        })
    })
}
