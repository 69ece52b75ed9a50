use chrono::Utc;
use rusqlite::{Connection, Row};
use tracing::{info, warn};

use crate::commands::orders::{close_order, find_order, paid_amount, require_pending};
use crate::commands::shifts::require_open_shift;
use crate::db::Database;
use crate::error::{PosError, PosResult};
use crate::models::{Caller, Payment, PaymentInput, PaymentMethod};

const PAYMENT_COLUMNS: &str =
    "id, order_id, shift_id, amount, method, operation_code, created_by, created_at";

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        order_id: row.get(1)?,
        shift_id: row.get(2)?,
        amount: row.get(3)?,
        method: row.get(4)?,
        operation_code: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn find_payment(conn: &Connection, id: i64) -> PosResult<Payment> {
    let payment = conn.query_row(
        &format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLUMNS),
        [id],
        payment_from_row,
    )?;
    Ok(payment)
}

/// Records one (possibly partial) payment against a pending order.
///
/// The payment lands in the caller's open shift. When the payments add up to
/// the order total exactly, the order closes and its table is freed in the
/// same transaction.
pub fn record_payment(db: &Database, caller: &Caller, input: PaymentInput) -> PosResult<Payment> {
    if !input.amount.is_positive() {
        return Err(PosError::invalid("payment amount must be positive"));
    }
    let operation_code = input
        .operation_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string);

    let result = db.transaction(|tx| {
        let shift = require_open_shift(tx, caller.user_id)?;

        let order = find_order(tx, input.order_id)?;
        require_pending(&order)?;

        match (order.is_credit, input.method) {
            (true, PaymentMethod::CompanyCredit) => {}
            (true, method) => {
                return Err(PosError::invalid(format!(
                    "credit order {} can only be settled with COMPANY_CREDIT, not {}",
                    order.id, method
                )));
            }
            (false, PaymentMethod::CompanyCredit) => {
                return Err(PosError::invalid(format!(
                    "order {} is not a credit order and cannot be settled with COMPANY_CREDIT",
                    order.id
                )));
            }
            (false, _) => {}
        }

        let paid = paid_amount(tx, order.id)?;
        let outstanding = order.total - paid;
        if input.amount > outstanding {
            return Err(PosError::OverPayment {
                order_id: order.id,
                outstanding,
                attempted: input.amount,
            });
        }

        tx.execute(
            "INSERT INTO payments (order_id, shift_id, amount, method, operation_code, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                order.id,
                shift.id,
                input.amount,
                input.method,
                operation_code,
                caller.user_id,
                Utc::now()
            ],
        )?;
        let payment = find_payment(tx, tx.last_insert_rowid())?;

        let settled = paid + input.amount == order.total;
        if settled {
            close_order(tx, &order)?;
        }

        Ok((payment, settled))
    });

    match result {
        Ok((payment, settled)) => {
            info!(
                payment_id = payment.id,
                order_id = payment.order_id,
                shift_id = payment.shift_id,
                method = %payment.method,
                amount = %payment.amount,
                settled,
                "Payment recorded"
            );
            Ok(payment)
        }
        Err(e) => {
            warn!(order_id = input.order_id, kind = e.kind(), error = %e, "Payment rejected");
            Err(e)
        }
    }
}

pub fn get_order_payments(db: &Database, order_id: i64) -> PosResult<Vec<Payment>> {
    db.read(|conn| {
        find_order(conn, order_id)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM payments WHERE order_id = ?1 ORDER BY id",
            PAYMENT_COLUMNS
        ))?;
        let payments = stmt
            .query_map([order_id], payment_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(payments)
    })
}
