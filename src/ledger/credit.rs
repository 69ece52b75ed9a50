use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::{PosError, PosResult};
use crate::models::Company;
use crate::money::Money;

pub(crate) const COMPANY_COLUMNS: &str =
    "id, legal_name, tax_id, has_credit, credit_limit, credit_used, created_at";

pub(crate) fn company_from_row(row: &Row<'_>) -> rusqlite::Result<Company> {
    Ok(Company {
        id: row.get(0)?,
        legal_name: row.get(1)?,
        tax_id: row.get(2)?,
        has_credit: row.get(3)?,
        credit_limit: row.get(4)?,
        credit_used: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn find_company(conn: &Connection, id: i64) -> PosResult<Company> {
    conn.query_row(
        &format!("SELECT {} FROM companies WHERE id = ?1", COMPANY_COLUMNS),
        [id],
        company_from_row,
    )
    .optional()?
    .ok_or(PosError::CompanyNotFound(id))
}

/// Checks that `amount` fits in the company's remaining credit. Writes nothing.
pub fn authorize(conn: &Connection, company_id: i64, amount: Money) -> PosResult<Company> {
    let company = find_company(conn, company_id)?;

    if !company.has_credit {
        return Err(PosError::CreditDisabled { company_id });
    }

    let available = company.available_credit();
    if amount > available {
        return Err(PosError::CreditExceeded {
            company_id,
            available,
            requested: amount,
        });
    }

    Ok(company)
}

/// Adds `amount` to the company's used credit.
pub fn commit(conn: &Connection, company_id: i64, amount: Money) -> PosResult<Money> {
    if amount.is_negative() {
        return Err(PosError::invalid("credit amount must not be negative"));
    }

    let used: Option<Money> = conn
        .query_row(
            "UPDATE companies SET credit_used = credit_used + ?1
             WHERE id = ?2 AND has_credit = 1 AND credit_used + ?1 <= credit_limit
             RETURNING credit_used",
            params![amount, company_id],
            |row| row.get(0),
        )
        .optional()?;

    match used {
        Some(used) => {
            debug!(company_id, %amount, %used, "Credit committed");
            Ok(used)
        }
        None => {
            // Guard failed: report the precise reason.
            authorize(conn, company_id, amount)?;
            Err(PosError::Internal(format!(
                "credit commit for company {} rejected without cause",
                company_id
            )))
        }
    }
}

/// Gives back `amount` of used credit (amortization or cancellation).
pub fn release(conn: &Connection, company_id: i64, amount: Money) -> PosResult<Money> {
    if !amount.is_positive() {
        return Err(PosError::invalid("released amount must be positive"));
    }

    let company = find_company(conn, company_id)?;
    if amount > company.credit_used {
        return Err(PosError::invalid(format!(
            "cannot release {} from company {}: only {} in use",
            amount, company_id, company.credit_used
        )));
    }

    let used: Money = conn.query_row(
        "UPDATE companies SET credit_used = credit_used - ?1
         WHERE id = ?2 AND credit_used >= ?1
         RETURNING credit_used",
        params![amount, company_id],
        |row| row.get(0),
    )?;

    debug!(company_id, %amount, %used, "Credit released");
    Ok(used)
}
