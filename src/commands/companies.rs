use chrono::Utc;
use tracing::info;

use crate::db::Database;
use crate::error::{PosError, PosResult};
use crate::ledger::credit::{self, company_from_row, find_company, COMPANY_COLUMNS};
use crate::models::{Company, CreateCompany, UpdateCreditLine};
use crate::money::Money;

pub fn get_companies(db: &Database) -> PosResult<Vec<Company>> {
    db.read(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM companies ORDER BY legal_name",
            COMPANY_COLUMNS
        ))?;

        let companies = stmt
            .query_map([], company_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(companies)
    })
}

pub fn get_company(db: &Database, id: i64) -> PosResult<Company> {
    db.read(|conn| find_company(conn, id))
}

pub fn create_company(db: &Database, company: CreateCompany) -> PosResult<Company> {
    let legal_name = company.legal_name.trim().to_string();
    let tax_id = company.tax_id.trim().to_string();
    if legal_name.is_empty() || tax_id.is_empty() {
        return Err(PosError::invalid("legal name and tax id are required"));
    }
    if company.credit_limit.is_negative() {
        return Err(PosError::invalid("credit limit must not be negative"));
    }

    let credit_limit = if company.has_credit {
        company.credit_limit
    } else {
        Money::ZERO
    };

    let created = db.transaction(|tx| {
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM companies WHERE tax_id = ?1)",
            [&tax_id],
            |row| row.get(0),
        )?;
        if exists {
            return Err(PosError::DuplicateTaxId(tax_id.clone()));
        }

        tx.execute(
            "INSERT INTO companies (legal_name, tax_id, has_credit, credit_limit, credit_used, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            rusqlite::params![legal_name, tax_id, company.has_credit, credit_limit, Utc::now()],
        )?;

        find_company(tx, tx.last_insert_rowid())
    })?;

    info!(company_id = created.id, tax_id = %created.tax_id, "Company created");
    Ok(created)
}

/// Changes the credit line. The limit cannot drop below what is already in
/// use, and credit can only be switched off once nothing is owed.
pub fn update_credit_line(db: &Database, id: i64, update: UpdateCreditLine) -> PosResult<Company> {
    if update.credit_limit.is_negative() {
        return Err(PosError::invalid("credit limit must not be negative"));
    }

    db.transaction(|tx| {
        let company = find_company(tx, id)?;

        if update.has_credit && update.credit_limit < company.credit_used {
            return Err(PosError::invalid(format!(
                "credit limit {} is below the {} already in use",
                update.credit_limit, company.credit_used
            )));
        }
        if !update.has_credit && company.credit_used.is_positive() {
            return Err(PosError::invalid(format!(
                "cannot disable credit while {} is still owed",
                company.credit_used
            )));
        }

        let limit = if update.has_credit {
            update.credit_limit
        } else {
            Money::ZERO
        };
        tx.execute(
            "UPDATE companies SET has_credit = ?1, credit_limit = ?2 WHERE id = ?3",
            rusqlite::params![update.has_credit, limit, id],
        )?;

        find_company(tx, id)
    })
}

/// Amortization: the company paid back part of its balance.
pub fn release_credit(db: &Database, id: i64, amount: Money) -> PosResult<Company> {
    let company = db.transaction(|tx| {
        credit::release(tx, id, amount)?;
        find_company(tx, id)
    })?;

    info!(company_id = id, %amount, used = %company.credit_used, "Credit released");
    Ok(company)
}
