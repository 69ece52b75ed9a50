use rusqlite::{Connection, OptionalExtension, Row};

use crate::db::Database;
use crate::error::{PosError, PosResult};
use crate::models::{CreateTable, DiningTable};

const TABLE_COLUMNS: &str = "id, label, seats, occupied";

fn table_from_row(row: &Row<'_>) -> rusqlite::Result<DiningTable> {
    Ok(DiningTable {
        id: row.get(0)?,
        label: row.get(1)?,
        seats: row.get(2)?,
        occupied: row.get(3)?,
    })
}

pub(crate) fn find_table(conn: &Connection, id: i64) -> PosResult<DiningTable> {
    conn.query_row(
        &format!("SELECT {} FROM dining_tables WHERE id = ?1", TABLE_COLUMNS),
        [id],
        table_from_row,
    )
    .optional()?
    .ok_or(PosError::TableNotFound(id))
}

/// FREE -> OCCUPIED. Fails with `TableOccupied` if another order holds it.
pub(crate) fn occupy(conn: &Connection, id: i64) -> PosResult<DiningTable> {
    let table = find_table(conn, id)?;

    let changed = conn.execute(
        "UPDATE dining_tables SET occupied = 1 WHERE id = ?1 AND occupied = 0",
        [id],
    )?;
    if changed == 0 {
        return Err(PosError::TableOccupied {
            table_id: id,
            label: table.label,
        });
    }

    Ok(DiningTable {
        occupied: true,
        ..table
    })
}

/// OCCUPIED -> FREE.
pub(crate) fn release(conn: &Connection, id: i64) -> PosResult<()> {
    let changed = conn.execute(
        "UPDATE dining_tables SET occupied = 0 WHERE id = ?1 AND occupied = 1",
        [id],
    )?;
    if changed == 0 {
        return Err(PosError::Internal(format!(
            "table {} was not occupied by the order being closed",
            id
        )));
    }
    Ok(())
}

pub fn get_tables(db: &Database) -> PosResult<Vec<DiningTable>> {
    db.read(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM dining_tables ORDER BY label",
            TABLE_COLUMNS
        ))?;

        let tables = stmt
            .query_map([], table_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(tables)
    })
}

pub fn get_table(db: &Database, id: i64) -> PosResult<DiningTable> {
    db.read(|conn| find_table(conn, id))
}

pub fn create_table(db: &Database, table: CreateTable) -> PosResult<DiningTable> {
    let label = table.label.trim().to_string();
    if label.is_empty() {
        return Err(PosError::invalid("table label is required"));
    }
    if table.seats < 1 {
        return Err(PosError::invalid("a table needs at least one seat"));
    }

    db.transaction(|tx| {
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM dining_tables WHERE label = ?1)",
            [&label],
            |row| row.get(0),
        )?;
        if exists {
            return Err(PosError::DuplicateTable(label.clone()));
        }

        tx.execute(
            "INSERT INTO dining_tables (label, seats, occupied) VALUES (?1, ?2, 0)",
            rusqlite::params![label, table.seats],
        )?;

        find_table(tx, tx.last_insert_rowid())
    })
}
