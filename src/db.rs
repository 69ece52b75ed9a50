use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{PosError, PosResult};

/// How long a connection waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> PosResult<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .map_err(|e| PosError::Internal(format!("create data directory: {}", e)))?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> PosResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> PosResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    pub fn initialize(&self) -> PosResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "
            -- Catalog
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                price INTEGER NOT NULL CHECK (price >= 0),
                cost INTEGER NOT NULL DEFAULT 0 CHECK (cost >= 0),
                stock_tracked INTEGER NOT NULL DEFAULT 0,
                stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
                available INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            -- Dining room tables
            CREATE TABLE IF NOT EXISTS dining_tables (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                label TEXT NOT NULL UNIQUE,
                seats INTEGER NOT NULL DEFAULT 4,
                occupied INTEGER NOT NULL DEFAULT 0
            );

            -- Corporate credit accounts
            CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                legal_name TEXT NOT NULL,
                tax_id TEXT NOT NULL UNIQUE,
                has_credit INTEGER NOT NULL DEFAULT 0,
                credit_limit INTEGER NOT NULL DEFAULT 0 CHECK (credit_limit >= 0),
                credit_used INTEGER NOT NULL DEFAULT 0 CHECK (credit_used >= 0),
                created_at TEXT NOT NULL
            );

            -- Orders
            CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                table_id INTEGER,
                customer_id INTEGER,
                company_id INTEGER,
                is_credit INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'PENDING',
                total INTEGER NOT NULL,
                created_by INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                closed_at TEXT,
                FOREIGN KEY (table_id) REFERENCES dining_tables(id),
                FOREIGN KEY (company_id) REFERENCES companies(id)
            );

            -- A table carries at most one pending order
            CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_pending_table
                ON orders(table_id) WHERE status = 'PENDING' AND table_id IS NOT NULL;

            -- Order lines, nested through parent_line_id
            CREATE TABLE IF NOT EXISTS order_lines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id INTEGER NOT NULL,
                product_id INTEGER NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity >= 1),
                unit_price INTEGER NOT NULL,
                note TEXT,
                parent_line_id INTEGER,
                FOREIGN KEY (order_id) REFERENCES orders(id),
                FOREIGN KEY (product_id) REFERENCES products(id),
                FOREIGN KEY (parent_line_id) REFERENCES order_lines(id)
            );

            -- Kardex
            CREATE TABLE IF NOT EXISTS inventory_movements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity > 0),
                delta INTEGER NOT NULL,
                stock_after INTEGER NOT NULL,
                unit_cost INTEGER NOT NULL DEFAULT 0,
                reason TEXT NOT NULL,
                order_id INTEGER,
                created_at TEXT NOT NULL,
                FOREIGN KEY (product_id) REFERENCES products(id),
                FOREIGN KEY (order_id) REFERENCES orders(id)
            );

            -- Cash shifts
            CREATE TABLE IF NOT EXISTS cash_shifts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cashier_id INTEGER NOT NULL,
                opening_float INTEGER NOT NULL CHECK (opening_float >= 0),
                opened_at TEXT NOT NULL,
                closed_at TEXT,
                counted_amount INTEGER,
                notes TEXT,
                is_open INTEGER NOT NULL DEFAULT 1
            );

            -- A cashier holds at most one open shift
            CREATE UNIQUE INDEX IF NOT EXISTS idx_cash_shifts_open_cashier
                ON cash_shifts(cashier_id) WHERE is_open = 1;

            -- Payments
            CREATE TABLE IF NOT EXISTS payments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id INTEGER NOT NULL,
                shift_id INTEGER NOT NULL,
                amount INTEGER NOT NULL CHECK (amount > 0),
                method TEXT NOT NULL,
                operation_code TEXT,
                created_by INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (order_id) REFERENCES orders(id),
                FOREIGN KEY (shift_id) REFERENCES cash_shifts(id)
            );
            ",
        )?;

        // Run migrations for existing databases (pass connection to avoid deadlock)
        Self::migrate_conn(&conn)?;

        Ok(())
    }

    fn migrate_conn(conn: &Connection) -> rusqlite::Result<()> {
        let order_columns = Self::columns(conn, "orders")?;
        if !order_columns.iter().any(|c| c == "closed_at") {
            conn.execute("ALTER TABLE orders ADD COLUMN closed_at TEXT", [])?;
        }

        let shift_columns = Self::columns(conn, "cash_shifts")?;
        if !shift_columns.iter().any(|c| c == "notes") {
            conn.execute("ALTER TABLE cash_shifts ADD COLUMN notes TEXT", [])?;
        }

        Ok(())
    }

    fn columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    fn lock(&self) -> PosResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| PosError::Internal(format!("database lock poisoned: {}", e)))
    }

    /// Runs `f` inside one write-locking transaction.
    ///
    /// The transaction is opened with `BEGIN IMMEDIATE`, so the write lock is
    /// held from the first read; competing connections wait on the busy
    /// timeout. Returning `Err` from `f` drops the transaction, rolling back
    /// every write it made.
    pub fn transaction<T, F>(&self, f: F) -> PosResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> PosResult<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Runs read-only work on the shared connection.
    pub fn read<T, F>(&self, f: F) -> PosResult<T>
    where
        F: FnOnce(&Connection) -> PosResult<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }
}
