use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;

use crate::domain::TableKind;
use crate::error::KiraError;

/// Handle on the SQLite file. Every operation opens its own connection; the
/// connection closes when it goes out of scope, on success and on error alike.
#[derive(Debug, Clone)]
pub struct Store {
    db_path: Utf8PathBuf,
}

impl Store {
    pub fn new(db_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Utf8Path {
        &self.db_path
    }

    /// Opens the database for writing, creating the file if needed.
    ///
    /// Foreign keys are declared in the schema but not enforced, so tables can
    /// be loaded and reloaded in any order.
    pub fn open(&self) -> Result<Connection, KiraError> {
        let conn = Connection::open(self.db_path.as_std_path()).map_err(|err| {
            KiraError::Database(format!("open {}: {err}", self.db_path))
        })?;
        conn.pragma_update(None, "foreign_keys", false)?;
        Ok(conn)
    }

    /// Opens an existing database without write access.
    pub fn open_read_only(&self) -> Result<Connection, KiraError> {
        Connection::open_with_flags(
            self.db_path.as_std_path(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|err| KiraError::Database(format!("open {}: {err}", self.db_path)))
    }

    pub fn table_exists(conn: &Connection, table: TableKind) -> Result<bool, KiraError> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table.table_name()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn count_rows(conn: &Connection, table: TableKind) -> Result<i64, KiraError> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.table_name());
        let count = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }

    /// Presence and row count of every table.
    pub fn status(&self) -> Result<StoreStatus, KiraError> {
        let conn = self.open_read_only()?;
        let mut tables = Vec::with_capacity(TableKind::ALL.len());
        for table in TableKind::ALL {
            let exists = Self::table_exists(&conn, table)?;
            let rows = if exists {
                Self::count_rows(&conn, table)?
            } else {
                0
            };
            tables.push(TableStatus {
                table,
                exists,
                rows,
            });
        }
        Ok(StoreStatus { tables })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub tables: Vec<TableStatus>,
}

impl StoreStatus {
    pub fn table(&self, table: TableKind) -> Option<&TableStatus> {
        self.tables.iter().find(|status| status.table == table)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableStatus {
    pub table: TableKind,
    pub exists: bool,
    pub rows: i64,
}
