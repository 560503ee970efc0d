//! Wide-column row store on top of SQLite.
//!
//! Each logical table is a SQLite table of `(row_key, family, qualifier,
//! value)` cells. A catalog table records the declared column families and
//! the region split keys of every logical table.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::{Row, RowStore, StoreError};

/// Row store handle. One connection, serialised between workers.
pub struct SqliteRowStore {
    conn: Mutex<Connection>,
}

impl SqliteRowStore {
    /// Open or create a row store database.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(30))?;
        Self::with_connection(conn)
    }

    /// Open an in-memory row store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS row_tables (
                name TEXT PRIMARY KEY,
                families TEXT NOT NULL,
                split_keys TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Close the underlying connection, reporting any error on the way out.
    pub fn close(self) -> Result<(), StoreError> {
        let conn = self.conn.into_inner().unwrap_or_else(PoisonError::into_inner);
        conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }

    /// Region split keys a table was created with.
    pub fn split_keys(&self, table: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.conn();
        let raw: Option<String> = conn
            .query_row(
                "SELECT split_keys FROM row_tables WHERE name = ?1",
                params![table],
                |row| row.get(0),
            )
            .optional()?;
        let raw = raw.ok_or_else(|| StoreError::NoSuchTable(table.to_string()))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Number of regions a table is split into.
    pub fn region_count(&self, table: &str) -> Result<usize, StoreError> {
        Ok(self.split_keys(table)?.len() + 1)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Table and family names end up in SQL identifiers.
fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn cells_table(name: &str) -> Result<String, StoreError> {
    validate_name(name)?;
    Ok(format!("\"cells_{name}\""))
}

fn families(conn: &Connection, table: &str) -> Result<Vec<String>, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT families FROM row_tables WHERE name = ?1",
            params![table],
            |row| row.get(0),
        )
        .optional()?;
    let raw = raw.ok_or_else(|| StoreError::NoSuchTable(table.to_string()))?;
    Ok(serde_json::from_str(&raw)?)
}

/// Resolve the physical table for `table`, checking `family` is declared.
fn family_table(conn: &Connection, table: &str, family: &str) -> Result<String, StoreError> {
    if !families(conn, table)?.iter().any(|f| f == family) {
        return Err(StoreError::NoSuchFamily {
            table: table.to_string(),
            family: family.to_string(),
        });
    }
    cells_table(table)
}

impl RowStore for SqliteRowStore {
    fn create_table(
        &self,
        name: &str,
        families: &[&str],
        split_keys: &[String],
    ) -> Result<bool, StoreError> {
        let physical = cells_table(name)?;
        for family in families {
            validate_name(family)?;
        }

        let mut conn = self.conn();
        if table_exists(&conn, name)? {
            return Ok(false);
        }

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO row_tables (name, families, split_keys) VALUES (?1, ?2, ?3)",
            params![
                name,
                serde_json::to_string(families)?,
                serde_json::to_string(split_keys)?
            ],
        )?;
        tx.execute_batch(&format!(
            r#"
            CREATE TABLE {physical} (
                row_key TEXT NOT NULL,
                family TEXT NOT NULL,
                qualifier TEXT NOT NULL,
                value BLOB NOT NULL,
                PRIMARY KEY (row_key, family, qualifier)
            ) WITHOUT ROWID;
            CREATE INDEX "idx_cells_{name}_family" ON {physical}(family, row_key);
            "#
        ))?;
        tx.commit()?;

        debug!(table = name, ?families, regions = split_keys.len() + 1, "Created table");
        Ok(true)
    }

    fn delete_table(&self, name: &str) -> Result<bool, StoreError> {
        let physical = cells_table(name)?;
        let mut conn = self.conn();
        if !table_exists(&conn, name)? {
            return Ok(false);
        }

        let tx = conn.transaction()?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {physical};"))?;
        tx.execute("DELETE FROM row_tables WHERE name = ?1", params![name])?;
        tx.commit()?;

        debug!(table = name, "Deleted table");
        Ok(true)
    }

    fn table_exists(&self, name: &str) -> Result<bool, StoreError> {
        table_exists(&self.conn(), name)
    }

    fn put(
        &self,
        table: &str,
        row_key: &str,
        family: &str,
        column: &str,
        value: &[u8],
    ) -> Result<(), StoreError> {
        let conn = self.conn();
        let physical = family_table(&conn, table, family)?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {physical} (row_key, family, qualifier, value) VALUES (?1, ?2, ?3, ?4)"
            ),
            params![row_key, family, column, value],
        )?;
        Ok(())
    }

    fn put_row(
        &self,
        table: &str,
        row_key: &str,
        family: &str,
        cells: &[(&str, Vec<u8>)],
    ) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let physical = family_table(&conn, table, family)?;

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO {physical} (row_key, family, qualifier, value) VALUES (?1, ?2, ?3, ?4)"
            ))?;
            for (column, value) in cells {
                stmt.execute(params![row_key, family, column, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get(&self, table: &str, row_key: &str, family: &str) -> Result<Option<Row>, StoreError> {
        let conn = self.conn();
        let physical = family_table(&conn, table, family)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT qualifier, value FROM {physical} WHERE row_key = ?1 AND family = ?2 ORDER BY qualifier"
        ))?;
        let cells = stmt.query_map(params![row_key, family], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut found = BTreeMap::new();
        for cell in cells {
            let (qualifier, value) = cell?;
            found.insert(qualifier, value);
        }

        if found.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Row {
                key: row_key.to_string(),
                cells: found,
            }))
        }
    }

    fn scan(
        &self,
        table: &str,
        family: &str,
        column: Option<&str>,
    ) -> Result<Vec<Row>, StoreError> {
        let conn = self.conn();
        let physical = family_table(&conn, table, family)?;

        let mut stmt = conn.prepare(&format!(
            r#"SELECT row_key, qualifier, value FROM {physical}
               WHERE family = ?1 AND (?2 IS NULL OR qualifier = ?2)
               ORDER BY row_key, qualifier"#
        ))?;
        let cells = stmt.query_map(params![family, column], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })?;

        let mut rows: Vec<Row> = Vec::new();
        for cell in cells {
            let (key, qualifier, value) = cell?;
            match rows.last_mut() {
                Some(row) if row.key == key => {
                    row.cells.insert(qualifier, value);
                }
                _ => rows.push(Row {
                    key,
                    cells: BTreeMap::from([(qualifier, value)]),
                }),
            }
        }

        Ok(rows)
    }

    fn count_rows(&self, table: &str, prefix: Option<&str>) -> Result<u64, StoreError> {
        let conn = self.conn();
        families(&conn, table)?;
        let physical = cells_table(table)?;

        let count: i64 = conn.query_row(
            &format!(
                r#"SELECT COUNT(DISTINCT row_key) FROM {physical}
                   WHERE ?1 IS NULL OR substr(row_key, 1, length(?1)) = ?1"#
            ),
            params![prefix],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn delete_row(&self, table: &str, row_key: &str) -> Result<(), StoreError> {
        let conn = self.conn();
        families(&conn, table)?;
        let physical = cells_table(table)?;
        conn.execute(
            &format!("DELETE FROM {physical} WHERE row_key = ?1"),
            params![row_key],
        )?;
        Ok(())
    }
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM row_tables WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}
