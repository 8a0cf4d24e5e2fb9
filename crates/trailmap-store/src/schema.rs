//! Database schema.
//!
//! The store owns exactly one table. The schema version lives in
//! `PRAGMA user_version` so no bookkeeping tables are added next to it.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Name of the sample table.
pub const TABLE: &str = "LocationData";

/// Column holding the store-assigned id.
const ID_COLUMN: &str = "Id";

/// Columns the sample table must provide.
const REQUIRED_COLUMNS: [&str; 3] = [ID_COLUMN, "Latitude", "Longitude"];

/// Initialize the database schema.
///
/// Safe to call on a database that already holds the table, including one
/// written by an earlier application that never set a schema version. Runs
/// in one transaction: a database whose table is rejected is left exactly
/// as it was found.
pub fn initialize(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    create_schema_v1(&tx)?;
    verify(&tx)?;
    if get_schema_version(&tx)? < SCHEMA_VERSION {
        set_schema_version(&tx, SCHEMA_VERSION)?;
    }

    tx.commit()?;
    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Create the initial schema (version 1) unless the table already exists.
fn create_schema_v1(conn: &Connection) -> Result<()> {
    // AUTOINCREMENT keeps ids from being reused after a clear.
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS LocationData (
            Id INTEGER PRIMARY KEY AUTOINCREMENT,
            Latitude REAL NOT NULL,
            Longitude REAL NOT NULL
        );
        "#,
    )?;

    Ok(())
}

/// One row of `PRAGMA table_info`.
struct ColumnInfo {
    name: String,
    decl_type: String,
    pk: i32,
}

/// Check that the sample table has the expected columns and that `Id` is
/// the table's rowid (a lone `INTEGER PRIMARY KEY`).
fn verify(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({TABLE})"))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                decl_type: row.get(2)?,
                pk: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let missing: Vec<&'static str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|required| !columns.iter().any(|c| c.name.eq_ignore_ascii_case(required)))
        .collect();
    if !missing.is_empty() {
        return Err(Error::SchemaMismatch {
            table: TABLE,
            missing,
        });
    }

    let key_columns = columns.iter().filter(|c| c.pk > 0).count();
    let Some(id) = columns.iter().find(|c| c.name.eq_ignore_ascii_case(ID_COLUMN)) else {
        return Ok(());
    };
    let found = if id.pk == 0 {
        format!("{} column without a primary key", describe_type(&id.decl_type))
    } else if key_columns > 1 {
        "part of a composite primary key".to_string()
    } else if !id.decl_type.eq_ignore_ascii_case("INTEGER") {
        format!("{} PRIMARY KEY", describe_type(&id.decl_type))
    } else {
        return Ok(());
    };

    Err(Error::InvalidKey {
        table: TABLE,
        column: ID_COLUMN,
        found,
    })
}

fn describe_type(decl_type: &str) -> &str {
    if decl_type.is_empty() {
        "untyped"
    } else {
        decl_type
    }
}
