//! Read-only view of the `cases` table. Cases are owned by the case
//! subsystem; the pipeline only reads the client name as a company hint.

use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};

/// Inserts a case row. Used by the upload side and by tests.
pub fn insert(db: &Database, client_name: &str) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO cases (client_name) VALUES (?1)",
            params![client_name],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Client name of a case, or `None` if the case does not exist.
pub fn client_name(db: &Database, case_id: i64) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let name = conn
            .query_row(
                "SELECT client_name FROM cases WHERE id = ?1",
                params![case_id],
                |r| r.get::<_, String>(0),
            )
            .optional()?;
        Ok(name)
    })
}
