// src/db/users.rs
use crate::errors::AppError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

/// Trim + lowercase, minimal sanity check.
pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let e = email.trim().to_lowercase();
    if e.is_empty() || !e.contains('@') || e.starts_with('@') || e.ends_with('@') {
        return Err(AppError::BadRequest("invalid email".into()));
    }
    Ok(e)
}

/// Insert a user if they don't exist, then return the user id.
/// Email should already be normalized by caller.
pub fn get_or_create_user(
    conn: &Connection,
    email: &str,
    name: &str,
    now: DateTime<Utc>,
) -> Result<i64, AppError> {
    conn.execute(
        "insert or ignore into users (email, name, created_at) values (?, ?, ?)",
        params![email, name, now],
    )
    .map_err(|e| AppError::DbError(format!("insert user failed: {e}")))?;

    conn.query_row(
        "select id from users where email = ?",
        params![email],
        |row| row.get(0),
    )
    .map_err(|e| AppError::DbError(format!("select user id failed: {e}")))
}

pub fn set_user_role(conn: &Connection, user_id: i64, role: &str) -> Result<(), AppError> {
    let updated = conn
        .execute(
            "update users set role = ? where id = ?",
            params![role, user_id],
        )
        .map_err(|e| AppError::DbError(format!("update user role failed: {e}")))?;
    if updated != 1 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::apply_schema;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  A@B.com ").unwrap(), "a@b.com");
        assert!(normalize_email("nope").is_err());
        assert!(normalize_email("@x").is_err());
    }

    #[test]
    fn get_or_create_user_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let now = Utc::now();
        let id1 = get_or_create_user(&conn, "test@example.com", "T", now).unwrap();
        let id2 = get_or_create_user(&conn, "test@example.com", "T", now).unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn unknown_role_is_refused_by_schema() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let id = get_or_create_user(&conn, "r@example.com", "R", Utc::now()).unwrap();
        assert!(set_user_role(&conn, id, "provider").is_ok());
        assert!(matches!(
            set_user_role(&conn, id, "wizard"),
            Err(AppError::DbError(_))
        ));
        assert!(matches!(set_user_role(&conn, 9999, "admin"), Err(AppError::NotFound)));
    }
}
