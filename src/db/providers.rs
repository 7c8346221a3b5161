// src/db/providers.rs
use crate::db::users::{get_or_create_user, normalize_email, set_user_role};
use crate::domain::ApplicationStatus;
use crate::errors::AppError;
use crate::ids::generate_id;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct NewProviderApplication {
    pub email: String,
    pub name: String,
    pub pincodes: Vec<String>,
    pub service_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderApplication {
    pub id: String,
    pub email: String,
    pub name: String,
    pub pincodes: Vec<String>,
    pub service_types: Vec<String>,
    pub status: ApplicationStatus,
    pub reason: Option<String>,
    pub provider_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Trimmed, lowercased, non-empty and de-duplicated.
fn clean_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn split_list(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn submit_application(
    conn: &Connection,
    app: &NewProviderApplication,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let email = normalize_email(&app.email)?;
    let name = app.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("provider name is required".into()));
    }
    let pincodes = clean_list(&app.pincodes);
    let service_types = clean_list(&app.service_types);
    if pincodes.is_empty() || service_types.is_empty() {
        return Err(AppError::BadRequest(
            "at least one pincode and one service type are required".into(),
        ));
    }

    let pending: i64 = conn
        .query_row(
            "select count(*) from provider_applications where email = ? and status = ?",
            params![email, ApplicationStatus::Pending],
            |r| r.get(0),
        )
        .map_err(|e| AppError::DbError(format!("count pending applications failed: {e}")))?;
    if pending > 0 {
        return Err(AppError::Conflict(format!(
            "{email} already has a pending application"
        )));
    }

    let id = generate_id("app");
    conn.execute(
        r#"
        insert into provider_applications (id, email, name, pincodes, service_types, submitted_at)
        values (?, ?, ?, ?, ?, ?)
        "#,
        params![id, email, name, pincodes.join(","), service_types.join(","), now],
    )
    .map_err(|e| AppError::DbError(format!("insert application failed: {e}")))?;

    tracing::info!(application_id = %id, %email, "provider application submitted");
    Ok(id)
}

pub fn load_application(
    conn: &Connection,
    id: &str,
) -> Result<Option<ProviderApplication>, AppError> {
    conn.query_row(
        r#"
        select id, email, name, pincodes, service_types, status, reason, provider_id,
               submitted_at, reviewed_at
        from provider_applications
        where id = ?
        "#,
        params![id],
        |r| {
            let pincodes: String = r.get(3)?;
            let service_types: String = r.get(4)?;
            Ok(ProviderApplication {
                id: r.get(0)?,
                email: r.get(1)?,
                name: r.get(2)?,
                pincodes: split_list(&pincodes),
                service_types: split_list(&service_types),
                status: r.get(5)?,
                reason: r.get(6)?,
                provider_id: r.get(7)?,
                submitted_at: r.get(8)?,
                reviewed_at: r.get(9)?,
            })
        },
    )
    .optional()
    .map_err(|e| AppError::DbError(format!("select application failed: {e}")))
}

/// Approve a pending application. Writes the application, the provider
/// (with areas and services) and the user's role in one transaction, so a
/// failure part-way leaves none of them changed.
pub fn approve_application(
    conn: &mut Connection,
    application_id: &str,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let tx = conn
        .transaction()
        .map_err(|e| AppError::DbError(format!("begin tx failed: {e}")))?;

    let app = load_application(&tx, application_id)?.ok_or(AppError::NotFound)?;
    if app.status != ApplicationStatus::Pending {
        return Err(AppError::Conflict(format!(
            "application {application_id} is already {}",
            app.status
        )));
    }

    let user_id = get_or_create_user(&tx, &app.email, &app.name, now)?;
    let provider_id = generate_id("prv");

    tx.execute(
        "insert into providers (id, user_id, name, created_at) values (?, ?, ?, ?)",
        params![provider_id, user_id, app.name, now],
    )
    .map_err(|e| AppError::DbError(format!("insert provider failed: {e}")))?;

    for pincode in &app.pincodes {
        tx.execute(
            "insert into provider_areas (provider_id, pincode) values (?, ?)",
            params![provider_id, pincode],
        )
        .map_err(|e| AppError::DbError(format!("insert provider area failed: {e}")))?;
    }
    for service_type in &app.service_types {
        tx.execute(
            "insert into provider_services (provider_id, service_type) values (?, ?)",
            params![provider_id, service_type],
        )
        .map_err(|e| AppError::DbError(format!("insert provider service failed: {e}")))?;
    }

    set_user_role(&tx, user_id, "provider")?;

    tx.execute(
        r#"
        update provider_applications
        set status = ?, provider_id = ?, reviewed_at = ?
        where id = ? and status = ?
        "#,
        params![
            ApplicationStatus::Approved,
            provider_id,
            now,
            application_id,
            ApplicationStatus::Pending
        ],
    )
    .map_err(|e| AppError::DbError(format!("update application failed: {e}")))?;

    tx.commit()
        .map_err(|e| AppError::DbError(format!("commit tx failed: {e}")))?;

    tracing::info!(%application_id, %provider_id, "provider application approved");
    Ok(provider_id)
}

pub fn reject_application(
    conn: &Connection,
    application_id: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let updated = conn
        .execute(
            r#"
            update provider_applications
            set status = ?, reason = ?, reviewed_at = ?
            where id = ? and status = ?
            "#,
            params![
                ApplicationStatus::Rejected,
                reason,
                now,
                application_id,
                ApplicationStatus::Pending
            ],
        )
        .map_err(|e| AppError::DbError(format!("reject application failed: {e}")))?;

    if updated != 1 {
        return match load_application(conn, application_id)? {
            None => Err(AppError::NotFound),
            Some(app) => Err(AppError::Conflict(format!(
                "application {application_id} is already {}",
                app.status
            ))),
        };
    }

    tracing::info!(%application_id, "provider application rejected");
    Ok(())
}

pub fn set_provider_active(
    conn: &Connection,
    provider_id: &str,
    active: bool,
) -> Result<(), AppError> {
    let updated = conn
        .execute(
            "update providers set active = ? where id = ?",
            params![active, provider_id],
        )
        .map_err(|e| AppError::DbError(format!("update provider failed: {e}")))?;
    if updated != 1 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Active providers serving `pincode` that offer at least one of `service_types`.
pub fn matching_providers(
    conn: &Connection,
    pincode: &str,
    service_types: &BTreeSet<String>,
) -> Result<BTreeSet<String>, AppError> {
    let mut stmt = conn
        .prepare(
            r#"
            select p.id
            from providers p
            join provider_areas a on a.provider_id = p.id
            join provider_services s on s.provider_id = p.id
            where p.active = 1 and a.pincode = ? and s.service_type = ?
            "#,
        )
        .map_err(|e| AppError::DbError(format!("prepare provider match failed: {e}")))?;

    let mut matched = BTreeSet::new();
    for service_type in service_types {
        let rows = stmt
            .query_map(params![pincode.trim(), service_type], |r| r.get::<_, String>(0))
            .map_err(|e| AppError::DbError(format!("provider match failed: {e}")))?;
        for row in rows {
            matched.insert(row.map_err(|e| AppError::DbError(e.to_string()))?);
        }
    }
    Ok(matched)
}

pub fn count_active_providers(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row("select count(*) from providers where active = 1", [], |r| {
        r.get(0)
    })
    .map_err(|e| AppError::DbError(format!("count providers failed: {e}")))
}

pub fn count_pending_applications(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row(
        "select count(*) from provider_applications where status = ?",
        [ApplicationStatus::Pending],
        |r| r.get(0),
    )
    .map_err(|e| AppError::DbError(format!("count applications failed: {e}")))
}
