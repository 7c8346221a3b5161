// src/db/requests.rs
use crate::db::providers::matching_providers;
use crate::db::users::{get_or_create_user, normalize_email};
use crate::domain::{
    derive_status, Customer, NewServiceRequest, OrderItem, OrderStatus, ProviderResponse,
    ResponseStatus, ServiceRequest,
};
use crate::errors::AppError;
use crate::ids::generate_id;
use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, BTreeSet};

/// Next value of the store-wide revision counter.
fn next_revision(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row(
        "select coalesce(max(revision), 0) + 1 from service_requests",
        [],
        |r| r.get(0),
    )
    .map_err(|e| AppError::DbError(format!("read revision failed: {e}")))
}

/// Refresh `updated_at` and bump `revision` after any mutation.
fn touch(conn: &Connection, request_id: &str, now: DateTime<Utc>) -> Result<(), AppError> {
    let revision = next_revision(conn)?;
    conn.execute(
        "update service_requests set updated_at = ?, revision = ? where id = ?",
        params![now, revision, request_id],
    )
    .map_err(|e| AppError::DbError(format!("touch request failed: {e}")))?;
    Ok(())
}

fn validate_items(items: &[OrderItem]) -> Result<i64, AppError> {
    if items.is_empty() {
        return Err(AppError::BadRequest("cart is empty".into()));
    }
    let mut total = 0i64;
    for item in items {
        if item.service_type.trim().is_empty() || item.name.trim().is_empty() {
            return Err(AppError::BadRequest(
                "every item needs a service type and a name".into(),
            ));
        }
        if item.quantity <= 0 {
            return Err(AppError::BadRequest(format!(
                "quantity for '{}' must be positive",
                item.name
            )));
        }
        if item.unit_price_cents < 0 {
            return Err(AppError::BadRequest(format!(
                "price for '{}' cannot be negative",
                item.name
            )));
        }
        total = item
            .unit_price_cents
            .checked_mul(item.quantity)
            .and_then(|line| line.checked_add(total))
            .ok_or_else(|| AppError::BadRequest("order total overflows".into()))?;
    }
    Ok(total)
}

/// Create a request from a customer's cart and fan it out to every matching
/// provider. Starts `pending` with no responses.
pub fn create_request(
    conn: &mut Connection,
    new: &NewServiceRequest,
    now: DateTime<Utc>,
) -> Result<ServiceRequest, AppError> {
    let email = normalize_email(&new.customer_email)?;
    let pincode = new.pincode.trim().to_string();
    if pincode.is_empty() {
        return Err(AppError::BadRequest("pincode is required".into()));
    }
    let items: Vec<OrderItem> = new
        .items
        .iter()
        .map(|item| OrderItem {
            service_type: item.service_type.trim().to_lowercase(),
            ..item.clone()
        })
        .collect();
    let total = validate_items(&items)?;

    let tx = conn
        .transaction()
        .map_err(|e| AppError::DbError(format!("begin tx failed: {e}")))?;

    let customer_id = get_or_create_user(&tx, &email, new.customer_name.trim(), now)?;
    let service_types: BTreeSet<String> = items.iter().map(|i| i.service_type.clone()).collect();
    let providers = matching_providers(&tx, &pincode, &service_types)?;

    let id = generate_id("req");
    let revision = next_revision(&tx)?;
    tx.execute(
        r#"
        insert into service_requests
          (id, customer_id, customer_name, address, pincode, status,
           total_amount_cents, created_at, updated_at, revision)
        values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            id,
            customer_id,
            new.customer_name.trim(),
            new.address.trim(),
            pincode,
            OrderStatus::Pending,
            total,
            now,
            now,
            revision
        ],
    )
    .map_err(|e| AppError::DbError(format!("insert request failed: {e}")))?;

    for item in &items {
        tx.execute(
            r#"
            insert into request_items (request_id, service_type, name, unit_price_cents, quantity)
            values (?, ?, ?, ?, ?)
            "#,
            params![id, item.service_type, item.name, item.unit_price_cents, item.quantity],
        )
        .map_err(|e| AppError::DbError(format!("insert request item failed: {e}")))?;
    }

    for provider_id in &providers {
        tx.execute(
            "insert into request_providers (request_id, provider_id) values (?, ?)",
            params![id, provider_id],
        )
        .map_err(|e| AppError::DbError(format!("insert request provider failed: {e}")))?;
    }

    tx.commit()
        .map_err(|e| AppError::DbError(format!("commit tx failed: {e}")))?;

    if providers.is_empty() {
        tracing::warn!(request_id = %id, %pincode, "no provider serves this request");
    }
    tracing::info!(
        request_id = %id,
        providers = providers.len(),
        total_cents = total,
        "service request created"
    );

    load_request(conn, &id)?.ok_or(AppError::InternalError)
}

pub fn load_request(conn: &Connection, id: &str) -> Result<Option<ServiceRequest>, AppError> {
    let base = conn
        .query_row(
            r#"
            select r.id, r.customer_id, u.email, r.customer_name, r.address, r.pincode,
                   r.status, r.total_amount_cents, r.created_at, r.updated_at, r.revision
            from service_requests r
            join users u on u.id = r.customer_id
            where r.id = ?
            "#,
            params![id],
            |r| {
                Ok(ServiceRequest {
                    id: r.get(0)?,
                    customer: Customer {
                        user_id: r.get(1)?,
                        email: r.get(2)?,
                        name: r.get(3)?,
                        address: r.get(4)?,
                        pincode: r.get(5)?,
                    },
                    status: r.get(6)?,
                    available_providers: BTreeSet::new(),
                    provider_responses: BTreeMap::new(),
                    items: Vec::new(),
                    total_amount_cents: r.get(7)?,
                    created_at: r.get(8)?,
                    updated_at: r.get(9)?,
                    revision: r.get(10)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::DbError(format!("select request failed: {e}")))?;

    let Some(mut request) = base else {
        return Ok(None);
    };

    let mut stmt = conn
        .prepare(
            r#"
            select service_type, name, unit_price_cents, quantity
            from request_items where request_id = ? order by id
            "#,
        )
        .map_err(|e| AppError::DbError(e.to_string()))?;
    let rows = stmt
        .query_map(params![id], |r| {
            Ok(OrderItem {
                service_type: r.get(0)?,
                name: r.get(1)?,
                unit_price_cents: r.get(2)?,
                quantity: r.get(3)?,
            })
        })
        .map_err(|e| AppError::DbError(e.to_string()))?;
    for row in rows {
        request
            .items
            .push(row.map_err(|e| AppError::DbError(e.to_string()))?);
    }

    let mut stmt = conn
        .prepare("select provider_id from request_providers where request_id = ?")
        .map_err(|e| AppError::DbError(e.to_string()))?;
    let rows = stmt
        .query_map(params![id], |r| r.get::<_, String>(0))
        .map_err(|e| AppError::DbError(e.to_string()))?;
    for row in rows {
        request
            .available_providers
            .insert(row.map_err(|e| AppError::DbError(e.to_string()))?);
    }

    let mut stmt = conn
        .prepare(
            "select provider_id, status, updated_at from provider_responses where request_id = ?",
        )
        .map_err(|e| AppError::DbError(e.to_string()))?;
    let rows = stmt
        .query_map(params![id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                ProviderResponse {
                    status: r.get(1)?,
                    updated_at: r.get(2)?,
                },
            ))
        })
        .map_err(|e| AppError::DbError(e.to_string()))?;
    for row in rows {
        let (provider_id, response) = row.map_err(|e| AppError::DbError(e.to_string()))?;
        request.provider_responses.insert(provider_id, response);
    }

    Ok(Some(request))
}

fn load_where(
    conn: &Connection,
    sql: &str,
    args: &[&dyn ToSql],
) -> Result<Vec<ServiceRequest>, AppError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| AppError::DbError(e.to_string()))?;
    let ids = stmt
        .query_map(args, |r| r.get::<_, String>(0))
        .map_err(|e| AppError::DbError(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::DbError(e.to_string()))?;

    let mut requests = Vec::with_capacity(ids.len());
    for id in ids {
        // Rows cannot disappear: requests are never deleted.
        if let Some(request) = load_request(conn, &id)? {
            requests.push(request);
        }
    }
    Ok(requests)
}

pub fn list_requests(conn: &Connection) -> Result<Vec<ServiceRequest>, AppError> {
    load_where(
        conn,
        "select id from service_requests order by created_at desc, revision desc",
        &[],
    )
}

pub fn list_requests_for_customer(
    conn: &Connection,
    email: &str,
) -> Result<Vec<ServiceRequest>, AppError> {
    let email = normalize_email(email)?;
    load_where(
        conn,
        r#"
        select r.id from service_requests r
        join users u on u.id = r.customer_id
        where u.email = ?
        order by r.created_at desc, r.revision desc
        "#,
        &[&email],
    )
}

/// Requests this provider was fanned out to, newest first.
pub fn list_requests_for_provider(
    conn: &Connection,
    provider_id: &str,
) -> Result<Vec<ServiceRequest>, AppError> {
    load_where(
        conn,
        r#"
        select r.id from service_requests r
        join request_providers rp on rp.request_id = r.id
        where rp.provider_id = ?
        order by r.created_at desc, r.revision desc
        "#,
        &[&provider_id],
    )
}

/// Full snapshots of every request mutated after `revision`, oldest change first.
pub fn changed_since(conn: &Connection, revision: i64) -> Result<Vec<ServiceRequest>, AppError> {
    load_where(
        conn,
        "select id from service_requests where revision > ? order by revision asc",
        &[&revision],
    )
}

/// Record one provider's accept/reject decision.
///
/// Guards: the provider must be one the request was fanned out to, the base
/// status must not be terminal, and only the first acceptance is taken.
pub fn record_provider_response(
    conn: &mut Connection,
    request_id: &str,
    provider_id: &str,
    decision: ResponseStatus,
    now: DateTime<Utc>,
) -> Result<ServiceRequest, AppError> {
    if decision == ResponseStatus::Pending {
        return Err(AppError::BadRequest(
            "a response must be accepted or rejected".into(),
        ));
    }

    let tx = conn
        .transaction()
        .map_err(|e| AppError::DbError(format!("begin tx failed: {e}")))?;

    let request = load_request(&tx, request_id)?.ok_or(AppError::NotFound)?;
    if !request.available_providers.contains(provider_id) {
        return Err(AppError::BadRequest(format!(
            "provider {provider_id} was not offered request {request_id}"
        )));
    }
    if request.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "request {request_id} is already {}",
            request.status
        )));
    }
    if request.response_of(provider_id) == ResponseStatus::Accepted {
        return Err(AppError::Conflict("an acceptance cannot be withdrawn".into()));
    }
    if decision == ResponseStatus::Accepted {
        if let Some(winner) = request.accepted_by() {
            return Err(AppError::Conflict(format!(
                "request {request_id} was already accepted by {winner}"
            )));
        }
    }

    tx.execute(
        r#"
        insert into provider_responses (request_id, provider_id, status, updated_at)
        values (?, ?, ?, ?)
        on conflict(request_id, provider_id)
        do update set status = excluded.status, updated_at = excluded.updated_at
        "#,
        params![request_id, provider_id, decision, now],
    )
    .map_err(|e| AppError::DbError(format!("upsert provider response failed: {e}")))?;
    touch(&tx, request_id, now)?;

    tx.commit()
        .map_err(|e| AppError::DbError(format!("commit tx failed: {e}")))?;

    let updated = load_request(conn, request_id)?.ok_or(AppError::InternalError)?;
    tracing::info!(
        %request_id,
        %provider_id,
        %decision,
        derived = %derive_status(&updated),
        "provider responded"
    );
    Ok(updated)
}

/// Customer cancellation. Only the owning customer may cancel, and not once
/// the request has been settled.
pub fn cancel_request(
    conn: &mut Connection,
    request_id: &str,
    customer_email: &str,
    now: DateTime<Utc>,
) -> Result<ServiceRequest, AppError> {
    let email = normalize_email(customer_email)?;

    let tx = conn
        .transaction()
        .map_err(|e| AppError::DbError(format!("begin tx failed: {e}")))?;

    let request = load_request(&tx, request_id)?.ok_or(AppError::NotFound)?;
    if request.customer.email != email {
        return Err(AppError::BadRequest(format!(
            "request {request_id} does not belong to {email}"
        )));
    }
    if matches!(
        request.status,
        OrderStatus::Cancelled | OrderStatus::Paid | OrderStatus::Completed | OrderStatus::Refunded
    ) {
        return Err(AppError::Conflict(format!(
            "request {request_id} is already {}",
            request.status
        )));
    }

    write_status(&tx, request_id, OrderStatus::Cancelled, now)?;

    tx.commit()
        .map_err(|e| AppError::DbError(format!("commit tx failed: {e}")))?;

    tracing::info!(%request_id, "request cancelled by customer");
    load_request(conn, request_id)?.ok_or(AppError::InternalError)
}

/// Administrative overwrite of the base status.
pub fn set_request_status(
    conn: &mut Connection,
    request_id: &str,
    status: OrderStatus,
    now: DateTime<Utc>,
) -> Result<ServiceRequest, AppError> {
    let tx = conn
        .transaction()
        .map_err(|e| AppError::DbError(format!("begin tx failed: {e}")))?;

    let previous = load_request(&tx, request_id)?.ok_or(AppError::NotFound)?;
    write_status(&tx, request_id, status, now)?;

    tx.commit()
        .map_err(|e| AppError::DbError(format!("commit tx failed: {e}")))?;

    tracing::info!(%request_id, from = %previous.status, to = %status, "request status set");
    load_request(conn, request_id)?.ok_or(AppError::InternalError)
}

fn write_status(
    conn: &Connection,
    request_id: &str,
    status: OrderStatus,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    conn.execute(
        "update service_requests set status = ? where id = ?",
        params![status, request_id],
    )
    .map_err(|e| AppError::DbError(format!("update request status failed: {e}")))?;
    touch(conn, request_id, now)
}
