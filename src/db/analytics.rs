// src/db/analytics.rs
use crate::db::providers::{count_active_providers, count_pending_applications};
use crate::db::requests::list_requests;
use crate::domain::{derive_status, DerivedStatus, OrderStatus};
use crate::errors::AppError;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

/// Numbers for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminSummary {
    pub total_requests: i64,
    /// Keyed by what customers currently see, not the stored base status.
    pub by_derived_status: BTreeMap<DerivedStatus, i64>,
    pub paid_revenue_cents: i64,
    pub active_providers: i64,
    pub pending_applications: i64,
}

pub fn admin_summary(conn: &Connection) -> Result<AdminSummary, AppError> {
    let requests = list_requests(conn)?;

    let mut by_derived_status = BTreeMap::new();
    let mut paid_revenue_cents = 0i64;
    for request in &requests {
        *by_derived_status.entry(derive_status(request)).or_insert(0) += 1;
        if request.status == OrderStatus::Paid {
            paid_revenue_cents = paid_revenue_cents
                .checked_add(request.total_amount_cents)
                .ok_or(AppError::InternalError)?;
        }
    }

    Ok(AdminSummary {
        total_requests: requests.len() as i64,
        by_derived_status,
        paid_revenue_cents,
        active_providers: count_active_providers(conn)?,
        pending_applications: count_pending_applications(conn)?,
    })
}
