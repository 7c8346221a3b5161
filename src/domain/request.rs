// src/domain/request.rs

use crate::domain::status::{OrderStatus, ResponseStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type RequestId = String;
pub type ProviderId = String;

/// A customer's request for one or more services, fanned out to eligible providers.
///
/// Every snapshot delivered by the feed is a full, self-consistent copy of this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: RequestId,
    pub customer: Customer,
    /// Base status, authoritative for payment and admin flows.
    pub status: OrderStatus,
    /// Providers eligible at creation time (pincode + service type match).
    pub available_providers: BTreeSet<ProviderId>,
    /// Populated lazily as providers act. Missing entries are implicitly pending.
    pub provider_responses: BTreeMap<ProviderId, ProviderResponse>,
    pub items: Vec<OrderItem>,
    pub total_amount_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Store-wide change counter, bumped on every mutation of this record.
    pub revision: i64,
}

impl ServiceRequest {
    /// Response for a provider, treating an absent slot as pending.
    pub fn response_of(&self, provider_id: &str) -> ResponseStatus {
        self.provider_responses
            .get(provider_id)
            .map(|r| r.status)
            .unwrap_or(ResponseStatus::Pending)
    }

    /// The provider whose acceptance won the request, if any.
    pub fn accepted_by(&self) -> Option<&str> {
        self.provider_responses
            .iter()
            .filter(|(id, _)| self.available_providers.contains(*id))
            .find(|(_, r)| r.status == ResponseStatus::Accepted)
            .map(|(id, _)| id.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub status: ResponseStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub address: String,
    pub pincode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub service_type: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
}

impl OrderItem {
    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity
    }
}

/// Cart contents submitted by a customer, before fan-out.
#[derive(Debug, Clone, Deserialize)]
pub struct NewServiceRequest {
    pub customer_email: String,
    pub customer_name: String,
    pub address: String,
    pub pincode: String,
    pub items: Vec<OrderItem>,
}
