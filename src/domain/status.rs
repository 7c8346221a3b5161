// src/domain/status.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base lifecycle status as stored on a service request.
///
/// Written directly by customer or administrative actions. No transition
/// table is enforced here; the write path decides what is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Paid,
    Cancelled,
    Refunded,
    Disputed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Paid,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
        OrderStatus::Disputed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Disputed => "disputed",
        }
    }

    /// Statuses that short-circuit provider-response analysis.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Cancelled | OrderStatus::Paid | OrderStatus::Completed
        )
    }
}

/// One provider's decision on a request. Absent entries read as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ResponseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseStatus::Pending => "pending",
            ResponseStatus::Accepted => "accepted",
            ResponseStatus::Rejected => "rejected",
        }
    }
}

/// Review state of a provider application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

/// What the customer is shown. The base vocabulary plus `Rejected`,
/// which only exists as the outcome of exhaustive rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedStatus {
    Pending,
    Accepted,
    Rejected,
    InProgress,
    Completed,
    Paid,
    Cancelled,
    Refunded,
    Disputed,
}

impl DerivedStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DerivedStatus::Pending => "pending",
            DerivedStatus::Accepted => "accepted",
            DerivedStatus::Rejected => "rejected",
            DerivedStatus::InProgress => "in_progress",
            DerivedStatus::Completed => "completed",
            DerivedStatus::Paid => "paid",
            DerivedStatus::Cancelled => "cancelled",
            DerivedStatus::Refunded => "refunded",
            DerivedStatus::Disputed => "disputed",
        }
    }
}

impl From<OrderStatus> for DerivedStatus {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Pending => DerivedStatus::Pending,
            OrderStatus::Accepted => DerivedStatus::Accepted,
            OrderStatus::InProgress => DerivedStatus::InProgress,
            OrderStatus::Completed => DerivedStatus::Completed,
            OrderStatus::Paid => DerivedStatus::Paid,
            OrderStatus::Cancelled => DerivedStatus::Cancelled,
            OrderStatus::Refunded => DerivedStatus::Refunded,
            OrderStatus::Disputed => DerivedStatus::Disputed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

impl FromStr for ResponseStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ResponseStatus::Pending),
            "accepted" => Ok(ResponseStatus::Accepted),
            "rejected" => Ok(ResponseStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApplicationStatus::Pending),
            "approved" => Ok(ApplicationStatus::Approved),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DerivedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
