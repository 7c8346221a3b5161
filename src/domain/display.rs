// src/domain/display.rs

use crate::domain::status::DerivedStatus;
use serde::Serialize;

/// Visual bucket a status badge is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Warning,
    Info,
    Success,
    Danger,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusDisplay {
    pub label: &'static str,
    pub category: StatusCategory,
}

pub fn status_display(status: DerivedStatus) -> StatusDisplay {
    let (label, category) = match status {
        DerivedStatus::Pending => ("Pending", StatusCategory::Warning),
        DerivedStatus::Accepted => ("Accepted", StatusCategory::Info),
        DerivedStatus::Rejected => ("Rejected", StatusCategory::Danger),
        DerivedStatus::InProgress => ("In Progress", StatusCategory::Info),
        DerivedStatus::Completed => ("Completed", StatusCategory::Success),
        DerivedStatus::Paid => ("Paid", StatusCategory::Success),
        DerivedStatus::Cancelled => ("Cancelled", StatusCategory::Neutral),
        DerivedStatus::Refunded => ("Refunded", StatusCategory::Neutral),
        DerivedStatus::Disputed => ("Disputed", StatusCategory::Danger),
    };
    StatusDisplay { label, category }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_human_readable() {
        assert_eq!(status_display(DerivedStatus::InProgress).label, "In Progress");
        assert_eq!(
            status_display(DerivedStatus::Rejected).category,
            StatusCategory::Danger
        );
        assert_eq!(
            status_display(DerivedStatus::Paid).category,
            StatusCategory::Success
        );
    }
}
