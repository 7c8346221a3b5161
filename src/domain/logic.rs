// src/domain/logic.rs

use crate::domain::request::ServiceRequest;
use crate::domain::status::{DerivedStatus, ResponseStatus};

/// Determines the status shown to the customer from the stored base status and
/// the providers' responses. The order of checks determines precedence.
///
/// For example, a request can carry both an acceptance and several rejections,
/// but any acceptance wins: the request is no longer up for grabs.
///
/// Responses keyed by a provider outside `available_providers` are ignored.
/// Pure and total; never touches storage.
pub fn derive_status(request: &ServiceRequest) -> DerivedStatus {
    if request.status.is_terminal() {
        return request.status.into();
    }
    if request.provider_responses.is_empty() {
        return DerivedStatus::Pending;
    }

    let mut rejected = 0usize;
    for (provider_id, response) in &request.provider_responses {
        if !request.available_providers.contains(provider_id) {
            continue;
        }
        match response.status {
            ResponseStatus::Accepted => return DerivedStatus::Accepted,
            ResponseStatus::Rejected => rejected += 1,
            ResponseStatus::Pending => {}
        }
    }

    // Zero eligible providers is not exhaustive rejection.
    let total = request.available_providers.len();
    if total > 0 && rejected == total {
        DerivedStatus::Rejected
    } else {
        DerivedStatus::Pending
    }
}
