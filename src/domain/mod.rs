pub mod display;
pub mod logic;
pub mod request;
pub mod status;

pub use display::{status_display, StatusCategory, StatusDisplay};
pub use logic::derive_status;
pub use request::{Customer, NewServiceRequest, OrderItem, ProviderResponse, ServiceRequest};
pub use status::{ApplicationStatus, DerivedStatus, OrderStatus, ResponseStatus};
