pub mod analytics;
pub mod columns;
pub mod connection;
pub mod providers;
pub mod requests;
pub mod users;

pub use connection::{init_db, Database};
