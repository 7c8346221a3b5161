//! Local-services marketplace core: service requests fanned out to providers,
//! and the customer-facing status derived from their responses.

pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod feed;
pub mod ids;
pub mod mailer;

#[cfg(test)]
mod tests;
