//! Zoho Books report collaborators: API client and the per-report jobs.

pub mod client;
pub mod reports;

pub use client::ZohoClient;
pub use reports::run_all;
