// src/lib.rs
//
// Headless core of the KRONOS leave-management frontend. Everything here is
// a client of the remote leave API: typed repository wrappers, the leave
// lifecycle controller, the calendar aggregation view-model, the wallet
// controller, and the shared notification + query-cache glue.

pub mod admin;
pub mod approvals;
pub mod auth;
pub mod balance;
pub mod cache;
pub mod calendar;
pub mod client;
pub mod config;
pub mod error;
pub mod leave;
pub mod lifecycle;
pub mod notify;

pub use client::KronosClient;
pub use config::KronosConfig;
pub use error::KronosError;

#[cfg(test)]
mod balance_tests;
#[cfg(test)]
mod client_tests;
