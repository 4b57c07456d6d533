//! Ticket Ledger sync library.
//!
//! Pulls fulfilled Webflow orders, enriches every purchased ticket with CMS
//! data and keeps a per-variant running total in a Google Sheet. Exposed as
//! a library so the server binary, the CLI and the integration tests share
//! one implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkpoint;
pub mod config;
pub mod enrich;
pub mod error;
pub mod export;
pub mod orders;
pub mod reconcile;
pub mod routes;
pub mod service;
pub mod sheets;
pub mod state;
pub mod throttle;
pub mod webflow;
