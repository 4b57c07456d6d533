//! Ticket Ledger Core - Shared types library.
//!
//! This crate provides the plain records that flow through a sync run:
//! - `sync` - Webflow → Google Sheets order sync (server and library)
//! - `cli` - Command-line tools for running syncs and managing the checkpoint
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. This keeps it lightweight and trivially testable.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, orders, enrichment records and spreadsheet rows

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
