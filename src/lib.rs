//! Moldstore: CSV-Backed Inventory Tables
//!
//! Mold and cutter inventory tables stored as CSV files in a remote file
//! store. Every mutation is a fetch-mutate-write cycle guarded by the file's
//! version token and retried on conflict, so concurrent writers never lose
//! each other's updates.

pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod search;
pub mod server;
pub mod service;
pub mod store;
pub mod table;
pub mod tooling;
pub mod types;
pub mod writer;
