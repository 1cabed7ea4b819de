//! supaguard - a read-only SQL endpoint for a Supabase admin dashboard.
//!
//! Incoming SQL is checked by a conservative validator, capped at a fixed
//! row count, and executed inside a read-only, time-limited transaction.
//! This library exposes the core modules for use in integration tests.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod query;
pub mod safety;
pub mod server;
