// ABOUTME: Library crate for sqlite-postgres-migrator
// ABOUTME: Exports all modules for use by the binary and integration tests

pub mod commands;
pub mod config;
pub mod migration;
pub mod organize;
pub mod postgres;
pub mod sqlite;
pub mod utils;
