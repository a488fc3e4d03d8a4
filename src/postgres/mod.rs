// ABOUTME: PostgreSQL destination module
// ABOUTME: Exports connection management, catalog lookups, and privilege checks

pub mod catalog;
pub mod connection;
pub mod privileges;

pub use catalog::{count_rows, query_count, table_exists};
pub use connection::{connect, connect_with_retry, target_url};
pub use privileges::{check_schema_privileges, PrivilegeCheck};
