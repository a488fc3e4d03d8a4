// ABOUTME: Command implementations for each migration step
// ABOUTME: Exports check, export, import, verify, migrate, and organize commands

pub mod check;
pub mod export;
pub mod import;
pub mod migrate;
pub mod organize;
pub mod verify;

pub use check::check;
pub use export::export;
pub use import::import;
pub use migrate::{migrate, MigrateOptions};
pub use organize::organize;
pub use verify::verify;
