//! Shared shapler data models consumed by the core library and runner crates.

pub mod capture;
pub mod ledger;
pub mod record;

pub use capture::*;
pub use ledger::*;
pub use record::*;
