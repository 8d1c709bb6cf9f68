//! SQLite backend for the VTU ledger engine.

mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
