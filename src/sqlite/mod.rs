// SQLite backend.
//
// - config: options, builder and pool wiring
// - params: conversion from canonical values to rusqlite values
// - driver: the `Driver` implementation over `rusqlite::Connection`

pub mod config;
pub mod driver;
pub mod params;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use driver::SqliteDriver;
pub use params::row_value_to_sqlite_value;
