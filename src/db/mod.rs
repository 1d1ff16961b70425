//! Database layer
//!
//! SQLite is the default backend; MySQL is selected through configuration.
//! Both sit behind the `DatabasePool` trait so repositories can pick the
//! right SQL dialect at runtime.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
