//! Database layer
//!
//! SQLite is the default backend; MySQL can be selected in `config.yml`.
//! Everything above this module talks to the database through the
//! repository traits in [`repositories`].

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
