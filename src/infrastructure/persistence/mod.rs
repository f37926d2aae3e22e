//! Persistence Layer - 数据持久化
//!
//! SQLite 元数据存储实现

pub mod sqlite;

pub use self::sqlite::{create_pool, run_migrations, DatabaseConfig, DbPool, SqliteVoiceRepository};
