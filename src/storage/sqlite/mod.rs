mod sqlite;
mod sqlite_publishers;

pub use sqlite::SqliteStorage;
