pub mod connection;
pub mod history_repo;

pub use connection::DatabaseConnection;
pub use history_repo::SqliteHistoryRepo;
