pub mod manager;
pub mod models;
pub mod relations;
pub mod users;

pub use manager::{DatabaseError, DatabaseManager};
pub use relations::PgLineageStore;
pub use users::{PgUserStore, UserStore};
