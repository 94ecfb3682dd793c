pub mod relation;
pub mod user;

pub use relation::{ImageRelation, NewRelation};
pub use user::{NewUser, User};
