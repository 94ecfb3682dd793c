// handlers/public/mod.rs - Public handlers (no session required)
//
// Service info, health, the landing page's GitHub widgets, stored files and
// the session endpoints that acquire a cookie in the first place.

pub mod auth;
pub mod files;
pub mod github;
pub mod info;

pub use files::file_get;
pub use github::github_activity;
pub use info::{health, login_page, root};
