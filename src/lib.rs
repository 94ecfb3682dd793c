pub mod auth;
pub mod billing;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod github;
pub mod google;
pub mod handlers;
pub mod images;
pub mod lineage;
pub mod middleware;
pub mod n8n;
pub mod state;
pub mod storage;

#[cfg(test)]
pub mod testing;
