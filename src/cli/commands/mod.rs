pub mod billing;
pub mod gate;
pub mod lineage;
pub mod migrate;
pub mod user;
