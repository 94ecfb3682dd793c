// handlers/elevated/mod.rs - Admin-only handlers
//
// Route Prefix: /api/admin/*
// Gate: Admin role, re-checked against the users table on every request

pub mod users;
