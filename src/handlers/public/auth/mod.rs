// handlers/public/auth/mod.rs - Session acquisition
//
// Signing in happens client side with Firebase; these endpoints turn the
// resulting ID token into the server session cookie and back out again.

pub mod session;

pub use session::{session_create, session_delete};
