pub mod firebase;
pub mod role;
pub mod session;

pub use firebase::{FirebaseVerifier, IdentityError, IdentityVerifier, VerifiedIdentity};
pub use role::Role;
pub use session::{IssuedSession, SessionClaims, SessionError, SessionManager};
