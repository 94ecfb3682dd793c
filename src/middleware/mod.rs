pub mod gate;
pub mod response;
pub mod session;

pub use gate::{decide, required_role, GateDecision, GateRule, RULES};
pub use response::{ApiResponse, ApiResult};
pub use session::{authenticate, role_gate, SessionUser};
